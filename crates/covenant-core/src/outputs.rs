//! Output builder - exact byte layout of every output a covenant constrains
//!
//! An output is `value (u64 LE) || varint(len(script)) || script`. The
//! covenants only ever require four kinds of output:
//!
//! - continuation: the contract's own locking script carrying the next state
//! - payment: plain P2PKH
//! - token transfer: BSV-20 transfer inscription prepended to a P2PKH script
//! - change: P2PKH to a caller-chosen address, omitted when zero

use serde::{Deserialize, Serialize};

use crate::codec::{
    read_u32_le, slice, transfer_inscription, write_varint, Addr, TokenId, OP_CHECKSIG, OP_DUP,
    OP_EQUALVERIFY, OP_HASH160, OP_RETURN,
};
use crate::digest::Hash256;
use crate::{Error, Result};

/// Version byte appended after the state length
pub const STATE_VERSION: u8 = 0x00;

/// Value locked in a token-transfer output
pub const TRANSFER_OUTPUT_VALUE: u64 = 1;

/// A single transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    #[serde(with = "crate::codec::hex_bytes")]
    pub script: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: u64, script: Vec<u8>) -> Self {
        TxOutput { value, script }
    }

    /// Pay `value` to a public-key-hash address
    pub fn p2pkh(addr: &Addr, value: u64) -> Self {
        TxOutput::new(value, p2pkh_script(addr))
    }

    /// 1-sat ordinal output transferring `amt` of `token_id` to `addr`
    pub fn token_transfer(addr: &Addr, token_id: &TokenId, amt: u64) -> Self {
        let mut script = transfer_inscription(token_id, amt);
        script.extend_from_slice(&p2pkh_script(addr));
        TxOutput::new(TRANSFER_OUTPUT_VALUE, script)
    }

    /// Re-instantiate a stateful contract carrying `state`
    pub fn continuation(script_code: &[u8], state: &[u8], value: u64) -> Self {
        TxOutput::new(value, state_script(script_code, state))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 9 + self.script.len());
        out.extend_from_slice(&self.value.to_le_bytes());
        write_varint(&mut out, self.script.len() as u64);
        out.extend_from_slice(&self.script);
        out
    }
}

pub fn p2pkh_script(addr: &Addr) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(&addr.0);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// `code || OP_RETURN || state || u32 LE(len(state)) || version`
pub fn state_script(script_code: &[u8], state: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(script_code.len() + state.len() + 6);
    script.extend_from_slice(script_code);
    script.push(OP_RETURN);
    script.extend_from_slice(state);
    script.extend_from_slice(&(state.len() as u32).to_le_bytes());
    script.push(STATE_VERSION);
    script
}

/// Split a stateful locking script into `(code, state)`
pub fn split_state_script(script: &[u8]) -> Result<(&[u8], &[u8])> {
    if script.len() < 6 {
        return Err(Error::Codec("state script too short".into()));
    }
    let version = script[script.len() - 1];
    if version != STATE_VERSION {
        return Err(Error::Codec(format!(
            "unknown state version {:#04x}",
            version
        )));
    }
    let len_at = script.len() - 5;
    let state_len = read_u32_le(script, len_at)? as usize;
    // code || OP_RETURN || state
    let state_start = len_at
        .checked_sub(state_len)
        .ok_or_else(|| Error::Codec("state length exceeds script".into()))?;
    let return_at = state_start
        .checked_sub(1)
        .ok_or_else(|| Error::Codec("missing OP_RETURN before state".into()))?;
    if script[return_at] != OP_RETURN {
        return Err(Error::Codec("missing OP_RETURN before state".into()));
    }
    Ok((slice(script, 0, return_at)?, slice(script, state_start, len_at)?))
}

/// A contract whose locking script carries serialized mutable state
pub trait Stateful {
    /// Immutable code part fixed at deployment
    fn script_code(&self) -> &[u8];

    /// Serialized mutable fields, in declaration order
    fn encode_state(&self) -> Result<Vec<u8>>;

    fn locking_script(&self) -> Result<Vec<u8>> {
        Ok(state_script(self.script_code(), &self.encode_state()?))
    }

    /// Continuation output re-committing this state at `value`
    fn continuation(&self, value: u64) -> Result<TxOutput> {
        Ok(TxOutput::new(value, self.locking_script()?))
    }
}

/// Change output requested by the transaction builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOutput {
    pub address: Addr,
    pub amount: u64,
}

impl ChangeOutput {
    /// Zero change emits nothing
    pub fn to_output(&self) -> Option<TxOutput> {
        (self.amount > 0).then(|| TxOutput::p2pkh(&self.address, self.amount))
    }
}

/// Ordered outputs whose concatenation is committed to by `hashOutputs`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSet {
    pub outputs: Vec<TxOutput>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, output: TxOutput) {
        self.outputs.push(output);
    }

    pub fn push_change(&mut self, change: Option<&ChangeOutput>) {
        if let Some(out) = change.and_then(ChangeOutput::to_output) {
            self.outputs.push(out);
        }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Serialized output blocks, in commitment order
    pub fn blocks(&self) -> Vec<Vec<u8>> {
        self.outputs.iter().map(TxOutput::serialize).collect()
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.outputs.iter().flat_map(|o| o.serialize()).collect()
    }

    pub fn digest(&self) -> Hash256 {
        Hash256::of(&self.serialize())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Addr {
        Addr([b; 20])
    }

    #[test]
    fn test_p2pkh_script_layout() {
        let script = p2pkh_script(&addr(0xcd));
        assert_eq!(script.len(), 25);
        assert_eq!(&script[..3], &[0x76, 0xa9, 0x14]);
        assert_eq!(&script[3..23], &[0xcd; 20]);
        assert_eq!(&script[23..], &[0x88, 0xac]);
    }

    #[test]
    fn test_output_serialization() {
        let out = TxOutput::p2pkh(&addr(1), 1000);
        let bytes = out.serialize();
        assert_eq!(&bytes[..8], &1000u64.to_le_bytes());
        assert_eq!(bytes[8], 25);
        assert_eq!(&bytes[9..], &p2pkh_script(&addr(1))[..]);
    }

    #[test]
    fn test_token_transfer_output() {
        let id = TokenId("deadbeef_0".into());
        let out = TxOutput::token_transfer(&addr(2), &id, 50);
        assert_eq!(out.value, 1);
        let ins = transfer_inscription(&id, 50);
        assert!(out.script.starts_with(&ins));
        assert!(out.script.ends_with(&p2pkh_script(&addr(2))));
    }

    #[test]
    fn test_state_script_split_roundtrip() {
        let code = vec![0x51, 0x52, 0x53];
        let state = vec![0x01, 0x05];
        let script = state_script(&code, &state);
        assert_eq!(
            script,
            vec![0x51, 0x52, 0x53, 0x6a, 0x01, 0x05, 2, 0, 0, 0, 0x00]
        );
        let (c, s) = split_state_script(&script).unwrap();
        assert_eq!(c, &code[..]);
        assert_eq!(s, &state[..]);
    }

    #[test]
    fn test_split_state_script_rejects_garbage() {
        assert!(split_state_script(&[0x00]).is_err());
        // state length larger than the script
        assert!(split_state_script(&[0x6a, 0xff, 0, 0, 0, 0x00]).is_err());
        // version mismatch
        assert!(split_state_script(&[0x6a, 0, 0, 0, 0, 0x01]).is_err());
    }

    #[test]
    fn test_zero_change_is_omitted() {
        let mut set = OutputSet::new();
        set.push_change(Some(&ChangeOutput {
            address: addr(3),
            amount: 0,
        }));
        set.push_change(None);
        assert!(set.is_empty());
        set.push_change(Some(&ChangeOutput {
            address: addr(3),
            amount: 7,
        }));
        assert_eq!(set.len(), 1);
        assert_eq!(set.outputs[0], TxOutput::p2pkh(&addr(3), 7));
    }

    #[test]
    fn test_output_set_concatenates_in_order() {
        let a = TxOutput::p2pkh(&addr(1), 1);
        let b = TxOutput::p2pkh(&addr(2), 2);
        let mut set = OutputSet::new();
        set.push(a.clone());
        set.push(b.clone());
        let mut expected = a.serialize();
        expected.extend(b.serialize());
        assert_eq!(set.serialize(), expected);
        assert_eq!(set.blocks(), vec![a.serialize(), b.serialize()]);
        assert_eq!(set.digest(), Hash256::of(&expected));
    }
}
