//! Byte codec - integers, script encodings and inscriptions
//!
//! Everything that ends up inside an output script or an oracle message is
//! encoded here. The encodings are consensus-critical: the engine and the
//! surrounding system must agree on them bit-for-bit, so every helper is
//! deterministic and every decoder rejects malformed or non-minimal input.
//!
//! # Encodings
//!
//! - integers: little-endian fixed width (`u32`, `u64`)
//! - lengths: Bitcoin compact-size varint
//! - script numbers: minimal little-endian sign-magnitude
//! - data pushes: minimal `OP_PUSHDATA*` framing
//! - outpoints: `txid || vout (u32 LE)`, 36 bytes

use serde::{Deserialize, Serialize};

use crate::digest::hash160;
use crate::{Error, Result};

// ── Opcodes ───────────────────────────────────────────────

pub const OP_0: u8 = 0x00;
pub const OP_FALSE: u8 = OP_0;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_IF: u8 = 0x63;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// Size of an encoded outpoint (txid + output index)
pub const OUTPOINT_LEN: usize = 36;

// ── Slicing ───────────────────────────────────────────────

/// Bounds-checked `bytes[start..end]`
pub fn slice(bytes: &[u8], start: usize, end: usize) -> Result<&[u8]> {
    if start > end || end > bytes.len() {
        return Err(Error::Codec(format!(
            "slice [{}:{}) out of range for {} bytes",
            start,
            end,
            bytes.len()
        )));
    }
    Ok(&bytes[start..end])
}

/// Read a little-endian `u64` at `offset`
pub fn read_u64_le(bytes: &[u8], offset: usize) -> Result<u64> {
    let end = offset
        .checked_add(8)
        .ok_or_else(|| Error::Codec("u64 offset overflow".into()))?;
    let raw: [u8; 8] = slice(bytes, offset, end)?
        .try_into()
        .map_err(|_| Error::Codec("u64 requires 8 bytes".into()))?;
    Ok(u64::from_le_bytes(raw))
}

/// Read a little-endian `u32` at `offset`
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    let end = offset
        .checked_add(4)
        .ok_or_else(|| Error::Codec("u32 offset overflow".into()))?;
    let raw: [u8; 4] = slice(bytes, offset, end)?
        .try_into()
        .map_err(|_| Error::Codec("u32 requires 4 bytes".into()))?;
    Ok(u32::from_le_bytes(raw))
}

// ── Varint ────────────────────────────────────────────────

pub fn write_varint(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Decode a compact-size varint, returning `(value, bytes consumed)`
pub fn read_varint(bytes: &[u8]) -> Result<(u64, usize)> {
    let prefix = *bytes
        .first()
        .ok_or_else(|| Error::Codec("empty varint".into()))?;
    let (value, used, min) = match prefix {
        0xfd => {
            let raw = slice(bytes, 1, 3)?;
            (u16::from_le_bytes([raw[0], raw[1]]) as u64, 3, 0xfd)
        }
        0xfe => (read_u32_le(bytes, 1)? as u64, 5, 0x1_0000),
        0xff => (read_u64_le(bytes, 1)?, 9, 0x1_0000_0000),
        n => (n as u64, 1, 0),
    };
    if value < min {
        return Err(Error::Codec(format!("non-canonical varint {}", value)));
    }
    Ok((value, used))
}

// ── Script numbers ────────────────────────────────────────

/// Minimal sign-magnitude little-endian encoding; zero is the empty string
pub fn encode_script_num(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let negative = n < 0;
    let mut magnitude = n.unsigned_abs();
    let mut out = Vec::with_capacity(9);
    while magnitude > 0 {
        out.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }
    let last = out.len() - 1;
    if out[last] & 0x80 != 0 {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        out[last] |= 0x80;
    }
    out
}

pub fn decode_script_num(bytes: &[u8]) -> Result<i64> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 8 {
        return Err(Error::Codec(format!(
            "script number of {} bytes exceeds 8",
            bytes.len()
        )));
    }
    let last = bytes[bytes.len() - 1];
    if last & 0x7f == 0 && (bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0) {
        return Err(Error::Codec("non-minimal script number".into()));
    }
    let mut magnitude: u64 = 0;
    for (i, b) in bytes.iter().enumerate() {
        let b = if i == bytes.len() - 1 { b & 0x7f } else { *b };
        magnitude |= (b as u64) << (8 * i);
    }
    // At most 63 magnitude bits survive the masking above
    let value = magnitude as i64;
    Ok(if last & 0x80 != 0 { -value } else { value })
}

// ── Pushdata ──────────────────────────────────────────────

pub fn push_data(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    match len {
        0 => out.push(OP_0),
        1..=75 => out.push(len as u8),
        76..=0xff => {
            out.push(OP_PUSHDATA1);
            out.push(len as u8);
        }
        0x100..=0xffff => {
            out.push(OP_PUSHDATA2);
            out.extend_from_slice(&(len as u16).to_le_bytes());
        }
        _ => {
            out.push(OP_PUSHDATA4);
            out.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    out.extend_from_slice(data);
}

/// Decode one data push, returning `(payload, bytes consumed)`
pub fn read_push(bytes: &[u8]) -> Result<(&[u8], usize)> {
    let op = *bytes
        .first()
        .ok_or_else(|| Error::Codec("expected pushdata, found end of script".into()))?;
    let (len, header) = match op {
        OP_0 => (0usize, 1usize),
        1..=75 => (op as usize, 1),
        OP_PUSHDATA1 => (slice(bytes, 1, 2)?[0] as usize, 2),
        OP_PUSHDATA2 => {
            let raw = slice(bytes, 1, 3)?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, 3)
        }
        OP_PUSHDATA4 => (read_u32_le(bytes, 1)? as usize, 5),
        other => {
            return Err(Error::Codec(format!(
                "expected pushdata, found opcode {:#04x}",
                other
            )))
        }
    };
    let end = header
        .checked_add(len)
        .ok_or_else(|| Error::Codec("pushdata length overflow".into()))?;
    Ok((slice(bytes, header, end)?, end))
}

// ── Chain primitives ──────────────────────────────────────

/// Reference to a transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outpoint {
    #[serde(with = "hex_array")]
    pub txid: [u8; 32],
    pub vout: u32,
}

impl Outpoint {
    pub fn encode(&self) -> [u8; OUTPOINT_LEN] {
        let mut out = [0u8; OUTPOINT_LEN];
        out[..32].copy_from_slice(&self.txid);
        out[32..].copy_from_slice(&self.vout.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let txid: [u8; 32] = slice(bytes, 0, 32)?
            .try_into()
            .map_err(|_| Error::Codec("txid requires 32 bytes".into()))?;
        let vout = read_u32_le(bytes, 32)?;
        Ok(Outpoint { txid, vout })
    }
}

/// P2PKH address: hash160 of a public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Addr(#[serde(with = "hex_array")] pub [u8; 20]);

impl Addr {
    pub fn from_pubkey(key: &PubKey) -> Self {
        Addr(hash160(key.as_bytes()))
    }
}

/// SEC1-encoded public key (compressed or uncompressed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PubKey(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl PubKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// BSV-20 v2 token id, e.g. `"<txid>_<vout>"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// ── BSV-20 inscriptions ───────────────────────────────────

const ORD_TAG: &[u8] = b"ord";
const BSV20_CONTENT_TYPE: &[u8] = b"application/bsv-20";

/// Canonical transfer inscription envelope for `(token_id, amt)`
///
/// `OP_FALSE OP_IF "ord" OP_1 <content-type> OP_0 <json> OP_ENDIF`
pub fn transfer_inscription(token_id: &TokenId, amt: u64) -> Vec<u8> {
    let mut content = Vec::with_capacity(64 + token_id.0.len());
    content.extend_from_slice(br#"{"p":"bsv-20","op":"transfer","id":""#);
    content.extend_from_slice(token_id.as_bytes());
    content.extend_from_slice(br#"","amt":""#);
    content.extend_from_slice(amt.to_string().as_bytes());
    content.extend_from_slice(br#""}"#);

    let mut out = Vec::with_capacity(content.len() + 32);
    out.push(OP_FALSE);
    out.push(OP_IF);
    push_data(&mut out, ORD_TAG);
    out.push(OP_1);
    push_data(&mut out, BSV20_CONTENT_TYPE);
    out.push(OP_0);
    push_data(&mut out, &content);
    out.push(OP_ENDIF);
    out
}

// ── Serde helpers ─────────────────────────────────────────

/// Hex encoding for variable-length byte fields
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Hex encoding for fixed-size byte arrays
pub mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}
