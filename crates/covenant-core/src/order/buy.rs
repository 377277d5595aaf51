//! Buy-side limit order settled through a Rabin price oracle
//!
//! The buyer locks satoshis in the covenant. A seller spends one of their
//! BSV-20 token UTXOs as the first input and presents an oracle attestation
//! of how many tokens it holds:
//!
//! ```text
//! oracle_msg = outpoint (36) || amount u64 LE (8) || transfer inscription (L)
//! ```
//!
//! Required outputs, in order:
//!
//! 1. token transfer of `total_amount` to the buyer's address
//! 2. P2PKH payment of the covenant UTXO's value to the seller
//! 3. continuation at the UTXO's value, only when the order became fully cleared
//! 4. change

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{cancel, check_counter, check_positive, encode_counter_state, Settlement};
use crate::codec::{read_u64_le, transfer_inscription, Addr, PubKey, TokenId, OUTPOINT_LEN};
use crate::commitment::verify_outputs;
use crate::oracle::{verify_sig, RabinPubKey, RabinSig};
use crate::outputs::{OutputSet, Stateful, TxOutput};
use crate::{Error, Result, SpendContext};

/// Offset of the attested token amount inside the oracle message
pub const ORACLE_AMOUNT_OFFSET: usize = OUTPOINT_LEN;
/// Offset of the transfer inscription inside the oracle message
pub const ORACLE_INSCRIPTION_OFFSET: usize = ORACLE_AMOUNT_OFFSET + 8;

/// Buy order snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyOrder {
    pub token_id: TokenId,
    /// Total tokens wanted over the covenant's lifetime
    pub total_amount: u64,
    /// Tokens already cleared
    pub cleared_amount: u64,
    pub oracle_key: RabinPubKey,
    pub buyer: PubKey,
    #[serde(with = "crate::codec::hex_bytes")]
    pub script_code: Vec<u8>,
}

/// Witness for `settle`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuySettle {
    #[serde(with = "crate::codec::hex_bytes")]
    pub oracle_msg: Vec<u8>,
    pub oracle_sig: RabinSig,
    pub seller_addr: Addr,
}

impl Stateful for BuyOrder {
    fn script_code(&self) -> &[u8] {
        &self.script_code
    }

    fn encode_state(&self) -> Result<Vec<u8>> {
        encode_counter_state(self.cleared_amount)
    }
}

impl BuyOrder {
    /// Fresh deployment with nothing cleared
    pub fn new(
        token_id: TokenId,
        total_amount: u64,
        oracle_key: RabinPubKey,
        buyer: PubKey,
        script_code: Vec<u8>,
    ) -> Self {
        BuyOrder {
            token_id,
            total_amount,
            cleared_amount: 0,
            oracle_key,
            buyer,
            script_code,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total_amount.saturating_sub(self.cleared_amount)
    }

    /// Run every check except the commitment and return the required outputs
    pub fn build_settlement(
        &self,
        call: &BuySettle,
        ctx: &SpendContext,
    ) -> Result<Settlement<BuyOrder>> {
        check_counter(self.cleared_amount, self.total_amount)?;
        let msg = &call.oracle_msg;

        if !verify_sig(msg, &call.oracle_sig, &self.oracle_key) {
            return Err(Error::Authentication("oracle sig verify failed".into()));
        }

        // The attestation must describe the UTXO spent by the first input
        if msg.get(..OUTPOINT_LEN) != Some(ctx.first_prevout()?) {
            return Err(Error::Binding(
                "first input is not spending specified ordinal UTXO".into(),
            ));
        }

        let utxo_token_amount = read_u64_le(msg, ORACLE_AMOUNT_OFFSET)?;
        let remaining = self.total_amount - self.cleared_amount;
        if utxo_token_amount > remaining {
            return Err(Error::InvariantViolation(
                "UTXO token amount exceeds total".into(),
            ));
        }
        check_positive(utxo_token_amount)?;

        let next = BuyOrder {
            cleared_amount: self.cleared_amount + utxo_token_amount,
            ..self.clone()
        };

        let inscription = transfer_inscription(&self.token_id, utxo_token_amount);
        let end = ORACLE_INSCRIPTION_OFFSET + inscription.len();
        let attested = msg.get(ORACLE_INSCRIPTION_OFFSET..end);
        if attested != Some(&inscription[..]) {
            return Err(Error::Binding("unexpected inscription from oracle".into()));
        }

        let mut outputs = OutputSet::new();
        outputs.push(TxOutput::token_transfer(
            &Addr::from_pubkey(&self.buyer),
            &self.token_id,
            self.total_amount,
        ));
        outputs.push(TxOutput::p2pkh(&call.seller_addr, ctx.utxo.value));
        let continued = next.cleared_amount == next.total_amount;
        if continued {
            outputs.push(next.continuation(ctx.utxo.value)?);
        }
        outputs.push_change(ctx.change.as_ref());

        debug!(
            attested = utxo_token_amount,
            cleared = next.cleared_amount,
            total = next.total_amount,
            continued,
            outputs = outputs.len(),
            "buy order settlement built"
        );

        Ok(Settlement {
            next,
            continued,
            outputs,
        })
    }

    /// Settle against the oracle attestation and verify the commitment
    pub fn settle(&self, call: &BuySettle, ctx: &SpendContext) -> Result<Settlement<BuyOrder>> {
        let settlement = self.build_settlement(call, ctx)?;
        verify_outputs(&settlement.outputs, &ctx.hash_outputs)?;
        Ok(settlement)
    }

    /// Buyer-authorized termination
    pub fn cancel(&self, sig: &[u8], ctx: &SpendContext) -> Result<()> {
        cancel(&self.buyer, sig, ctx)
    }
}
