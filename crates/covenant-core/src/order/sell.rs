//! Sell-side limit order, settled directly against the buyer's quantity
//!
//! The seller locks the covenant holding their tokens. A buyer names an
//! amount and is paid out tokens while the seller receives satoshis at the
//! fixed `price_per_unit`. Required outputs, in order:
//!
//! 1. continuation holding 1 sat, while tokens remain
//! 2. token transfer of `amount` to the seller's address
//! 3. P2PKH payment of `price_per_unit * amount` to the buyer's address
//! 4. change
//!
//! A single step may never sell the whole remaining balance: the check is
//! `sold + amount < total`, strictly.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{cancel, check_counter, check_positive, encode_counter_state, Settlement};
use crate::codec::{Addr, PubKey, TokenId};
use crate::commitment::verify_outputs;
use crate::outputs::{OutputSet, Stateful, TxOutput};
use crate::{Error, Result, SpendContext};

/// Marker value held by the continuation output
pub const CONTINUATION_VALUE: u64 = 1;

/// Sell order snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellOrder {
    pub token_id: TokenId,
    pub total_amount: u64,
    pub sold_amount: u64,
    pub seller: PubKey,
    /// Asking price in satoshis per token unit
    pub price_per_unit: u64,
    #[serde(with = "crate::codec::hex_bytes")]
    pub script_code: Vec<u8>,
}

/// Witness for `settle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellSettle {
    pub amount: u64,
    pub buyer_addr: Addr,
}

impl Stateful for SellOrder {
    fn script_code(&self) -> &[u8] {
        &self.script_code
    }

    fn encode_state(&self) -> Result<Vec<u8>> {
        encode_counter_state(self.sold_amount)
    }
}

impl SellOrder {
    pub fn new(
        token_id: TokenId,
        total_amount: u64,
        seller: PubKey,
        price_per_unit: u64,
        script_code: Vec<u8>,
    ) -> Self {
        SellOrder {
            token_id,
            total_amount,
            sold_amount: 0,
            seller,
            price_per_unit,
            script_code,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total_amount.saturating_sub(self.sold_amount)
    }

    /// Run every check except the commitment and return the required outputs
    pub fn build_settlement(
        &self,
        call: &SellSettle,
        ctx: &SpendContext,
    ) -> Result<Settlement<SellOrder>> {
        check_counter(self.sold_amount, self.total_amount)?;

        if ctx.first_prevout()? != &ctx.utxo.outpoint.encode()[..] {
            return Err(Error::Binding(
                "first input is not spending this contract".into(),
            ));
        }

        let sold = self
            .sold_amount
            .checked_add(call.amount)
            .filter(|sold| *sold < self.total_amount)
            .ok_or_else(|| {
                Error::InvariantViolation("insufficient tokens left in the contract".into())
            })?;
        check_positive(call.amount)?;

        let next = SellOrder {
            sold_amount: sold,
            ..self.clone()
        };

        let mut outputs = OutputSet::new();
        let continued = next.total_amount - next.sold_amount > 0;
        if continued {
            outputs.push(next.continuation(CONTINUATION_VALUE)?);
        }
        outputs.push(TxOutput::token_transfer(
            &Addr::from_pubkey(&self.seller),
            &self.token_id,
            call.amount,
        ));
        let sats_for_buyer = self
            .price_per_unit
            .checked_mul(call.amount)
            .ok_or_else(|| Error::InvariantViolation("payment amount overflows".into()))?;
        outputs.push(TxOutput::p2pkh(&call.buyer_addr, sats_for_buyer));
        outputs.push_change(ctx.change.as_ref());

        debug!(
            amount = call.amount,
            sold = next.sold_amount,
            total = next.total_amount,
            sats_for_buyer,
            continued,
            "sell order settlement built"
        );

        Ok(Settlement {
            next,
            continued,
            outputs,
        })
    }

    pub fn settle(&self, call: &SellSettle, ctx: &SpendContext) -> Result<Settlement<SellOrder>> {
        let settlement = self.build_settlement(call, ctx)?;
        verify_outputs(&settlement.outputs, &ctx.hash_outputs)?;
        Ok(settlement)
    }

    /// Seller-authorized termination
    pub fn cancel(&self, sig: &[u8], ctx: &SpendContext) -> Result<()> {
        cancel(&self.seller, sig, ctx)
    }
}
