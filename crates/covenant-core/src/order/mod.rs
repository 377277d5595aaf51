//! Partial-fill limit orders for BSV-20 tokens
//!
//! Both variants share one shape: an immutable `total_amount` bounding a
//! counter that only grows. The counterparty key can cancel. A settlement
//! computes a fresh snapshot with the counter advanced; the caller's
//! snapshot is never touched.
//!
//! - [`buy`]: oracle-attested quantity, paid out of the UTXO value
//! - [`sell`]: buyer-chosen quantity, paid at a fixed price per unit

pub mod buy;
pub mod sell;

pub use buy::{BuyOrder, BuySettle};
pub use sell::{SellOrder, SellSettle};

use tracing::debug;

use crate::auth::check_sig;
use crate::codec::{decode_script_num, encode_script_num, push_data, read_push, PubKey};
use crate::outputs::OutputSet;
use crate::{Error, Result, SpendContext};

/// Outcome of a successful settlement step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement<S> {
    /// Snapshot after the step
    pub next: S,
    /// Whether a continuation output was emitted for `next`
    pub continued: bool,
    /// Outputs the spending transaction must contain, in order
    pub outputs: OutputSet,
}

/// Reject snapshots whose counter already exceeds the ceiling
pub(crate) fn check_counter(counter: u64, total: u64) -> Result<()> {
    if counter > total {
        return Err(Error::InvariantViolation(format!(
            "counter {} exceeds total {}",
            counter, total
        )));
    }
    Ok(())
}

/// Settlements must strictly advance the counter
pub(crate) fn check_positive(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvariantViolation(
            "settlement must move a positive amount".into(),
        ));
    }
    Ok(())
}

/// Counter state: a single pushed script number
pub fn encode_counter_state(counter: u64) -> Result<Vec<u8>> {
    let n = i64::try_from(counter)
        .map_err(|_| Error::Codec(format!("counter {} exceeds script number range", counter)))?;
    let mut out = Vec::new();
    push_data(&mut out, &encode_script_num(n));
    Ok(out)
}

pub fn decode_counter_state(state: &[u8]) -> Result<u64> {
    let (payload, used) = read_push(state)?;
    if used != state.len() {
        return Err(Error::Codec("trailing bytes after counter state".into()));
    }
    let n = decode_script_num(payload)?;
    u64::try_from(n).map_err(|_| Error::Codec(format!("negative counter {}", n)))
}

/// Counterparty cancellation; no output constraints beyond the signature
pub(crate) fn cancel(party: &PubKey, sig: &[u8], ctx: &SpendContext) -> Result<()> {
    if !check_sig(sig, party, &ctx.sighash) {
        return Err(Error::Authentication("party signature verify failed".into()));
    }
    debug!("cancellation authorized");
    Ok(())
}
