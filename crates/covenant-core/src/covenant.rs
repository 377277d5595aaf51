//! Covenant dispatch - one closed entry point over every contract
//!
//! `Covenant` and `Call` are closed enumerations; a method a covenant does
//! not expose is rejected before any check runs. `evaluate` verifies the
//! commitment, `expected_outputs` stops just short of it so a transaction
//! builder can learn the digest it has to pin.
//!
//! # JSON surface
//!
//! ```text
//! {"covenant": {"type": "sell_limit_order", ...},
//!  "call":     {"method": "sell_settle", "amount": 3, "buyer_addr": "..."},
//!  "context":  {"prevouts": "...", "utxo": {...}, "hash_outputs": "..."}}
//! ```
//!
//! A rejection is still a successful response: `{"accepted": false,
//! "reason": "...", "kind": "..."}`. Only unreadable requests are `Err`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec::hex_bytes;
use crate::order::{BuyOrder, BuySettle, SellOrder, SellSettle, Settlement};
use crate::outputs::{OutputSet, TxOutput};
use crate::turing::{StepOutcome, TuringState};
use crate::{Error, Hash256, Result, SpendContext};

// ── Closed surface ────────────────────────────────────────

/// Every covenant the engine can evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Covenant {
    BuyLimitOrder(BuyOrder),
    SellLimitOrder(SellOrder),
    TuringMachine(TuringState),
}

/// Every method call, with its witness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Call {
    BuySettle(BuySettle),
    SellSettle(SellSettle),
    /// Counterparty termination; `sig` is DER plus the sighash type byte
    Cancel {
        #[serde(with = "hex_bytes")]
        sig: Vec<u8>,
    },
    /// Single Turing step
    Transit,
}

impl Covenant {
    pub fn name(&self) -> &'static str {
        match self {
            Covenant::BuyLimitOrder(_) => "buy_limit_order",
            Covenant::SellLimitOrder(_) => "sell_limit_order",
            Covenant::TuringMachine(_) => "turing_machine",
        }
    }
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::BuySettle(_) => "buy_settle",
            Call::SellSettle(_) => "sell_settle",
            Call::Cancel { .. } => "cancel",
            Call::Transit => "transit",
        }
    }
}

/// Accepted outcome of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    /// A continuation carrying `next` was committed
    Continue { next: Covenant, outputs: String },
    /// Order step that emitted no continuation; the contract ends here
    Settled { final_state: Covenant, outputs: String },
    /// Machine reached ACCEPT
    Halted { final_state: Covenant },
    Cancelled,
}

impl Verdict {
    pub fn status(&self) -> &'static str {
        match self {
            Verdict::Continue { .. } => "continue",
            Verdict::Settled { .. } => "settled",
            Verdict::Halted { .. } => "halted",
            Verdict::Cancelled => "cancelled",
        }
    }
}

/// Outputs a call requires, with the digest to pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutputs {
    pub outputs: Vec<TxOutput>,
    pub hash_outputs: Hash256,
    /// Hex of the concatenated output blocks
    pub serialized: String,
}

impl From<&OutputSet> for ExpectedOutputs {
    fn from(set: &OutputSet) -> Self {
        ExpectedOutputs {
            outputs: set.outputs.clone(),
            hash_outputs: set.digest(),
            serialized: set.to_hex(),
        }
    }
}

fn unsupported(covenant: &Covenant, call: &Call) -> Error {
    debug!(covenant = covenant.name(), method = call.name(), "call rejected by surface");
    Error::UnsupportedCall("method not supported by covenant".into())
}

fn settled<S>(settlement: Settlement<S>, wrap: fn(S) -> Covenant) -> Verdict {
    let outputs = settlement.outputs.to_hex();
    let state = wrap(settlement.next);
    if settlement.continued {
        Verdict::Continue {
            next: state,
            outputs,
        }
    } else {
        Verdict::Settled {
            final_state: state,
            outputs,
        }
    }
}

// ── Evaluation ────────────────────────────────────────────

fn dispatch(covenant: &Covenant, call: &Call, ctx: &SpendContext) -> Result<Verdict> {
    match (covenant, call) {
        (Covenant::BuyLimitOrder(order), Call::BuySettle(witness)) => {
            Ok(settled(order.settle(witness, ctx)?, Covenant::BuyLimitOrder))
        }
        (Covenant::SellLimitOrder(order), Call::SellSettle(witness)) => {
            Ok(settled(order.settle(witness, ctx)?, Covenant::SellLimitOrder))
        }
        (Covenant::BuyLimitOrder(order), Call::Cancel { sig }) => {
            order.cancel(sig, ctx).map(|_| Verdict::Cancelled)
        }
        (Covenant::SellLimitOrder(order), Call::Cancel { sig }) => {
            order.cancel(sig, ctx).map(|_| Verdict::Cancelled)
        }
        (Covenant::TuringMachine(machine), Call::Transit) => {
            match machine.step(ctx)? {
                (StepOutcome::Continue(next), outputs) => Ok(Verdict::Continue {
                    next: Covenant::TuringMachine(next),
                    outputs: outputs.to_hex(),
                }),
                (StepOutcome::Halted(last), _) => Ok(Verdict::Halted {
                    final_state: Covenant::TuringMachine(last),
                }),
            }
        }
        _ => Err(unsupported(covenant, call)),
    }
}

/// Evaluate one call against one snapshot
///
/// The snapshot is borrowed immutably; the next one, if any, is carried in
/// the returned verdict. Any error means the spend is rejected.
pub fn evaluate(covenant: &Covenant, call: &Call, ctx: &SpendContext) -> Result<Verdict> {
    match dispatch(covenant, call, ctx) {
        Ok(verdict) => {
            info!(
                covenant = covenant.name(),
                method = call.name(),
                status = verdict.status(),
                "call accepted"
            );
            Ok(verdict)
        }
        Err(e) => {
            warn!(
                covenant = covenant.name(),
                method = call.name(),
                kind = e.kind(),
                reason = %e.reason(),
                "call rejected"
            );
            Err(e)
        }
    }
}

/// Outputs the call requires, with every check but the commitment applied
pub fn expected_outputs(
    covenant: &Covenant,
    call: &Call,
    ctx: &SpendContext,
) -> Result<ExpectedOutputs> {
    let set = match (covenant, call) {
        (Covenant::BuyLimitOrder(order), Call::BuySettle(witness)) => {
            order.build_settlement(witness, ctx)?.outputs
        }
        (Covenant::SellLimitOrder(order), Call::SellSettle(witness)) => {
            order.build_settlement(witness, ctx)?.outputs
        }
        (Covenant::BuyLimitOrder(order), Call::Cancel { sig }) => {
            order.cancel(sig, ctx)?;
            OutputSet::new()
        }
        (Covenant::SellLimitOrder(order), Call::Cancel { sig }) => {
            order.cancel(sig, ctx)?;
            OutputSet::new()
        }
        (Covenant::TuringMachine(machine), Call::Transit) => machine.build_step(ctx)?.1,
        _ => return Err(unsupported(covenant, call)),
    };
    Ok(ExpectedOutputs::from(&set))
}

// ── JSON API ──────────────────────────────────────────────

/// A full evaluation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub covenant: Covenant,
    pub call: Call,
    pub context: SpendContext,
}

impl Request {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Request(format!("invalid request: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        to_json(self)
    }

    /// Same request with the digest this call requires pinned
    pub fn pinned(&self) -> Result<Self> {
        let expected = expected_outputs(&self.covenant, &self.call, &self.context)?;
        Ok(Request {
            context: self.context.with_hash_outputs(expected.hash_outputs),
            ..self.clone()
        })
    }
}

/// JSON response to an evaluation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl From<Result<Verdict>> for Response {
    fn from(result: Result<Verdict>) -> Self {
        match result {
            Ok(verdict) => Response {
                accepted: true,
                verdict: Some(verdict),
                reason: None,
                kind: None,
            },
            Err(e) => Response {
                accepted: false,
                verdict: None,
                reason: Some(e.reason()),
                kind: Some(e.kind().to_string()),
            },
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| Error::Request(format!("Failed to serialize result: {}", e)))
}

/// Evaluate a JSON request, returning a JSON response
///
/// Rejections are reported inside the response; `Err` means the request
/// itself could not be read.
pub fn evaluate_json(request: &str) -> Result<String> {
    let req = Request::from_json(request)?;
    let response = Response::from(evaluate(&req.covenant, &req.call, &req.context));
    to_json(&response)
}

/// Expected outputs for a JSON request; rejections are `Err`
pub fn expected_outputs_json(request: &str) -> Result<String> {
    let req = Request::from_json(request)?;
    to_json(&expected_outputs(&req.covenant, &req.call, &req.context)?)
}
