//! Covenant Core - continuation and verification engine for stateful covenants
//!
//! A stateful covenant is a contract whose spending transaction must rebuild
//! an updated copy of the contract and commit to it. The engine computes the
//! next state from the current snapshot plus witness data. It serializes the
//! outputs the spending transaction must contain and checks them against the
//! `hashOutputs` digest pinned in the spending context.
//!
//! # Architecture
//!
//! ```text
//! Snapshot + Witness + SpendContext
//!          ↓
//!   order::{buy, sell} / turing   → next snapshot (never mutated in place)
//!          ↓
//!   outputs                       → ordered output blocks
//!          ↓
//!   commitment                    → hash256(outputs) == hashOutputs
//!          ↓
//!   Verdict: Continue | Settled | Halted | Cancelled   (or Error = reject)
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: same snapshot + witness + context → same verdict
//! - **All-or-nothing**: a rejected call leaves the input snapshot untouched
//! - **Closed surface**: covenants and their methods are fixed enumerations

pub mod auth;
pub mod codec;
pub mod commitment;
pub mod covenant;
pub mod digest;
pub mod error;
pub mod oracle;
pub mod order;
pub mod outputs;
pub mod turing;

pub use covenant::{evaluate, evaluate_json, expected_outputs, Call, Covenant, Verdict};
pub use digest::Hash256;
pub use error::{Error, Result};

/// Version of the covenant-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use codec::{slice, Outpoint, OUTPOINT_LEN};
use outputs::ChangeOutput;

/// The UTXO holding the covenant being spent
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Utxo {
    pub value: u64,
    pub outpoint: Outpoint,
}

/// Facts about the spending transaction, supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SpendContext {
    /// Concatenated 36-byte outpoints of every input, in input order
    #[serde(with = "codec::hex_bytes")]
    pub prevouts: Vec<u8>,
    pub utxo: Utxo,
    /// Digest the transaction's outputs must hash to
    pub hash_outputs: Hash256,
    /// Signature hash of the spending input; only `cancel` reads it
    #[serde(default, with = "codec::hex_array")]
    pub sighash: [u8; 32],
    #[serde(default)]
    pub change: Option<ChangeOutput>,
}

impl SpendContext {
    /// Outpoint spent by the transaction's first input
    pub fn first_prevout(&self) -> Result<&[u8]> {
        slice(&self.prevouts, 0, OUTPOINT_LEN)
            .map_err(|_| Error::Binding("spending transaction has no first input".into()))
    }

    /// Same context with a different pinned digest
    pub fn with_hash_outputs(&self, hash_outputs: Hash256) -> Self {
        SpendContext {
            hash_outputs,
            ..self.clone()
        }
    }
}
