//! Commitment verifier - the single gate that makes a covenant stateful
//!
//! The spending context pins `hashOutputs`, the hash256 of the exact
//! concatenation of the transaction's outputs. A step is accepted only if
//! the outputs it computed hash to that value. Any byte difference,
//! including a different order, is a hard failure.

use tracing::debug;

use crate::digest::Hash256;
use crate::outputs::OutputSet;
use crate::{Error, Result};

/// Digest of ordered output blocks
pub fn outputs_digest<B: AsRef<[u8]>>(blocks: &[B]) -> Hash256 {
    let mut concat = Vec::with_capacity(blocks.iter().map(|b| b.as_ref().len()).sum());
    for block in blocks {
        concat.extend_from_slice(block.as_ref());
    }
    Hash256::of(&concat)
}

/// Verify ordered output blocks against the pinned digest
pub fn verify_blocks<B: AsRef<[u8]>>(blocks: &[B], expected: &Hash256) -> Result<()> {
    let computed = outputs_digest(blocks);
    if &computed != expected {
        debug!(
            expected = %expected,
            computed = %computed,
            blocks = blocks.len(),
            "commitment rejected"
        );
        return Err(Error::CommitmentMismatch {
            expected: expected.to_hex(),
            computed: computed.to_hex(),
        });
    }
    debug!(digest = %computed, blocks = blocks.len(), "commitment verified");
    Ok(())
}

/// Verify an output set against the pinned digest
pub fn verify_outputs(outputs: &OutputSet, expected: &Hash256) -> Result<()> {
    verify_blocks(&outputs.blocks(), expected)
}
