//! Party signature checks (secp256k1 ECDSA)
//!
//! Cancellation is authorized by the counterparty signing the spending
//! transaction. The collaborator computes the sighash; this module only
//! verifies. Signatures arrive Bitcoin-style: DER followed by one
//! sighash-type byte.

use std::sync::OnceLock;

use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};

use crate::codec::PubKey;

fn verification_ctx() -> &'static Secp256k1<VerifyOnly> {
    static CTX: OnceLock<Secp256k1<VerifyOnly>> = OnceLock::new();
    CTX.get_or_init(Secp256k1::verification_only)
}

/// Verify `sig` (DER + sighash byte) by `key` over `sighash`
///
/// Malformed keys or signatures simply fail verification.
pub fn check_sig(sig: &[u8], key: &PubKey, sighash: &[u8; 32]) -> bool {
    let Some((_sighash_type, der)) = sig.split_last() else {
        return false;
    };
    let pubkey = match PublicKey::from_slice(key.as_bytes()) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let mut signature = match Signature::from_der(der) {
        Ok(s) => s,
        Err(_) => return false,
    };
    signature.normalize_s();
    let message = Message::from_digest(*sighash);
    verification_ctx()
        .verify_ecdsa(&message, &signature, &pubkey)
        .is_ok()
}

/// Deterministic ECDSA signer for tests and fixtures
#[cfg(any(test, feature = "testkit"))]
pub mod testing {
    use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

    use crate::codec::PubKey;

    /// SIGHASH_ALL | FORKID
    pub const SIGHASH_ALL_FORKID: u8 = 0x41;

    fn secret(seed: u8) -> SecretKey {
        // Any non-zero 32-byte scalar below the curve order is valid
        SecretKey::from_slice(&[seed.max(1); 32]).expect("valid fixture scalar")
    }

    /// Compressed public key for the fixture secret `[seed; 32]`
    pub fn pubkey(seed: u8) -> PubKey {
        let secp = Secp256k1::new();
        let pk = PublicKey::from_secret_key(&secp, &secret(seed));
        PubKey(pk.serialize().to_vec())
    }

    /// DER signature plus sighash-type byte
    pub fn sign(seed: u8, sighash: &[u8; 32]) -> Vec<u8> {
        let secp = Secp256k1::new();
        let sig = secp.sign_ecdsa(&Message::from_digest(*sighash), &secret(seed));
        let mut out = sig.serialize_der().to_vec();
        out.push(SIGHASH_ALL_FORKID);
        out
    }
}
