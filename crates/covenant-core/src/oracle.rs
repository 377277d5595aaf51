//! Rabin signature oracle
//!
//! The buy-side order trusts an external oracle to attest how many tokens
//! a UTXO holds. The oracle signs with a Rabin key; verification is a
//! single modular squaring over arbitrary-precision integers.
//!
//! ```text
//! hx = sha256(msg || padding)
//! H  = sha256(hx[0..16]) || sha256(hx[16..32])   (512 bits)
//! h  = H read as unsigned little-endian
//! valid  <=>  s² mod n == h mod n
//! ```

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::sha256;

/// Rabin public key, the modulus `n = p * q`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RabinPubKey(pub BigUint);

/// Rabin signature: square root `s` plus the padding that made the
/// message hash a quadratic residue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RabinSig {
    #[serde(with = "biguint_hex")]
    pub s: BigUint,
    #[serde(with = "crate::codec::hex_bytes")]
    pub padding: Vec<u8>,
}

impl Serialize for RabinPubKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        biguint_hex::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for RabinPubKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        biguint_hex::deserialize(deserializer).map(RabinPubKey)
    }
}

/// Expand a message into the 512-bit Rabin hash
pub fn rabin_hash(bytes: &[u8]) -> [u8; 64] {
    let hx = sha256(bytes);
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&sha256(&hx[..16]));
    out[32..].copy_from_slice(&sha256(&hx[16..]));
    out
}

fn message_residue(msg: &[u8], padding: &[u8]) -> BigUint {
    let mut preimage = Vec::with_capacity(msg.len() + padding.len());
    preimage.extend_from_slice(msg);
    preimage.extend_from_slice(padding);
    BigUint::from_bytes_le(&rabin_hash(&preimage))
}

/// Verify a Rabin signature over `msg`
///
/// A zero modulus never verifies.
pub fn verify_sig(msg: &[u8], sig: &RabinSig, key: &RabinPubKey) -> bool {
    if key.0.is_zero() {
        return false;
    }
    let h = message_residue(msg, &sig.padding);
    (&sig.s * &sig.s) % &key.0 == h % &key.0
}

/// Big integers travel as little-endian hex, matching the script encoding
mod biguint_hex {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(n: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(n.to_bytes_le()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Ok(BigUint::from_bytes_le(&bytes))
    }
}

/// Rabin signer for tests and fixtures
///
/// Signing is outside the engine proper; this exists so test suites can
/// produce oracle attestations without an external service.
#[cfg(any(test, feature = "testkit"))]
pub mod testing {
    use num_bigint::BigUint;
    use num_traits::{One, Zero};

    use super::{message_residue, RabinPubKey, RabinSig};

    /// Private key `(p, q)`; both primes must be ≡ 3 mod 4
    #[derive(Debug, Clone)]
    pub struct RabinPrivateKey {
        p: BigUint,
        q: BigUint,
    }

    impl RabinPrivateKey {
        pub fn new(p: BigUint, q: BigUint) -> Self {
            RabinPrivateKey { p, q }
        }

        /// Fixed key built from the Mersenne primes 2^127-1 and 2^89-1
        pub fn fixture() -> Self {
            let one = BigUint::one();
            let p = (&one << 127usize) - &one;
            let q = (&one << 89usize) - &one;
            Self::new(p, q)
        }

        pub fn public_key(&self) -> RabinPubKey {
            RabinPubKey(&self.p * &self.q)
        }

        /// Sign `msg`, growing the padding until the hash is a residue mod `p` and `q`
        pub fn sign(&self, msg: &[u8]) -> RabinSig {
            let n = &self.p * &self.q;
            let mut counter: u32 = 0;
            loop {
                let padding = counter.to_le_bytes().to_vec();
                let h = message_residue(msg, &padding) % &n;
                if is_residue(&h, &self.p) && is_residue(&h, &self.q) {
                    let s = self.root(&h, &n);
                    return RabinSig { s, padding };
                }
                counter += 1;
            }
        }

        fn root(&self, h: &BigUint, n: &BigUint) -> BigUint {
            let one = BigUint::one();
            let sp = h.modpow(&((&self.p + &one) >> 2usize), &self.p);
            let sq = h.modpow(&((&self.q + &one) >> 2usize), &self.q);
            // Fermat inverses; both moduli are prime
            let q_inv = self.q.modpow(&(&self.p - 2u32), &self.p);
            let p_inv = self.p.modpow(&(&self.q - 2u32), &self.q);
            (sp * &self.q * q_inv + sq * &self.p * p_inv) % n
        }
    }

    fn is_residue(h: &BigUint, prime: &BigUint) -> bool {
        let r = h % prime;
        if r.is_zero() {
            return true;
        }
        let exp = (prime - 1u32) >> 1usize;
        r.modpow(&exp, prime).is_one()
    }
}
