//! Crypto primitives: digest, sign and verify.
//!
//! Digests are BLAKE3-256 ([`Hash256::compute`]); signatures are Ed25519
//! over the raw 32 digest bytes. Verification never errors: malformed keys
//! or signatures are simply "does not verify", because a forged or mangled
//! transaction is an expected input, not a fault.
//!
//! Key generation and storage belong to the wallet side. The ledger only
//! needs the [`Signer`] seam to build signed transactions and
//! [`verify`] to check them; [`Keypair`] is the in-process implementation
//! used by tests and the demo binary.

use std::fmt;

use ed25519_dalek::{Signer as _, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::types::{Hash256, Identity, Signature};

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Key provider capability: an identity plus a signing oracle bound to a
/// private key the ledger never sees.
pub trait Signer {
    /// Public-key encoding used as the participant identity.
    fn identity(&self) -> Identity;

    /// Signs a content digest.
    fn sign_digest(&self, digest: &Hash256) -> Signature;
}

/// Deterministic digest of arbitrary bytes.
pub fn hash(data: &[u8]) -> Hash256 {
    Hash256::compute(data)
}

/// Signs `digest` with an Ed25519 signing key.
pub fn sign(key: &SigningKey, digest: &Hash256) -> Signature {
    Signature(key.sign(digest.as_bytes()).to_bytes().to_vec())
}

/// Verifies `signature` over `digest` against the hex public key `public_key`.
///
/// Returns `false` for undecodable keys, wrong-length signatures and
/// signatures that do not match.
pub fn verify(public_key: &Identity, digest: &Hash256, signature: &Signature) -> bool {
    let mut pk = [0u8; PUBLIC_KEY_LEN];
    if hex::decode_to_slice(public_key.as_str(), &mut pk).is_err() {
        return false;
    }
    let Ok(vk) = VerifyingKey::from_bytes(&pk) else {
        return false;
    };
    let Ok(sig) = ed25519_dalek::Signature::from_slice(signature.as_bytes()) else {
        return false;
    };
    vk.verify(digest.as_bytes(), &sig).is_ok()
}

/// In-process Ed25519 key pair.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generates a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let mut rng = OsRng;
        Self {
            signing: SigningKey::generate(&mut rng),
        }
    }

    /// Rebuilds a key pair from a 32-byte secret seed.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(secret),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }
}

impl Signer for Keypair {
    fn identity(&self) -> Identity {
        Identity::from_public_key(self.signing.verifying_key().as_bytes())
    }

    fn sign_digest(&self, digest: &Hash256) -> Signature {
        sign(&self.signing, digest)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}
