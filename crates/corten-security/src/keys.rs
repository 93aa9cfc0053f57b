//! Key material and trust configuration.
//!
//! Keys are identified by `sha256:<lowercase-hex>` of their raw public
//! bytes. The same scheme covers Ed25519 verification keys and X25519
//! agreement keys, so a key id is enough to address either side's material.

use std::collections::HashMap;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Compute the key id of raw public key bytes.
pub fn key_id(public_key_bytes: &[u8]) -> String {
    let hash = Sha256::digest(public_key_bytes);
    format!("sha256:{}", hex::encode(hash))
}

/// Ed25519 keypair used to sign outbound envelopes.
pub struct SigningKeypair {
    signing: SigningKey,
}

// No Clone/Debug; the secret half must not leak through either.

impl SigningKeypair {
    /// Fresh keypair from OS entropy.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn key_id(&self) -> String {
        key_id(self.signing.verifying_key().as_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

/// X25519 keypair a receiver holds to decrypt messages addressed to it.
///
/// The secret half zeroizes on drop.
pub struct DecryptionKeypair {
    secret: x25519_dalek::StaticSecret,
}

// No Clone/Debug here either.

impl DecryptionKeypair {
    pub fn generate() -> Self {
        Self {
            secret: x25519_dalek::StaticSecret::random_from_rng(OsRng),
        }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: x25519_dalek::StaticSecret::from(bytes),
        }
    }

    pub fn public_key(&self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(&self.secret)
    }

    pub fn key_id(&self) -> String {
        key_id(self.public_key().as_bytes())
    }

    pub(crate) fn diffie_hellman(
        &self,
        their_public: &x25519_dalek::PublicKey,
    ) -> x25519_dalek::SharedSecret {
        self.secret.diffie_hellman(their_public)
    }
}

/// Trust configuration handed to the inbound processor: which signer keys
/// are accepted, and which agreement key decrypts inbound content.
#[derive(Default)]
pub struct TrustMaterial {
    signers: HashMap<String, VerifyingKey>,
    decryption: Option<DecryptionKeypair>,
}

impl TrustMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept signatures made with `key`.
    pub fn trust_signer(&mut self, key: VerifyingKey) {
        self.signers.insert(key_id(key.as_bytes()), key);
    }

    pub fn with_decryption(mut self, keypair: DecryptionKeypair) -> Self {
        self.decryption = Some(keypair);
        self
    }

    pub fn signer(&self, id: &str) -> Option<&VerifyingKey> {
        self.signers.get(id)
    }

    pub fn decryption(&self) -> Option<&DecryptionKeypair> {
        self.decryption.as_ref()
    }
}
