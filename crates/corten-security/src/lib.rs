//! Message-level security for the Corten AS4 stack.
//!
//! Implements the WS-Security profile the stack speaks on the wire:
//! Ed25519 detached signatures over the Messaging header, the Body and every
//! attachment; X25519 key agreement deriving a per-message XChaCha20-Poly1305
//! session key; body and attachment encryption; and receipt construction
//! echoing verified signature references.
//!
//! The outbound order is fixed at the type level: [`sign`] consumes a freshly
//! rendered envelope, [`encrypt`] consumes the signed one and is terminal.
//! Compression happens before either, in the attachment layer. Inbound,
//! [`process`] runs the whole inverse ladder over a received document and
//! either returns a fully verified [`SecurityState`] or fails.
//!
//! Signatures never canonicalize. The signer renders each covered chunk
//! exactly once and signs those bytes; the verifier digests the raw byte
//! spans of the received document. What you sign is what travels.
//!
//! # Modules
//!
//! - [`algorithms`]: the closed algorithm allowlist
//! - [`keys`]: keypairs, key ids, the [`TrustMaterial`] store
//! - [`sign`] / [`encrypt`]: outbound protection
//! - [`verify`]: inbound processing
//! - [`receipt`]: acknowledgement construction
//! - [`xmldsig`]: shared signature-document helpers
//! - [`session`]: key derivation and the AEAD seal/open pair

pub mod algorithms;
pub mod encrypt;
pub mod error;
pub mod keys;
pub mod receipt;
pub mod session;
pub mod sign;
pub mod verify;
pub mod xmldsig;

// Convenience re-exports
pub use encrypt::{encrypt, EncryptedEnvelope, EncryptionConfig, OutboundEnvelope};
pub use error::SecurityError;
pub use keys::{key_id, DecryptionKeypair, SigningKeypair, TrustMaterial};
pub use receipt::build_receipt;
pub use sign::{sign, SignedEnvelope, SigningConfig};
pub use verify::{process, SecurityState, SignerInfo};
pub use xmldsig::extract_signed_references;
