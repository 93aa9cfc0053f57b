//! Algorithm URI allowlist.
//!
//! One algorithm per role. Interoperating peers must agree on these exact
//! URIs; anything else is rejected before any key material is touched.

use crate::error::SecurityError;

/// Ed25519 over the embedded `SignedInfo` bytes.
pub const SIGNATURE_ED25519: &str = "http://www.w3.org/2021/04/xmldsig-more#eddsa-ed25519";

/// SHA-256 digests for signature references.
pub const DIGEST_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// Declared canonicalization: signed chunks are rendered exactly once and
/// embedded byte-for-byte, so no canonicalization runs on either side.
pub const C14N_AS_EMBEDDED: &str = "urn:corten:c14n:as-embedded";

/// Ephemeral X25519 agreement with HKDF-SHA256 key derivation.
pub const KEY_AGREEMENT_X25519: &str = "urn:corten:enc:x25519-hkdf-sha256";

/// XChaCha20-Poly1305 content encryption, nonce prepended to ciphertext.
pub const ENCRYPTION_XCHACHA20: &str = "urn:corten:enc:xchacha20-poly1305";

/// ValueType of a binary security token carrying a raw Ed25519 public key.
pub const TOKEN_ED25519: &str = "urn:corten:token:ed25519";

/// ValueType of a key identifier carrying a `sha256:<hex>` key id.
pub const TOKEN_KEY_ID: &str = "urn:corten:token:key-id";

/// EncodingType of base64 binary security tokens (WSS 1.0).
pub const ENCODING_BASE64: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

fn require(context: &'static str, expected: &'static str, uri: &str) -> Result<(), SecurityError> {
    if uri == expected {
        Ok(())
    } else {
        Err(SecurityError::DisallowedAlgorithm {
            context,
            uri: uri.to_string(),
        })
    }
}

pub fn require_signature(uri: &str) -> Result<(), SecurityError> {
    require("signature", SIGNATURE_ED25519, uri)
}

pub fn require_digest(uri: &str) -> Result<(), SecurityError> {
    require("digest", DIGEST_SHA256, uri)
}

pub fn require_c14n(uri: &str) -> Result<(), SecurityError> {
    require("canonicalization", C14N_AS_EMBEDDED, uri)
}

pub fn require_key_agreement(uri: &str) -> Result<(), SecurityError> {
    require("key agreement", KEY_AGREEMENT_X25519, uri)
}

pub fn require_encryption(uri: &str) -> Result<(), SecurityError> {
    require("content encryption", ENCRYPTION_XCHACHA20, uri)
}
