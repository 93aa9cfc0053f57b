//! Per-message session keys and AEAD framing.
//!
//! Every encrypted message gets one fresh session key, derived with
//! HKDF-SHA256 from an ephemeral X25519 agreement. Content is sealed with
//! XChaCha20-Poly1305; the 24-byte nonce travels prepended to the
//! ciphertext, so a sealed blob is self-contained next to the key.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SecurityError;

/// Nonce length of XChaCha20-Poly1305.
pub(crate) const NONCE_LEN: usize = 24;

/// Poly1305 tag length.
const TAG_LEN: usize = 16;

/// HKDF info string binding derived keys to this protocol role.
const SESSION_KEY_INFO: &[u8] = b"urn:corten:enc:session-key";

/// 256-bit content encryption key, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SessionKey([u8; 32]);

// No Clone/Debug, key material must not leak through either.

/// Derive the session key both sides compute from the X25519 agreement.
pub(crate) fn derive_session_key(
    shared: &x25519_dalek::SharedSecret,
) -> Result<SessionKey, SecurityError> {
    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(SESSION_KEY_INFO, &mut key)
        .map_err(|e| SecurityError::Crypto(format!("session key derivation failed: {e}")))?;
    Ok(SessionKey(key))
}

/// Encrypt `plaintext` under a fresh random nonce; returns nonce || ciphertext.
pub(crate) fn seal(key: &SessionKey, plaintext: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| SecurityError::Crypto(format!("content encryption failed: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Undo [`seal`]. Wrong key, truncation and tampering all land on the same
/// error; callers cannot tell them apart and must not try.
pub(crate) fn open(key: &SessionKey, sealed: &[u8]) -> Result<Vec<u8>, SecurityError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(SecurityError::Crypto(
            "sealed content shorter than nonce and tag".into(),
        ));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| SecurityError::Crypto("content decryption failed".into()))
}
