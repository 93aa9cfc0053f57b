//! Security processing errors.
//!
//! Inbound variants are deliberately coarse. The validation pipeline maps
//! them onto the ebMS vocabulary: allowlist and header-structure failures
//! become Authentication errors, the consistency cross-check becomes
//! ValueInconsistent, and everything that goes wrong while actually
//! decrypting or verifying becomes a Decryption error. Signature failures
//! and cipher failures are not distinguished; callers must not assume a
//! finer split than the variants here carry.

use corten_mime::MimeError;
use corten_model::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// Outbound operations applied in the wrong order.
    #[error("security processing out of order: {0}")]
    OrderViolation(&'static str),

    /// Encryption was requested with nothing selected to encrypt.
    #[error("encryption requested but no content selected")]
    NothingToEncrypt,

    /// An algorithm URI outside the allowlist, outbound or inbound.
    #[error("algorithm not allowed for {context}: {uri}")]
    DisallowedAlgorithm { context: &'static str, uri: String },

    /// The security header is present but structurally unusable.
    #[error("malformed security header: {0}")]
    MalformedSecurity(String),

    /// An attachment's Content-ID does not match any declared part href.
    #[error("attachment not declared in payload info: {0}")]
    AttachmentMismatch(String),

    /// Decryption or signature verification failed. One variant on purpose.
    #[error("security verification failed: {0}")]
    Crypto(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Mime(#[from] MimeError),
}
