//! Transport-layer failures.
//!
//! Protocol rejection is not a Rust error in this crate: a rejected message
//! still yields a [`Reception`](crate::pipeline::Reception) carrying its one
//! structured error and an Error signal response. `TransportError` is the
//! other failure layer: the request never became an attributable ebMS
//! message (or a response could not be built), and the HTTP front maps it
//! to a plain 4xx/5xx instead of an Error signal.

use corten_mime::MimeError;
use corten_model::ModelError;

use crate::stage::PipelineStage;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The body is not a usable envelope: not UTF-8, not well-formed XML,
    /// not SOAP, or no Messaging header to attribute a message id from.
    #[error("unusable request body: {0}")]
    Envelope(String),

    /// The multipart wrapper could not be decoded within limits.
    #[error("multipart body rejected: {0}")]
    Multipart(#[from] MimeError),

    /// Internal ordering bug in the pipeline itself.
    #[error("pipeline stage order violated: {from:?} -> {to:?}")]
    Stage {
        from: PipelineStage,
        to: PipelineStage,
    },

    /// The synchronous response envelope could not be rendered.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The synchronous response could not be constructed.
    #[error("response construction failed: {0}")]
    Response(String),
}
