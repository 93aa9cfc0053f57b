//! Packaging failures.
//!
//! [`MimeError::Decompression`] is deliberately its own condition rather than
//! an [`MimeError::Io`] wrapper: the validation pipeline maps it to the
//! decompression-failure protocol error, while generic I/O stays a local
//! fault. Collapsing the two would lose that distinction on the wire.

/// Attachment packaging error.
#[derive(Debug, thiserror::Error)]
pub enum MimeError {
    #[error("attachment id {0:?} is not usable in a content id")]
    BadAttachmentId(String),

    #[error("attachment {0:?} is already compressed")]
    AlreadyCompressed(String),

    #[error("duplicate content id {0:?}")]
    DuplicateContentId(String),

    #[error("content id {0:?} does not match <corten-att-*@corten>")]
    ContentIdScheme(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("not a multipart/related content type: {0:?}")]
    NotMultipart(String),

    #[error("content type has no boundary parameter")]
    MissingBoundary,

    #[error("multipart body is malformed: {0}")]
    Malformed(&'static str),

    #[error("{what} exceeds limit of {limit} bytes")]
    TooLarge { what: &'static str, limit: u64 },

    #[error("too many body parts (limit {0})")]
    TooManyParts(usize),

    #[error("unsupported content-transfer-encoding {0:?}")]
    UnsupportedEncoding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MimeError {
    /// Whether this failure is a decompression condition (the pipeline
    /// reports those with their own protocol error code).
    pub fn is_decompression(&self) -> bool {
        matches!(self, MimeError::Decompression(_))
    }
}
