//! Attachment packaging for the Corten AS4 stack.
//!
//! Owns everything between the typed message model and the transport body:
//! the attachment value type with its re-readable content storage, the
//! Content-ID scheme tying MIME part headers to PayloadInfo hrefs, gzip part
//! compression, PayloadInfo assembly, and the multipart/related codec with
//! bounded parsing.
//!
//! The identifier correlation rule is the heart of this crate: an attachment
//! id `x` appears on the wire as MIME header `Content-ID: <corten-att-x@corten>`
//! and in the ebMS header as `href="cid:x"`. [`content_id::wrap`] and
//! [`content_id::strip`] are exact inverses; any value that does not survive
//! the round trip is a structural error, never silently accepted.

pub mod attachment;
pub mod compress;
pub mod content_id;
pub mod error;
pub mod multipart;
pub mod parts;

// Convenience re-exports
pub use attachment::{Attachment, AttachmentContent, CompressionMode};
pub use error::MimeError;
pub use multipart::{
    is_multipart_related, parse_related, write_related, MimePackage, MultipartLimits,
    MultipartLimitsOverrides, ParsedMultipart, ROOT_CONTENT_ID,
};
pub use parts::build_payload_info;
