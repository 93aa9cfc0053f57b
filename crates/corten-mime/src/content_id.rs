//! The Content-ID scheme.
//!
//! A MIME part header carries `<corten-att-<id>@corten>`; the matching
//! PayloadInfo href is `cid:<id>`. `wrap` and `strip` are exact inverses
//! over valid ids; `strip` rejects anything that was not produced by `wrap`.

use crate::error::MimeError;

pub const PREFIX: &str = "corten-att-";
pub const SUFFIX: &str = "@corten";

/// Header value for an attachment id: `<corten-att-<id>@corten>`.
pub fn wrap(id: &str) -> String {
    format!("<{PREFIX}{id}{SUFFIX}>")
}

/// Recover the attachment id from a Content-ID header value.
///
/// # Errors
///
/// Fails when the value is not angle-bracketed, lacks the fixed prefix or
/// suffix, or wraps an empty id. A mismatch at this seam means the sender's
/// MIME layer and ebMS header disagree; the caller surfaces it, never skips
/// the part.
pub fn strip(header_value: &str) -> Result<&str, MimeError> {
    let inner = header_value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .ok_or_else(|| MimeError::ContentIdScheme(header_value.to_string()))?;
    let id = inner
        .strip_prefix(PREFIX)
        .and_then(|v| v.strip_suffix(SUFFIX))
        .ok_or_else(|| MimeError::ContentIdScheme(header_value.to_string()))?;
    if id.is_empty() {
        return Err(MimeError::ContentIdScheme(header_value.to_string()));
    }
    Ok(id)
}
