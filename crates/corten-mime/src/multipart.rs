//! The multipart/related codec.
//!
//! Writing is exact: root SOAP part first, CRLF line endings, one part per
//! attachment with its Content-ID and `Content-Transfer-Encoding: binary`.
//! Parsing is bounded and slightly lenient (LF-only line endings and quoted
//! or bare boundary parameters are accepted), but every limit breach and
//! every malformed structure is an explicit error, never a skipped part.

use crate::attachment::{Attachment, AttachmentContent};
use crate::content_id;
use crate::error::MimeError;
use corten_model::SoapVersion;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Write;
use uuid::Uuid;

/// Content-ID of the root SOAP part.
pub const ROOT_CONTENT_ID: &str = "<corten-soap@corten>";

/// Bounds applied while decoding a received package.
#[derive(Debug, Clone, Copy)]
pub struct MultipartLimits {
    /// All parts, root included.
    pub max_parts: usize,
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
    pub max_header_bytes: usize,
    /// Decoded part content larger than this spills to a temp file.
    pub spool_threshold_bytes: u64,
    /// Bound on a single part's decompressed size.
    pub max_decompressed_bytes: u64,
}

impl Default for MultipartLimits {
    fn default() -> Self {
        Self {
            max_parts: 32,
            max_part_bytes: 64 * 1024 * 1024,        // 64 MB
            max_total_bytes: 256 * 1024 * 1024,      // 256 MB
            max_header_bytes: 16 * 1024,             // 16 KB
            spool_threshold_bytes: 256 * 1024,       // 256 KB
            max_decompressed_bytes: 512 * 1024 * 1024, // 512 MB
        }
    }
}

/// Partial overrides for `MultipartLimits`, for config parsing. Unknown keys
/// fail deserialization (deny_unknown_fields). Merge with
/// `MultipartLimits::default().apply(overrides)`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultipartLimitsOverrides {
    pub max_parts: Option<usize>,
    pub max_part_bytes: Option<u64>,
    pub max_total_bytes: Option<u64>,
    pub max_header_bytes: Option<usize>,
    pub spool_threshold_bytes: Option<u64>,
    pub max_decompressed_bytes: Option<u64>,
}

impl MultipartLimits {
    /// Apply overrides onto these defaults. Only `Some` values override.
    pub fn apply(self, overrides: MultipartLimitsOverrides) -> MultipartLimits {
        MultipartLimits {
            max_parts: overrides.max_parts.unwrap_or(self.max_parts),
            max_part_bytes: overrides.max_part_bytes.unwrap_or(self.max_part_bytes),
            max_total_bytes: overrides.max_total_bytes.unwrap_or(self.max_total_bytes),
            max_header_bytes: overrides.max_header_bytes.unwrap_or(self.max_header_bytes),
            spool_threshold_bytes: overrides
                .spool_threshold_bytes
                .unwrap_or(self.spool_threshold_bytes),
            max_decompressed_bytes: overrides
                .max_decompressed_bytes
                .unwrap_or(self.max_decompressed_bytes),
        }
    }
}

/// A packaged message: the transport content type plus the raw body.
#[derive(Debug, Clone)]
pub struct MimePackage {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// A decoded package: root part bytes plus the attachments.
#[derive(Debug)]
pub struct ParsedMultipart {
    pub root: Vec<u8>,
    pub attachments: Vec<Attachment>,
}

/// Quick check on the transport content type.
pub fn is_multipart_related(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("multipart/related"))
}

/// Package an envelope and its attachments.
///
/// Attachment content is read as it stands, so compression (and encryption)
/// must already have been applied by the caller.
pub fn write_related(
    envelope: &str,
    soap_version: SoapVersion,
    attachments: &[Attachment],
) -> Result<MimePackage, MimeError> {
    let mut seen = HashSet::new();
    for attachment in attachments {
        if !seen.insert(attachment.id()) {
            return Err(MimeError::DuplicateContentId(attachment.id().to_string()));
        }
    }

    let boundary = format!("corten-mime-{}", Uuid::new_v4());
    let content_type = format!(
        "multipart/related; boundary=\"{boundary}\"; type=\"{soap}\"; start=\"{root}\"",
        soap = soap_version.media_type(),
        root = ROOT_CONTENT_ID,
    );

    let mut body = Vec::new();
    write!(body, "--{boundary}\r\n")?;
    write!(
        body,
        "Content-Type: {}; charset=UTF-8\r\n",
        soap_version.media_type()
    )?;
    write!(body, "Content-ID: {ROOT_CONTENT_ID}\r\n")?;
    write!(body, "Content-Transfer-Encoding: binary\r\n\r\n")?;
    body.extend_from_slice(envelope.as_bytes());
    write!(body, "\r\n")?;

    for attachment in attachments {
        write!(body, "--{boundary}\r\n")?;
        match attachment.charset() {
            Some(charset) => write!(
                body,
                "Content-Type: {}; charset={charset}\r\n",
                attachment.mime_type()
            )?,
            None => write!(body, "Content-Type: {}\r\n", attachment.mime_type())?,
        }
        write!(body, "Content-ID: {}\r\n", content_id::wrap(attachment.id()))?;
        write!(body, "Content-Transfer-Encoding: binary\r\n\r\n")?;
        body.extend_from_slice(&attachment.bytes()?);
        write!(body, "\r\n")?;
    }
    write!(body, "--{boundary}--\r\n")?;

    tracing::debug!(
        parts = attachments.len() + 1,
        bytes = body.len(),
        "assembled multipart package"
    );
    Ok(MimePackage { content_type, body })
}

/// Decode a received package.
///
/// The first part is the root; every further part must carry a Content-ID in
/// the fixed scheme. Declared compression is not applied here; that happens
/// once the ebMS header has been read and correlated.
pub fn parse_related(
    content_type: &str,
    body: &[u8],
    limits: &MultipartLimits,
) -> Result<ParsedMultipart, MimeError> {
    if !is_multipart_related(content_type) {
        return Err(MimeError::NotMultipart(content_type.to_string()));
    }
    let boundary = parameter(content_type, "boundary").ok_or(MimeError::MissingBoundary)?;
    if body.len() as u64 > limits.max_total_bytes {
        return Err(MimeError::TooLarge {
            what: "multipart body",
            limit: limits.max_total_bytes,
        });
    }

    let raw_parts = split_parts(body, &boundary, limits)?;
    if raw_parts.is_empty() {
        return Err(MimeError::Malformed("package has no parts"));
    }

    let mut root = None;
    let mut attachments = Vec::new();
    let mut seen = HashSet::new();
    for raw in raw_parts {
        let (headers, content) = parse_part(raw, limits)?;
        check_transfer_encoding(headers.transfer_encoding.as_deref())?;

        if root.is_none() {
            root = Some(content.to_vec());
            continue;
        }

        let header_value = headers
            .content_id
            .ok_or(MimeError::Malformed("attachment part without Content-ID"))?;
        let id = content_id::strip(&header_value)?.to_string();
        if !seen.insert(id.clone()) {
            return Err(MimeError::DuplicateContentId(id));
        }

        let (mime_type, charset) = match headers.content_type {
            Some(value) => split_media_type(&value),
            None => ("application/octet-stream".to_string(), None),
        };
        let content =
            AttachmentContent::from_vec(content.to_vec(), limits.spool_threshold_bytes)?;
        attachments.push(Attachment::from_wire(id, mime_type, charset, content));
    }

    match root {
        Some(root) => {
            tracing::debug!(
                attachments = attachments.len(),
                root_bytes = root.len(),
                "decoded multipart package"
            );
            Ok(ParsedMultipart { root, attachments })
        }
        None => Err(MimeError::Malformed("package has no parts")),
    }
}

fn check_transfer_encoding(value: Option<&str>) -> Result<(), MimeError> {
    match value {
        None => Ok(()),
        Some(v) if ["binary", "8bit", "7bit"].iter().any(|a| v.eq_ignore_ascii_case(a)) => Ok(()),
        Some(v) => Err(MimeError::UnsupportedEncoding(v.to_string())),
    }
}

/// Extract a `name=value` parameter from a content type, unquoting if needed.
fn parameter(content_type: &str, name: &str) -> Option<String> {
    for segment in content_type.split(';').skip(1) {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case(name) {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            return Some(value.to_string());
        }
    }
    None
}

/// Split `type; charset=x` into the bare media type and the charset.
fn split_media_type(value: &str) -> (String, Option<String>) {
    let mime = value.split(';').next().unwrap_or(value).trim().to_string();
    let charset = parameter(value, "charset");
    (mime, charset)
}

/// Cut the body into raw parts (header block + content), bounds-checked.
fn split_parts<'a>(
    body: &'a [u8],
    boundary: &str,
    limits: &MultipartLimits,
) -> Result<Vec<&'a [u8]>, MimeError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut cursor = find_delimiter(body, delimiter, 0)
        .ok_or(MimeError::Malformed("no opening boundary"))?
        + delimiter.len();

    loop {
        if body[cursor..].starts_with(b"--") {
            // Closing delimiter.
            break;
        }
        let content_start =
            skip_line(body, cursor).ok_or(MimeError::Malformed("truncated boundary line"))?;
        let next = find_delimiter(body, delimiter, content_start)
            .ok_or(MimeError::Malformed("unterminated part"))?;

        // The line break before the next delimiter belongs to the delimiter.
        let mut content_end = next;
        if content_end > content_start && body[content_end - 1] == b'\n' {
            content_end -= 1;
            if content_end > content_start && body[content_end - 1] == b'\r' {
                content_end -= 1;
            }
        }

        parts.push(&body[content_start..content_end]);
        if parts.len() > limits.max_parts {
            return Err(MimeError::TooManyParts(limits.max_parts));
        }
        cursor = next + delimiter.len();
    }

    Ok(parts)
}

/// First occurrence of the delimiter at a line start, at or after `from`.
fn find_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    let mut at = from;
    while at + delimiter.len() <= body.len() {
        let found = body[at..]
            .windows(delimiter.len())
            .position(|w| w == delimiter)?
            + at;
        if found == 0 || body[found - 1] == b'\n' {
            return Some(found);
        }
        at = found + 1;
    }
    None
}

/// Position just past the next newline; the rest of the current line must be
/// whitespace only.
fn skip_line(body: &[u8], from: usize) -> Option<usize> {
    for (offset, byte) in body[from..].iter().enumerate() {
        match byte {
            b'\n' => return Some(from + offset + 1),
            b'\r' | b' ' | b'\t' => {}
            _ => return None,
        }
    }
    None
}

struct PartHeaders {
    content_type: Option<String>,
    content_id: Option<String>,
    transfer_encoding: Option<String>,
}

fn parse_part<'a>(
    raw: &'a [u8],
    limits: &MultipartLimits,
) -> Result<(PartHeaders, &'a [u8]), MimeError> {
    let (headers_end, content_start) =
        find_blank_line(raw).ok_or(MimeError::Malformed("part without header terminator"))?;
    if headers_end > limits.max_header_bytes {
        return Err(MimeError::TooLarge {
            what: "part headers",
            limit: limits.max_header_bytes as u64,
        });
    }
    let content = &raw[content_start..];
    if content.len() as u64 > limits.max_part_bytes {
        return Err(MimeError::TooLarge {
            what: "part content",
            limit: limits.max_part_bytes,
        });
    }

    let text = std::str::from_utf8(&raw[..headers_end])
        .map_err(|_| MimeError::Malformed("part headers are not UTF-8"))?;
    let mut headers = PartHeaders {
        content_type: None,
        content_id: None,
        transfer_encoding: None,
    };
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(MimeError::Malformed("folded part headers are not supported"));
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(MimeError::Malformed("header line without colon"));
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-type") {
            headers.content_type = Some(value);
        } else if name.eq_ignore_ascii_case("content-id") {
            headers.content_id = Some(value);
        } else if name.eq_ignore_ascii_case("content-transfer-encoding") {
            headers.transfer_encoding = Some(value);
        }
    }
    Ok((headers, content))
}

/// Find the first blank line; returns (header block length, content offset).
fn find_blank_line(raw: &[u8]) -> Option<(usize, usize)> {
    for i in 0..raw.len() {
        if raw[i..].starts_with(b"\r\n\r\n") {
            return Some((i, i + 4));
        }
        if raw[i..].starts_with(b"\n\n") {
            return Some((i, i + 2));
        }
    }
    None
}
