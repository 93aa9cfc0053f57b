//! The attachment value type and its re-readable content storage.
//!
//! Downstream stages read the same attachment more than once (digest for
//! signing, then packaging; or verification, then business dispatch), so
//! content is never a single-shot stream. Small parts stay in memory; large
//! parts spill to a named temp file that is deleted when the attachment is
//! dropped, on success and failure paths alike.

use crate::compress;
use crate::error::MimeError;
use std::io::Write;
use tempfile::NamedTempFile;

/// Supported part compression modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Gzip,
}

impl CompressionMode {
    /// The `CompressionType` part-property value.
    pub fn mime_value(&self) -> &'static str {
        match self {
            CompressionMode::Gzip => "application/gzip",
        }
    }

    pub fn from_mime_value(value: &str) -> Option<Self> {
        match value {
            "application/gzip" => Some(CompressionMode::Gzip),
            _ => None,
        }
    }
}

/// Re-readable content storage.
#[derive(Debug)]
pub enum AttachmentContent {
    Bytes(Vec<u8>),
    Spooled(NamedTempFile),
}

impl AttachmentContent {
    /// Keep in memory up to `spool_threshold` bytes, spill beyond it.
    pub(crate) fn from_vec(bytes: Vec<u8>, spool_threshold: u64) -> Result<Self, MimeError> {
        if bytes.len() as u64 > spool_threshold {
            let mut file = NamedTempFile::new()?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(AttachmentContent::Spooled(file))
        } else {
            Ok(AttachmentContent::Bytes(bytes))
        }
    }

    /// Read the full content. Repeatable; spooled content is re-read from
    /// disk every time.
    pub fn bytes(&self) -> Result<Vec<u8>, MimeError> {
        match self {
            AttachmentContent::Bytes(b) => Ok(b.clone()),
            AttachmentContent::Spooled(file) => Ok(std::fs::read(file.path())?),
        }
    }

    pub fn len(&self) -> Result<u64, MimeError> {
        match self {
            AttachmentContent::Bytes(b) => Ok(b.len() as u64),
            AttachmentContent::Spooled(file) => Ok(file.as_file().metadata()?.len()),
        }
    }

    pub fn is_empty(&self) -> Result<bool, MimeError> {
        Ok(self.len()? == 0)
    }
}

/// One binary payload part.
///
/// `mime_type` is the type of the content as it stands (so `application/gzip`
/// once compressed); `uncompressed_mime_type` is the type a receiver obtains
/// after undoing compression. They are equal for uncompressed attachments.
#[derive(Debug)]
pub struct Attachment {
    id: String,
    mime_type: String,
    uncompressed_mime_type: String,
    charset: Option<String>,
    compression: Option<CompressionMode>,
    part_properties: Vec<(String, String)>,
    content: AttachmentContent,
}

impl Attachment {
    /// New uncompressed attachment over in-memory content.
    ///
    /// # Errors
    ///
    /// The id must be non-empty and restricted to ASCII alphanumerics plus
    /// `-`, `.` and `_`; anything else cannot appear verbatim in both a
    /// Content-ID header and an href attribute.
    pub fn from_bytes(
        id: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, MimeError> {
        let id = id.into();
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
        {
            return Err(MimeError::BadAttachmentId(id));
        }
        let mime_type = mime_type.into();
        Ok(Self {
            id,
            uncompressed_mime_type: mime_type.clone(),
            mime_type,
            charset: None,
            compression: None,
            part_properties: Vec::new(),
            content: AttachmentContent::Bytes(bytes),
        })
    }

    /// Receiver-side constructor: content as decoded from the wire, identity
    /// already validated by the Content-ID scheme.
    pub(crate) fn from_wire(
        id: String,
        mime_type: String,
        charset: Option<String>,
        content: AttachmentContent,
    ) -> Self {
        Self {
            id,
            uncompressed_mime_type: mime_type.clone(),
            mime_type,
            charset,
            compression: None,
            part_properties: Vec::new(),
            content,
        }
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Add a custom part property carried in the ebMS header.
    pub fn with_part_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, MimeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MimeError::Malformed("part property with empty name"));
        }
        self.part_properties.push((name, value.into()));
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn uncompressed_mime_type(&self) -> &str {
        &self.uncompressed_mime_type
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn compression(&self) -> Option<CompressionMode> {
        self.compression
    }

    pub fn part_properties(&self) -> &[(String, String)] {
        &self.part_properties
    }

    pub fn content(&self) -> &AttachmentContent {
        &self.content
    }

    /// Read the full content as it stands (compressed bytes if compressed).
    pub fn bytes(&self) -> Result<Vec<u8>, MimeError> {
        self.content.bytes()
    }

    /// Compress the content in place with gzip.
    ///
    /// Must happen before signing; the signature digests transmitted bytes.
    /// Compressing twice is a caller bug and is rejected rather than
    /// silently re-wrapped.
    pub fn compress(&mut self) -> Result<(), MimeError> {
        if self.compression.is_some() {
            return Err(MimeError::AlreadyCompressed(self.id.clone()));
        }
        let packed = compress::gzip(&self.bytes()?)?;
        self.content = AttachmentContent::Bytes(packed);
        self.compression = Some(CompressionMode::Gzip);
        self.mime_type = CompressionMode::Gzip.mime_value().to_string();
        Ok(())
    }

    /// Apply the part declaration from the ebMS header to a received
    /// attachment. The MIME layer alone cannot know the payload type of an
    /// encrypted part (it travels as `application/octet-stream`) or whether
    /// a part is compressed; both facts live in the header.
    ///
    /// For compressed parts the wire media type is left alone until
    /// [`into_decompressed`](Self::into_decompressed) restores the payload.
    pub fn apply_declaration(
        &mut self,
        mime_type: impl Into<String>,
        charset: Option<String>,
        compression: Option<CompressionMode>,
    ) {
        let mime_type = mime_type.into();
        self.uncompressed_mime_type = mime_type.clone();
        self.compression = compression;
        if compression.is_none() {
            self.mime_type = mime_type;
        }
        if charset.is_some() {
            self.charset = charset;
        }
    }

    /// Swap the content for its encrypted form. The wire media type becomes
    /// `application/octet-stream` and any charset is dropped; the part
    /// properties keep describing the payload underneath the ciphertext.
    pub fn replace_with_ciphertext(&mut self, ciphertext: Vec<u8>) {
        self.content = AttachmentContent::Bytes(ciphertext);
        self.mime_type = "application/octet-stream".into();
        self.charset = None;
    }

    /// Swap ciphertext back for the recovered cleartext, spilling content
    /// above `spool_threshold` to disk. The media type is corrected later
    /// from the part declaration; decryption alone cannot know it.
    pub fn replace_with_cleartext(
        &mut self,
        cleartext: Vec<u8>,
        spool_threshold: u64,
    ) -> Result<(), MimeError> {
        self.content = AttachmentContent::from_vec(cleartext, spool_threshold)?;
        Ok(())
    }

    /// Undo declared compression, producing the cleartext attachment handed
    /// to business code. Content larger than `spool_threshold` is spilled.
    /// Attachments without declared compression pass through unchanged.
    pub fn into_decompressed(
        self,
        max_bytes: u64,
        spool_threshold: u64,
    ) -> Result<Self, MimeError> {
        let Some(mode) = self.compression else {
            return Ok(self);
        };
        let plain = match mode {
            CompressionMode::Gzip => compress::gunzip(&self.bytes()?, max_bytes)?,
        };
        Ok(Self {
            id: self.id,
            mime_type: self.uncompressed_mime_type.clone(),
            uncompressed_mime_type: self.uncompressed_mime_type,
            charset: self.charset,
            compression: None,
            part_properties: self.part_properties,
            content: AttachmentContent::from_vec(plain, spool_threshold)?,
        })
    }
}
