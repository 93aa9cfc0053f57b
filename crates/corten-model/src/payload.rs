//! Payload part declarations: which parts a user message carries and the
//! part properties describing each one.

use crate::error::ModelError;
use crate::properties::Property;
use serde::Serialize;

/// Well-known part property names.
pub mod part_property {
    pub const MIME_TYPE: &str = "MimeType";
    pub const CHARACTER_SET: &str = "CharacterSet";
    pub const COMPRESSION_TYPE: &str = "CompressionType";
}

/// One declared payload part.
///
/// `href` is `None` for the part carried in the SOAP body and
/// `Some("cid:<id>")` for an attached part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartInfo {
    pub href: Option<String>,
    pub properties: Vec<Property>,
}

impl PartInfo {
    /// Part living in the SOAP body.
    pub fn body() -> Self {
        Self {
            href: None,
            properties: Vec::new(),
        }
    }

    /// Part referencing an attachment by content id.
    ///
    /// # Errors
    ///
    /// The href must use the `cid:` scheme; anything else cannot be resolved
    /// against the attachment set.
    pub fn attachment(href: impl Into<String>) -> Result<Self, ModelError> {
        let href = href.into();
        if !href.starts_with("cid:") || href.len() == "cid:".len() {
            return Err(ModelError::BadPartHref(href));
        }
        Ok(Self {
            href: Some(href),
            properties: Vec::new(),
        })
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// The bare content id (`href` without the `cid:` prefix), if this part
    /// references an attachment.
    pub fn content_id(&self) -> Option<&str> {
        self.href.as_deref().and_then(|h| h.strip_prefix("cid:"))
    }

    /// Look up a part property by name.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Whether this part is declared gzip-compressed.
    pub fn is_compressed(&self) -> bool {
        self.property(part_property::COMPRESSION_TYPE) == Some("application/gzip")
    }
}

/// The full payload declaration of a user message.
///
/// Absent entirely (`None` at the message level) when the message carries no
/// payload parts at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadInfo {
    pub parts: Vec<PartInfo>,
}

impl PayloadInfo {
    pub fn new(parts: Vec<PartInfo>) -> Result<Self, ModelError> {
        if parts.is_empty() {
            return Err(ModelError::EmptyField("payload parts"));
        }
        Ok(Self { parts })
    }

    /// All attachment content ids, in declaration order.
    pub fn attachment_ids(&self) -> Vec<&str> {
        self.parts.iter().filter_map(|p| p.content_id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn href_scheme_enforced() {
        assert!(PartInfo::attachment("cid:").is_err());
        assert!(PartInfo::attachment("https://example.org/doc").is_err());
        let part = PartInfo::attachment("cid:order-1").unwrap();
        assert_eq!(part.content_id(), Some("order-1"));
    }

    #[test]
    fn body_part_has_no_content_id() {
        assert_eq!(PartInfo::body().content_id(), None);
    }

    #[test]
    fn compression_flag_reads_part_properties() {
        let part = PartInfo::attachment("cid:a")
            .unwrap()
            .with_property(Property::new(part_property::MIME_TYPE, "application/xml").unwrap())
            .with_property(
                Property::new(part_property::COMPRESSION_TYPE, "application/gzip").unwrap(),
            );
        assert!(part.is_compressed());
        assert_eq!(part.property(part_property::MIME_TYPE), Some("application/xml"));
    }

    #[test]
    fn payload_info_rejects_empty_part_list() {
        assert!(PayloadInfo::new(Vec::new()).is_err());
    }

    #[test]
    fn attachment_ids_in_declaration_order() {
        let info = PayloadInfo::new(vec![
            PartInfo::attachment("cid:b").unwrap(),
            PartInfo::body(),
            PartInfo::attachment("cid:a").unwrap(),
        ])
        .unwrap();
        assert_eq!(info.attachment_ids(), vec!["b", "a"]);
    }
}
