//! PayloadInfo assembly from the attachment set.

use crate::attachment::Attachment;
use corten_model::payload::{part_property, PartInfo, PayloadInfo};
use corten_model::properties::Property;

/// Build the PayloadInfo block for a message.
///
/// Returns `None` when there are no parts at all; an empty PayloadInfo is
/// never placed on the wire. The body part (no href, no properties) comes
/// first when present, then one PartInfo per attachment in order.
///
/// Part properties are emitted in a fixed order: `MimeType`, `CharacterSet`
/// (when the attachment declares one), `CompressionType` (when compressed),
/// then custom properties in insertion order. Duplicate names keep the first
/// occurrence; a custom property cannot shadow a reserved one.
pub fn build_payload_info(
    has_body_payload: bool,
    attachments: &[Attachment],
) -> Option<PayloadInfo> {
    if !has_body_payload && attachments.is_empty() {
        return None;
    }

    let mut parts = Vec::with_capacity(attachments.len() + 1);
    if has_body_payload {
        parts.push(PartInfo::body());
    }
    for attachment in attachments {
        parts.push(part_for(attachment));
    }
    Some(PayloadInfo { parts })
}

fn part_for(attachment: &Attachment) -> PartInfo {
    let mut properties: Vec<Property> = Vec::new();
    let mut push = |name: &str, value: &str| {
        if !properties.iter().any(|p| p.name == name) {
            properties.push(Property {
                name: name.to_string(),
                property_type: None,
                value: value.to_string(),
            });
        }
    };

    // MimeType names what the receiver holds after undoing compression; the
    // transport-level type already sits on the MIME part header.
    push(part_property::MIME_TYPE, attachment.uncompressed_mime_type());
    if let Some(charset) = attachment.charset() {
        push(part_property::CHARACTER_SET, charset);
    }
    if let Some(mode) = attachment.compression() {
        push(part_property::COMPRESSION_TYPE, mode.mime_value());
    }
    for (name, value) in attachment.part_properties() {
        push(name, value);
    }

    PartInfo {
        href: Some(format!("cid:{}", attachment.id())),
        properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(part: &PartInfo) -> Vec<&str> {
        part.properties.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn no_parts_means_no_payload_info() {
        assert!(build_payload_info(false, &[]).is_none());
    }

    #[test]
    fn body_part_comes_first_and_is_bare() {
        let att = Attachment::from_bytes("a", "text/plain", vec![]).unwrap();
        let info = build_payload_info(true, &[att]).unwrap();
        assert_eq!(info.parts.len(), 2);
        assert!(info.parts[0].href.is_none());
        assert!(info.parts[0].properties.is_empty());
        assert_eq!(info.parts[1].href.as_deref(), Some("cid:a"));
    }

    #[test]
    fn property_order_is_fixed() {
        let mut att = Attachment::from_bytes("doc-1", "application/xml", b"<x/>".to_vec())
            .unwrap()
            .with_charset("utf-8")
            .with_part_property("origin", "warehouse-7")
            .unwrap();
        att.compress().unwrap();

        let info = build_payload_info(false, &[att]).unwrap();
        assert_eq!(
            names(&info.parts[0]),
            vec!["MimeType", "CharacterSet", "CompressionType", "origin"]
        );
        let part = &info.parts[0];
        assert_eq!(part.property("MimeType"), Some("application/xml"));
        assert_eq!(part.property("CompressionType"), Some("application/gzip"));
        assert!(part.is_compressed());
    }

    #[test]
    fn custom_duplicates_keep_first_occurrence() {
        let att = Attachment::from_bytes("doc-1", "text/plain", vec![])
            .unwrap()
            .with_part_property("origin", "first")
            .unwrap()
            .with_part_property("origin", "second")
            .unwrap()
            .with_part_property("MimeType", "spoofed/type")
            .unwrap();

        let info = build_payload_info(false, &[att]).unwrap();
        let part = &info.parts[0];
        assert_eq!(part.property("origin"), Some("first"));
        // Reserved names are emitted before customs, so the spoof is dropped.
        assert_eq!(part.property("MimeType"), Some("text/plain"));
        assert_eq!(names(part), vec!["MimeType", "origin"]);
    }

    #[test]
    fn charset_property_present_iff_declared() {
        let plain = Attachment::from_bytes("p", "text/plain", vec![]).unwrap();
        let info = build_payload_info(false, &[plain]).unwrap();
        assert_eq!(names(&info.parts[0]), vec!["MimeType"]);
    }
}
