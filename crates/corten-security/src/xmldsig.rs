//! XML-DSig structure access over a parsed envelope.
//!
//! Read-only helpers shared by the inbound processor and the receipt
//! builder. Nothing here verifies anything; extraction and verification
//! are kept apart so receipts can echo references from documents the
//! verifier has already judged.

use std::collections::HashMap;

use corten_model::{ns, SignedReference};

use crate::error::SecurityError;

/// Lift the ordered `ds:Reference` list out of a document's signature.
///
/// Returns an empty list when the document carries no signature. A
/// reference missing its URI, digest algorithm or digest value is skipped;
/// the receipt builder echoes evidence, it does not validate it.
pub fn extract_signed_references(doc: &roxmltree::Document<'_>) -> Vec<SignedReference> {
    let Some(signature) = find_element(doc, ns::DSIG, ns::node::SIGNATURE) else {
        return Vec::new();
    };
    let Some(signed_info) = find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO) else {
        return Vec::new();
    };

    find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE)
        .into_iter()
        .filter_map(|reference| {
            let uri = reference.attribute(ns::attr::URI)?;
            let digest_algorithm = find_child_element(reference, ns::DSIG, ns::node::DIGEST_METHOD)?
                .attribute(ns::attr::ALGORITHM)?;
            let digest_value = find_child_element(reference, ns::DSIG, ns::node::DIGEST_VALUE)
                .map(text_compact)?;
            if digest_value.is_empty() {
                return None;
            }
            Some(SignedReference {
                uri: uri.to_string(),
                digest_algorithm: digest_algorithm.to_string(),
                digest_value,
            })
        })
        .collect()
}

// ── Helper functions ─────────────────────────────────────────────────

pub(crate) fn find_element<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    doc.descendants().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns_uri
    })
}

pub(crate) fn find_child_element<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    parent.children().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns_uri
    })
}

pub(crate) fn find_child_elements<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    parent
        .children()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns_uri
        })
        .collect()
}

pub(crate) fn required_child<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Result<roxmltree::Node<'a, 'input>, SecurityError> {
    find_child_element(parent, ns_uri, local_name)
        .ok_or_else(|| SecurityError::MalformedSecurity(format!("missing {local_name}")))
}

pub(crate) fn required_attr<'a>(
    node: roxmltree::Node<'a, '_>,
    name: &str,
) -> Result<&'a str, SecurityError> {
    node.attribute(name).ok_or_else(|| {
        SecurityError::MalformedSecurity(format!(
            "missing {name} attribute on {}",
            node.tag_name().name()
        ))
    })
}

/// Element text with all whitespace removed, the tolerant reading of
/// base64 values that peers wrap or indent.
pub(crate) fn text_compact(node: roxmltree::Node<'_, '_>) -> String {
    node.text()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Map every `wsu:Id` (and unqualified `Id`) value to its element.
pub(crate) fn build_id_map<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
) -> HashMap<&'a str, roxmltree::Node<'a, 'input>> {
    let mut map = HashMap::new();
    for node in doc.descendants() {
        if !node.is_element() {
            continue;
        }
        let id = node
            .attribute((ns::WSU, ns::attr::ID))
            .or_else(|| node.attribute(ns::attr::ID));
        if let Some(id) = id {
            map.insert(id, node);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED: &str = r##"<e xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
      <ds:Signature><ds:SignedInfo>
        <ds:Reference URI="#m"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue> qq
          zz </ds:DigestValue></ds:Reference>
        <ds:Reference URI="cid:a1"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>AA==</ds:DigestValue></ds:Reference>
        <ds:Reference URI="#broken"><ds:DigestMethod Algorithm="x"/></ds:Reference>
      </ds:SignedInfo></ds:Signature></e>"##;

    #[test]
    fn references_extracted_in_order_with_compacted_values() {
        let doc = roxmltree::Document::parse(SIGNED).unwrap();
        let refs = extract_signed_references(&doc);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].uri, "#m");
        assert_eq!(refs[0].digest_value, "qqzz");
        assert_eq!(refs[1].uri, "cid:a1");
    }

    #[test]
    fn unsigned_document_yields_no_references() {
        let doc = roxmltree::Document::parse("<e><child/></e>").unwrap();
        assert!(extract_signed_references(&doc).is_empty());
    }

    #[test]
    fn id_map_covers_qualified_and_plain_ids() {
        let xml = r#"<e xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
            <a wsu:Id="first"/><b Id="second"/><c/></e>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let map = build_id_map(&doc);
        assert!(map.contains_key("first"));
        assert!(map.contains_key("second"));
        assert_eq!(map.len(), 2);
    }
}
