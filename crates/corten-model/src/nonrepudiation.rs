//! Non-repudiation content for receipts.
//!
//! When a received message was signed, the receipt echoes one
//! `MessagePartNRInformation` per signed reference, each wrapping a copy of
//! the original `ds:Reference` (URI, digest algorithm, digest value). The
//! sender can then compare these against its own signature to prove the
//! receiver saw exactly the bytes that were sent.

use crate::error::ModelError;
use crate::ns;
use serde::Serialize;
use xmltree::{Element, Namespace, XMLNode};

/// One reference lifted from a verified signature's `SignedInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedReference {
    /// Reference URI as it appeared on the wire (`#id` or `cid:...`).
    pub uri: String,
    /// Digest algorithm URI.
    pub digest_algorithm: String,
    /// Digest value, base64 as it appeared on the wire.
    pub digest_value: String,
}

impl SignedReference {
    fn to_element(&self) -> Element {
        let mut reference = Element::new(ns::node::REFERENCE);
        reference.prefix = Some(ns::prefix::DSIG.into());
        reference.namespace = Some(ns::DSIG.into());
        reference
            .attributes
            .insert(ns::attr::URI.into(), self.uri.clone());

        let mut method = Element::new(ns::node::DIGEST_METHOD);
        method.prefix = Some(ns::prefix::DSIG.into());
        method.namespace = Some(ns::DSIG.into());
        method
            .attributes
            .insert(ns::attr::ALGORITHM.into(), self.digest_algorithm.clone());
        reference.children.push(XMLNode::Element(method));

        let mut value = Element::new(ns::node::DIGEST_VALUE);
        value.prefix = Some(ns::prefix::DSIG.into());
        value.namespace = Some(ns::DSIG.into());
        value.children.push(XMLNode::Text(self.digest_value.clone()));
        reference.children.push(XMLNode::Element(value));

        reference
    }
}

/// One part entry of the non-repudiation block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePartNrInformation {
    pub reference: SignedReference,
}

/// The full non-repudiation block carried in a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonRepudiationInformation {
    pub parts: Vec<MessagePartNrInformation>,
}

impl NonRepudiationInformation {
    /// Build from the references of a verified signature.
    ///
    /// # Errors
    ///
    /// Rejects an empty reference list; a signature with zero references
    /// cannot have verified, so an empty block here always indicates a bug
    /// in the caller.
    pub fn new(references: Vec<SignedReference>) -> Result<Self, ModelError> {
        if references.is_empty() {
            return Err(ModelError::EmptyField("signed references"));
        }
        Ok(Self {
            parts: references
                .into_iter()
                .map(|reference| MessagePartNrInformation { reference })
                .collect(),
        })
    }

    /// Render as an `ebbp:NonRepudiationInformation` element. Declares the
    /// `ebbp` and `ds` bindings itself so the block is valid wherever it is
    /// embedded.
    pub fn to_element(&self) -> Element {
        let mut nri = Element::new(ns::node::NON_REPUDIATION_INFORMATION);
        nri.prefix = Some(ns::prefix::EBBP.into());
        nri.namespace = Some(ns::EBBP.into());
        let mut bindings = Namespace::empty();
        bindings.put(ns::prefix::EBBP, ns::EBBP);
        bindings.put(ns::prefix::DSIG, ns::DSIG);
        nri.namespaces = Some(bindings);
        for part in &self.parts {
            let mut part_el = Element::new(ns::node::MESSAGE_PART_NR_INFORMATION);
            part_el.prefix = Some(ns::prefix::EBBP.into());
            part_el.namespace = Some(ns::EBBP.into());
            part_el
                .children
                .push(XMLNode::Element(part.reference.to_element()));
            nri.children.push(XMLNode::Element(part_el));
        }
        nri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reference(uri: &str) -> SignedReference {
        SignedReference {
            uri: uri.into(),
            digest_algorithm: "http://www.w3.org/2001/04/xmlenc#sha256".into(),
            digest_value: "2jmj7l5rSw0yVb/vlWAYkK/YBwk=".into(),
        }
    }

    #[test]
    fn empty_reference_list_rejected() {
        assert!(NonRepudiationInformation::new(Vec::new()).is_err());
    }

    #[test]
    fn one_part_per_reference() {
        let nri = NonRepudiationInformation::new(vec![
            sample_reference("#corten-body-1"),
            sample_reference("cid:corten-att-a@corten"),
        ])
        .unwrap();
        assert_eq!(nri.parts.len(), 2);

        let el = nri.to_element();
        assert_eq!(el.name, "NonRepudiationInformation");
        assert_eq!(el.children.len(), 2);
        let first = el.children[0].as_element().unwrap();
        assert_eq!(first.name, "MessagePartNRInformation");
        let reference = first.children[0].as_element().unwrap();
        assert_eq!(
            reference.attributes.get("URI").map(String::as_str),
            Some("#corten-body-1")
        );
    }
}
