//! Header extraction from received envelopes.
//!
//! The reader is descriptive, not judgmental: it reports every UserMessage
//! and SignalMessage found in the Messaging block and leaves the
//! exactly-one-per-envelope rule to the validation pipeline, which owns the
//! rejection vocabulary. What the reader does enforce is wire shape: required
//! elements present, required text non-empty, hrefs in the cid scheme,
//! containers never empty-present.

use crate::collaboration::{AgreementRef, CollaborationInfo, Service};
use crate::error::{EbmsError, EbmsErrorCode, EbmsSeverity, ModelError};
use crate::info::MessageInfo;
use crate::message::{
    PullRequest, Receipt, SignalBody, SignalMessage, SoapVersion, UserMessage, UserMessageDraft,
};
use crate::nonrepudiation::{NonRepudiationInformation, SignedReference};
use crate::ns;
use crate::party::{Party, PartyId, PartyInfo};
use crate::payload::{PartInfo, PayloadInfo};
use crate::properties::Property;
use chrono::{DateTime, Utc};
use roxmltree::Node;

/// Header extraction failure. Distinct from an XML parse failure, which the
/// caller hits before this layer is reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("document root is not a SOAP envelope")]
    NotSoap,

    #[error("no Messaging header block")]
    MissingMessaging,

    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl From<ModelError> for ReadError {
    fn from(e: ModelError) -> Self {
        ReadError::InvalidHeader(e.to_string())
    }
}

/// Everything the Messaging block declared, as found. May be structurally
/// ambiguous (several entries); counting is the pipeline's job.
#[derive(Debug, Clone)]
pub struct ParsedMessaging {
    pub soap_version: SoapVersion,
    /// `wsu:Id` of the Messaging block, when present.
    pub messaging_id: Option<String>,
    pub user_messages: Vec<UserMessage>,
    pub signals: Vec<SignalMessage>,
}

/// Extract the Messaging header from a parsed envelope.
pub fn parse_envelope(doc: &roxmltree::Document<'_>) -> Result<ParsedMessaging, ReadError> {
    let root = doc.root_element();
    let soap_version = if root.has_tag_name((ns::SOAP11, ns::node::ENVELOPE)) {
        SoapVersion::Soap11
    } else if root.has_tag_name((ns::SOAP12, ns::node::ENVELOPE)) {
        SoapVersion::Soap12
    } else {
        return Err(ReadError::NotSoap);
    };

    let header = find_child(root, soap_version.namespace(), ns::node::HEADER)
        .ok_or(ReadError::MissingMessaging)?;
    let messaging =
        find_child(header, ns::EBMS, ns::node::MESSAGING).ok_or(ReadError::MissingMessaging)?;
    let messaging_id = messaging
        .attribute((ns::WSU, ns::attr::ID))
        .map(str::to_string);

    let mut user_messages = Vec::new();
    let mut signals = Vec::new();
    for child in messaging.children().filter(|c| c.is_element()) {
        match (child.tag_name().namespace(), child.tag_name().name()) {
            (Some(ns::EBMS), ns::node::USER_MESSAGE) => {
                user_messages.push(parse_user_message(child)?);
            }
            (Some(ns::EBMS), ns::node::SIGNAL_MESSAGE) => {
                signals.push(parse_signal_message(child)?);
            }
            (Some(ns::EBMS), other) => {
                return Err(ReadError::InvalidHeader(format!(
                    "unexpected element {other:?} in Messaging"
                )));
            }
            // Foreign-namespace extensions are tolerated.
            _ => {}
        }
    }

    Ok(ParsedMessaging {
        soap_version,
        messaging_id,
        user_messages,
        signals,
    })
}

fn parse_message_info(parent: Node<'_, '_>) -> Result<MessageInfo, ReadError> {
    let info = required_child(parent, ns::EBMS, ns::node::MESSAGE_INFO)?;
    let timestamp_text = required_text(info, ns::EBMS, ns::node::TIMESTAMP)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_text)
        .map_err(|e| {
            ReadError::InvalidHeader(format!("bad timestamp {timestamp_text:?}: {e}"))
        })?
        .with_timezone(&Utc);
    let message_id = required_text(info, ns::EBMS, ns::node::MESSAGE_ID)?;
    let ref_to_message_id = optional_text(info, ns::EBMS, ns::node::REF_TO_MESSAGE_ID)?;
    Ok(MessageInfo {
        message_id,
        timestamp,
        ref_to_message_id,
    })
}

fn parse_user_message(node: Node<'_, '_>) -> Result<UserMessage, ReadError> {
    let info = parse_message_info(node)?;

    let party_info = required_child(node, ns::EBMS, ns::node::PARTY_INFO)?;
    let from = parse_party(required_child(party_info, ns::EBMS, ns::node::FROM)?)?;
    let to = parse_party(required_child(party_info, ns::EBMS, ns::node::TO)?)?;

    let collaboration =
        parse_collaboration(required_child(node, ns::EBMS, ns::node::COLLABORATION_INFO)?)?;

    let mut draft = UserMessageDraft::new(info, PartyInfo::new(from, to), collaboration);
    draft.mpc = node.attribute(ns::attr::MPC).map(str::to_string);

    if let Some(props) = find_child(node, ns::EBMS, ns::node::MESSAGE_PROPERTIES) {
        draft.properties = parse_properties(props)?;
        if draft.properties.is_empty() {
            return Err(ReadError::InvalidHeader(
                "MessageProperties present but empty".into(),
            ));
        }
    }

    if let Some(payload) = find_child(node, ns::EBMS, ns::node::PAYLOAD_INFO) {
        let mut parts = Vec::new();
        for part_node in payload
            .children()
            .filter(|c| c.has_tag_name((ns::EBMS, ns::node::PART_INFO)))
        {
            let mut part = match part_node.attribute(ns::attr::HREF) {
                Some(href) => PartInfo::attachment(href)?,
                None => PartInfo::body(),
            };
            if let Some(part_props) =
                find_child(part_node, ns::EBMS, ns::node::PART_PROPERTIES)
            {
                part.properties = parse_properties(part_props)?;
            }
            parts.push(part);
        }
        draft.payload = Some(PayloadInfo::new(parts)?);
    }

    Ok(draft.finish()?)
}

fn parse_party(node: Node<'_, '_>) -> Result<Party, ReadError> {
    let role = required_text(node, ns::EBMS, ns::node::ROLE)?;
    let mut ids = Vec::new();
    for id_node in node
        .children()
        .filter(|c| c.has_tag_name((ns::EBMS, ns::node::PARTY_ID)))
    {
        let value = text_of(id_node).ok_or_else(|| {
            ReadError::InvalidHeader("PartyId is missing or empty".into())
        })?;
        let id = match id_node.attribute(ns::attr::TYPE) {
            Some(scheme) => PartyId::with_scheme(value, scheme)?,
            None => PartyId::new(value)?,
        };
        ids.push(id);
    }
    let mut ids = ids.into_iter();
    let first = ids.next().ok_or_else(|| {
        ReadError::InvalidHeader("party requires at least one PartyId".into())
    })?;
    let mut party = Party::new(first, role)?;
    for id in ids {
        party = party.with_id(id);
    }
    Ok(party)
}

fn parse_collaboration(node: Node<'_, '_>) -> Result<CollaborationInfo, ReadError> {
    let service_node = required_child(node, ns::EBMS, ns::node::SERVICE)?;
    let mut service = Service::new(text_of(service_node).ok_or_else(|| {
        ReadError::InvalidHeader("Service is missing or empty".into())
    })?)?;
    if let Some(t) = service_node.attribute(ns::attr::TYPE) {
        service = service.with_type(t);
    }

    let action = required_text(node, ns::EBMS, ns::node::ACTION)?;
    let conversation_id = required_text(node, ns::EBMS, ns::node::CONVERSATION_ID)?;
    let mut collaboration = CollaborationInfo::new(service, action, conversation_id)?;

    if let Some(agreement_node) = find_child(node, ns::EBMS, ns::node::AGREEMENT_REF) {
        let mut agreement = AgreementRef::new(text_of(agreement_node).ok_or_else(|| {
            ReadError::InvalidHeader("AgreementRef present but empty".into())
        })?)?;
        if let Some(t) = agreement_node.attribute(ns::attr::TYPE) {
            agreement = agreement.with_type(t);
        }
        if let Some(pmode) = agreement_node.attribute(ns::attr::PMODE) {
            agreement = agreement.with_pmode(pmode);
        }
        collaboration = collaboration.with_agreement(agreement);
    }

    Ok(collaboration)
}

fn parse_properties(node: Node<'_, '_>) -> Result<Vec<Property>, ReadError> {
    let mut properties = Vec::new();
    for prop_node in node
        .children()
        .filter(|c| c.has_tag_name((ns::EBMS, ns::node::PROPERTY)))
    {
        let name = prop_node.attribute(ns::attr::NAME).ok_or_else(|| {
            ReadError::InvalidHeader("Property without name attribute".into())
        })?;
        let value = prop_node.text().unwrap_or("").trim().to_string();
        let mut property = Property::new(name, value)?;
        if let Some(t) = prop_node.attribute(ns::attr::TYPE) {
            property = property.with_type(t);
        }
        properties.push(property);
    }
    Ok(properties)
}

fn parse_signal_message(node: Node<'_, '_>) -> Result<SignalMessage, ReadError> {
    let info = parse_message_info(node)?;

    let mut receipts: Vec<Receipt> = Vec::new();
    let mut errors: Vec<EbmsError> = Vec::new();
    let mut pulls: Vec<PullRequest> = Vec::new();

    for child in node.children().filter(|c| c.is_element()) {
        match (child.tag_name().namespace(), child.tag_name().name()) {
            (Some(ns::EBMS), ns::node::MESSAGE_INFO) => {}
            (Some(ns::EBMS), ns::node::RECEIPT) => receipts.push(parse_receipt(child)?),
            (Some(ns::EBMS), ns::node::ERROR) => errors.push(parse_error(child)?),
            (Some(ns::EBMS), ns::node::PULL_REQUEST) => {
                pulls.push(PullRequest::new(
                    child.attribute(ns::attr::MPC).map(str::to_string),
                ));
            }
            (Some(ns::EBMS), other) => {
                return Err(ReadError::InvalidHeader(format!(
                    "unexpected element {other:?} in SignalMessage"
                )));
            }
            _ => {}
        }
    }

    // One payload kind per signal; errors may repeat, the others may not.
    let body = match (receipts.len(), errors.len(), pulls.len()) {
        (1, 0, 0) => SignalBody::Receipt(receipts.remove(0)),
        (0, n, 0) if n > 0 => SignalBody::Errors(errors),
        (0, 0, 1) => SignalBody::PullRequest(pulls.remove(0)),
        (0, 0, 0) => {
            return Err(ReadError::InvalidHeader(
                "signal message carries no payload".into(),
            ));
        }
        _ => {
            return Err(ReadError::InvalidHeader(
                "signal message carries mixed payloads".into(),
            ));
        }
    };

    Ok(SignalMessage { info, body })
}

fn parse_receipt(node: Node<'_, '_>) -> Result<Receipt, ReadError> {
    let Some(nri_node) = find_child(node, ns::EBBP, ns::node::NON_REPUDIATION_INFORMATION)
    else {
        return Ok(Receipt::empty());
    };
    let mut references = Vec::new();
    for part in nri_node
        .children()
        .filter(|c| c.has_tag_name((ns::EBBP, ns::node::MESSAGE_PART_NR_INFORMATION)))
    {
        let reference = required_child(part, ns::DSIG, ns::node::REFERENCE)?;
        let uri = reference.attribute(ns::attr::URI).ok_or_else(|| {
            ReadError::InvalidHeader("non-repudiation Reference without URI".into())
        })?;
        let method = required_child(reference, ns::DSIG, ns::node::DIGEST_METHOD)?;
        let digest_algorithm = method.attribute(ns::attr::ALGORITHM).ok_or_else(|| {
            ReadError::InvalidHeader("DigestMethod without Algorithm".into())
        })?;
        let digest_value = required_text(reference, ns::DSIG, ns::node::DIGEST_VALUE)?;
        references.push(SignedReference {
            uri: uri.to_string(),
            digest_algorithm: digest_algorithm.to_string(),
            digest_value,
        });
    }
    Ok(Receipt::non_repudiation(NonRepudiationInformation::new(
        references,
    )?))
}

fn parse_error(node: Node<'_, '_>) -> Result<EbmsError, ReadError> {
    let code_attr = node.attribute(ns::attr::ERROR_CODE).ok_or_else(|| {
        ReadError::InvalidHeader("Error without errorCode attribute".into())
    })?;
    let code = EbmsErrorCode::from_code(code_attr).ok_or_else(|| {
        ReadError::InvalidHeader(format!("unrecognized error code {code_attr:?}"))
    })?;

    // shortDescription and category are derived from the code; a mismatch
    // means the peer and this implementation disagree about the vocabulary.
    if let Some(short) = node.attribute(ns::attr::SHORT_DESCRIPTION) {
        if short != code.short_description() {
            return Err(ReadError::InvalidHeader(format!(
                "shortDescription {short:?} does not match {code}"
            )));
        }
    }
    if let Some(category) = node.attribute(ns::attr::CATEGORY) {
        if category != code.category().as_str() {
            return Err(ReadError::InvalidHeader(format!(
                "category {category:?} does not match {code}"
            )));
        }
    }

    let severity_attr = node.attribute(ns::attr::SEVERITY).ok_or_else(|| {
        ReadError::InvalidHeader("Error without severity attribute".into())
    })?;
    let severity = EbmsSeverity::from_wire(severity_attr).ok_or_else(|| {
        ReadError::InvalidHeader(format!("unrecognized severity {severity_attr:?}"))
    })?;

    let mut error = EbmsError::new(
        code,
        node.attribute(ns::attr::REF_TO_MESSAGE_IN_ERROR)
            .map(str::to_string),
    );
    error.severity = severity;
    if let Some(description) = find_child(node, ns::EBMS, ns::node::DESCRIPTION) {
        let text = text_of(description).ok_or(ModelError::EmptyErrorDescription)?;
        error = error.with_description(text)?;
    }
    if let Some(detail) = find_child(node, ns::EBMS, ns::node::ERROR_DETAIL) {
        if let Some(text) = text_of(detail) {
            error = error.with_detail(text);
        }
    }
    Ok(error)
}

fn find_child<'a, 'input>(
    node: Node<'a, 'input>,
    ns_uri: &str,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.has_tag_name((ns_uri, name)))
}

fn required_child<'a, 'input>(
    node: Node<'a, 'input>,
    ns_uri: &str,
    name: &str,
) -> Result<Node<'a, 'input>, ReadError> {
    find_child(node, ns_uri, name)
        .ok_or_else(|| ReadError::InvalidHeader(format!("missing {name} element")))
}

/// Trimmed element text, `None` when absent or blank.
fn text_of<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    let text = node.text()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn required_text(parent: Node<'_, '_>, ns_uri: &str, name: &str) -> Result<String, ReadError> {
    let node = required_child(parent, ns_uri, name)?;
    text_of(node)
        .map(str::to_string)
        .ok_or_else(|| ReadError::InvalidHeader(format!("{name} is empty")))
}

fn optional_text(
    parent: Node<'_, '_>,
    ns_uri: &str,
    name: &str,
) -> Result<Option<String>, ReadError> {
    match find_child(parent, ns_uri, name) {
        None => Ok(None),
        Some(node) => text_of(node)
            .map(|t| Some(t.to_string()))
            .ok_or_else(|| ReadError::InvalidHeader(format!("{name} present but empty"))),
    }
}
