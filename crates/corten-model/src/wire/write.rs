//! Envelope rendering.
//!
//! [`render_envelope`] produces a [`RenderedEnvelope`] holding the Messaging
//! header chunk and the Body chunk as separate strings, each rendered exactly
//! once. The security layer computes digests over these exact strings and may
//! add a security header chunk or replace the body with its encrypted form;
//! [`RenderedEnvelope::assemble`] then splices whatever chunks are present
//! into the final envelope. Nothing is ever re-serialized, so signed bytes
//! and transmitted bytes cannot drift apart.

use crate::error::ModelError;
use crate::message::{Message, MessageKind, ReceiptContent, SignalBody, SignalMessage, UserMessage};
use crate::ns;
use crate::properties::Property;
use uuid::Uuid;
use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

/// The envelope as independently rendered chunks.
#[derive(Debug, Clone)]
pub struct RenderedEnvelope {
    pub soap_version: crate::message::SoapVersion,
    /// `wsu:Id` of the Messaging block (signature reference target).
    pub messaging_id: String,
    /// `wsu:Id` of the Body (signature reference target).
    pub body_id: String,
    /// The `eb:Messaging` header block, self-contained.
    pub messaging_xml: String,
    /// The `env:Body` element, self-contained.
    pub body_xml: String,
    /// Optional `wsse:Security` header block, inserted by the security
    /// layer after signing.
    pub security_xml: Option<String>,
}

impl RenderedEnvelope {
    /// Splice the chunks into the complete envelope document.
    pub fn assemble(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <env:Envelope xmlns:env=\"{env}\"><env:Header>{security}{messaging}</env:Header>\
             {body}</env:Envelope>",
            env = self.soap_version.namespace(),
            security = self.security_xml.as_deref().unwrap_or(""),
            messaging = self.messaging_xml,
            body = self.body_xml,
        )
    }
}

/// Render a message into its envelope chunks.
///
/// `body_payload` is the business document placed inside the SOAP body,
/// already serialized by the caller. It must be a single well-formed XML
/// element; it is embedded verbatim, never re-serialized.
///
/// # Errors
///
/// - [`ModelError::SignalWithBodyPayload`] when a signal message is given a
///   body payload; signals travel entirely in the header.
/// - [`ModelError::InvalidBodyPayload`] when the payload string does not
///   parse as one XML element.
pub fn render_envelope(
    message: &Message,
    body_payload: Option<&str>,
) -> Result<RenderedEnvelope, ModelError> {
    if message.is_signal() && body_payload.is_some() {
        return Err(ModelError::SignalWithBodyPayload);
    }
    if let Some(payload) = body_payload {
        roxmltree::Document::parse(payload)
            .map_err(|e| ModelError::InvalidBodyPayload(e.to_string()))?;
    }

    let body_id = format!("body-{}", Uuid::new_v4());
    let messaging_xml = render_messaging(message)?;
    let body_xml = render_body(message.soap_version, &body_id, body_payload);

    Ok(RenderedEnvelope {
        soap_version: message.soap_version,
        messaging_id: message.messaging_id.clone(),
        body_id,
        messaging_xml,
        body_xml,
        security_xml: None,
    })
}

fn render_body(
    soap_version: crate::message::SoapVersion,
    body_id: &str,
    payload: Option<&str>,
) -> String {
    let open = format!(
        "<env:Body xmlns:env=\"{env}\" xmlns:wsu=\"{wsu}\" wsu:Id=\"{id}\"",
        env = soap_version.namespace(),
        wsu = ns::WSU,
        id = body_id,
    );
    match payload {
        Some(payload) => format!("{open}>{payload}</env:Body>"),
        None => format!("{open}/>"),
    }
}

fn render_messaging(message: &Message) -> Result<String, ModelError> {
    let mut messaging = eb(ns::node::MESSAGING);
    let mut bindings = Namespace::empty();
    bindings.put(ns::prefix::EBMS, ns::EBMS);
    bindings.put(ns::prefix::WSU, ns::WSU);
    bindings.put(ns::prefix::ENV, message.soap_version.namespace());
    messaging.namespaces = Some(bindings);
    messaging.attributes.insert(
        format!("{}:{}", ns::prefix::ENV, ns::attr::MUST_UNDERSTAND),
        message.soap_version.must_understand().into(),
    );
    messaging
        .attributes
        .insert(ns::attr::WSU_ID.into(), message.messaging_id.clone());

    let child = match &message.kind {
        MessageKind::User(user) => user_message_element(user),
        MessageKind::Signal(signal) => signal_message_element(signal),
    };
    messaging.children.push(XMLNode::Element(child));

    element_to_string(&messaging)
}

fn user_message_element(user: &UserMessage) -> Element {
    let mut el = eb(ns::node::USER_MESSAGE);
    if let Some(mpc) = &user.mpc {
        el.attributes.insert(ns::attr::MPC.into(), mpc.clone());
    }

    let mut info = eb(ns::node::MESSAGE_INFO);
    push(&mut info, eb_text(ns::node::TIMESTAMP, user.info.timestamp_str()));
    push(&mut info, eb_text(ns::node::MESSAGE_ID, &user.info.message_id));
    if let Some(ref_id) = &user.info.ref_to_message_id {
        push(&mut info, eb_text(ns::node::REF_TO_MESSAGE_ID, ref_id));
    }
    push(&mut el, info);

    let mut party_info = eb(ns::node::PARTY_INFO);
    push(&mut party_info, party_element(ns::node::FROM, &user.party.from));
    push(&mut party_info, party_element(ns::node::TO, &user.party.to));
    push(&mut el, party_info);

    let mut collab = eb(ns::node::COLLABORATION_INFO);
    if let Some(agreement) = &user.collaboration.agreement {
        let mut a = eb_text(ns::node::AGREEMENT_REF, &agreement.value);
        if let Some(t) = &agreement.agreement_type {
            a.attributes.insert(ns::attr::TYPE.into(), t.clone());
        }
        if let Some(pmode) = &agreement.pmode {
            a.attributes.insert(ns::attr::PMODE.into(), pmode.clone());
        }
        push(&mut collab, a);
    }
    let mut service = eb_text(ns::node::SERVICE, &user.collaboration.service.value);
    if let Some(t) = &user.collaboration.service.service_type {
        service.attributes.insert(ns::attr::TYPE.into(), t.clone());
    }
    push(&mut collab, service);
    push(&mut collab, eb_text(ns::node::ACTION, &user.collaboration.action));
    push(
        &mut collab,
        eb_text(ns::node::CONVERSATION_ID, &user.collaboration.conversation_id),
    );
    push(&mut el, collab);

    // Empty containers are omitted entirely, never serialized empty.
    if !user.properties.is_empty() {
        let mut props = eb(ns::node::MESSAGE_PROPERTIES);
        for p in &user.properties {
            push(&mut props, property_element(p));
        }
        push(&mut el, props);
    }

    if let Some(payload) = &user.payload {
        let mut payload_el = eb(ns::node::PAYLOAD_INFO);
        for part in &payload.parts {
            let mut part_el = eb(ns::node::PART_INFO);
            if let Some(href) = &part.href {
                part_el.attributes.insert(ns::attr::HREF.into(), href.clone());
            }
            if !part.properties.is_empty() {
                let mut part_props = eb(ns::node::PART_PROPERTIES);
                for p in &part.properties {
                    push(&mut part_props, property_element(p));
                }
                push(&mut part_el, part_props);
            }
            push(&mut payload_el, part_el);
        }
        push(&mut el, payload_el);
    }

    el
}

fn signal_message_element(signal: &SignalMessage) -> Element {
    let mut el = eb(ns::node::SIGNAL_MESSAGE);

    let mut info = eb(ns::node::MESSAGE_INFO);
    push(&mut info, eb_text(ns::node::TIMESTAMP, signal.info.timestamp_str()));
    push(&mut info, eb_text(ns::node::MESSAGE_ID, &signal.info.message_id));
    if let Some(ref_id) = &signal.info.ref_to_message_id {
        push(&mut info, eb_text(ns::node::REF_TO_MESSAGE_ID, ref_id));
    }
    push(&mut el, info);

    match &signal.body {
        SignalBody::Receipt(receipt) => {
            let mut receipt_el = eb(ns::node::RECEIPT);
            match &receipt.content {
                ReceiptContent::NonRepudiation(nri) => {
                    receipt_el.children.push(XMLNode::Element(nri.to_element()));
                }
                ReceiptContent::Empty => {}
            }
            push(&mut el, receipt_el);
        }
        SignalBody::Errors(errors) => {
            for error in errors {
                el.children.push(XMLNode::Element(error.to_element()));
            }
        }
        SignalBody::PullRequest(pull) => {
            let mut pull_el = eb(ns::node::PULL_REQUEST);
            if let Some(mpc) = &pull.mpc {
                pull_el.attributes.insert(ns::attr::MPC.into(), mpc.clone());
            }
            push(&mut el, pull_el);
        }
    }

    el
}

fn party_element(name: &str, party: &crate::party::Party) -> Element {
    let mut el = eb(name);
    for id in &party.ids {
        let mut id_el = eb_text(ns::node::PARTY_ID, &id.value);
        if let Some(scheme) = &id.scheme {
            id_el.attributes.insert(ns::attr::TYPE.into(), scheme.clone());
        }
        push(&mut el, id_el);
    }
    push(&mut el, eb_text(ns::node::ROLE, &party.role));
    el
}

fn property_element(p: &Property) -> Element {
    let mut el = eb_text(ns::node::PROPERTY, &p.value);
    el.attributes.insert(ns::attr::NAME.into(), p.name.clone());
    if let Some(t) = &p.property_type {
        el.attributes.insert(ns::attr::TYPE.into(), t.clone());
    }
    el
}

fn eb(name: &str) -> Element {
    let mut el = Element::new(name);
    el.prefix = Some(ns::prefix::EBMS.into());
    el.namespace = Some(ns::EBMS.into());
    el
}

fn eb_text(name: &str, text: impl Into<String>) -> Element {
    let mut el = eb(name);
    el.children.push(XMLNode::Text(text.into()));
    el
}

fn push(parent: &mut Element, child: Element) {
    parent.children.push(XMLNode::Element(child));
}

/// Serialize one element without declaration or indentation. The output is a
/// single line; whitespace inside it is significant to signatures.
pub fn element_to_string(el: &Element) -> Result<String, ModelError> {
    let mut out = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(false)
        .perform_indent(false)
        .pad_self_closing(false);
    el.write_with_config(&mut out, config)
        .map_err(|e| ModelError::Render(e.to_string()))?;
    String::from_utf8(out).map_err(|e| ModelError::Render(e.to_string()))
}
