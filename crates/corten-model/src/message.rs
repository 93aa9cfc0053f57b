//! The message sum type: one User Message or one Signal Message per envelope.
//!
//! `Message` is the unit the rest of the stack operates on. Exactly one kind
//! per envelope is a type-level fact here, not a runtime check: a `Message`
//! holds either a [`UserMessage`] or a [`SignalMessage`], never both, and a
//! receipt's content slot is the two-variant [`ReceiptContent`] rather than a
//! free-form element list.

use crate::collaboration::CollaborationInfo;
use crate::error::{EbmsError, ModelError};
use crate::info::MessageInfo;
use crate::nonrepudiation::NonRepudiationInformation;
use crate::ns;
use crate::party::PartyInfo;
use crate::payload::PayloadInfo;
use crate::properties::Property;
use serde::Serialize;
use uuid::Uuid;

/// SOAP envelope version. Both are accepted inbound; outbound defaults to 1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl Default for SoapVersion {
    fn default() -> Self {
        SoapVersion::Soap12
    }
}

impl SoapVersion {
    pub fn namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => ns::SOAP11,
            SoapVersion::Soap12 => ns::SOAP12,
        }
    }

    /// Value of the `mustUnderstand` attribute on the Messaging header
    /// (`"1"` under SOAP 1.1, `"true"` under SOAP 1.2).
    pub fn must_understand(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "1",
            SoapVersion::Soap12 => "true",
        }
    }

    /// Media type of the root part in a multipart package.
    pub fn media_type(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "text/xml",
            SoapVersion::Soap12 => "application/soap+xml",
        }
    }
}

/// A completed, validated user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    pub info: MessageInfo,
    /// Message partition channel, absent for the default channel.
    pub mpc: Option<String>,
    pub party: PartyInfo,
    pub collaboration: CollaborationInfo,
    /// Message-level properties (deduplicated by name at `finish`).
    pub properties: Vec<Property>,
    /// Declared payload parts; `None` when the message carries none.
    pub payload: Option<PayloadInfo>,
}

/// Assembly state for a [`UserMessage`]: plain fields in, one validation
/// pass at [`finish`](UserMessageDraft::finish).
///
/// Field-level emptiness is already enforced by the sub-structure
/// constructors; `finish` checks the rules that span fields.
#[derive(Debug, Clone)]
pub struct UserMessageDraft {
    pub info: MessageInfo,
    pub mpc: Option<String>,
    pub party: PartyInfo,
    pub collaboration: CollaborationInfo,
    pub properties: Vec<Property>,
    pub payload: Option<PayloadInfo>,
}

impl UserMessageDraft {
    pub fn new(info: MessageInfo, party: PartyInfo, collaboration: CollaborationInfo) -> Self {
        Self {
            info,
            mpc: None,
            party,
            collaboration,
            properties: Vec::new(),
            payload: None,
        }
    }

    /// Validate cross-field rules and produce the message.
    ///
    /// - duplicate payload part hrefs are rejected (two parts resolving to
    ///   the same attachment cannot be packaged);
    /// - properties are deduplicated by name, first occurrence wins;
    /// - a present-but-empty mpc is rejected.
    pub fn finish(self) -> Result<UserMessage, ModelError> {
        if let Some(mpc) = &self.mpc {
            if mpc.is_empty() {
                return Err(ModelError::EmptyField("mpc"));
            }
        }
        if let Some(payload) = &self.payload {
            let mut seen = std::collections::HashSet::new();
            for part in &payload.parts {
                if let Some(href) = &part.href {
                    if !seen.insert(href.as_str()) {
                        return Err(ModelError::DuplicatePartHref(href.clone()));
                    }
                }
            }
        }
        let mut properties: Vec<Property> = Vec::with_capacity(self.properties.len());
        for p in self.properties {
            if !properties.iter().any(|q| q.name == p.name) {
                properties.push(p);
            }
        }
        Ok(UserMessage {
            info: self.info,
            mpc: self.mpc,
            party: self.party,
            collaboration: self.collaboration,
            properties,
            payload: self.payload,
        })
    }
}

/// Receipt content: non-repudiation evidence when the acknowledged message
/// was signed, empty otherwise. There is no variant that carries both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReceiptContent {
    NonRepudiation(NonRepudiationInformation),
    Empty,
}

/// Acknowledgement signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub content: ReceiptContent,
}

impl Receipt {
    pub fn non_repudiation(nri: NonRepudiationInformation) -> Self {
        Self {
            content: ReceiptContent::NonRepudiation(nri),
        }
    }

    pub fn empty() -> Self {
        Self {
            content: ReceiptContent::Empty,
        }
    }
}

/// Pull signal requesting delivery from a partition channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct PullRequest {
    /// Channel to pull from; absent means the default channel.
    pub mpc: Option<String>,
}

impl PullRequest {
    pub fn new(mpc: Option<String>) -> Self {
        Self { mpc }
    }
}

/// The three signal payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SignalBody {
    Receipt(Receipt),
    Errors(Vec<EbmsError>),
    PullRequest(PullRequest),
}

impl SignalBody {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SignalBody::Receipt(_) => "Receipt",
            SignalBody::Errors(_) => "Error",
            SignalBody::PullRequest(_) => "PullRequest",
        }
    }
}

/// One signal message: identity plus exactly one signal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalMessage {
    pub info: MessageInfo,
    pub body: SignalBody,
}

/// What a message is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    User(UserMessage),
    Signal(SignalMessage),
}

/// A complete message, ready for the wire writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub soap_version: SoapVersion,
    /// `wsu:Id` of the `eb:Messaging` block, the signature reference target.
    pub messaging_id: String,
    pub kind: MessageKind,
}

impl Message {
    fn assemble(soap_version: SoapVersion, kind: MessageKind) -> Self {
        Self {
            soap_version,
            messaging_id: format!("msg-{}", Uuid::new_v4()),
            kind,
        }
    }

    pub fn user(soap_version: SoapVersion, user: UserMessage) -> Self {
        Self::assemble(soap_version, MessageKind::User(user))
    }

    pub fn receipt(soap_version: SoapVersion, info: MessageInfo, receipt: Receipt) -> Self {
        Self::assemble(
            soap_version,
            MessageKind::Signal(SignalMessage {
                info,
                body: SignalBody::Receipt(receipt),
            }),
        )
    }

    /// Error signal. At least one error is required; an empty error signal
    /// is meaningless on the wire.
    pub fn errors(
        soap_version: SoapVersion,
        info: MessageInfo,
        errors: Vec<EbmsError>,
    ) -> Result<Self, ModelError> {
        if errors.is_empty() {
            return Err(ModelError::NoErrors);
        }
        Ok(Self::assemble(
            soap_version,
            MessageKind::Signal(SignalMessage {
                info,
                body: SignalBody::Errors(errors),
            }),
        ))
    }

    pub fn pull_request(soap_version: SoapVersion, info: MessageInfo, pull: PullRequest) -> Self {
        Self::assemble(
            soap_version,
            MessageKind::Signal(SignalMessage {
                info,
                body: SignalBody::PullRequest(pull),
            }),
        )
    }

    pub fn info(&self) -> &MessageInfo {
        match &self.kind {
            MessageKind::User(u) => &u.info,
            MessageKind::Signal(s) => &s.info,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.info().message_id
    }

    pub fn is_signal(&self) -> bool {
        matches!(self.kind, MessageKind::Signal(_))
    }

    /// Declared payload, if this is a user message that has one.
    pub fn payload(&self) -> Option<&PayloadInfo> {
        match &self.kind {
            MessageKind::User(u) => u.payload.as_ref(),
            MessageKind::Signal(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            MessageKind::User(_) => "UserMessage",
            MessageKind::Signal(s) => s.body.kind_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaboration::Service;
    use crate::error::EbmsErrorCode;
    use crate::info::MessageIdGenerator;
    use crate::party::{Party, PartyId};
    use crate::payload::{PartInfo, PayloadInfo};

    fn draft() -> UserMessageDraft {
        let gen = MessageIdGenerator::default();
        let info = MessageInfo::new(gen.mint()).unwrap();
        let party = PartyInfo::new(
            Party::new(PartyId::new("acme").unwrap(), "Buyer").unwrap(),
            Party::new(PartyId::new("globex").unwrap(), "Seller").unwrap(),
        );
        let collab =
            CollaborationInfo::new(Service::new("urn:corten:svc:orders").unwrap(), "Submit", "conv-1")
                .unwrap();
        UserMessageDraft::new(info, party, collab)
    }

    #[test]
    fn duplicate_part_hrefs_rejected_at_finish() {
        let mut d = draft();
        d.payload = Some(
            PayloadInfo::new(vec![
                PartInfo::attachment("cid:a").unwrap(),
                PartInfo::attachment("cid:a").unwrap(),
            ])
            .unwrap(),
        );
        assert_eq!(
            d.finish().unwrap_err(),
            ModelError::DuplicatePartHref("cid:a".into())
        );
    }

    #[test]
    fn properties_deduplicated_first_wins() {
        let mut d = draft();
        d.properties = vec![
            Property::new("origin", "warehouse-7").unwrap(),
            Property::new("priority", "high").unwrap(),
            Property::new("origin", "warehouse-9").unwrap(),
        ];
        let user = d.finish().unwrap();
        assert_eq!(user.properties.len(), 2);
        assert_eq!(user.properties[0].value, "warehouse-7");
    }

    #[test]
    fn empty_mpc_rejected() {
        let mut d = draft();
        d.mpc = Some(String::new());
        assert_eq!(d.finish().unwrap_err(), ModelError::EmptyField("mpc"));
    }

    #[test]
    fn messaging_ids_unique_per_message() {
        let user = draft().finish().unwrap();
        let a = Message::user(SoapVersion::Soap12, user.clone());
        let b = Message::user(SoapVersion::Soap12, user);
        assert_ne!(a.messaging_id, b.messaging_id);
        assert!(a.messaging_id.starts_with("msg-"));
    }

    #[test]
    fn error_signal_requires_errors() {
        let info = MessageInfo::in_reply_to("sig@corten.msg", "orig@corten.msg").unwrap();
        assert_eq!(
            Message::errors(SoapVersion::Soap12, info, Vec::new()).unwrap_err(),
            ModelError::NoErrors
        );
    }

    #[test]
    fn accessors_reach_through_kinds() {
        let user = draft().finish().unwrap();
        let user_id = user.info.message_id.clone();
        let msg = Message::user(SoapVersion::Soap12, user);
        assert_eq!(msg.message_id(), user_id);
        assert!(!msg.is_signal());
        assert_eq!(msg.kind_name(), "UserMessage");

        let info = MessageInfo::in_reply_to("sig@corten.msg", user_id).unwrap();
        let receipt = Message::receipt(SoapVersion::Soap12, info, Receipt::empty());
        assert!(receipt.is_signal());
        assert_eq!(receipt.kind_name(), "Receipt");
        assert!(receipt.payload().is_none());

        let info = MessageInfo::in_reply_to("err@corten.msg", "orig@corten.msg").unwrap();
        let errs = vec![EbmsError::new(EbmsErrorCode::Other, None)];
        let error_msg = Message::errors(SoapVersion::Soap11, info, errs).unwrap();
        assert_eq!(error_msg.kind_name(), "Error");
        assert_eq!(error_msg.soap_version.must_understand(), "1");
    }
}
