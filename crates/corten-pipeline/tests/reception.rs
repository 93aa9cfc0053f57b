//! End-to-end reception tests: bytes a real sender would put on the wire go
//! through [`Pipeline::receive`] and come out as dispatched business payloads
//! plus a synchronous Receipt, or as exactly one structured error.

use std::sync::{Arc, Mutex};

use corten_mime::{build_payload_info, write_related, Attachment};
use corten_model::wire::write::render_envelope;
use corten_model::{
    CollaborationInfo, EbmsErrorCode, Message, MessageIdGenerator, MessageInfo, Party, PartyId,
    PartyInfo, Service, SoapVersion, UserMessage, UserMessageDraft,
};
use corten_pipeline::{
    AcceptedMessage, BusinessHandler, Pipeline, PipelineStage, ReceptionPolicy, SyncResponse,
    TransportError,
};
use corten_security::{
    build_receipt, encrypt, sign, DecryptionKeypair, EncryptionConfig, SecurityState,
    SigningConfig, SigningKeypair, TrustMaterial,
};

const SPOOL: u64 = 1 << 20;

fn order_message(has_body_payload: bool, attachments: &[Attachment]) -> Message {
    let info = MessageInfo::new(MessageIdGenerator::default().mint()).unwrap();
    let party = PartyInfo::new(
        Party::new(PartyId::new("urn:corten:party:acme").unwrap(), "Buyer").unwrap(),
        Party::new(PartyId::new("urn:corten:party:globex").unwrap(), "Seller").unwrap(),
    );
    let collab = CollaborationInfo::new(
        Service::new("urn:corten:svc:orders").unwrap(),
        "SubmitOrder",
        "conv-77",
    )
    .unwrap();
    let mut draft = UserMessageDraft::new(info, party, collab);
    draft.payload = build_payload_info(has_body_payload, attachments);
    Message::user(SoapVersion::Soap12, draft.finish().unwrap())
}

struct Delivery {
    message_id: String,
    signed: bool,
    parts: Vec<(String, String, Vec<u8>)>,
}

#[derive(Default)]
struct RecordingHandler {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingHandler {
    fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.deliveries.lock().unwrap())
    }

    fn count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }
}

impl BusinessHandler for RecordingHandler {
    fn deliver(
        &self,
        message: &UserMessage,
        attachments: Vec<Attachment>,
        security: &SecurityState,
    ) -> anyhow::Result<()> {
        let mut parts = Vec::new();
        for attachment in &attachments {
            parts.push((
                attachment.id().to_string(),
                attachment.mime_type().to_string(),
                attachment.bytes()?,
            ));
        }
        self.deliveries.lock().unwrap().push(Delivery {
            message_id: message.info.message_id.clone(),
            signed: security.is_signed,
            parts,
        });
        Ok(())
    }
}

struct FailingHandler;

impl BusinessHandler for FailingHandler {
    fn deliver(
        &self,
        _message: &UserMessage,
        _attachments: Vec<Attachment>,
        _security: &SecurityState,
    ) -> anyhow::Result<()> {
        anyhow::bail!("order store unavailable")
    }
}

/// Fails a fixed number of deliveries, then accepts.
struct FlakyHandler {
    failures_left: Mutex<u32>,
    delivered: Mutex<Vec<String>>,
}

impl FlakyHandler {
    fn failing_once() -> Self {
        Self {
            failures_left: Mutex::new(1),
            delivered: Mutex::new(Vec::new()),
        }
    }
}

impl BusinessHandler for FlakyHandler {
    fn deliver(
        &self,
        message: &UserMessage,
        _attachments: Vec<Attachment>,
        _security: &SecurityState,
    ) -> anyhow::Result<()> {
        let mut left = self.failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            anyhow::bail!("order store unavailable");
        }
        self.delivered
            .lock()
            .unwrap()
            .push(message.info.message_id.clone());
        Ok(())
    }
}

#[test]
fn signed_encrypted_multipart_is_accepted_and_dispatched() {
    let signer = SigningKeypair::generate();
    let signer_key = signer.verifying_key();
    let recipient = DecryptionKeypair::generate();
    let recipient_public = recipient.public_key();

    let report = br#"<Report season="q3"/>"#.to_vec();
    let mut attachments =
        vec![Attachment::from_bytes("report-1", "application/xml", report.clone()).unwrap()];
    attachments[0].compress().unwrap();

    let message = order_message(true, &attachments);
    let sent_id = message.message_id().to_string();

    let rendered = render_envelope(&message, Some("<OrderStatus>open</OrderStatus>")).unwrap();
    let signed = sign(rendered, &attachments, &SigningConfig::new(signer)).unwrap();
    let sealed = encrypt(
        signed,
        &mut attachments,
        &EncryptionConfig::new(recipient_public),
    )
    .unwrap();
    let package = write_related(&sealed.assemble(), SoapVersion::Soap12, &attachments).unwrap();

    let handler = Arc::new(RecordingHandler::default());
    let mut trust = TrustMaterial::new().with_decryption(recipient);
    trust.trust_signer(signer_key);
    let pipeline = Pipeline::new(ReceptionPolicy::strict(), trust).with_handler(handler.clone());

    let reception = pipeline
        .receive(&package.content_type, &package.body)
        .unwrap();

    assert!(reception.is_accepted());
    assert_eq!(reception.message_id.as_deref(), Some(sent_id.as_str()));
    assert!(reception.dispatched);
    assert!(!reception.duplicate);
    assert_eq!(reception.stage, PipelineStage::BusinessDispatched);

    // The business side sees the restored payload, not the wire form.
    let deliveries = handler.take();
    assert_eq!(deliveries.len(), 1);
    let delivery = &deliveries[0];
    assert_eq!(delivery.message_id, sent_id);
    assert!(delivery.signed);
    let (id, mime, bytes) = &delivery.parts[0];
    assert_eq!(id, "report-1");
    assert_eq!(mime, "application/xml");
    assert_eq!(bytes, &report);

    // A receipt answering the sent message, echoing the verified references.
    let SyncResponse::Receipt(receipt) = &reception.response else {
        panic!("accepted user message must be answered with a receipt");
    };
    assert_eq!(
        receipt.info().ref_to_message_id.as_deref(),
        Some(sent_id.as_str())
    );
    let body = reception.response.to_body().unwrap().unwrap();
    assert!(body.contains("NonRepudiationInformation"));
    assert!(body.contains("cid:report-1"));
}

#[test]
fn unsigned_message_is_rejected_when_policy_requires_signing() {
    let message = order_message(true, &[]);
    let sent_id = message.message_id().to_string();
    let document = render_envelope(&message, Some("<Doc/>")).unwrap().assemble();

    let policy = ReceptionPolicy {
        require_signed: true,
        ..ReceptionPolicy::permissive()
    };
    let handler = Arc::new(RecordingHandler::default());
    let pipeline = Pipeline::new(policy, TrustMaterial::new()).with_handler(handler.clone());
    let reception = pipeline
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();

    assert!(!reception.is_accepted());
    assert_eq!(reception.stage, PipelineStage::Rejected);
    assert_eq!(handler.count(), 0);
    let rejection = reception.rejection.as_ref().unwrap();
    assert_eq!(rejection.code, EbmsErrorCode::FailedAuthentication);
    assert_eq!(
        rejection.ref_to_message_in_error.as_deref(),
        Some(sent_id.as_str())
    );

    // The synchronous answer is an Error signal naming code and message.
    assert!(reception.response.is_error());
    let body = reception.response.to_body().unwrap().unwrap();
    assert!(body.contains("EBMS:0101"));
    assert!(body.contains(&sent_id));
}

#[test]
fn signed_but_unencrypted_message_fails_an_encryption_requirement() {
    let signer = SigningKeypair::generate();
    let signer_key = signer.verifying_key();

    let message = order_message(true, &[]);
    let rendered = render_envelope(&message, Some("<Doc/>")).unwrap();
    let document = sign(rendered, &[], &SigningConfig::new(signer))
        .unwrap()
        .assemble();

    let policy = ReceptionPolicy {
        require_signed: true,
        require_encrypted: true,
        ..ReceptionPolicy::permissive()
    };
    let mut trust = TrustMaterial::new();
    trust.trust_signer(signer_key);
    let reception = Pipeline::new(policy, trust)
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();

    // The signature requirement is met; the missing encryption still fails.
    let rejection = reception.rejection.unwrap();
    assert_eq!(rejection.code, EbmsErrorCode::FailedDecryption);
}

#[test]
fn retransmission_is_acknowledged_but_not_redispatched() {
    let signer = SigningKeypair::generate();
    let signer_key = signer.verifying_key();

    let attachments =
        vec![Attachment::from_bytes("doc-1", "text/plain", b"once".to_vec()).unwrap()];
    let message = order_message(false, &attachments);
    let rendered = render_envelope(&message, None).unwrap();
    let document = sign(rendered, &attachments, &SigningConfig::new(signer))
        .unwrap()
        .assemble();
    let package = write_related(&document, SoapVersion::Soap12, &attachments).unwrap();

    let handler = Arc::new(RecordingHandler::default());
    let mut trust = TrustMaterial::new();
    trust.trust_signer(signer_key);
    let pipeline =
        Pipeline::new(ReceptionPolicy::permissive(), trust).with_handler(handler.clone());

    let first = pipeline
        .receive(&package.content_type, &package.body)
        .unwrap();
    assert!(first.dispatched);
    assert!(!first.duplicate);

    let second = pipeline
        .receive(&package.content_type, &package.body)
        .unwrap();
    assert!(second.is_accepted());
    assert!(second.duplicate);
    assert!(!second.dispatched);
    // The sender still gets its receipt; only dispatch is suppressed.
    assert!(matches!(second.response, SyncResponse::Receipt(_)));
    assert_eq!(handler.count(), 1);
}

#[test]
fn missing_attachment_is_a_payload_error() {
    let declared =
        vec![Attachment::from_bytes("doc-1", "text/plain", b"x".to_vec()).unwrap()];
    let message = order_message(false, &declared);
    let document = render_envelope(&message, None).unwrap().assemble();

    // Bare envelope: the declared part never arrives.
    let pipeline = Pipeline::new(ReceptionPolicy::permissive(), TrustMaterial::new());
    let reception = pipeline
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();

    let rejection = reception.rejection.unwrap();
    assert_eq!(rejection.code, EbmsErrorCode::ExternalPayloadError);
    let detail = rejection.detail.as_deref().unwrap_or_default();
    assert!(
        detail.contains("1 attachment parts declared, 0 attachments received"),
        "got: {detail}"
    );
}

#[test]
fn corrupted_gzip_part_is_a_decompression_failure() {
    let mut attachments =
        vec![Attachment::from_bytes("doc-1", "application/xml", b"<Doc/>".repeat(40)).unwrap()];
    attachments[0].compress().unwrap();
    // Declared compressed, but the content on the wire is not gzip.
    let message = order_message(false, &attachments);
    attachments[0]
        .replace_with_cleartext(b"definitely not gzip".to_vec(), SPOOL)
        .unwrap();

    let document = render_envelope(&message, None).unwrap().assemble();
    let package = write_related(&document, SoapVersion::Soap12, &attachments).unwrap();

    let pipeline = Pipeline::new(ReceptionPolicy::permissive(), TrustMaterial::new());
    let reception = pipeline
        .receive(&package.content_type, &package.body)
        .unwrap();

    let rejection = reception.rejection.unwrap();
    assert_eq!(rejection.code, EbmsErrorCode::DecompressionFailure);
    assert!(rejection
        .detail
        .as_deref()
        .unwrap_or_default()
        .contains("cid:doc-1"));
}

#[test]
fn attachment_swapped_in_transit_is_rejected_with_attribution() {
    let signer = SigningKeypair::generate();
    let signer_key = signer.verifying_key();

    let attachments =
        vec![Attachment::from_bytes("doc-1", "text/plain", b"genuine".to_vec()).unwrap()];
    let message = order_message(false, &attachments);
    let sent_id = message.message_id().to_string();
    let rendered = render_envelope(&message, None).unwrap();
    let document = sign(rendered, &attachments, &SigningConfig::new(signer))
        .unwrap()
        .assemble();

    let forged =
        vec![Attachment::from_bytes("doc-1", "text/plain", b"forged".to_vec()).unwrap()];
    let package = write_related(&document, SoapVersion::Soap12, &forged).unwrap();

    let mut trust = TrustMaterial::new();
    trust.trust_signer(signer_key);
    let reception = Pipeline::new(ReceptionPolicy::permissive(), trust)
        .receive(&package.content_type, &package.body)
        .unwrap();

    let rejection = reception.rejection.unwrap();
    assert_eq!(rejection.code, EbmsErrorCode::FailedDecryption);
    // The header verified, so the rejection still names the message.
    assert_eq!(
        rejection.ref_to_message_in_error.as_deref(),
        Some(sent_id.as_str())
    );
}

#[test]
fn handler_failure_is_reported_as_other() {
    let message = order_message(true, &[]);
    let document = render_envelope(&message, Some("<Doc/>")).unwrap().assemble();

    let pipeline = Pipeline::new(ReceptionPolicy::permissive(), TrustMaterial::new())
        .with_handler(Arc::new(FailingHandler));
    let reception = pipeline
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();

    let rejection = reception.rejection.unwrap();
    assert_eq!(rejection.code, EbmsErrorCode::Other);
    let detail = rejection.detail.as_deref().unwrap_or_default();
    assert!(detail.contains("order store unavailable"), "got: {detail}");
}

#[test]
fn rejected_dispatch_leaves_the_id_retryable() {
    let message = order_message(true, &[]);
    let sent_id = message.message_id().to_string();
    let document = render_envelope(&message, Some("<Doc/>")).unwrap().assemble();

    let handler = Arc::new(FlakyHandler::failing_once());
    let pipeline = Pipeline::new(ReceptionPolicy::permissive(), TrustMaterial::new())
        .with_handler(handler.clone());

    let first = pipeline
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();
    assert_eq!(first.rejection.as_ref().unwrap().code, EbmsErrorCode::Other);

    // The sender retries the identical bytes after the failure report. The
    // retry must dispatch, not vanish as a duplicate behind a receipt.
    let retry = pipeline
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();
    assert!(retry.is_accepted());
    assert!(!retry.duplicate);
    assert!(retry.dispatched);
    assert!(matches!(retry.response, SyncResponse::Receipt(_)));
    assert_eq!(*handler.delivered.lock().unwrap(), vec![sent_id]);
}

#[test]
fn production_mode_requires_a_handler() {
    let message = order_message(true, &[]);
    let document = render_envelope(&message, Some("<Doc/>")).unwrap().assemble();

    let production = ReceptionPolicy {
        production_mode: true,
        ..ReceptionPolicy::permissive()
    };
    let pipeline = Pipeline::new(production, TrustMaterial::new());
    let reception = pipeline
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();
    assert_eq!(reception.rejection.unwrap().code, EbmsErrorCode::Other);

    // The rejection did not claim the id: a retry is rejected the same way,
    // never misread as an already-handled duplicate.
    let retry = pipeline
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();
    assert_eq!(retry.rejection.unwrap().code, EbmsErrorCode::Other);

    // Outside production the message is accepted and discarded.
    let reception = Pipeline::new(ReceptionPolicy::permissive(), TrustMaterial::new())
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();
    assert!(reception.is_accepted());
    assert!(!reception.dispatched);
}

#[test]
fn inbound_receipt_signal_gets_no_response() {
    let receipt = build_receipt(
        SoapVersion::Soap12,
        &MessageIdGenerator::default(),
        "earlier-message@corten",
        &[],
        false,
    )
    .unwrap();
    let document = render_envelope(&receipt, None).unwrap().assemble();

    let pipeline = Pipeline::new(ReceptionPolicy::permissive(), TrustMaterial::new());
    let reception = pipeline
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();

    assert!(reception.is_accepted());
    assert!(matches!(
        reception.accepted,
        Some(AcceptedMessage::Signal(_))
    ));
    assert!(!reception.dispatched);
    assert!(matches!(reception.response, SyncResponse::Empty));
    assert!(reception.response.to_body().unwrap().is_none());
}

#[test]
fn signal_with_attachments_is_a_payload_error() {
    let receipt = build_receipt(
        SoapVersion::Soap12,
        &MessageIdGenerator::default(),
        "earlier-message@corten",
        &[],
        false,
    )
    .unwrap();
    let document = render_envelope(&receipt, None).unwrap().assemble();

    let stray = vec![Attachment::from_bytes("stray-1", "text/plain", b"x".to_vec()).unwrap()];
    let package = write_related(&document, SoapVersion::Soap12, &stray).unwrap();

    let pipeline = Pipeline::new(ReceptionPolicy::permissive(), TrustMaterial::new());
    let reception = pipeline
        .receive(&package.content_type, &package.body)
        .unwrap();

    assert_eq!(
        reception.rejection.unwrap().code,
        EbmsErrorCode::ExternalPayloadError
    );
}

#[test]
fn bundled_signals_are_rejected_as_inconsistent() {
    let document = "<env:Envelope xmlns:env=\"http://www.w3.org/2003/05/soap-envelope\">\
         <env:Header>\
         <eb:Messaging xmlns:eb=\"http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/\">\
         <eb:SignalMessage><eb:MessageInfo>\
         <eb:Timestamp>2026-03-01T09:00:00Z</eb:Timestamp>\
         <eb:MessageId>pull-1@peer</eb:MessageId></eb:MessageInfo>\
         <eb:PullRequest/></eb:SignalMessage>\
         <eb:SignalMessage><eb:MessageInfo>\
         <eb:Timestamp>2026-03-01T09:00:01Z</eb:Timestamp>\
         <eb:MessageId>pull-2@peer</eb:MessageId></eb:MessageInfo>\
         <eb:PullRequest mpc=\"urn:corten:mpc:invoices\"/></eb:SignalMessage>\
         </eb:Messaging></env:Header><env:Body/></env:Envelope>";

    let pipeline = Pipeline::new(ReceptionPolicy::permissive(), TrustMaterial::new());
    let reception = pipeline
        .receive(SoapVersion::Soap12.media_type(), document.as_bytes())
        .unwrap();

    assert!(!reception.is_accepted());
    assert_eq!(reception.stage, PipelineStage::Rejected);
    let rejection = reception.rejection.as_ref().unwrap();
    assert_eq!(rejection.code, EbmsErrorCode::ValueInconsistent);
    // Attribution falls to the first signal in the bundle.
    assert_eq!(
        rejection.ref_to_message_in_error.as_deref(),
        Some("pull-1@peer")
    );
    let body = reception.response.to_body().unwrap().unwrap();
    assert!(body.contains("EBMS:0003"));
    assert!(body.contains("pull-1@peer"));
}

#[test]
fn garbage_requests_never_become_protocol_rejections() {
    let pipeline = Pipeline::new(ReceptionPolicy::permissive(), TrustMaterial::new());

    // Not UTF-8.
    let err = pipeline
        .receive("application/soap+xml", &[0xFF, 0xFE, 0x00])
        .unwrap_err();
    assert!(matches!(err, TransportError::Envelope(_)));

    // XML, but not a SOAP envelope.
    let err = pipeline
        .receive("application/soap+xml", b"<Root/>")
        .unwrap_err();
    assert!(matches!(err, TransportError::Envelope(_)));

    // A SOAP envelope with no Messaging header has no sender to answer.
    let bare = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Header/><env:Body/></env:Envelope>"#;
    let err = pipeline
        .receive("application/soap+xml", bare.as_bytes())
        .unwrap_err();
    assert!(matches!(err, TransportError::Envelope(_)));

    // Multipart framing that cannot be split.
    let err = pipeline
        .receive("multipart/related", b"irrelevant")
        .unwrap_err();
    assert!(matches!(err, TransportError::Multipart(_)));
}

#[test]
fn single_payload_profile_counts_attached_parts() {
    let attachments = vec![
        Attachment::from_bytes("doc-1", "text/plain", b"a".to_vec()).unwrap(),
        Attachment::from_bytes("doc-2", "text/plain", b"b".to_vec()).unwrap(),
    ];
    let message = order_message(false, &attachments);
    let document = render_envelope(&message, None).unwrap().assemble();
    let package = write_related(&document, SoapVersion::Soap12, &attachments).unwrap();

    let policy = ReceptionPolicy {
        require_single_payload: true,
        ..ReceptionPolicy::permissive()
    };
    let reception = Pipeline::new(policy, TrustMaterial::new())
        .receive(&package.content_type, &package.body)
        .unwrap();

    let rejection = reception.rejection.unwrap();
    assert_eq!(rejection.code, EbmsErrorCode::ValueInconsistent);
    let detail = rejection.detail.as_deref().unwrap_or_default();
    assert!(detail.contains("found 2"), "got: {detail}");
}
