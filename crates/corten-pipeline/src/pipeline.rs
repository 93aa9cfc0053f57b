//! The incoming validation pipeline.
//!
//! Every inbound request walks the stages strictly in order. The first
//! failing check rejects the message with exactly one structured error and
//! no later check runs; there is never a partial acceptance and never more
//! than one error per rejection. Rejection is an outcome, not a Rust error:
//! [`TransportError`] is reserved for requests that never became an
//! attributable message at all.
//!
//! Rejection codes by stage:
//! - header extraction: ValueInconsistent
//! - security processing: FailedAuthentication / FailedDecryption /
//!   ValueInconsistent (attachment cross-check)
//! - attachment resolution: ExternalPayloadError / DecompressionFailure
//! - structure validation: ValueInconsistent
//! - business dispatch: Other

use std::sync::Arc;

use corten_mime::{
    is_multipart_related, parse_related, Attachment, CompressionMode, MultipartLimits,
};
use corten_model::{
    ns, parse_envelope, part_property, EbmsError, EbmsErrorCode, Message, MessageIdGenerator,
    MessageInfo, ParsedMessaging, PartInfo, PayloadInfo, ReadError, SignalMessage, SoapVersion,
    UserMessage,
};
use corten_security::{build_receipt, SecurityError, SecurityState, TrustMaterial};

use crate::dedup::{DedupConfig, DuplicateGuard};
use crate::error::TransportError;
use crate::handler::BusinessHandler;
use crate::policy::ReceptionPolicy;
use crate::response::SyncResponse;
use crate::stage::{PipelineStage, StageTracker};

/// The message the pipeline accepted, for callers that correlate signals
/// against sent messages or archive user messages.
#[derive(Debug)]
pub enum AcceptedMessage {
    User(UserMessage),
    Signal(SignalMessage),
}

impl AcceptedMessage {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AcceptedMessage::User(_) => "UserMessage",
            AcceptedMessage::Signal(signal) => signal.body.kind_name(),
        }
    }
}

/// Outcome of one received request.
#[derive(Debug)]
pub struct Reception {
    /// Inbound message id, when one was attributable.
    pub message_id: Option<String>,
    /// The accepted message; `None` on rejection.
    pub accepted: Option<AcceptedMessage>,
    /// The single structured error, on rejection.
    pub rejection: Option<EbmsError>,
    /// Whether this was a retransmission of an already-seen id.
    pub duplicate: bool,
    /// Whether the business handler ran.
    pub dispatched: bool,
    /// Terminal stage reached.
    pub stage: PipelineStage,
    pub response: SyncResponse,
}

impl Reception {
    pub fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Everything a receiving endpoint needs to validate inbound traffic.
pub struct Pipeline {
    policy: ReceptionPolicy,
    trust: TrustMaterial,
    limits: MultipartLimits,
    dedup: DuplicateGuard,
    id_gen: MessageIdGenerator,
    handler: Option<Arc<dyn BusinessHandler>>,
}

impl Pipeline {
    pub fn new(policy: ReceptionPolicy, trust: TrustMaterial) -> Self {
        Self {
            policy,
            trust,
            limits: MultipartLimits::default(),
            dedup: DuplicateGuard::new(&DedupConfig::default()),
            id_gen: MessageIdGenerator::default(),
            handler: None,
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn BusinessHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_limits(mut self, limits: MultipartLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Share a duplicate guard across pipelines (clones share state).
    pub fn with_dedup(mut self, dedup: DuplicateGuard) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_id_generator(mut self, id_gen: MessageIdGenerator) -> Self {
        self.id_gen = id_gen;
        self
    }

    /// Process one received request body.
    ///
    /// `content_type` decides the outer decoding: multipart/related is split
    /// into envelope plus attachments, anything else is taken as a bare
    /// envelope. Returns a [`Reception`] for both acceptance and protocol
    /// rejection; `Err` only when the request never became an attributable
    /// message or the response could not be built.
    pub fn receive(&self, content_type: &str, body: &[u8]) -> Result<Reception, TransportError> {
        let mut stages = StageTracker::new();
        let (document, attachments) = self.decode(content_type, body)?;
        let doc = roxmltree::Document::parse(&document)
            .map_err(|e| TransportError::Envelope(format!("not well-formed XML: {e}")))?;
        let soap_version = sniff_soap_version(&doc)?;

        match self.run(&mut stages, &document, &doc, attachments) {
            Ok(outcome) => {
                let response = match &outcome.accepted {
                    AcceptedMessage::User(_) => {
                        let receipt = build_receipt(
                            soap_version,
                            &self.id_gen,
                            &outcome.message_id,
                            &outcome.security.signed_references,
                            self.policy.non_repudiation_receipts,
                        )
                        .map_err(|e| TransportError::Response(e.to_string()))?;
                        SyncResponse::Receipt(receipt)
                    }
                    AcceptedMessage::Signal(_) => SyncResponse::Empty,
                };
                tracing::debug!(
                    message_id = %outcome.message_id,
                    kind = outcome.accepted.kind_name(),
                    duplicate = outcome.duplicate,
                    dispatched = outcome.dispatched,
                    "message accepted"
                );
                Ok(Reception {
                    message_id: Some(outcome.message_id),
                    accepted: Some(outcome.accepted),
                    rejection: None,
                    duplicate: outcome.duplicate,
                    dispatched: outcome.dispatched,
                    stage: stages.stage(),
                    response,
                })
            }
            Err(Halt::Reject(error)) => {
                stages.advance(PipelineStage::Rejected)?;
                tracing::debug!(code = error.code.code(), "message rejected");
                let signal = self.error_signal(soap_version, &error)?;
                Ok(Reception {
                    message_id: error.ref_to_message_in_error.clone(),
                    accepted: None,
                    rejection: Some(error),
                    duplicate: false,
                    dispatched: false,
                    stage: stages.stage(),
                    response: SyncResponse::Error(signal),
                })
            }
            Err(Halt::Transport(e)) => Err(e),
        }
    }

    fn decode(
        &self,
        content_type: &str,
        body: &[u8],
    ) -> Result<(String, Vec<Attachment>), TransportError> {
        if is_multipart_related(content_type) {
            let parsed = parse_related(content_type, body, &self.limits)?;
            let document = String::from_utf8(parsed.root)
                .map_err(|_| TransportError::Envelope("root part is not UTF-8".into()))?;
            Ok((document, parsed.attachments))
        } else {
            let document = String::from_utf8(body.to_vec())
                .map_err(|_| TransportError::Envelope("request body is not UTF-8".into()))?;
            Ok((document, Vec::new()))
        }
    }

    fn run(
        &self,
        stages: &mut StageTracker,
        document: &str,
        doc: &roxmltree::Document<'_>,
        attachments: Vec<Attachment>,
    ) -> Result<Accepted, Halt> {
        // RECEIVED -> HEADER_EXTRACTED
        let parsed = match parse_envelope(doc) {
            Ok(parsed) => parsed,
            Err(e @ (ReadError::NotSoap | ReadError::MissingMessaging)) => {
                return Err(Halt::Transport(TransportError::Envelope(e.to_string())));
            }
            Err(ReadError::InvalidHeader(detail)) => {
                return Err(reject(EbmsErrorCode::ValueInconsistent, None, detail));
            }
        };
        let (message_id, accepted) = exactly_one(parsed)?;
        stages.advance(PipelineStage::HeaderExtracted)?;

        // HEADER_EXTRACTED -> SECURITY_PROCESSED
        let mut attachments = attachments;
        let security = match corten_security::process(
            document,
            &mut attachments,
            &self.trust,
            self.limits.spool_threshold_bytes,
        ) {
            Ok(state) => state,
            Err(e) => return Err(security_rejection(&e, &message_id)),
        };
        if self.policy.require_signed && !security.is_signed {
            return Err(reject(
                EbmsErrorCode::FailedAuthentication,
                Some(&message_id),
                "policy requires a signed message; none arrived",
            ));
        }
        if self.policy.require_encrypted && !security.is_encrypted {
            return Err(reject(
                EbmsErrorCode::FailedDecryption,
                Some(&message_id),
                "policy requires an encrypted message; none arrived",
            ));
        }
        stages.advance(PipelineStage::SecurityProcessed)?;

        // SECURITY_PROCESSED -> ATTACHMENTS_RESOLVED
        let attachments = match &accepted {
            AcceptedMessage::User(user) => {
                self.resolve_attachments(user.payload.as_ref(), attachments, &message_id)?
            }
            AcceptedMessage::Signal(_) => {
                if !attachments.is_empty() {
                    return Err(reject(
                        EbmsErrorCode::ExternalPayloadError,
                        Some(&message_id),
                        format!(
                            "signal message arrived with {} undeclared attachments",
                            attachments.len()
                        ),
                    ));
                }
                attachments
            }
        };
        stages.advance(PipelineStage::AttachmentsResolved)?;

        // ATTACHMENTS_RESOLVED -> STRUCTURE_VALIDATED
        if let AcceptedMessage::User(user) = &accepted {
            self.validate_structure(user, &message_id)?;
        }
        stages.advance(PipelineStage::StructureValidated)?;

        // STRUCTURE_VALIDATED -> BUSINESS_DISPATCHED
        let duplicate = !self.dedup.first_sight(&message_id);
        let mut dispatched = false;
        if let AcceptedMessage::User(user) = &accepted {
            if duplicate {
                tracing::debug!(message_id = %message_id, "retransmission; dispatch skipped");
            } else {
                match self.handler.as_deref() {
                    Some(handler) => {
                        if let Err(cause) = handler.deliver(user, attachments, &security) {
                            // Rejection releases the id; the retransmission
                            // must not read as a duplicate.
                            self.dedup.forget(&message_id);
                            return Err(reject(
                                EbmsErrorCode::Other,
                                Some(&message_id),
                                format!("business handler failed: {cause:#}"),
                            ));
                        }
                        dispatched = true;
                    }
                    None if self.policy.production_mode => {
                        self.dedup.forget(&message_id);
                        return Err(reject(
                            EbmsErrorCode::Other,
                            Some(&message_id),
                            "no business handler registered",
                        ));
                    }
                    None => {
                        tracing::warn!(
                            message_id = %message_id,
                            "no business handler registered; message accepted and discarded"
                        );
                    }
                }
            }
        }
        stages.advance(PipelineStage::BusinessDispatched)?;

        Ok(Accepted {
            message_id,
            accepted,
            security,
            duplicate,
            dispatched,
        })
    }

    fn resolve_attachments(
        &self,
        payload: Option<&PayloadInfo>,
        attachments: Vec<Attachment>,
        message_id: &str,
    ) -> Result<Vec<Attachment>, Halt> {
        let declared: Vec<&PartInfo> = payload
            .map(|p| p.parts.iter().filter(|part| part.href.is_some()).collect())
            .unwrap_or_default();
        if declared.len() != attachments.len() {
            return Err(reject(
                EbmsErrorCode::ExternalPayloadError,
                Some(message_id),
                format!(
                    "{} attachment parts declared, {} attachments received",
                    declared.len(),
                    attachments.len()
                ),
            ));
        }

        let mut pending = attachments;
        let mut resolved = Vec::with_capacity(pending.len());
        for part in declared {
            let Some(id) = part.content_id() else {
                return Err(reject(
                    EbmsErrorCode::ExternalPayloadError,
                    Some(message_id),
                    format!(
                        "part href {:?} is not a cid reference",
                        part.href.as_deref().unwrap_or_default()
                    ),
                ));
            };
            let Some(position) = pending.iter().position(|a| a.id() == id) else {
                return Err(reject(
                    EbmsErrorCode::ExternalPayloadError,
                    Some(message_id),
                    format!("declared part cid:{id} has no matching attachment"),
                ));
            };
            let mut attachment = pending.swap_remove(position);

            // The wire type of a decrypted part is octet-stream; the declared
            // MimeType names what the part really is.
            let mime = part
                .property(part_property::MIME_TYPE)
                .unwrap_or(attachment.mime_type())
                .to_string();
            let charset = part
                .property(part_property::CHARACTER_SET)
                .map(str::to_string);
            let compression = part.is_compressed().then_some(CompressionMode::Gzip);
            attachment.apply_declaration(mime, charset, compression);

            let attachment = if part.is_compressed() {
                match attachment.into_decompressed(
                    self.limits.max_decompressed_bytes,
                    self.limits.spool_threshold_bytes,
                ) {
                    Ok(plain) => plain,
                    Err(e) if e.is_decompression() => {
                        return Err(reject(
                            EbmsErrorCode::DecompressionFailure,
                            Some(message_id),
                            format!("part cid:{id}: {e}"),
                        ));
                    }
                    Err(e) => {
                        return Err(reject(
                            EbmsErrorCode::ExternalPayloadError,
                            Some(message_id),
                            format!("part cid:{id}: {e}"),
                        ));
                    }
                }
            } else {
                attachment
            };
            resolved.push(attachment);
        }
        Ok(resolved)
    }

    fn validate_structure(&self, user: &UserMessage, message_id: &str) -> Result<(), Halt> {
        let attached: Vec<&PartInfo> = user
            .payload
            .as_ref()
            .map(|p| p.parts.iter().filter(|part| part.href.is_some()).collect())
            .unwrap_or_default();
        for part in &attached {
            if part.property(part_property::MIME_TYPE).is_none() {
                return Err(reject(
                    EbmsErrorCode::ValueInconsistent,
                    Some(message_id),
                    format!(
                        "part {} lacks the MimeType property",
                        part.href.as_deref().unwrap_or_default()
                    ),
                ));
            }
        }
        if self.policy.require_single_payload && attached.len() != 1 {
            return Err(reject(
                EbmsErrorCode::ValueInconsistent,
                Some(message_id),
                format!(
                    "profile expects exactly one application payload part, found {}",
                    attached.len()
                ),
            ));
        }
        Ok(())
    }

    fn error_signal(
        &self,
        soap_version: SoapVersion,
        error: &EbmsError,
    ) -> Result<Message, TransportError> {
        let info = match &error.ref_to_message_in_error {
            Some(id) => MessageInfo::in_reply_to(self.id_gen.mint(), id)?,
            None => MessageInfo::new(self.id_gen.mint())?,
        };
        Ok(Message::errors(soap_version, info, vec![error.clone()])?)
    }
}

struct Accepted {
    message_id: String,
    accepted: AcceptedMessage,
    security: SecurityState,
    duplicate: bool,
    dispatched: bool,
}

enum Halt {
    Reject(EbmsError),
    Transport(TransportError),
}

impl From<TransportError> for Halt {
    fn from(e: TransportError) -> Self {
        Halt::Transport(e)
    }
}

fn reject(code: EbmsErrorCode, message_id: Option<&str>, detail: impl Into<String>) -> Halt {
    Halt::Reject(EbmsError::new(code, message_id.map(str::to_string)).with_detail(detail))
}

fn security_rejection(error: &SecurityError, message_id: &str) -> Halt {
    let code = match error {
        SecurityError::MalformedSecurity(_) | SecurityError::DisallowedAlgorithm { .. } => {
            EbmsErrorCode::FailedAuthentication
        }
        SecurityError::AttachmentMismatch(_) => EbmsErrorCode::ValueInconsistent,
        SecurityError::Crypto(_) => EbmsErrorCode::FailedDecryption,
        SecurityError::OrderViolation(_)
        | SecurityError::NothingToEncrypt
        | SecurityError::Mime(_)
        | SecurityError::Model(_) => EbmsErrorCode::Other,
    };
    reject(code, Some(message_id), error.to_string())
}

fn sniff_soap_version(doc: &roxmltree::Document<'_>) -> Result<SoapVersion, TransportError> {
    let root = doc.root_element();
    if root.has_tag_name((ns::SOAP11, ns::node::ENVELOPE)) {
        Ok(SoapVersion::Soap11)
    } else if root.has_tag_name((ns::SOAP12, ns::node::ENVELOPE)) {
        Ok(SoapVersion::Soap12)
    } else {
        Err(TransportError::Envelope(
            "document root is not a SOAP envelope".into(),
        ))
    }
}

fn exactly_one(parsed: ParsedMessaging) -> Result<(String, AcceptedMessage), Halt> {
    let ParsedMessaging {
        mut user_messages,
        mut signals,
        ..
    } = parsed;
    match (user_messages.len(), signals.len()) {
        (1, 0) => {
            let user = user_messages.remove(0);
            Ok((user.info.message_id.clone(), AcceptedMessage::User(user)))
        }
        (0, 1) => {
            let signal = signals.remove(0);
            Ok((signal.info.message_id.clone(), AcceptedMessage::Signal(signal)))
        }
        (users, sigs) => {
            let id = user_messages
                .first()
                .map(|u| u.info.message_id.as_str())
                .or_else(|| signals.first().map(|s| s.info.message_id.as_str()));
            Err(reject(
                EbmsErrorCode::ValueInconsistent,
                id,
                format!(
                    "Messaging carries {users} user messages and {sigs} signals; exactly one message is accepted"
                ),
            ))
        }
    }
}
