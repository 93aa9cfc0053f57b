//! Business dispatch seam.

use corten_mime::Attachment;
use corten_model::UserMessage;
use corten_security::SecurityState;

/// Receives validated user messages at the end of the pipeline.
///
/// Implementations live outside this crate (queue writers, document stores,
/// test recorders). A returned error rejects the message with the Other
/// code, carrying the error's text in the error detail; the pipeline treats
/// dispatch failure like any other stage failure and produces an Error
/// signal, never a partial acceptance.
pub trait BusinessHandler: Send + Sync {
    fn deliver(
        &self,
        message: &UserMessage,
        attachments: Vec<Attachment>,
        security: &SecurityState,
    ) -> anyhow::Result<()>;
}

/// Accepts everything and drops it.
pub struct DiscardingHandler;

impl BusinessHandler for DiscardingHandler {
    fn deliver(
        &self,
        _message: &UserMessage,
        _attachments: Vec<Attachment>,
        _security: &SecurityState,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
