//! Synchronous response shaping.

use corten_model::{render_envelope, Message};

use crate::error::TransportError;

/// What travels back on the open connection.
///
/// The transport maps this to HTTP: any variant is a 2xx, with the rendered
/// envelope as body when there is one. Transport-level failures never reach
/// this type; they surface as [`TransportError`] before a response exists.
#[derive(Debug)]
pub enum SyncResponse {
    /// Acknowledgement for an accepted user message.
    Receipt(Message),
    /// Protocol rejection referencing the failed message.
    Error(Message),
    /// Nothing to say; an accepted signal gets no counter-signal.
    Empty,
}

impl SyncResponse {
    /// Render the response envelope. `None` means an empty 2xx body.
    pub fn to_body(&self) -> Result<Option<String>, TransportError> {
        match self {
            SyncResponse::Receipt(message) | SyncResponse::Error(message) => {
                Ok(Some(render_envelope(message, None)?.assemble()))
            }
            SyncResponse::Empty => Ok(None),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncResponse::Error(_))
    }
}
