//! Typed ebMS3 message model for the Corten AS4 stack.
//!
//! This crate owns the value types of the messaging layer: the four message
//! kinds (User Message, Receipt, Error, Pull Request), their sub-structures
//! (message info, party and collaboration info, properties, payload part
//! lists), the byte-exact ebMS error vocabulary, and the wire mapping to and
//! from the SOAP envelope.
//!
//! Construction is plain-struct assembly validated once at a `finish()`
//! boundary; there is no mutable builder state and no global configuration.
//! Message ids are minted by an explicitly-owned [`MessageIdGenerator`].
//!
//! # Modules
//!
//! - [`ns`]: namespace URIs and wire names
//! - [`info`]: [`MessageInfo`] and id generation
//! - [`party`], [`collaboration`], [`properties`], [`payload`]: UserMessage
//!   sub-structures
//! - [`error`]: [`EbmsError`] and the wire error vocabulary
//! - [`message`]: the [`Message`] sum type and per-kind constructors
//! - [`nonrepudiation`]: signed-reference evidence types for receipts
//! - [`wire`]: envelope rendering (write) and header extraction (read)

pub mod collaboration;
pub mod error;
pub mod info;
pub mod message;
pub mod nonrepudiation;
pub mod ns;
pub mod party;
pub mod payload;
pub mod properties;
pub mod wire;

// Convenience re-exports
pub use collaboration::{AgreementRef, CollaborationInfo, Service};
pub use error::{EbmsCategory, EbmsError, EbmsErrorCode, EbmsSeverity, ModelError};
pub use info::{MessageIdGenerator, MessageInfo};
pub use message::{
    Message, MessageKind, PullRequest, Receipt, ReceiptContent, SignalBody, SignalMessage,
    SoapVersion, UserMessage, UserMessageDraft,
};
pub use nonrepudiation::{MessagePartNrInformation, NonRepudiationInformation, SignedReference};
pub use party::{Party, PartyId, PartyInfo};
pub use payload::{part_property, PartInfo, PayloadInfo};
pub use properties::Property;
pub use wire::read::{parse_envelope, ParsedMessaging, ReadError};
pub use wire::write::{render_envelope, RenderedEnvelope};
