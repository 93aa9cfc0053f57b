//! Incoming validation pipeline for the Corten AS4 stack.
//!
//! Sits between the transport and the business handler on the receiving
//! side. One call, [`Pipeline::receive`], takes the raw request body and
//! drives the full ladder: multipart decoding, header extraction, security
//! processing, attachment resolution and decompression, structural checks,
//! duplicate detection, business dispatch, and synchronous response
//! shaping (Receipt, Error signal, or nothing).
//!
//! The two failure layers stay apart by type. A protocol rejection is a
//! normal [`Reception`] carrying exactly one structured `EbmsError` and an
//! Error signal response; a [`TransportError`] means the request never
//! became an attributable message and the HTTP front answers 4xx/5xx on
//! its own.
//!
//! # Modules
//!
//! - [`pipeline`]: the orchestrator and its outcome types
//! - [`stage`]: the forward-only stage machine
//! - [`policy`]: fail-closed reception policy
//! - [`dedup`]: bounded duplicate-id cache
//! - [`handler`]: the business dispatch seam
//! - [`response`]: synchronous response shaping

pub mod dedup;
pub mod error;
pub mod handler;
pub mod pipeline;
pub mod policy;
pub mod response;
pub mod stage;

// Convenience re-exports
pub use dedup::{DedupConfig, DuplicateGuard};
pub use error::TransportError;
pub use handler::{BusinessHandler, DiscardingHandler};
pub use pipeline::{AcceptedMessage, Pipeline, Reception};
pub use policy::ReceptionPolicy;
pub use response::SyncResponse;
pub use stage::{PipelineStage, StageTracker};
