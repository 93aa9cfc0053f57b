//! Message identity: id generation and the `MessageInfo` header block.

use crate::error::ModelError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Default right-hand side of generated message ids.
pub const DEFAULT_ID_SUFFIX: &str = "corten.msg";

/// Mints message ids of the form `<uuid-v4>@<suffix>`.
///
/// The generator is an explicit value, not a global: tests construct one with
/// a fixed suffix and thread it through, production code builds one per
/// sending endpoint.
#[derive(Debug, Clone)]
pub struct MessageIdGenerator {
    suffix: String,
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_ID_SUFFIX.into(),
        }
    }
}

impl MessageIdGenerator {
    /// Generator with a caller-chosen suffix (typically a domain name).
    ///
    /// # Errors
    ///
    /// Rejects an empty suffix; ids ending in a bare `@` are not valid
    /// anywhere downstream.
    pub fn with_suffix(suffix: impl Into<String>) -> Result<Self, ModelError> {
        let suffix = suffix.into();
        if suffix.is_empty() {
            return Err(ModelError::EmptySuffix);
        }
        Ok(Self { suffix })
    }

    /// Mint a fresh id.
    pub fn mint(&self) -> String {
        format!("{}@{}", Uuid::new_v4(), self.suffix)
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

/// The identity block every message carries: id, timestamp, and the optional
/// back-reference used by receipts and errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageInfo {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub ref_to_message_id: Option<String>,
}

impl MessageInfo {
    /// Info for a fresh outbound message (no back-reference).
    pub fn new(message_id: impl Into<String>) -> Result<Self, ModelError> {
        Self::build(message_id, None)
    }

    /// Info for a signal that answers `ref_to_message_id`.
    pub fn in_reply_to(
        message_id: impl Into<String>,
        ref_to_message_id: impl Into<String>,
    ) -> Result<Self, ModelError> {
        Self::build(message_id, Some(ref_to_message_id.into()))
    }

    fn build(
        message_id: impl Into<String>,
        ref_to_message_id: Option<String>,
    ) -> Result<Self, ModelError> {
        let message_id = message_id.into();
        if message_id.is_empty() {
            return Err(ModelError::EmptyMessageId);
        }
        if let Some(r) = &ref_to_message_id {
            if r.is_empty() {
                return Err(ModelError::EmptyField("ref_to_message_id"));
            }
        }
        Ok(Self {
            message_id,
            timestamp: Utc::now(),
            ref_to_message_id,
        })
    }

    /// Timestamp in the wire form (`2026-01-15T10:30:00Z`, second precision,
    /// always UTC).
    pub fn timestamp_str(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_have_suffix_and_are_unique() {
        let gen = MessageIdGenerator::with_suffix("example.org").unwrap();
        let a = gen.mint();
        let b = gen.mint();
        assert!(a.ends_with("@example.org"));
        assert!(b.ends_with("@example.org"));
        assert_ne!(a, b);
    }

    #[test]
    fn default_suffix_used_when_unspecified() {
        let id = MessageIdGenerator::default().mint();
        assert!(id.ends_with("@corten.msg"));
    }

    #[test]
    fn empty_suffix_rejected() {
        assert_eq!(
            MessageIdGenerator::with_suffix("").unwrap_err(),
            ModelError::EmptySuffix
        );
    }

    #[test]
    fn empty_ids_rejected() {
        assert_eq!(MessageInfo::new("").unwrap_err(), ModelError::EmptyMessageId);
        assert_eq!(
            MessageInfo::in_reply_to("a@b", "").unwrap_err(),
            ModelError::EmptyField("ref_to_message_id")
        );
    }

    #[test]
    fn timestamp_is_utc_second_precision() {
        let info = MessageInfo::new("a@b").unwrap();
        let s = info.timestamp_str();
        assert!(s.ends_with('Z'), "timestamp must be UTC: {s}");
        assert!(!s.contains('.'), "no sub-second digits: {s}");
    }
}
