//! Reception policy: what protection an inbound message must carry.
//!
//! Policy is fail closed. A message arriving without a protection the
//! policy requires is rejected with the matching security error code; the
//! pipeline never downgrades a missing signature or missing encryption to
//! a logged warning.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceptionPolicy {
    /// Unsigned user messages are rejected with FailedAuthentication.
    #[serde(default)]
    pub require_signed: bool,

    /// Unencrypted messages are rejected with FailedDecryption.
    #[serde(default)]
    pub require_encrypted: bool,

    /// Exactly one attached application payload part per user message.
    #[serde(default)]
    pub require_single_payload: bool,

    /// Reject when no business handler is registered. Off means
    /// accept-and-discard, logged as a deviation.
    #[serde(default)]
    pub production_mode: bool,

    /// Receipts for signed originals echo the verified signature references.
    #[serde(default = "default_true")]
    pub non_repudiation_receipts: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReceptionPolicy {
    fn default() -> Self {
        Self {
            require_signed: false,
            require_encrypted: false,
            require_single_payload: false,
            production_mode: false,
            non_repudiation_receipts: true,
        }
    }
}

impl ReceptionPolicy {
    /// Accepts unprotected messages; suitable for tests and closed networks.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Everything on: both protections required, single-payload profile,
    /// production dispatch rules.
    pub fn strict() -> Self {
        Self {
            require_signed: true,
            require_encrypted: true,
            require_single_payload: true,
            production_mode: true,
            non_repudiation_receipts: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_permissive_with_nri_receipts() {
        let policy = ReceptionPolicy::default();
        assert!(!policy.require_signed);
        assert!(!policy.require_encrypted);
        assert!(!policy.require_single_payload);
        assert!(!policy.production_mode);
        assert!(policy.non_repudiation_receipts);
    }

    #[test]
    fn absent_fields_take_defaults() {
        let policy: ReceptionPolicy =
            serde_json::from_str(r#"{"require_signed": true}"#).unwrap();
        assert!(policy.require_signed);
        assert!(!policy.require_encrypted);
        assert!(policy.non_repudiation_receipts);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<ReceptionPolicy>(
            r#"{"require_signing": true}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn strict_turns_everything_on() {
        let policy = ReceptionPolicy::strict();
        assert!(policy.require_signed && policy.require_encrypted);
        assert!(policy.require_single_payload && policy.production_mode);
    }
}
