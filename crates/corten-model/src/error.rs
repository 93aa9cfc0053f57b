//! Model construction errors and the ebMS wire error vocabulary.
//!
//! Two distinct things live here and must not be conflated:
//!
//! - [`ModelError`]: a Rust-level construction failure (a caller handed us
//!   values that cannot form a valid message). Never serialized.
//! - [`EbmsError`]: a protocol-level structured error that travels inside an
//!   Error Signal Message. Its code, short description, and category strings
//!   are part of the interoperability contract and are matched byte-for-byte
//!   by peers.

use crate::ns;
use serde::Serialize;
use xmltree::{Element, XMLNode};

/// Construction failure for model values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("message id must not be empty")]
    EmptyMessageId,

    #[error("message id suffix must not be empty")]
    EmptySuffix,

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("error description is present but empty")]
    EmptyErrorDescription,

    #[error("error signal requires at least one error")]
    NoErrors,

    #[error("duplicate payload part href {0:?}")]
    DuplicatePartHref(String),

    #[error("part href must use the cid scheme: {0:?}")]
    BadPartHref(String),

    #[error("a signal message cannot carry a body payload")]
    SignalWithBodyPayload,

    #[error("body payload is not well-formed XML: {0}")]
    InvalidBodyPayload(String),

    #[error("xml rendering failed: {0}")]
    Render(String),
}

/// Severity of a wire error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EbmsSeverity {
    Failure,
    Warning,
}

impl EbmsSeverity {
    /// Wire spelling (lower case).
    pub fn as_str(&self) -> &'static str {
        match self {
            EbmsSeverity::Failure => "failure",
            EbmsSeverity::Warning => "warning",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "failure" => Some(EbmsSeverity::Failure),
            "warning" => Some(EbmsSeverity::Warning),
            _ => None,
        }
    }
}

/// Category of a wire error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EbmsCategory {
    Content,
    Processing,
    Communication,
}

impl EbmsCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EbmsCategory::Content => "Content",
            EbmsCategory::Processing => "Processing",
            EbmsCategory::Communication => "Communication",
        }
    }
}

/// Stable error vocabulary (enumeration, not exhaustive in the protocol, but
/// closed for this implementation).
///
/// Every variant carries its wire code, short description, and category as
/// fixed metadata; the pipeline picks the variant, never free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EbmsErrorCode {
    /// Structural/protocol shape violation (duplicate signals, header
    /// inconsistencies, attachment href mismatches).
    ValueInconsistent,
    /// Catch-all for business/handler failures.
    Other,
    /// Attachment set does not match the declared payload parts.
    ExternalPayloadError,
    /// Signature absent when required, or security header not acceptable.
    FailedAuthentication,
    /// Cryptographic processing failed (decryption or verification).
    FailedDecryption,
    /// A compressed part could not be decompressed.
    DecompressionFailure,
}

impl EbmsErrorCode {
    /// Wire error code, e.g. `EBMS:0003`.
    pub fn code(&self) -> &'static str {
        match self {
            EbmsErrorCode::ValueInconsistent => "EBMS:0003",
            EbmsErrorCode::Other => "EBMS:0004",
            EbmsErrorCode::ExternalPayloadError => "EBMS:0011",
            EbmsErrorCode::FailedAuthentication => "EBMS:0101",
            EbmsErrorCode::FailedDecryption => "EBMS:0102",
            EbmsErrorCode::DecompressionFailure => "EBMS:0303",
        }
    }

    /// Wire short description, matched by peers.
    pub fn short_description(&self) -> &'static str {
        match self {
            EbmsErrorCode::ValueInconsistent => "ValueInconsistent",
            EbmsErrorCode::Other => "Other",
            EbmsErrorCode::ExternalPayloadError => "ExternalPayloadError",
            EbmsErrorCode::FailedAuthentication => "FailedAuthentication",
            EbmsErrorCode::FailedDecryption => "FailedDecryption",
            EbmsErrorCode::DecompressionFailure => "DecompressionFailure",
        }
    }

    /// Wire category for this code.
    pub fn category(&self) -> EbmsCategory {
        match self {
            EbmsErrorCode::ValueInconsistent
            | EbmsErrorCode::Other
            | EbmsErrorCode::ExternalPayloadError => EbmsCategory::Content,
            EbmsErrorCode::FailedAuthentication | EbmsErrorCode::FailedDecryption => {
                EbmsCategory::Processing
            }
            EbmsErrorCode::DecompressionFailure => EbmsCategory::Communication,
        }
    }

    /// Default severity. Every code in this vocabulary is fatal to the
    /// message; nothing here is ever downgraded to a warning.
    pub fn severity(&self) -> EbmsSeverity {
        EbmsSeverity::Failure
    }

    /// Reverse lookup from the wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "EBMS:0003" => Some(EbmsErrorCode::ValueInconsistent),
            "EBMS:0004" => Some(EbmsErrorCode::Other),
            "EBMS:0011" => Some(EbmsErrorCode::ExternalPayloadError),
            "EBMS:0101" => Some(EbmsErrorCode::FailedAuthentication),
            "EBMS:0102" => Some(EbmsErrorCode::FailedDecryption),
            "EBMS:0303" => Some(EbmsErrorCode::DecompressionFailure),
            _ => None,
        }
    }
}

impl std::fmt::Display for EbmsErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.short_description())
    }
}

/// A structured protocol error, carried inside an Error Signal Message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EbmsError {
    pub code: EbmsErrorCode,
    pub severity: EbmsSeverity,
    /// Message id of the message that triggered this error, when known.
    pub ref_to_message_in_error: Option<String>,
    /// Optional human-readable description. Never empty (enforced at
    /// construction; an empty description would serialize to invalid markup).
    pub description: Option<String>,
    /// Optional free-form diagnostic detail.
    pub detail: Option<String>,
}

impl EbmsError {
    /// Create an error with the code's default severity and no texts.
    pub fn new(code: EbmsErrorCode, ref_to_message_in_error: Option<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            ref_to_message_in_error,
            description: None,
            detail: None,
        }
    }

    /// Attach a description.
    ///
    /// # Errors
    ///
    /// Rejects an empty string: the wire form would be an empty
    /// `Description` element, which peers treat as invalid markup. This is
    /// caught here, at construction time, not at serialization time.
    pub fn with_description(mut self, text: impl Into<String>) -> Result<Self, ModelError> {
        let text = text.into();
        if text.is_empty() {
            return Err(ModelError::EmptyErrorDescription);
        }
        self.description = Some(text);
        Ok(self)
    }

    /// Attach diagnostic detail (underlying cause text, free-form).
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Render as an `eb:Error` element.
    pub fn to_element(&self) -> Element {
        let mut el = Element::new(ns::node::ERROR);
        el.prefix = Some(ns::prefix::EBMS.into());
        el.namespace = Some(ns::EBMS.into());
        el.attributes
            .insert(ns::attr::ERROR_CODE.into(), self.code.code().into());
        el.attributes
            .insert(ns::attr::SEVERITY.into(), self.severity.as_str().into());
        el.attributes.insert(
            ns::attr::SHORT_DESCRIPTION.into(),
            self.code.short_description().into(),
        );
        el.attributes.insert(
            ns::attr::CATEGORY.into(),
            self.code.category().as_str().into(),
        );
        if let Some(ref_id) = &self.ref_to_message_in_error {
            el.attributes
                .insert(ns::attr::REF_TO_MESSAGE_IN_ERROR.into(), ref_id.clone());
        }
        if let Some(description) = &self.description {
            let mut d = Element::new(ns::node::DESCRIPTION);
            d.prefix = Some(ns::prefix::EBMS.into());
            d.namespace = Some(ns::EBMS.into());
            d.attributes.insert(ns::attr::XML_LANG.into(), "en".into());
            d.children.push(XMLNode::Text(description.clone()));
            el.children.push(XMLNode::Element(d));
        }
        if let Some(detail) = &self.detail {
            let mut d = Element::new(ns::node::ERROR_DETAIL);
            d.prefix = Some(ns::prefix::EBMS.into());
            d.namespace = Some(ns::EBMS.into());
            d.children.push(XMLNode::Text(detail.clone()));
            el.children.push(XMLNode::Element(d));
        }
        el
    }
}

impl std::fmt::Display for EbmsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(d) = &self.detail {
            write!(f, ": {}", d)?;
        }
        Ok(())
    }
}
