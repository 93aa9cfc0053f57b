//! Business collaboration context: agreement, service, action, conversation.

use crate::error::ModelError;
use serde::Serialize;

/// Reference to the agreement (P-Mode umbrella) governing the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgreementRef {
    pub value: String,
    pub agreement_type: Option<String>,
    /// Named processing mode under the agreement, the wire `pmode` attribute.
    pub pmode: Option<String>,
}

impl AgreementRef {
    pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ModelError::EmptyField("agreement ref"));
        }
        Ok(Self {
            value,
            agreement_type: None,
            pmode: None,
        })
    }

    pub fn with_type(mut self, agreement_type: impl Into<String>) -> Self {
        self.agreement_type = Some(agreement_type.into());
        self
    }

    pub fn with_pmode(mut self, pmode: impl Into<String>) -> Self {
        self.pmode = Some(pmode.into());
        self
    }
}

/// The business service being addressed, optionally type-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub value: String,
    pub service_type: Option<String>,
}

impl Service {
    pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ModelError::EmptyField("service"));
        }
        Ok(Self {
            value,
            service_type: None,
        })
    }

    pub fn with_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }
}

/// Collaboration block of a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollaborationInfo {
    pub agreement: Option<AgreementRef>,
    pub service: Service,
    pub action: String,
    pub conversation_id: String,
}

impl CollaborationInfo {
    pub fn new(
        service: Service,
        action: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let action = action.into();
        if action.is_empty() {
            return Err(ModelError::EmptyField("action"));
        }
        let conversation_id = conversation_id.into();
        if conversation_id.is_empty() {
            return Err(ModelError::EmptyField("conversation id"));
        }
        Ok(Self {
            agreement: None,
            service,
            action,
            conversation_id,
        })
    }

    pub fn with_agreement(mut self, agreement: AgreementRef) -> Self {
        self.agreement = Some(agreement);
        self
    }
}
