//! Sending and receiving parties.

use crate::error::ModelError;
use serde::Serialize;

/// One identifier for a party, optionally qualified by an identifier scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyId {
    pub value: String,
    /// Identifier scheme URI (`type` attribute on the wire).
    pub scheme: Option<String>,
}

impl PartyId {
    pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
        Self::build(value.into(), None)
    }

    pub fn with_scheme(
        value: impl Into<String>,
        scheme: impl Into<String>,
    ) -> Result<Self, ModelError> {
        Self::build(value.into(), Some(scheme.into()))
    }

    fn build(value: String, scheme: Option<String>) -> Result<Self, ModelError> {
        if value.is_empty() {
            return Err(ModelError::EmptyField("party id"));
        }
        if let Some(s) = &scheme {
            if s.is_empty() {
                return Err(ModelError::EmptyField("party id scheme"));
            }
        }
        Ok(Self { value, scheme })
    }
}

/// A party: at least one identifier plus the role it plays in the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Party {
    pub ids: Vec<PartyId>,
    pub role: String,
}

impl Party {
    pub fn new(id: PartyId, role: impl Into<String>) -> Result<Self, ModelError> {
        let role = role.into();
        if role.is_empty() {
            return Err(ModelError::EmptyField("party role"));
        }
        Ok(Self {
            ids: vec![id],
            role,
        })
    }

    /// Add an additional identifier (parties may carry several, e.g. a GLN
    /// and a national registration number).
    pub fn with_id(mut self, id: PartyId) -> Self {
        self.ids.push(id);
        self
    }
}

/// The From/To pair of a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyInfo {
    pub from: Party,
    pub to: Party,
}

impl PartyInfo {
    pub fn new(from: Party, to: Party) -> Self {
        Self { from, to }
    }
}
