//! Name/value message properties.

use crate::error::ModelError;
use serde::Serialize;

/// One message- or part-level property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub name: String,
    /// Optional `type` attribute qualifying the name.
    pub property_type: Option<String>,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::EmptyField("property name"));
        }
        Ok(Self {
            name,
            property_type: None,
            value: value.into(),
        })
    }

    pub fn with_type(mut self, property_type: impl Into<String>) -> Self {
        self.property_type = Some(property_type.into());
        self
    }
}
