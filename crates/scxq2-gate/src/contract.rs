//! Shallow contract validation.
//!
//! A contract maps field names to rules:
//! - a type string (`"string"`, `"int?"`); a trailing `?` makes it optional
//! - an array, a literal enumeration, never required
//! - an object, a nested shape that must be present as an object
//!
//! Only presence is checked; type strings are descriptive.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::errors::GatewayError;

/// Rule for one contract field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRule {
    /// Must be present and non-null.
    Required(String),
    /// May be absent.
    Optional(String),
    /// Literal enumeration, not enforced.
    Enumeration(Vec<Value>),
    /// Must be present as an object; members are not inspected.
    Shape(Map<String, Value>),
}

impl FieldRule {
    fn parse(raw: &Value) -> Option<Self> {
        match raw {
            Value::String(ty) => Some(match ty.strip_suffix('?') {
                Some(base) => FieldRule::Optional(base.to_string()),
                None => FieldRule::Required(ty.clone()),
            }),
            Value::Array(values) => Some(FieldRule::Enumeration(values.clone())),
            Value::Object(shape) => Some(FieldRule::Shape(shape.clone())),
            _ => None,
        }
    }
}

/// Why a body failed its contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractViolation {
    /// Body is not a JSON object.
    #[error("request body must be JSON object")]
    NotAnObject,
    /// A required field is absent or null.
    #[error("missing field: {0}")]
    MissingField(String),
    /// A nested shape is present but not an object.
    #[error("field {0} must be an object")]
    NotAShape(String),
}

impl ContractViolation {
    /// Offending field, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            ContractViolation::NotAnObject => None,
            ContractViolation::MissingField(f) | ContractViolation::NotAShape(f) => Some(f),
        }
    }
}

/// Parsed contract, fields in name order.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    id: String,
    fields: Vec<(String, FieldRule)>,
}

impl Contract {
    /// Parses a contract descriptor.
    pub fn from_value(id: &str, descriptor: &Value) -> Result<Self, GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidContract {
            id: id.to_string(),
            reason,
        };
        let object = descriptor
            .as_object()
            .ok_or_else(|| invalid("descriptor must be an object".to_string()))?;
        let mut fields = Vec::with_capacity(object.len());
        for (name, raw) in object {
            let rule = FieldRule::parse(raw)
                .ok_or_else(|| invalid(format!("field {} has no usable rule", name)))?;
            fields.push((name.clone(), rule));
        }
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self {
            id: id.to_string(),
            fields,
        })
    }

    /// Contract id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Field rules in name order.
    pub fn fields(&self) -> &[(String, FieldRule)] {
        &self.fields
    }

    /// Checks a body. Extra fields always pass.
    pub fn validate(&self, body: &Value) -> Result<(), ContractViolation> {
        let object = body.as_object().ok_or(ContractViolation::NotAnObject)?;
        for (name, rule) in &self.fields {
            let value = object.get(name).filter(|v| !v.is_null());
            match rule {
                FieldRule::Optional(_) | FieldRule::Enumeration(_) => {}
                FieldRule::Required(_) => {
                    if value.is_none() {
                        return Err(ContractViolation::MissingField(name.clone()));
                    }
                }
                FieldRule::Shape(_) => match value {
                    None => return Err(ContractViolation::MissingField(name.clone())),
                    Some(v) if !v.is_object() => {
                        return Err(ContractViolation::NotAShape(name.clone()))
                    }
                    Some(_) => {}
                },
            }
        }
        Ok(())
    }
}
