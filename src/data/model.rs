use crate::ast::Value;
use crate::error::PayloadError;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;

/// The request data an execution routes on, e.g. an MPR's priority and budget.
///
/// A payload is a flat map of field names to values. It is owned by its
/// execution and never changes once the execution has started.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub fields: AHashMap<String, Value>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a payload from a JSON object such as `{"budget_amount": 85000}`.
    pub fn from_json_str(json: &str) -> Result<Self, PayloadError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| PayloadError::JsonParseError(e.to_string()))?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, PayloadError> {
        let object = value.as_object().ok_or(PayloadError::NotAnObject)?;
        let mut fields = AHashMap::with_capacity(object.len());
        for (key, raw) in object {
            let converted =
                Value::from_json(raw).ok_or_else(|| PayloadError::UnsupportedValue(key.clone()))?;
            fields.insert(key.clone(), converted);
        }
        Ok(Self { fields })
    }

    /// Load a payload from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, PayloadError> {
        let content = fs::read_to_string(path).map_err(|e| PayloadError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&content)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A JSON object with the fields in name order, for display and export.
    pub fn to_json(&self) -> serde_json::Value {
        let mut keys: Vec<_> = self.fields.keys().collect();
        keys.sort();
        let object = keys
            .into_iter()
            .map(|k| (k.clone(), self.fields[k].to_json()))
            .collect();
        serde_json::Value::Object(object)
    }

    /// A representative MPR used when no payload is supplied.
    pub fn sample_mpr() -> Self {
        Self::new()
            .with("position_title", "Senior Software Engineer")
            .with("department", "Engineering")
            .with("location", "Remote")
            .with("employment_type", "permanent")
            .with("hiring_reason", "growth")
            .with("priority", "normal")
            .with("budget_amount", 75000.0)
    }
}
