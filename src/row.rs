use serde_json::{Map, Value};

use crate::error::EtlError;

pub const NOT_APPLICABLE: &str = "NA";

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRow {
    fields: Map<String, Value>,
}

impl AnnotationRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Result<String, EtlError> {
        self.optional_text(field)
            .ok_or_else(|| EtlError::MissingField(field.to_string()))
    }

    pub fn optional_text(&self, field: &str) -> Option<String> {
        self.fields.get(field).and_then(value_text)
    }

    pub fn specimen_name(&self) -> Result<String, EtlError> {
        self.text("specimenName")
    }

    pub fn specimen_id(&self) -> Result<String, EtlError> {
        self.text("specimenID")
    }

    pub fn cell_line(&self) -> Result<String, EtlError> {
        self.text("cellLine")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl From<Map<String, Value>> for AnnotationRow {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub fn is_not_applicable(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim() == NOT_APPLICABLE,
        _ => false,
    }
}
