use serde_json::{Map, Value};

use crate::fhir::ResourceType;

pub trait SchemaValidator {
    fn validate(&self, resource_type: ResourceType, record: Value) -> Result<Value, String>;
}

impl<T: SchemaValidator + ?Sized> SchemaValidator for &T {
    fn validate(&self, resource_type: ResourceType, record: Value) -> Result<Value, String> {
        (**self).validate(resource_type, record)
    }
}

impl<T: SchemaValidator + ?Sized> SchemaValidator for Box<T> {
    fn validate(&self, resource_type: ResourceType, record: Value) -> Result<Value, String> {
        (**self).validate(resource_type, record)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl SchemaValidator for PassThrough {
    fn validate(&self, _resource_type: ResourceType, record: Value) -> Result<Value, String> {
        Ok(record)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConventionValidator;

impl SchemaValidator for ConventionValidator {
    fn validate(&self, resource_type: ResourceType, record: Value) -> Result<Value, String> {
        let Value::Object(object) = &record else {
            return Err("record is not a JSON object".to_string());
        };
        match object.get("resourceType").and_then(Value::as_str) {
            Some(kind) if kind == resource_type.as_str() => {}
            Some(kind) => return Err(format!("resourceType {kind} does not match {resource_type}")),
            None => return Err("missing resourceType".to_string()),
        }
        if !object
            .get("id")
            .and_then(Value::as_str)
            .is_some_and(|id| !id.is_empty())
        {
            return Err("missing id".to_string());
        }
        check_object(object, "")?;
        Ok(record)
    }
}

fn check_value(value: &Value, path: &str) -> Result<(), String> {
    match value {
        Value::Object(object) => check_object(object, path),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(index, item)| check_value(item, &format!("{path}[{index}]"))),
        _ => Ok(()),
    }
}

fn check_object(object: &Map<String, Value>, path: &str) -> Result<(), String> {
    for (key, value) in object {
        let child = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        match key.as_str() {
            "coding" => {
                for (index, coding) in as_list(value).iter().enumerate() {
                    require(coding, &["system", "code", "display"], &format!("{child}[{index}]"))?;
                }
            }
            "identifier" => {
                for (index, identifier) in as_list(value).iter().enumerate() {
                    require(identifier, &["system", "value"], &format!("{child}[{index}]"))?;
                }
            }
            "reference" => {
                let well_formed = value
                    .as_str()
                    .and_then(|reference| reference.split_once('/'))
                    .is_some_and(|(kind, id)| !kind.is_empty() && !id.is_empty());
                if !well_formed {
                    return Err(format!("{child} is not a Type/id reference: {value}"));
                }
            }
            _ => {}
        }
        check_value(value, &child)?;
    }
    Ok(())
}

fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn require(value: &Value, fields: &[&str], path: &str) -> Result<(), String> {
    for field in fields {
        let present = value
            .get(field)
            .is_some_and(|inner| !inner.is_null() && inner.as_str() != Some(""));
        if !present {
            return Err(format!("{path} is missing {field}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_complete_record() {
        let record = json!({
            "resourceType": "Substance",
            "id": "abc",
            "code": {"coding": [{"system": "s", "code": "c", "display": "d"}]},
            "identifier": [{"system": "s", "value": "v"}],
            "subject": {"reference": "Patient/1"},
        });
        assert!(ConventionValidator
            .validate(ResourceType::Substance, record)
            .is_ok());
    }

    #[test]
    fn rejects_coding_without_display() {
        let record = json!({
            "resourceType": "Substance",
            "id": "abc",
            "category": [{"coding": [{"system": "s", "code": "c"}]}],
        });
        let err = ConventionValidator
            .validate(ResourceType::Substance, record)
            .unwrap_err();
        assert!(err.contains("category[0].coding[0] is missing display"), "{err}");
    }

    #[test]
    fn rejects_wrong_type_and_bad_reference() {
        let record = json!({"resourceType": "Patient", "id": "abc"});
        assert!(ConventionValidator
            .validate(ResourceType::Substance, record)
            .is_err());

        let record = json!({
            "resourceType": "Specimen",
            "id": "abc",
            "processing": [{"additive": [{"reference": "dangling"}]}],
        });
        assert!(ConventionValidator
            .validate(ResourceType::Specimen, record)
            .is_err());
    }
}
