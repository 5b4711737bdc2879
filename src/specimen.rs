use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::error::EtlError;
use crate::fhir::{Identifier, ResourceType, Specimen};
use crate::identity::IdentityResolver;
use crate::row::AnnotationRow;
use crate::substance::SubstanceRef;
use crate::timepoint;

pub const SPECIMEN_ID_SYSTEM: &str = "https://www.synapse.org/#specimenID";
pub const SPECIMEN_NAME_SYSTEM: &str = "https://www.synapse.org/#specimenName";

static FHIR_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-.]{1,64}$").expect("valid id regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct SpecimenEnricher {
    identities: IdentityResolver,
}

impl SpecimenEnricher {
    pub fn new(identities: IdentityResolver) -> Self {
        Self { identities }
    }

    pub fn enrich(
        &self,
        line: usize,
        mut stub: Map<String, Value>,
        row: &AnnotationRow,
        substances: &[SubstanceRef],
    ) -> Result<Specimen, EtlError> {
        let specimen_id = row.specimen_id()?;
        let specimen_name = row.specimen_name()?;
        check_binding(line, &stub, &specimen_id)?;

        let collected_at = timepoint::encode_value(row.get("experimentalTimePoint"))?;

        match stub.get("resourceType") {
            None => {
                stub.insert("resourceType".to_string(), json!(ResourceType::Specimen));
            }
            Some(Value::String(kind)) if kind == ResourceType::Specimen.as_str() => {}
            Some(other) => {
                return Err(invalid_stub(
                    &specimen_name,
                    format!("stub has resourceType {other}"),
                ));
            }
        }

        let id = match stub.get("id") {
            None => {
                let id = self.identities.specimen(&specimen_name).to_string();
                stub.insert("id".to_string(), Value::String(id.clone()));
                id
            }
            Some(Value::String(text)) if FHIR_ID.is_match(text) => text.clone(),
            Some(Value::String(text)) => {
                return Err(invalid_stub(
                    &specimen_name,
                    format!("stub id {text:?} is not a valid resource id"),
                ));
            }
            Some(other) => {
                return Err(invalid_stub(
                    &specimen_name,
                    format!("stub id {other} is not a string"),
                ));
            }
        };

        if !stub.contains_key("identifier") {
            let identifiers = vec![
                Identifier {
                    system: SPECIMEN_ID_SYSTEM.to_string(),
                    value: specimen_id,
                },
                Identifier {
                    system: SPECIMEN_NAME_SYSTEM.to_string(),
                    value: specimen_name.clone(),
                },
            ];
            stub.insert("identifier".to_string(), json!(identifiers));
        }

        if !stub.contains_key("subject") {
            let patient = self.identities.patient(&row.cell_line()?);
            stub.insert(
                "subject".to_string(),
                json!(ResourceType::Patient.reference(patient)),
            );
        }

        let mut step = Map::new();
        if !substances.is_empty() {
            let additive = substances
                .iter()
                .map(|substance| &substance.reference)
                .collect::<Vec<_>>();
            step.insert("additive".to_string(), json!(additive));
        }
        step.insert("timeDateTime".to_string(), Value::String(collected_at));

        match stub
            .entry("processing")
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(steps) => steps.push(Value::Object(step)),
            _ => {
                return Err(invalid_stub(
                    &specimen_name,
                    "stub processing is not a list".to_string(),
                ));
            }
        }

        Ok(Specimen { id, document: stub })
    }
}

// specimenID-system identifiers are authoritative when present.
fn check_binding(line: usize, stub: &Map<String, Value>, expected: &str) -> Result<(), EtlError> {
    let Some(identifiers) = stub.get("identifier").and_then(Value::as_array) else {
        return Ok(());
    };
    let pairs = identifiers
        .iter()
        .filter_map(|identifier| {
            let value = identifier.get("value")?.as_str()?;
            let system = identifier.get("system").and_then(Value::as_str);
            Some((system, value))
        })
        .collect::<Vec<_>>();
    let tagged = pairs
        .iter()
        .filter(|(system, _)| *system == Some(SPECIMEN_ID_SYSTEM))
        .map(|(_, value)| *value)
        .collect::<Vec<_>>();
    let candidates = if tagged.is_empty() {
        pairs.iter().map(|(_, value)| *value).collect::<Vec<_>>()
    } else {
        tagged
    };
    if candidates.is_empty() || candidates.contains(&expected) {
        return Ok(());
    }
    Err(EtlError::SpecimenMismatch {
        line,
        expected: expected.to_string(),
        found: candidates.join(","),
    })
}

fn invalid_stub(specimen_name: &str, message: String) -> EtlError {
    EtlError::SchemaValidation {
        resource_type: ResourceType::Specimen.to_string(),
        id: specimen_name.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use uuid::Uuid;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn row() -> AnnotationRow {
        AnnotationRow::new(object(json!({
            "specimenName": "EGF_24_C1_A",
            "specimenID": "mcf10a_1",
            "cellLine": "MCF10A",
            "experimentalTimePoint": "26",
        })))
    }

    fn substance(id: Uuid) -> SubstanceRef {
        SubstanceRef {
            id,
            reference: ResourceType::Substance.reference(id),
            created: None,
        }
    }

    #[test]
    fn fills_missing_fields_and_processing() {
        let enricher = SpecimenEnricher::default();
        let specimen = enricher
            .enrich(1, Map::new(), &row(), &[substance(Uuid::nil())])
            .unwrap();
        let doc = &specimen.document;
        assert_eq!(
            specimen.id,
            IdentityResolver::default().specimen("EGF_24_C1_A").to_string()
        );
        assert_eq!(doc["resourceType"], "Specimen");
        assert_eq!(doc["identifier"][0]["value"], "mcf10a_1");
        assert_eq!(
            doc["processing"][0]["timeDateTime"],
            "1970-01-02T00:00:00Z"
        );
        assert_eq!(
            doc["processing"][0]["additive"][0]["reference"],
            format!("Substance/{}", Uuid::nil())
        );
        let patient = IdentityResolver::default().patient("MCF10A");
        let expected = format!("Patient/{patient}");
        assert_eq!(specimen.subject(), Some(expected.as_str()));
    }

    #[test]
    fn upstream_fields_are_kept() {
        let id = Uuid::from_u128(0x5eed);
        let stub = object(json!({
            "id": id.to_string(),
            "subject": {"reference": "Patient/upstream"},
            "identifier": [{"system": SPECIMEN_ID_SYSTEM, "value": "mcf10a_1"}],
            "collection": {"bodySite": {"text": "breast"}},
        }));
        let specimen = SpecimenEnricher::default()
            .enrich(1, stub, &row(), &[])
            .unwrap();
        assert_eq!(specimen.id, id.to_string());
        assert_eq!(specimen.subject(), Some("Patient/upstream"));
        assert_eq!(specimen.document["identifier"].as_array().unwrap().len(), 1);
        assert_eq!(specimen.document["collection"]["bodySite"]["text"], "breast");
        assert!(specimen.document["processing"][0].get("additive").is_none());
    }

    #[test]
    fn mismatched_stub_is_rejected() {
        let stub = object(json!({
            "identifier": [{"system": SPECIMEN_ID_SYSTEM, "value": "mcf10a_2"}],
        }));
        let err = SpecimenEnricher::default()
            .enrich(7, stub, &row(), &[])
            .unwrap_err();
        assert_matches!(err, EtlError::SpecimenMismatch { line: 7, .. });
    }

    #[test]
    fn upstream_id_need_not_be_a_uuid() {
        let stub = object(json!({
            "id": "specimen-S1",
            "identifier": [{"system": SPECIMEN_ID_SYSTEM, "value": "mcf10a_1"}],
        }));
        let specimen = SpecimenEnricher::default()
            .enrich(1, stub, &row(), &[])
            .unwrap();
        assert_eq!(specimen.id, "specimen-S1");
        assert_eq!(specimen.document["id"], "specimen-S1");
    }

    #[test]
    fn malformed_upstream_id_is_rejected() {
        let stub = object(json!({"id": "has spaces/and slash"}));
        let err = SpecimenEnricher::default()
            .enrich(1, stub, &row(), &[])
            .unwrap_err();
        assert_matches!(err, EtlError::SchemaValidation { .. });
    }
}
