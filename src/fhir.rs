use std::fmt;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::error::EtlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ResourceType {
    Patient,
    ResearchStudy,
    ResearchSubject,
    Substance,
    Specimen,
    Observation,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Patient,
        ResourceType::ResearchStudy,
        ResourceType::ResearchSubject,
        ResourceType::Substance,
        ResourceType::Specimen,
        ResourceType::Observation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::ResearchStudy => "ResearchStudy",
            ResourceType::ResearchSubject => "ResearchSubject",
            ResourceType::Substance => "Substance",
            ResourceType::Specimen => "Specimen",
            ResourceType::Observation => "Observation",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.ndjson", self.as_str())
    }

    pub fn reference(&self, id: impl fmt::Display) -> Reference {
        Reference {
            reference: format!("{}/{id}", self.as_str()),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeableConcept {
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl From<Coding> for CodeableConcept {
    fn from(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Reference {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub system: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quantity {
    pub value: Number,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstanceInstance {
    pub quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Substance {
    pub resource_type: ResourceType,
    pub id: Uuid,
    pub category: Vec<CodeableConcept>,
    pub code: CodeableConcept,
    pub instance: Vec<SubstanceInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub resource_type: ResourceType,
    pub id: Uuid,
    pub status: String,
    pub category: Vec<CodeableConcept>,
    pub code: CodeableConcept,
    pub subject: Reference,
    pub specimen: Reference,
    pub value_integer: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub resource_type: ResourceType,
    pub id: Uuid,
    pub identifier: Vec<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchStudy {
    pub resource_type: ResourceType,
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub identifier: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSubject {
    pub resource_type: ResourceType,
    pub id: Uuid,
    pub status: String,
    pub study: Reference,
    pub individual: Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Specimen {
    pub id: String,
    pub document: Map<String, Value>,
}

impl Specimen {
    pub fn subject(&self) -> Option<&str> {
        self.document
            .get("subject")
            .and_then(|subject| subject.get("reference"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Patient(Patient),
    ResearchStudy(ResearchStudy),
    ResearchSubject(ResearchSubject),
    Substance(Substance),
    Specimen(Specimen),
    Observation(Observation),
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::Patient(_) => ResourceType::Patient,
            Resource::ResearchStudy(_) => ResourceType::ResearchStudy,
            Resource::ResearchSubject(_) => ResourceType::ResearchSubject,
            Resource::Substance(_) => ResourceType::Substance,
            Resource::Specimen(_) => ResourceType::Specimen,
            Resource::Observation(_) => ResourceType::Observation,
        }
    }

    pub fn id(&self) -> String {
        match self {
            Resource::Patient(patient) => patient.id.to_string(),
            Resource::ResearchStudy(study) => study.id.to_string(),
            Resource::ResearchSubject(subject) => subject.id.to_string(),
            Resource::Substance(substance) => substance.id.to_string(),
            Resource::Specimen(specimen) => specimen.id.clone(),
            Resource::Observation(observation) => observation.id.to_string(),
        }
    }

    pub fn reference(&self) -> Reference {
        self.resource_type().reference(self.id())
    }

    pub fn to_record(&self) -> Result<Value, EtlError> {
        let record = match self {
            Resource::Patient(patient) => serde_json::to_value(patient),
            Resource::ResearchStudy(study) => serde_json::to_value(study),
            Resource::ResearchSubject(subject) => serde_json::to_value(subject),
            Resource::Substance(substance) => serde_json::to_value(substance),
            Resource::Specimen(specimen) => Ok(Value::Object(specimen.document.clone())),
            Resource::Observation(observation) => serde_json::to_value(observation),
        };
        record.map_err(|err| EtlError::SchemaValidation {
            resource_type: self.resource_type().to_string(),
            id: self.id(),
            message: err.to_string(),
        })
    }
}
