use std::collections::HashMap;

use serde_json::{Number, Value};
use tracing::debug;
use uuid::Uuid;

use crate::coding::CodeMappingTable;
use crate::error::EtlError;
use crate::fhir::{CodeableConcept, Quantity, Reference, ResourceType, Substance, SubstanceInstance};
use crate::identity::IdentityResolver;
use crate::row::{AnnotationRow, is_not_applicable, value_text};

const CONTROL: &str = "ctrl";
const NO_LIGAND: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LigandSlot {
    First,
    Second,
}

impl LigandSlot {
    pub const ALL: [LigandSlot; 2] = [LigandSlot::First, LigandSlot::Second];

    pub fn ligand_field(&self) -> &'static str {
        match self {
            LigandSlot::First => "ligand",
            LigandSlot::Second => "secondLigand",
        }
    }

    pub fn dose_field(&self) -> &'static str {
        match self {
            LigandSlot::First => "ligandDose",
            LigandSlot::Second => "secondLigandDose",
        }
    }

    pub fn unit_field(&self) -> &'static str {
        match self {
            LigandSlot::First => "ligandDoseUnit",
            LigandSlot::Second => "secondLigandDoseUnit",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dose {
    value: Number,
    text: String,
}

impl Dose {
    pub fn parse(field: &str, value: Option<&Value>) -> Result<Self, EtlError> {
        let raw = value.and_then(value_text).unwrap_or_default();
        let invalid = || EtlError::InvalidDose {
            field: field.to_string(),
            value: raw.clone(),
        };
        let amount = raw.trim().parse::<f64>().map_err(|_| invalid())?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(invalid());
        }
        if amount.fract() == 0.0 && amount < i64::MAX as f64 {
            let whole = amount as i64;
            return Ok(Self {
                value: Number::from(whole),
                text: whole.to_string(),
            });
        }
        let value = Number::from_f64(amount).ok_or_else(invalid)?;
        Ok(Self {
            value,
            text: amount.to_string(),
        })
    }

    pub fn is_zero(&self) -> bool {
        self.text == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> &Number {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubstanceRef {
    pub id: Uuid,
    pub reference: Reference,
    pub created: Option<Substance>,
}

pub struct SubstanceDeduplicator {
    identities: IdentityResolver,
    table: CodeMappingTable,
    registry: HashMap<String, Uuid>,
}

impl SubstanceDeduplicator {
    pub fn new(identities: IdentityResolver, table: CodeMappingTable) -> Self {
        Self {
            identities,
            table,
            registry: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn resolve_or_create(
        &mut self,
        ligand: &str,
        dose: &Dose,
        dose_unit: &str,
        specimen_scope: &str,
    ) -> Result<Option<SubstanceRef>, EtlError> {
        if is_sentinel(ligand, dose) {
            return Ok(None);
        }
        let key = format!("{ligand}-{}-{specimen_scope}", dose.as_str());
        if let Some(id) = self.registry.get(&key) {
            return Ok(Some(SubstanceRef {
                id: *id,
                reference: ResourceType::Substance.reference(*id),
                created: None,
            }));
        }

        let coding = self.table.ligand(ligand)?;
        let id = self.identities.resolve(&key);
        let substance = Substance {
            resource_type: ResourceType::Substance,
            id,
            category: vec![self.table.substance_category().into()],
            code: CodeableConcept {
                coding: vec![coding],
                text: Some(ligand.to_string()),
            },
            instance: vec![SubstanceInstance {
                quantity: Quantity {
                    value: dose.value().clone(),
                    unit: dose_unit.to_string(),
                },
            }],
        };
        debug!(%id, key = %key, "registered substance");
        self.registry.insert(key, id);
        Ok(Some(SubstanceRef {
            id,
            reference: ResourceType::Substance.reference(id),
            created: Some(substance),
        }))
    }

    pub fn resolve_row(&mut self, row: &AnnotationRow) -> Result<Vec<SubstanceRef>, EtlError> {
        let specimen_name = row.specimen_name()?;
        let mut refs = Vec::new();
        for slot in LigandSlot::ALL {
            let ligand = row.text(slot.ligand_field())?;
            if slot == LigandSlot::Second && ligand == NO_LIGAND {
                continue;
            }
            let dose = Dose::parse(slot.dose_field(), row.get(slot.dose_field()))?;
            if is_sentinel(&ligand, &dose) {
                continue;
            }
            let unit = dose_unit(row, slot)?;
            if let Some(resolved) = self.resolve_or_create(&ligand, &dose, &unit, &specimen_name)? {
                refs.push(resolved);
            }
        }
        Ok(refs)
    }
}

fn is_sentinel(ligand: &str, dose: &Dose) -> bool {
    (ligand == CONTROL || ligand == NO_LIGAND) && dose.is_zero()
}

fn dose_unit(row: &AnnotationRow, slot: LigandSlot) -> Result<String, EtlError> {
    let field = slot.unit_field();
    match row.get(field) {
        Some(value) if is_not_applicable(value) => Err(EtlError::MissingField(field.to_string())),
        _ => {
            let unit = row.text(field)?;
            if unit.trim().is_empty() {
                return Err(EtlError::MissingField(field.to_string()));
            }
            Ok(unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn dedup() -> SubstanceDeduplicator {
        SubstanceDeduplicator::new(IdentityResolver::default(), CodeMappingTable)
    }

    fn dose(value: Value) -> Dose {
        Dose::parse("ligandDose", Some(&value)).unwrap()
    }

    #[test]
    fn dose_text_is_canonical() {
        assert_eq!(dose(json!("100")).as_str(), "100");
        assert_eq!(dose(json!(100.0)).as_str(), "100");
        assert_eq!(dose(json!("0.5")).as_str(), "0.5");
        assert!(dose(json!(0)).is_zero());
    }

    #[test]
    fn invalid_dose() {
        assert_matches!(
            Dose::parse("ligandDose", Some(&json!("lots"))),
            Err(EtlError::InvalidDose { .. })
        );
        assert_matches!(
            Dose::parse("ligandDose", Some(&json!(-1))),
            Err(EtlError::InvalidDose { .. })
        );
    }

    #[test]
    fn second_occurrence_is_reused() {
        let mut dedup = dedup();
        let first = dedup
            .resolve_or_create("EGF", &dose(json!(100)), "ng/mL", "S1")
            .unwrap()
            .unwrap();
        let second = dedup
            .resolve_or_create("EGF", &dose(json!("100")), "ng/mL", "S1")
            .unwrap()
            .unwrap();
        assert!(first.created.is_some());
        assert!(second.created.is_none());
        assert_eq!(first.id, second.id);
        assert_eq!(first.id, IdentityResolver::default().resolve("EGF-100-S1"));
    }

    #[test]
    fn specimen_scope_separates_identities() {
        let mut dedup = dedup();
        let s1 = dedup
            .resolve_or_create("EGF", &dose(json!(100)), "ng/mL", "S1")
            .unwrap()
            .unwrap();
        let s2 = dedup
            .resolve_or_create("EGF", &dose(json!(100)), "ng/mL", "S2")
            .unwrap()
            .unwrap();
        assert_ne!(s1.id, s2.id);
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn sentinels_are_skipped() {
        let mut dedup = dedup();
        assert!(dedup
            .resolve_or_create("ctrl", &dose(json!(0)), "", "S1")
            .unwrap()
            .is_none());
        assert!(dedup
            .resolve_or_create("none", &dose(json!("0")), "", "S1")
            .unwrap()
            .is_none());
        assert!(dedup.is_empty());
    }

    #[test]
    fn unknown_ligand_is_fatal() {
        let err = dedup()
            .resolve_or_create("UNKNOWN", &dose(json!(1)), "ng/mL", "S1")
            .unwrap_err();
        assert_matches!(err, EtlError::UnmappedVocabularyTerm { .. });
    }

    #[test]
    fn row_with_no_second_ligand() {
        let row = match json!({
            "specimenName": "S1",
            "ligand": "OSM",
            "ligandDose": "30",
            "ligandDoseUnit": "ng/mL",
            "secondLigand": "none",
            "secondLigandDose": "NA",
            "secondLigandDoseUnit": "NA",
        }) {
            Value::Object(map) => AnnotationRow::new(map),
            _ => unreachable!(),
        };
        let refs = dedup().resolve_row(&row).unwrap();
        assert_eq!(refs.len(), 1);
        let substance = refs[0].created.as_ref().unwrap();
        assert_eq!(substance.instance[0].quantity.unit, "ng/mL");
        assert_eq!(substance.code.coding[0].code, "ENSG00000099985");
    }

    fn annotation(value: Value) -> AnnotationRow {
        match value {
            Value::Object(map) => AnnotationRow::new(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn dose_unit_is_required_for_a_real_ligand() {
        let missing = annotation(json!({
            "specimenName": "S1",
            "ligand": "EGF",
            "ligandDose": 100,
            "secondLigand": "none",
        }));
        assert_matches!(
            dedup().resolve_row(&missing),
            Err(EtlError::MissingField(field)) if field == "ligandDoseUnit"
        );

        let not_applicable = annotation(json!({
            "specimenName": "S1",
            "ligand": "EGF",
            "ligandDose": 100,
            "ligandDoseUnit": "NA",
            "secondLigand": "none",
        }));
        assert_matches!(
            dedup().resolve_row(&not_applicable),
            Err(EtlError::MissingField(field)) if field == "ligandDoseUnit"
        );
    }

    #[test]
    fn control_slot_needs_no_unit() {
        let row = annotation(json!({
            "specimenName": "S1",
            "ligand": "ctrl",
            "ligandDose": 0,
            "ligandDoseUnit": "NA",
            "secondLigand": "none",
        }));
        assert!(dedup().resolve_row(&row).unwrap().is_empty());
    }

    #[test]
    fn second_slot_gets_its_own_substance() {
        let row = annotation(json!({
            "specimenName": "S1",
            "ligand": "EGF",
            "ligandDose": 100,
            "ligandDoseUnit": "ng/mL",
            "secondLigand": "OSM",
            "secondLigandDose": 30,
            "secondLigandDoseUnit": "ng/mL",
        }));
        let mut dedup = dedup();
        let refs = dedup.resolve_row(&row).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].id, IdentityResolver::default().resolve("OSM-30-S1"));
        let again = dedup.resolve_row(&row).unwrap();
        assert!(again.iter().all(|substance| substance.created.is_none()));
        assert_eq!(dedup.len(), 2);
    }
}
