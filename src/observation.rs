use std::sync::LazyLock;

use regex::Regex;

use crate::coding::CodeMappingTable;
use crate::error::EtlError;
use crate::fhir::{CodeableConcept, Observation, Reference, ResourceType};
use crate::identity::IdentityResolver;
use crate::row::{AnnotationRow, is_not_applicable};

static QC_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?<prefix>[A-Za-z0-9]+(?:_[A-Za-z0-9]+)?)QCpass$").expect("valid QC regex")
});

const LEVEL_MARKER: &str = "Level";
const QC_SUFFIX: &str = "QCpass";

// Raw sequencing byte counts carry identifiers the code table cannot resolve.
pub const EXCLUDED_FAMILIES: &[&str] = &["RawSeq"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssayCount {
    pub family: String,
    pub count: usize,
}

// `RNAseqQCpass` and `RNAseqLevel3QCpass` both name the `RNAseq` family.
fn qc_family(field: &str) -> Option<&str> {
    let prefix = QC_FIELD.captures(field)?.name("prefix")?.as_str();
    let family = prefix.split(LEVEL_MARKER).next().unwrap_or(prefix);
    (!family.is_empty()).then_some(family)
}

pub fn assay_counts(row: &AnnotationRow) -> Vec<AssayCount> {
    let mut families: Vec<String> = Vec::new();
    for family in row.fields().filter_map(|(name, _)| qc_family(name)) {
        if !EXCLUDED_FAMILIES.contains(&coding_key(family))
            && !families.iter().any(|known| known == family)
        {
            families.push(family.to_string());
        }
    }

    let mut counts: Vec<AssayCount> = Vec::new();
    for (name, value) in row.fields() {
        let Some(family) = owning_family(&families, name) else {
            continue;
        };
        let index = match counts.iter().position(|entry| entry.family == family) {
            Some(index) => index,
            None => {
                counts.push(AssayCount {
                    family: family.to_string(),
                    count: 0,
                });
                counts.len() - 1
            }
        };
        let subtype = &name[family.len()..];
        if subtype.contains(LEVEL_MARKER)
            && !subtype.ends_with(QC_SUFFIX)
            && !is_not_applicable(value)
        {
            counts[index].count += 1;
        }
    }
    counts
}

// Longest family prefix wins, so `cycIFLevel1` belongs to `cycIF`, not `IF`.
fn owning_family<'a>(families: &'a [String], field: &str) -> Option<&'a str> {
    families
        .iter()
        .filter(|family| field.starts_with(family.as_str()))
        .max_by_key(|family| family.len())
        .map(String::as_str)
}

pub fn coding_key(family: &str) -> &str {
    family
        .rsplit_once('_')
        .map(|(base, _)| base)
        .unwrap_or(family)
}

pub struct ObservationAggregator {
    identities: IdentityResolver,
    table: CodeMappingTable,
}

impl ObservationAggregator {
    pub fn new(identities: IdentityResolver, table: CodeMappingTable) -> Self {
        Self { identities, table }
    }

    pub fn aggregate<'a>(
        &'a self,
        row: &AnnotationRow,
        specimen: &'a Reference,
        subject: &'a Reference,
    ) -> Result<impl Iterator<Item = Result<Observation, EtlError>> + use<'a>, EtlError> {
        let specimen_name = row.specimen_name()?;
        let counts = assay_counts(row);
        let observations = counts.into_iter().map(
            move |AssayCount { family, count }| -> Result<Observation, EtlError> {
                let coding = self.table.assay(coding_key(&family))?;
                Ok(Observation {
                    resource_type: ResourceType::Observation,
                    id: self.identities.observation(&specimen_name, &family, count),
                    status: "final".to_string(),
                    category: vec![self.table.laboratory_category().into()],
                    code: CodeableConcept {
                        coding: vec![coding],
                        text: Some(family),
                    },
                    subject: subject.clone(),
                    specimen: specimen.clone(),
                    value_integer: count as u64,
                })
            },
        );
        Ok(observations)
    }
}
