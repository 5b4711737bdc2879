use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::coding::CodeMappingTable;
use crate::config::StudyConfig;
use crate::emitter::MultiplexedEmitter;
use crate::error::EtlError;
use crate::fhir::{Identifier, Patient, ResearchStudy, ResearchSubject, Resource, ResourceType};
use crate::identity::IdentityResolver;
use crate::input::{CorrelatedStreams, RecordPair};
use crate::observation::ObservationAggregator;
use crate::specimen::SpecimenEnricher;
use crate::substance::SubstanceDeduplicator;
use crate::validate::SchemaValidator;

pub const SYNAPSE_SYSTEM: &str = "https://www.synapse.org/";
const DEFAULT_STUDY_TITLE: &str = "LINCS MCF10A Molecular Deep Dive (MDD)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Reading,
    Row(usize),
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub rows: usize,
    pub written: BTreeMap<String, usize>,
    pub duplicates_suppressed: usize,
    pub substances: usize,
    pub outputs: Vec<String>,
    pub finished_at: String,
}

pub struct PipelineRun<V: SchemaValidator> {
    identities: IdentityResolver,
    substances: SubstanceDeduplicator,
    enricher: SpecimenEnricher,
    observations: ObservationAggregator,
    emitter: MultiplexedEmitter<V>,
    study: Option<StudyConfig>,
    state: RunState,
    rows: usize,
}

impl<V: SchemaValidator> PipelineRun<V> {
    pub fn new(identities: IdentityResolver, emitter: MultiplexedEmitter<V>) -> Self {
        let table = CodeMappingTable;
        Self {
            identities,
            substances: SubstanceDeduplicator::new(identities, table),
            enricher: SpecimenEnricher::new(identities),
            observations: ObservationAggregator::new(identities, table),
            emitter,
            study: None,
            state: RunState::Idle,
            rows: 0,
        }
    }

    pub fn with_study(mut self, study: Option<StudyConfig>) -> Self {
        self.study = study;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn execute(
        &mut self,
        annotations: &Utf8Path,
        specimens: &Utf8Path,
    ) -> Result<RunSummary, EtlError> {
        info!(%annotations, %specimens, output = %self.emitter.output_dir(), "starting transform");
        let result = CorrelatedStreams::open(annotations, specimens)
            .and_then(|streams| self.drive(streams));
        self.finish(result)
    }

    pub fn execute_streams(&mut self, streams: CorrelatedStreams) -> Result<RunSummary, EtlError> {
        let result = self.drive(streams);
        self.finish(result)
    }

    fn drive(&mut self, streams: CorrelatedStreams) -> Result<(), EtlError> {
        self.state = RunState::Reading;
        self.emitter.clear_outputs()?;
        if let Some(study) = self.study.clone() {
            self.emit(&Resource::ResearchStudy(self.research_study(&study)))?;
        }
        for pair in streams {
            let pair = pair?;
            self.state = RunState::Row(pair.line);
            let line = pair.line;
            self.process(pair)
                .map_err(|err| EtlError::at_row(line, err))?;
            self.rows += 1;
        }
        Ok(())
    }

    fn finish(&mut self, result: Result<(), EtlError>) -> Result<RunSummary, EtlError> {
        let closed = self.emitter.close_all();
        match result.and(closed) {
            Ok(()) => {
                self.state = RunState::Completed;
                let summary = self.summary();
                info!(
                    rows = summary.rows,
                    suppressed = summary.duplicates_suppressed,
                    "transform completed"
                );
                Ok(summary)
            }
            Err(err) => {
                error!(error = %err, "transform failed");
                self.state = RunState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    pub fn process(&mut self, pair: RecordPair) -> Result<(), EtlError> {
        let RecordPair { line, row, stub } = pair;
        let cell_line = row.cell_line()?;
        let specimen_name = row.specimen_name()?;
        debug!(line, specimen = %specimen_name, "processing row");

        let patient = self.patient(&cell_line, row.optional_text("sex"));
        let subject = patient.reference();
        let mut resources = vec![patient];
        if let Some(study) = &self.study {
            resources.push(Resource::ResearchSubject(
                self.research_subject(study, &cell_line),
            ));
        }

        let substances = self.substances.resolve_row(&row)?;
        let specimen = self.enricher.enrich(line, stub, &row, &substances)?;
        if specimen.subject() != Some(subject.reference.as_str()) {
            warn!(
                line,
                stub_subject = specimen.subject().unwrap_or("<none>"),
                derived = %subject.reference,
                "specimen subject differs from derived patient"
            );
        }
        let specimen_ref = ResourceType::Specimen.reference(&specimen.id);
        let observations = self
            .observations
            .aggregate(&row, &specimen_ref, &subject)?
            .collect::<Result<Vec<_>, _>>()?;

        resources.extend(
            substances
                .into_iter()
                .filter_map(|substance| substance.created)
                .map(Resource::Substance),
        );
        resources.push(Resource::Specimen(specimen));
        resources.extend(observations.into_iter().map(Resource::Observation));

        for resource in &resources {
            self.emit(resource)?;
        }
        Ok(())
    }

    fn emit(&mut self, resource: &Resource) -> Result<(), EtlError> {
        self.emitter.emit(resource).map(|_| ())
    }

    fn patient(&self, cell_line: &str, sex: Option<String>) -> Resource {
        Resource::Patient(Patient {
            resource_type: ResourceType::Patient,
            id: self.identities.patient(cell_line),
            identifier: vec![Identifier {
                system: SYNAPSE_SYSTEM.to_string(),
                value: cell_line.to_string(),
            }],
            gender: sex.map(|sex| administrative_gender(&sex).to_string()),
        })
    }

    fn research_study(&self, study: &StudyConfig) -> ResearchStudy {
        ResearchStudy {
            resource_type: ResourceType::ResearchStudy,
            id: self.identities.resolve(&study.project_id),
            title: study
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_STUDY_TITLE.to_string()),
            status: "completed".to_string(),
            identifier: vec![Identifier {
                system: SYNAPSE_SYSTEM.to_string(),
                value: study.project_id.clone(),
            }],
        }
    }

    fn research_subject(&self, study: &StudyConfig, cell_line: &str) -> ResearchSubject {
        ResearchSubject {
            resource_type: ResourceType::ResearchSubject,
            id: self.identities.research_subject(cell_line),
            status: "on-study".to_string(),
            study: ResourceType::ResearchStudy
                .reference(self.identities.resolve(&study.project_id)),
            individual: ResourceType::Patient.reference(self.identities.patient(cell_line)),
        }
    }

    pub fn summary(&self) -> RunSummary {
        let mut streams: Vec<_> = self.emitter.written().iter().collect();
        streams.sort_by_key(|(resource_type, _)| resource_type.as_str());
        RunSummary {
            rows: self.rows,
            written: streams
                .iter()
                .map(|(resource_type, count)| (resource_type.to_string(), **count))
                .collect(),
            duplicates_suppressed: self.emitter.suppressed(),
            substances: self.substances.len(),
            outputs: streams
                .iter()
                .map(|(resource_type, _)| self.emitter.path_for(**resource_type).to_string())
                .collect(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn administrative_gender(sex: &str) -> &'static str {
    match sex.trim().to_ascii_lowercase().as_str() {
        "female" | "f" => "female",
        "male" | "m" => "male",
        "other" => "other",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_is_normalized() {
        assert_eq!(administrative_gender("Female"), "female");
        assert_eq!(administrative_gender("M"), "male");
        assert_eq!(administrative_gender("NA"), "unknown");
    }
}
