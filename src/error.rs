use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum EtlError {
    #[error("no {kind} coding for term: {term}")]
    #[diagnostic(help("add the term to the code mapping table before re-running"))]
    UnmappedVocabularyTerm { kind: &'static str, term: String },

    #[error("input streams are misaligned at line {line}: {reason}")]
    MisalignedStreams { line: usize, reason: String },

    #[error("specimen stub at line {line} does not match annotation specimenID {expected} (found {found})")]
    SpecimenMismatch {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("invalid experimental time point: {0}")]
    InvalidTimepoint(String),

    #[error("invalid dose in {field}: {value}")]
    InvalidDose { field: String, value: String },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid record in {stream} stream at line {line}: {message}")]
    InvalidRecord {
        stream: &'static str,
        line: usize,
        message: String,
    },

    #[error("{resource_type}/{id} failed schema validation: {message}")]
    SchemaValidation {
        resource_type: String,
        id: String,
        message: String,
    },

    #[error("cannot open {stream} input {path}: {message}")]
    InputOpen {
        stream: &'static str,
        path: String,
        message: String,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("missing config file kira-fhir.json and no input paths given")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("row {line}: {source}")]
    Row {
        line: usize,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    pub fn at_row(line: usize, source: EtlError) -> Self {
        match source {
            EtlError::Row { .. } => source,
            other => EtlError::Row {
                line,
                source: Box::new(other),
            },
        }
    }

    pub fn root(&self) -> &EtlError {
        match self {
            EtlError::Row { source, .. } => source.root(),
            other => other,
        }
    }
}
