use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::Utf8Path;
use flate2::read::GzDecoder;
use serde_json::{Map, Value};

use crate::error::EtlError;
use crate::row::AnnotationRow;

pub const ANNOTATION_STREAM: &str = "annotation";
pub const SPECIMEN_STREAM: &str = "specimen";

pub struct JsonLines {
    stream: &'static str,
    reader: Box<dyn BufRead>,
}

impl JsonLines {
    pub fn open(stream: &'static str, path: &Utf8Path) -> Result<Self, EtlError> {
        let file = File::open(path.as_std_path())
            .map_err(|err| EtlError::InputOpen {
                stream,
                path: path.to_string(),
                message: err.to_string(),
            })?;
        let reader: Box<dyn BufRead> = if path.as_str().ends_with(".gz") {
            Box::new(BufReader::new(GzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self { stream, reader })
    }

    pub fn from_reader(stream: &'static str, reader: impl BufRead + 'static) -> Self {
        Self {
            stream,
            reader: Box::new(reader),
        }
    }

    fn next_line(&mut self) -> Result<Option<String>, EtlError> {
        let mut buf = String::new();
        let read = self
            .reader
            .read_line(&mut buf)
            .map_err(|err| EtlError::Filesystem(format!("read {} stream: {err}", self.stream)))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(buf))
    }
}

pub fn parse_object(
    stream: &'static str,
    line: usize,
    text: &str,
) -> Result<Map<String, Value>, EtlError> {
    let invalid = |message: String| EtlError::InvalidRecord {
        stream,
        line,
        message,
    };
    match serde_json::from_str::<Value>(text).map_err(|err| invalid(err.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(invalid(format!("expected a JSON object, found {other}"))),
    }
}

#[derive(Debug, Clone)]
pub struct RecordPair {
    pub line: usize,
    pub row: AnnotationRow,
    pub stub: Map<String, Value>,
}

pub struct CorrelatedStreams {
    annotations: JsonLines,
    specimens: JsonLines,
    line: usize,
    finished: bool,
}

impl CorrelatedStreams {
    pub fn new(annotations: JsonLines, specimens: JsonLines) -> Self {
        Self {
            annotations,
            specimens,
            line: 0,
            finished: false,
        }
    }

    pub fn open(annotations: &Utf8Path, specimens: &Utf8Path) -> Result<Self, EtlError> {
        Ok(Self::new(
            JsonLines::open(ANNOTATION_STREAM, annotations)?,
            JsonLines::open(SPECIMEN_STREAM, specimens)?,
        ))
    }

    fn next_pair(&mut self) -> Result<Option<RecordPair>, EtlError> {
        loop {
            self.line += 1;
            let annotation = self.annotations.next_line()?;
            let specimen = self.specimens.next_line()?;
            let (annotation, specimen) = match (annotation, specimen) {
                (None, None) => return Ok(None),
                (Some(text), None) | (None, Some(text)) if text.trim().is_empty() => continue,
                (Some(_), None) => return Err(self.misaligned("specimen stream ended first")),
                (None, Some(_)) => return Err(self.misaligned("annotation stream ended first")),
                (Some(annotation), Some(specimen)) => (annotation, specimen),
            };
            match (annotation.trim().is_empty(), specimen.trim().is_empty()) {
                (true, true) => continue,
                (true, false) => return Err(self.misaligned("blank annotation line opposite a specimen")),
                (false, true) => return Err(self.misaligned("blank specimen line opposite an annotation")),
                (false, false) => {}
            }
            let row = parse_object(ANNOTATION_STREAM, self.line, &annotation)?;
            let stub = parse_object(SPECIMEN_STREAM, self.line, &specimen)?;
            return Ok(Some(RecordPair {
                line: self.line,
                row: row.into(),
                stub,
            }));
        }
    }

    fn misaligned(&self, reason: &str) -> EtlError {
        EtlError::MisalignedStreams {
            line: self.line,
            reason: reason.to_string(),
        }
    }
}

impl Iterator for CorrelatedStreams {
    type Item = Result<RecordPair, EtlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let next = self.next_pair();
        if !matches!(next, Ok(Some(_))) {
            self.finished = true;
        }
        next.transpose()
    }
}
