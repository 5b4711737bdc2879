use std::io::{self, Write};

use serde::Serialize;

use crate::pipeline::RunSummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout();
        Self::write_summary(&mut stdout, summary)
    }

    pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";

        writeln!(out, "{cyan}KIRA-FHIR summary{reset}")?;
        writeln!(out, "{green}Rows transformed: {}{reset}", summary.rows)?;
        writeln!(out, "{green}Distinct substances: {}{reset}", summary.substances)?;
        if summary.duplicates_suppressed > 0 {
            writeln!(
                out,
                "{yellow}Duplicates suppressed: {}{reset}",
                summary.duplicates_suppressed
            )?;
        }
        for ((resource_type, count), path) in summary.written.iter().zip(&summary.outputs) {
            writeln!(out, "{cyan}  {resource_type}: {count} -> {path}{reset}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn text_summary_lists_every_stream() {
        let summary = RunSummary {
            rows: 2,
            written: BTreeMap::from([("Observation".to_string(), 3), ("Specimen".to_string(), 2)]),
            duplicates_suppressed: 1,
            substances: 1,
            outputs: vec![
                "out/Observation.ndjson".to_string(),
                "out/Specimen.ndjson".to_string(),
            ],
            finished_at: "2026-01-01T00:00:00+00:00".to_string(),
        };
        let mut buffer = Vec::new();
        TextOutput::write_summary(&mut buffer, &summary).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Rows transformed: 2"));
        assert!(text.contains("Duplicates suppressed: 1"));
        assert!(text.contains("Observation: 3 -> out/Observation.ndjson"));
        assert!(text.contains("Specimen: 2 -> out/Specimen.ndjson"));
    }
}
