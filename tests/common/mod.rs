#![allow(dead_code)]

use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use tempfile::TempDir;

use kira_fhir_etl::specimen::SPECIMEN_ID_SYSTEM;

pub fn scratch() -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, dir)
}

pub fn annotation(name: &str, id: &str, ligand: &str, dose: Value, hours: Value) -> Value {
    json!({
        "specimenID": id,
        "specimenName": name,
        "cellLine": "MCF10A",
        "ligand": ligand,
        "ligandDose": dose,
        "ligandDoseUnit": "ng/mL",
        "secondLigand": "none",
        "secondLigandDose": 0,
        "secondLigandDoseUnit": "ng/mL",
        "experimentalTimePoint": hours,
        "RNAseqQCpass": true,
        "RNAseqLevel1": "NA",
        "RNAseqLevel2": "syn-level2",
        "RNAseqLevel3": "syn-level3",
    })
}

pub fn with_second_ligand(mut row: Value, ligand: &str, dose: Value) -> Value {
    row["secondLigand"] = json!(ligand);
    row["secondLigandDose"] = dose;
    row
}

pub fn without_fields(mut row: Value, prefix: &str) -> Value {
    if let Value::Object(fields) = &mut row {
        fields.retain(|name, _| !name.starts_with(prefix));
    }
    row
}

pub fn stub(id: &str) -> Value {
    json!({"identifier": [{"system": SPECIMEN_ID_SYSTEM, "value": id}]})
}

pub fn write_lines(dir: &Utf8Path, name: &str, records: &[Value]) -> Utf8PathBuf {
    let path = dir.join(name);
    fs::write(path.as_std_path(), render(records)).unwrap();
    path
}

pub fn write_gz_lines(dir: &Utf8Path, name: &str, records: &[Value]) -> Utf8PathBuf {
    let path = dir.join(name);
    let file = fs::File::create(path.as_std_path()).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(render(records).as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

fn render(records: &[Value]) -> String {
    records
        .iter()
        .map(|record| format!("{record}\n"))
        .collect()
}

pub fn read_records(path: &Utf8Path) -> Vec<Value> {
    fs::read_to_string(path.as_std_path())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
