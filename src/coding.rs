use crate::error::EtlError;
use crate::fhir::Coding;

const ENSEMBL_GENE: &str = "https://useast.ensembl.org/Homo_sapiens/Gene/";
const CHEMBL: &str = "https://www.ebi.ac.uk/chembl/g/#search_results/all/";
const EFO: &str = "http://www.ebi.ac.uk/efo/";
pub const MDD_ASSAY_SYSTEM: &str = "https://www.synapse.org/#assay";

pub const SUBSTANCE_CATEGORY_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/substance-category";
pub const OBSERVATION_CATEGORY_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/observation-category";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Ligand,
    Assay,
}

impl TermKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermKind::Ligand => "ligand",
            TermKind::Assay => "assay",
        }
    }
}

struct Entry {
    name: &'static str,
    system: &'static str,
    code: &'static str,
    display: &'static str,
}

#[rustfmt::skip]
const LIGANDS: &[Entry] = &[
    Entry { name: "BMP2", system: CHEMBL, code: "CHEMBL1926496", display: "Bone morphogenetic protein 2" },
    Entry { name: "EGF", system: ENSEMBL_GENE, code: "ENSG00000138798", display: "Epidermal growth factor" },
    Entry { name: "HGF", system: ENSEMBL_GENE, code: "ENSG00000019991", display: "Hepatocyte growth factor" },
    Entry { name: "IFNG", system: ENSEMBL_GENE, code: "ENSG00000111537", display: "Interferon gamma" },
    Entry { name: "OSM", system: ENSEMBL_GENE, code: "ENSG00000099985", display: "Oncostatin M" },
    Entry { name: "PBS", system: CHEMBL, code: "CHEMBL259100", display: "Phosphate-buffered saline" },
    Entry { name: "TGFB", system: CHEMBL, code: "CHEMBL1795178", display: "Transforming growth factor beta" },
];

#[rustfmt::skip]
const ASSAYS: &[Entry] = &[
    Entry { name: "RNAseq", system: EFO, code: "EFO_0008896", display: "RNA-seq" },
    Entry { name: "ATACseq", system: EFO, code: "EFO_0007045", display: "ATAC-seq" },
    Entry { name: "L1000", system: MDD_ASSAY_SYSTEM, code: "L1000", display: "L1000 transcriptional profiling" },
    Entry { name: "GCP", system: MDD_ASSAY_SYSTEM, code: "GCP", display: "Global chromatin profiling" },
    Entry { name: "RPPA", system: MDD_ASSAY_SYSTEM, code: "RPPA", display: "Reverse phase protein array" },
    Entry { name: "cycIF", system: MDD_ASSAY_SYSTEM, code: "cycIF", display: "Cyclic immunofluorescence" },
    Entry { name: "IF", system: MDD_ASSAY_SYSTEM, code: "IF", display: "Immunofluorescence" },
    Entry { name: "liveCellImaging", system: MDD_ASSAY_SYSTEM, code: "liveCellImaging", display: "Live cell imaging" },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeMappingTable;

impl CodeMappingTable {
    pub fn lookup(&self, name: &str) -> Result<Coding, EtlError> {
        self.ligand(name).or_else(|_| self.assay(name))
    }

    pub fn ligand(&self, name: &str) -> Result<Coding, EtlError> {
        find(LIGANDS, TermKind::Ligand, name)
    }

    pub fn assay(&self, name: &str) -> Result<Coding, EtlError> {
        find(ASSAYS, TermKind::Assay, name)
    }

    pub fn substance_category(&self) -> Coding {
        Coding {
            system: SUBSTANCE_CATEGORY_SYSTEM.to_string(),
            code: "chemical".to_string(),
            display: "Chemical".to_string(),
        }
    }

    pub fn laboratory_category(&self) -> Coding {
        Coding {
            system: OBSERVATION_CATEGORY_SYSTEM.to_string(),
            code: "laboratory".to_string(),
            display: "Laboratory".to_string(),
        }
    }
}

fn find(entries: &[Entry], kind: TermKind, name: &str) -> Result<Coding, EtlError> {
    entries
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| Coding {
            system: entry.system.to_string(),
            code: entry.code.to_string(),
            display: entry.display.to_string(),
        })
        .ok_or_else(|| EtlError::UnmappedVocabularyTerm {
            kind: kind.as_str(),
            term: name.to_string(),
        })
}
