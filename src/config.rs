use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::EtlError;
use crate::identity::{DEFAULT_NAMESPACE, IdentityResolver};

pub const DEFAULT_CONFIG_FILE: &str = "kira-fhir.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub annotations: Option<Utf8PathBuf>,
    #[serde(default)]
    pub specimens: Option<Utf8PathBuf>,
    #[serde(default)]
    pub output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub validate: Option<bool>,
    #[serde(default)]
    pub study: Option<StudyConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StudyConfig {
    pub project_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub namespace: Option<String>,
    pub annotations: Option<Utf8PathBuf>,
    pub specimens: Option<Utf8PathBuf>,
    pub output_dir: Option<Utf8PathBuf>,
    pub no_validate: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub identities: IdentityResolver,
    pub annotations: Utf8PathBuf,
    pub specimens: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub validate: bool,
    pub study: Option<StudyConfig>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, EtlError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| EtlError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| EtlError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, EtlError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let namespace = overrides
            .namespace
            .or(config.namespace)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let annotations = overrides
            .annotations
            .or(config.annotations)
            .ok_or(EtlError::MissingConfig)?;
        let specimens = overrides
            .specimens
            .or(config.specimens)
            .ok_or(EtlError::MissingConfig)?;
        let output_dir = overrides
            .output_dir
            .or(config.output_dir)
            .unwrap_or_else(default_output_dir);
        let validate = !overrides.no_validate && config.validate.unwrap_or(true);

        Ok(ResolvedConfig {
            schema_version,
            identities: IdentityResolver::from_dns_name(&namespace),
            annotations,
            specimens,
            output_dir,
            validate,
            study: config.study,
        })
    }
}

pub fn default_output_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("data/fhir")
}
