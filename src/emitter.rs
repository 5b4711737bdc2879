use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::error::EtlError;
use crate::fhir::{Resource, ResourceType};
use crate::validate::SchemaValidator;

pub struct MultiplexedEmitter<V: SchemaValidator> {
    output_dir: Utf8PathBuf,
    validator: V,
    streams: BTreeMap<ResourceType, BufWriter<File>>,
    emitted: HashSet<(ResourceType, String)>,
    written: BTreeMap<ResourceType, usize>,
    suppressed: usize,
}

impl<V: SchemaValidator> MultiplexedEmitter<V> {
    pub fn new(output_dir: impl Into<Utf8PathBuf>, validator: V) -> Self {
        Self {
            output_dir: output_dir.into(),
            validator,
            streams: BTreeMap::new(),
            emitted: HashSet::new(),
            written: BTreeMap::new(),
            suppressed: 0,
        }
    }

    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    pub fn path_for(&self, resource_type: ResourceType) -> Utf8PathBuf {
        self.output_dir.join(resource_type.file_name())
    }

    pub fn clear_outputs(&self) -> Result<(), EtlError> {
        for resource_type in ResourceType::ALL {
            let path = self.path_for(resource_type);
            match fs::remove_file(path.as_std_path()) {
                Ok(()) => info!(path = %path, "removed previous output"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(EtlError::Filesystem(format!("remove {path}: {err}")));
                }
            }
        }
        Ok(())
    }

    pub fn emit(&mut self, resource: &Resource) -> Result<bool, EtlError> {
        let resource_type = resource.resource_type();
        let key = (resource_type, resource.id());
        if self.emitted.contains(&key) {
            self.suppressed += 1;
            return Ok(false);
        }

        let record = self
            .validator
            .validate(resource_type, resource.to_record()?)
            .map_err(|message| EtlError::SchemaValidation {
                resource_type: resource_type.to_string(),
                id: resource.id(),
                message,
            })?;

        let path = self.path_for(resource_type);
        let writer = match self.streams.entry(resource_type) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = File::create(path.as_std_path())
                    .map_err(|err| EtlError::Filesystem(format!("create {path}: {err}")))?;
                info!(path = %path, "opened output stream");
                entry.insert(BufWriter::new(file))
            }
        };
        serde_json::to_writer(&mut *writer, &record)
            .map_err(|err| EtlError::Filesystem(format!("write {path}: {err}")))?;
        writer
            .write_all(b"\n")
            .map_err(|err| EtlError::Filesystem(format!("write {path}: {err}")))?;

        self.emitted.insert(key);
        *self.written.entry(resource_type).or_default() += 1;
        Ok(true)
    }

    pub fn close_all(&mut self) -> Result<(), EtlError> {
        let mut first_error = None;
        while let Some((resource_type, mut writer)) = self.streams.pop_first() {
            if let Err(err) = writer.flush() {
                first_error.get_or_insert_with(|| {
                    EtlError::Filesystem(format!("flush {}: {err}", resource_type.file_name()))
                });
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn written(&self) -> &BTreeMap<ResourceType, usize> {
        &self.written
    }

    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn has_emitted(&self, resource_type: ResourceType, id: &str) -> bool {
        self.emitted.contains(&(resource_type, id.to_string()))
    }
}

impl<V: SchemaValidator> Drop for MultiplexedEmitter<V> {
    fn drop(&mut self) {
        let _ = self.close_all();
    }
}
