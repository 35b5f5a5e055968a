//! JSONL-backed extraction source.
//!
//! Each stream maps to a `.jsonl` file, or to a directory whose `.jsonl`
//! files become one partition each (`{"file": "<name>.jsonl"}`). For
//! incremental streams, rows at or below the starting bookmark value are
//! filtered out at read time so an unchanged source yields no records on
//! a re-run.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tap_core::{PartitionContext, Record, StreamDefinition};
use tap_state::compare_replication_values;

use crate::config::JsonlStreamConfig;
use crate::source::{RecordSource, RecordStream};

pub struct JsonlSource {
    definition: StreamDefinition,
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(definition: StreamDefinition, path: PathBuf) -> Self {
        JsonlSource { definition, path }
    }

    pub fn from_config(config: &JsonlStreamConfig) -> anyhow::Result<Self> {
        let definition = config
            .resolve_definition()
            .with_context(|| format!("Invalid configuration for stream '{}'", config.name))?;
        Ok(JsonlSource::new(definition, config.path.clone()))
    }

    fn partition_file(&self, partition: Option<&PartitionContext>) -> anyhow::Result<PathBuf> {
        let Some(context) = partition else {
            return Ok(self.path.clone());
        };
        let file = context
            .get("file")
            .and_then(Value::as_str)
            .with_context(|| format!("Partition context {context:?} has no 'file' key"))?;
        Ok(self.path.join(file))
    }
}

#[async_trait]
impl RecordSource for JsonlSource {
    fn definition(&self) -> &StreamDefinition {
        &self.definition
    }

    fn definition_mut(&mut self) -> &mut StreamDefinition {
        &mut self.definition
    }

    fn partitions(&self) -> Option<Vec<PartitionContext>> {
        if !self.path.is_dir() {
            return None;
        }
        match list_jsonl_files(&self.path) {
            Ok(files) => Some(
                files
                    .into_iter()
                    .map(|name| {
                        let mut context = PartitionContext::new();
                        context.insert("file".to_string(), Value::String(name));
                        context
                    })
                    .collect(),
            ),
            Err(err) => {
                tracing::warn!(
                    "Failed to list partition files under {:?}: {err}",
                    self.path
                );
                None
            }
        }
    }

    async fn records(
        &mut self,
        partition: Option<&PartitionContext>,
        starting_value: Option<&Value>,
    ) -> anyhow::Result<Box<dyn RecordStream>> {
        let path = self.partition_file(partition)?;
        let file =
            File::open(&path).with_context(|| format!("Failed to open JSONL file {path:?}"))?;
        tracing::debug!("Reading records for stream '{}' from {path:?}", self.definition.name);

        Ok(Box::new(JsonlRecordStream {
            lines: BufReader::new(file).lines(),
            path,
            line_number: 0,
            replication_key: self.definition.replication_key.clone(),
            is_timestamp: self.definition.is_timestamp_replication_key(),
            starting_value: starting_value.cloned(),
        }))
    }
}

struct JsonlRecordStream {
    lines: std::io::Lines<BufReader<File>>,
    path: PathBuf,
    line_number: u64,
    replication_key: Option<String>,
    is_timestamp: bool,
    starting_value: Option<Value>,
}

impl JsonlRecordStream {
    /// Whether a row is already covered by the starting bookmark value.
    fn already_durable(&self, record: &Record) -> anyhow::Result<bool> {
        let (Some(key), Some(starting)) = (&self.replication_key, &self.starting_value) else {
            return Ok(false);
        };
        let Some(value) = record.get(key) else {
            return Ok(false);
        };
        if value.is_null() {
            return Ok(false);
        }
        let ordering = compare_replication_values(value, starting, self.is_timestamp)
            .with_context(|| {
                format!(
                    "Failed to compare replication key '{key}' on line {} of {:?}",
                    self.line_number, self.path
                )
            })?;
        Ok(ordering != Ordering::Greater)
    }
}

#[async_trait]
impl RecordStream for JsonlRecordStream {
    async fn next(&mut self) -> Option<anyhow::Result<Record>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => {
                    return Some(Err(anyhow::Error::new(err).context(format!(
                        "Failed to read line from {:?}",
                        self.path
                    ))))
                }
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let record: Record = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(err) => {
                    return Some(Err(anyhow::Error::new(err).context(format!(
                        "Invalid JSON object on line {} of {:?}",
                        self.line_number, self.path
                    ))))
                }
            };

            match self.already_durable(&record) {
                Ok(true) => continue,
                Ok(false) => return Some(Ok(record)),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn list_jsonl_files(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".jsonl") {
            files.push(name);
        }
    }
    // Deterministic partition order.
    files.sort();
    Ok(files)
}
