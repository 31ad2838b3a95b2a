//! Full refresh of every registered source
//!
//! A run re-copies each external source from its origin into the local
//! source store, regenerates the built-in datasets and rewrites every
//! cached artifact. Progress is reported through [`ProgressEvent`]s; per
//! source failures are collected and never abort the run.
//!
//! The pipeline does not serialize itself. Callers must not start a
//! second run against the same store while one is in flight.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use graphit_core::ProgressEvent;

use crate::catalog::CacheCatalog;
use crate::config::DataConfig;
use crate::ingest::{GeneratorId, SourceIngestor};
use crate::registry::{RegistryDocument, SourceRegistry};
use crate::{DataError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    CompletedWithFailures,
}

/// Outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Artifacts rewritten during the run
    pub refreshed: Vec<String>,
    /// Sources whose origin could not be copied
    pub invalid: Vec<String>,
    /// Sources whose content could not be cached
    pub failed: Vec<String>,
}

impl UpdateReport {
    pub fn has_failures(&self) -> bool {
        !self.invalid.is_empty() || !self.failed.is_empty()
    }
}

/// Everything a run needs, consumed by [`UpdatePipeline::run`]
pub struct UpdatePipeline {
    registry: Arc<SourceRegistry>,
    ingestor: SourceIngestor,
    catalog: CacheCatalog,
    sources_dir: PathBuf,
    probe_bytes: usize,
}

impl UpdatePipeline {
    pub fn new(registry: Arc<SourceRegistry>, catalog: CacheCatalog, config: &DataConfig) -> Self {
        Self {
            registry,
            ingestor: SourceIngestor::new(config.nulls.clone()),
            catalog,
            sources_dir: config.paths().sources,
            probe_bytes: config.encoding_probe_bytes,
        }
    }

    /// Start the run; work happens as the returned iterator is consumed
    pub fn run(self) -> UpdateRun {
        UpdateRun {
            pipeline: self,
            step: Step::Start,
            pending: VecDeque::new(),
            copied: Vec::new(),
            claimed: HashSet::new(),
            report: UpdateReport::default(),
            state: PipelineState::Idle,
        }
    }

    /// Copy every external source from its origin; returns the copied
    /// names with their recorded encodings, plus the names that failed
    fn copy_sources(&self) -> (Vec<(String, Option<String>)>, Vec<String>) {
        let document = match self.registry.load() {
            Ok(document) => document,
            Err(err) => {
                tracing::error!("Failed to read source registry: {}", err);
                RegistryDocument::default()
            }
        };

        let mut names: BTreeSet<String> = document.sources.keys().cloned().collect();
        match std::fs::read_dir(&self.sources_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if entry.path().is_file() {
                        names.insert(entry.file_name().to_string_lossy().into_owned());
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!("Failed to list {}: {}", self.sources_dir.display(), err),
        }

        let mut copied = Vec::new();
        let mut invalid = Vec::new();
        for name in names {
            let Some(record) = document.sources.get(&name) else {
                tracing::warn!("Local source {} is not registered", name);
                invalid.push(name);
                continue;
            };
            let local = self.sources_dir.join(&name);
            match copy_from_origin(&name, &record.origin, &local) {
                Ok(()) => copied.push((name, record.encoding.clone())),
                Err(err) => {
                    tracing::warn!("{}", err);
                    invalid.push(name);
                }
            }
        }
        (copied, invalid)
    }

    fn refresh_generator(&self, id: GeneratorId) -> Result<()> {
        let table = self
            .ingestor
            .ingest_internal(id)
            .map_err(|failure| DataError::Unparsable {
                name: failure.name,
                reason: failure.reason,
            })?;
        self.catalog.save(id.name(), &table)
    }

    /// Ingest a copied source and cache it; returns the artifact name
    fn refresh_external(&self, name: &str, encoding: Option<String>) -> Result<String> {
        let local = self.sources_dir.join(name);

        let encoding = match encoding {
            Some(encoding) => Some(encoding),
            None => {
                let detected = self.ingestor.detect_encoding(&local, self.probe_bytes)?;
                if let Some(label) = &detected {
                    self.registry.set_encoding(name, label)?;
                }
                detected
            }
        };

        let table = self
            .ingestor
            .ingest_external(&local, encoding.as_deref())
            .map_err(|failure| DataError::Unparsable {
                name: name.to_string(),
                reason: failure.reason,
            })?;
        let artifact = CacheCatalog::artifact_name(name);
        self.catalog.save(&artifact, &table)?;
        Ok(artifact)
    }
}

fn copy_from_origin(name: &str, origin: &Path, local: &Path) -> Result<()> {
    let unreachable = || DataError::OriginUnreachable {
        name: name.to_string(),
        path: origin.to_path_buf(),
    };
    if !origin.is_file() {
        return Err(unreachable());
    }
    // Sources registered from inside the store are already in place
    if origin.canonicalize().ok() == local.canonicalize().ok() && local.exists() {
        return Ok(());
    }
    if let Some(parent) = local.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(origin, local).map_err(|_| unreachable())?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Start,
    Copy,
    Generator(usize),
    External(usize),
    Finish,
    Exhausted,
}

/// A run in progress; yields progress events until [`ProgressEvent::Done`]
pub struct UpdateRun {
    pipeline: UpdatePipeline,
    step: Step,
    pending: VecDeque<ProgressEvent>,
    copied: Vec<(String, Option<String>)>,
    /// Artifact names already written by this run
    claimed: HashSet<String>,
    report: UpdateReport,
    state: PipelineState,
}

impl UpdateRun {
    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn report(&self) -> &UpdateReport {
        &self.report
    }

    /// Drain the remaining events and return the report
    pub fn finish(mut self) -> UpdateReport {
        for _ in self.by_ref() {}
        self.report
    }

    fn advance(&mut self) {
        match self.step {
            Step::Start => {
                self.state = PipelineState::Running;
                tracing::info!("Source update started");
                self.pending.push_back(ProgressEvent::Advance(1));
                self.step = Step::Copy;
            }
            Step::Copy => {
                let (copied, invalid) = self.pipeline.copy_sources();
                self.copied = copied;
                if !invalid.is_empty() {
                    self.pending.push_back(ProgressEvent::Invalid(invalid.clone()));
                    self.report.invalid = invalid;
                }
                self.step = Step::Generator(0);
            }
            Step::Generator(idx) => match GeneratorId::ALL.get(idx) {
                Some(&id) => {
                    self.pending.push_back(ProgressEvent::Advance(1));
                    self.claimed.insert(id.name().to_string());
                    match self.pipeline.refresh_generator(id) {
                        Ok(()) => self.report.refreshed.push(id.name().to_string()),
                        Err(err) => {
                            tracing::warn!("Generator {} failed: {}", id, err);
                            self.report.failed.push(id.name().to_string());
                        }
                    }
                    self.step = Step::Generator(idx + 1);
                }
                None => self.step = Step::External(0),
            },
            Step::External(idx) => match self.copied.get(idx).cloned() {
                Some((name, encoding)) => {
                    self.pending.push_back(ProgressEvent::Advance(1));
                    let artifact = CacheCatalog::artifact_name(&name);
                    // The first source to reach an artifact name owns it
                    if !self.claimed.insert(artifact.clone()) {
                        tracing::warn!(
                            "Source {} maps to artifact {} already written by this run",
                            name,
                            artifact
                        );
                        self.report.failed.push(name);
                    } else {
                        match self.pipeline.refresh_external(&name, encoding) {
                            Ok(artifact) => self.report.refreshed.push(artifact),
                            Err(err) => {
                                tracing::warn!("Source {} failed: {}", name, err);
                                self.report.failed.push(name);
                            }
                        }
                    }
                    self.step = Step::External(idx + 1);
                }
                None => self.step = Step::Finish,
            },
            Step::Finish => {
                if !self.report.failed.is_empty() {
                    self.pending.push_back(ProgressEvent::Failed(self.report.failed.clone()));
                }
                self.pending.push_back(ProgressEvent::Advance(1));
                self.pending.push_back(ProgressEvent::Done);
                self.state = if self.report.has_failures() {
                    PipelineState::CompletedWithFailures
                } else {
                    PipelineState::Completed
                };
                tracing::info!(
                    "Source update finished: {} refreshed, {} invalid, {} failed",
                    self.report.refreshed.len(),
                    self.report.invalid.len(),
                    self.report.failed.len()
                );
                self.step = Step::Exhausted;
            }
            Step::Exhausted => {}
        }
    }
}

impl Iterator for UpdateRun {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.step == Step::Exhausted {
                return None;
            }
            self.advance();
        }
    }
}
