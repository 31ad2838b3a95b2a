//! Owner of one data store
//!
//! A [`Session`] ties together the registry, the cache, plot maps and the
//! background work that mutates them. At most one update runs at a time;
//! imports of newly added sources (copy plus encoding probe) run
//! independently and may still commit after the session has been shut
//! down.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use graphit_core::{Prefix, ProgressEvent};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::catalog::CacheCatalog;
use crate::config::{DataConfig, StorePaths};
use crate::ingest::{GeneratorId, SourceFormat, SourceIngestor, SourceKind};
use crate::pipeline::{UpdatePipeline, UpdateReport};
use crate::plot_store::PlotMapStore;
use crate::registry::{SourceRecord, SourceRegistry};
use crate::{DataError, Result};

/// Events buffered between the update worker and its consumer
const PROGRESS_BUFFER: usize = 4;

/// Clears the in-flight flag when the update worker ends, even by panic
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A running update
pub struct UpdateHandle {
    events: mpsc::Receiver<ProgressEvent>,
    task: JoinHandle<UpdateReport>,
}

impl UpdateHandle {
    /// Next progress event; `None` once the run has ended
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Wait for the run to end, discarding unread events
    pub async fn finish(mut self) -> Result<UpdateReport> {
        while self.events.recv().await.is_some() {}
        Ok(self.task.await?)
    }
}

pub struct Session {
    config: DataConfig,
    paths: StorePaths,
    registry: Arc<SourceRegistry>,
    catalog: CacheCatalog,
    plots: PlotMapStore,
    ingestor: SourceIngestor,
    runtime: Handle,
    updating: Arc<AtomicBool>,
    imports: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Open the store described by `config`, creating its layout
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: DataConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|err| DataError::NoRuntime(err.to_string()))?;
        let paths = config.paths();
        paths.create_all()?;
        let registry = Arc::new(SourceRegistry::open(&paths.registry)?);
        let catalog = CacheCatalog::from_config(&config)?;
        let plots = PlotMapStore::new(&paths.plots);
        let ingestor = SourceIngestor::new(config.nulls.clone());
        tracing::info!("Opened data store at {}", paths.root.display());

        Ok(Self {
            config,
            paths,
            registry,
            catalog,
            plots,
            ingestor,
            runtime,
            updating: Arc::new(AtomicBool::new(false)),
            imports: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &CacheCatalog {
        &self.catalog
    }

    pub fn plots(&self) -> &PlotMapStore {
        &self.plots
    }

    /// Built-in generators followed by registered sources
    pub fn sources(&self) -> Result<Vec<(String, SourceKind)>> {
        let mut sources: Vec<(String, SourceKind)> = GeneratorId::ALL
            .iter()
            .map(|&id| (id.name().to_string(), SourceKind::Internal(id)))
            .collect();
        for entry in self.registry.entries()? {
            let kind = entry.kind();
            sources.push((entry.name, kind));
        }
        Ok(sources)
    }

    /// Register the file at `path`, optionally tagged with a classification prefix
    ///
    /// The source is registered under its (prefixed) name right away.
    /// Copying it into the store and probing its text encoding happen on
    /// a blocking worker; [`Session::settle`] waits for them. Fails with
    /// [`DataError::ArtifactConflict`] when the name would cache to the
    /// same artifact as a generator or another registered source.
    pub fn add_source(&self, path: &Path, prefix: Prefix) -> Result<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DataError::NotFound(path.display().to_string()))?;
        let format = SourceFormat::from_path(path).ok_or_else(|| DataError::Unparsable {
            name: file_name.clone(),
            reason: "unsupported file type".to_string(),
        })?;
        if !path.is_file() {
            return Err(DataError::OriginUnreachable {
                name: file_name,
                path: path.to_path_buf(),
            });
        }

        let name = prefix.apply(&file_name)?;
        let artifact = CacheCatalog::artifact_name(&name);
        if let Some(id) = GeneratorId::ALL.iter().find(|id| id.name() == artifact) {
            return Err(DataError::ArtifactConflict {
                name,
                artifact,
                owner: id.name().to_string(),
            });
        }

        let origin = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let source_dir = origin.parent().map(|dir| dir.to_string_lossy().into_owned());
        let conflict = self.registry.commit(|doc| {
            let owner = doc
                .sources
                .keys()
                .find(|other| *other != &name && CacheCatalog::artifact_name(other) == artifact);
            if let Some(owner) = owner {
                return Some(owner.clone());
            }
            doc.sources.entry(name.clone()).or_insert_with(|| SourceRecord {
                origin: origin.clone(),
                encoding: None,
            });
            if let Some(dir) = source_dir {
                doc.source_dir = dir;
            }
            None
        })?;
        if let Some(owner) = conflict {
            return Err(DataError::ArtifactConflict { name, artifact, owner });
        }
        tracing::info!("Registered source {} from {}", name, origin.display());

        let local = self.paths.sources.join(&name);
        self.spawn_import(name.clone(), origin, local, format.is_text());
        Ok(name)
    }

    /// Copy a new source into the store, then record its encoding
    fn spawn_import(&self, name: String, origin: PathBuf, local: PathBuf, probe: bool) {
        let registry = Arc::clone(&self.registry);
        let ingestor = self.ingestor.clone();
        let threshold = self.config.encoding_probe_bytes;

        let task = self.runtime.spawn_blocking(move || {
            if local.canonicalize().ok().as_ref() != Some(&origin) {
                if let Err(err) = std::fs::copy(&origin, &local) {
                    tracing::warn!("Could not copy {} into the store: {}", name, err);
                    return;
                }
            }
            if !probe {
                return;
            }
            let label = match ingestor.detect_encoding(&local, threshold) {
                Ok(Some(label)) => label,
                Ok(None) => return,
                Err(err) => {
                    tracing::warn!("Encoding probe for {} failed: {}", name, err);
                    return;
                }
            };
            if let Err(err) = registry.set_encoding(&name, &label) {
                tracing::warn!("Could not record encoding for {}: {}", name, err);
            }
        });

        let mut imports = self.imports.lock();
        imports.retain(|import| !import.is_finished());
        imports.push(task);
    }

    /// Wait for every outstanding source import
    pub async fn settle(&self) {
        let imports: Vec<JoinHandle<()>> = std::mem::take(&mut *self.imports.lock());
        for import in imports {
            if let Err(err) = import.await {
                tracing::warn!("Source import ended abnormally: {}", err);
            }
        }
    }

    /// Point a source whose origin moved at its new location
    pub fn reassociate(&self, name: &str, origin: &Path) -> Result<()> {
        let origin = origin.canonicalize().unwrap_or_else(|_| origin.to_path_buf());
        self.registry.set_origin(name, &origin)?;
        tracing::info!("Source {} now points at {}", name, origin.display());
        Ok(())
    }

    /// Forget a source along with its local copy and cached artifact
    ///
    /// Only a registry failure is reported; leftover files are logged.
    pub fn remove_source(&self, name: &str) -> Result<bool> {
        let existed = self.registry.remove_source(name)?;

        let local = self.paths.sources.join(name);
        if let Err(err) = crate::persist::remove_if_exists(&local) {
            tracing::warn!("Could not delete local copy of {}: {}", name, err);
        }
        let artifact = CacheCatalog::artifact_name(name);
        if let Err(err) = self.catalog.remove(&artifact) {
            tracing::warn!("Could not delete cached artifact {}: {}", artifact, err);
        }
        Ok(existed)
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    /// Refresh every source on a background worker
    ///
    /// Fails with [`DataError::UpdateInProgress`] while another run is active.
    pub fn start_update(&self) -> Result<UpdateHandle> {
        if self
            .updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DataError::UpdateInProgress);
        }
        let guard = FlightGuard(Arc::clone(&self.updating));

        let pipeline = UpdatePipeline::new(
            Arc::clone(&self.registry),
            self.catalog.clone(),
            &self.config,
        );
        let (sender, events) = mpsc::channel(PROGRESS_BUFFER);

        let task = self.runtime.spawn_blocking(move || {
            let _guard = guard;
            let mut run = pipeline.run();
            let mut listening = true;
            for event in run.by_ref() {
                if listening && sender.blocking_send(event).is_err() {
                    tracing::debug!("Progress listener went away, update continues");
                    listening = false;
                }
            }
            run.report().clone()
        });

        Ok(UpdateHandle { events, task })
    }

    /// Wait until no registry commit is in progress
    ///
    /// Outstanding source imports are not cancelled.
    pub fn shutdown(&self) {
        self.registry.quiesce();
        tracing::info!("Data store at {} closed", self.paths.root.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphit_core::CoreError;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> Session {
        Session::open(DataConfig::load(temp.path().join("saved")).unwrap()).unwrap()
    }

    #[test]
    fn test_open_requires_runtime() {
        let temp = TempDir::new().unwrap();
        let config = DataConfig::load(temp.path().join("saved")).unwrap();
        assert!(matches!(Session::open(config), Err(DataError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_add_source_copies_and_probes() {
        let temp = TempDir::new().unwrap();
        let session = open(&temp);
        let origin = temp.path().join("terrain.csv");
        std::fs::write(&origin, "x,y\n1,2\n").unwrap();

        let name = session.add_source(&origin, Prefix::Isometric).unwrap();
        assert_eq!(name, "iso_terrain.csv");
        assert!(session.registry().entry(&name).unwrap().is_some());

        session.settle().await;
        assert!(session.paths().sources.join(&name).is_file());
        let entry = session.registry().entry(&name).unwrap().unwrap();
        assert_eq!(entry.text_encoding.as_deref(), Some("UTF-8"));
        assert_eq!(
            session.registry().load().unwrap().source_dir,
            temp.path().canonicalize().unwrap().to_string_lossy()
        );
    }

    #[tokio::test]
    async fn test_add_source_rejects_unknown_type() {
        let temp = TempDir::new().unwrap();
        let session = open(&temp);
        let origin = temp.path().join("notes.txt");
        std::fs::write(&origin, "hello").unwrap();
        assert!(matches!(
            session.add_source(&origin, Prefix::None),
            Err(DataError::Unparsable { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_source_rejects_contradicting_prefix() {
        let temp = TempDir::new().unwrap();
        let session = open(&temp);
        let origin = temp.path().join("iso_x.csv");
        std::fs::write(&origin, "a\n1\n").unwrap();

        assert!(matches!(
            session.add_source(&origin, Prefix::None),
            Err(DataError::Core(CoreError::PrefixMismatch { .. }))
        ));
        assert!(session.registry().entries().unwrap().is_empty());
        assert_eq!(session.add_source(&origin, Prefix::Isometric).unwrap(), "iso_x.csv");
    }

    #[tokio::test]
    async fn test_add_source_rejects_artifact_collisions() {
        let temp = TempDir::new().unwrap();
        let session = open(&temp);
        let files = [
            ("data.csv", "a\n1\n"),
            ("data.json", "[]"),
            ("game_data.csv", "q\n1\n"),
        ];
        for (file, contents) in files {
            std::fs::write(temp.path().join(file), contents).unwrap();
        }

        let add = |file: &str, prefix| session.add_source(&temp.path().join(file), prefix);
        assert_eq!(add("data.csv", Prefix::None).unwrap(), "data.csv");
        match add("data.json", Prefix::None) {
            Err(DataError::ArtifactConflict { artifact, owner, .. }) => {
                assert_eq!(artifact, "data");
                assert_eq!(owner, "data.csv");
            }
            other => panic!("expected a conflict, got {:?}", other),
        }
        assert!(matches!(
            add("game_data.csv", Prefix::None),
            Err(DataError::ArtifactConflict { .. })
        ));
        assert_eq!(add("data.json", Prefix::Isometric).unwrap(), "iso_data.json");

        // Adding the same file again is not a conflict
        assert_eq!(add("data.csv", Prefix::None).unwrap(), "data.csv");
        session.settle().await;

        let names: Vec<String> = session
            .registry()
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["data.csv", "iso_data.json"]);
    }

    #[tokio::test]
    async fn test_shutdown_leaves_imports_running() {
        let temp = TempDir::new().unwrap();
        let session = open(&temp);
        let origin = temp.path().join("large.csv");
        let mut contents = String::from("a,b,c\n");
        for row in 0..200_000 {
            contents.push_str(&format!("{},{},label_{}\n", row, row * 2, row));
        }
        std::fs::write(&origin, contents).unwrap();

        let name = session.add_source(&origin, Prefix::None).unwrap();
        session.shutdown();
        assert!(session.registry().entry(&name).unwrap().is_some());

        session.settle().await;
        let entry = session.registry().entry(&name).unwrap().unwrap();
        assert_eq!(entry.text_encoding.as_deref(), Some("UTF-8"));
        assert_eq!(
            std::fs::metadata(session.paths().sources.join(&name)).unwrap().len(),
            std::fs::metadata(&origin).unwrap().len()
        );
    }

    #[tokio::test]
    async fn test_remove_source_clears_files() {
        let temp = TempDir::new().unwrap();
        let session = open(&temp);
        let origin = temp.path().join("sales.csv");
        std::fs::write(&origin, "a\n1\n").unwrap();
        let name = session.add_source(&origin, Prefix::None).unwrap();
        session.settle().await;

        session.start_update().unwrap().finish().await.unwrap();
        assert!(session.catalog().exists("sales"));

        assert!(session.remove_source(&name).unwrap());
        assert!(!session.catalog().exists("sales"));
        assert!(!session.paths().sources.join(&name).exists());
        assert!(!session.remove_source(&name).unwrap());
    }

    #[tokio::test]
    async fn test_sources_lists_generators_first() {
        let temp = TempDir::new().unwrap();
        let session = open(&temp);
        let sources = session.sources().unwrap();
        assert_eq!(sources.len(), GeneratorId::ALL.len());
        assert_eq!(sources[0].1, SourceKind::Internal(GeneratorId::Game));
    }
}
