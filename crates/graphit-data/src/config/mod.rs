//! Store configuration and on-disk layout

pub mod null_handling;

use std::path::{Path, PathBuf};

use parquet::basic::{Compression, GzipLevel};
use serde::{Deserialize, Serialize};

use crate::Result;

pub use null_handling::NullConfig;

/// Name of the optional configuration file inside the store root
pub const CONFIG_FILE_NAME: &str = "graphit.json";

/// Environment variable overriding the store root
pub const ROOT_ENV_VAR: &str = "GRAPHIT_ROOT";

/// Compression applied to cached artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCompression {
    Uncompressed,
    Gzip { level: u32 },
}

impl Default for CacheCompression {
    fn default() -> Self {
        CacheCompression::Gzip { level: 6 }
    }
}

impl CacheCompression {
    pub fn to_parquet(self) -> Result<Compression> {
        Ok(match self {
            CacheCompression::Uncompressed => Compression::UNCOMPRESSED,
            CacheCompression::Gzip { level } => Compression::GZIP(GzipLevel::try_new(level)?),
        })
    }
}

/// Data store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding every persisted file
    pub root: PathBuf,

    /// File extension of cached artifacts
    pub cache_extension: String,

    /// Null handling for text sources
    pub nulls: NullConfig,

    /// Bytes fed to the encoding detector before it is asked for a verdict
    pub encoding_probe_bytes: usize,

    pub compression: CacheCompression,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("saved"),
            cache_extension: "pqt".to_string(),
            nulls: NullConfig::default(),
            encoding_probe_bytes: 64 * 1024,
            compression: CacheCompression::default(),
        }
    }
}

impl DataConfig {
    /// Configuration rooted at `root`, read from its config file when present
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = root.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let bytes = std::fs::read(&path)?;
            tracing::debug!("Loaded store configuration from {}", path.display());
            serde_json::from_slice::<DataConfig>(&bytes)?
        } else {
            DataConfig::default()
        };
        config.root = root;
        Ok(config)
    }

    /// Root from `GRAPHIT_ROOT`, falling back to the default directory
    pub fn from_env() -> Result<Self> {
        let root = std::env::var_os(ROOT_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| DataConfig::default().root);
        Self::load(root)
    }

    pub fn paths(&self) -> StorePaths {
        StorePaths::new(&self.root)
    }
}

/// Directory layout under the store root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub root: PathBuf,
    /// Cached artifacts
    pub data: PathBuf,
    /// Plot map documents
    pub plots: PathBuf,
    /// Rendered exports
    pub outputs: PathBuf,
    /// Local copies of external sources
    pub sources: PathBuf,
    /// Registry document
    pub registry: PathBuf,
}

impl StorePaths {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            data: root.join("data"),
            plots: root.join("plots"),
            outputs: root.join("outputs"),
            sources: root.join("sources"),
            registry: root.join("spec.json"),
        }
    }

    pub fn create_all(&self) -> Result<()> {
        for dir in [&self.data, &self.plots, &self.outputs, &self.sources] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
