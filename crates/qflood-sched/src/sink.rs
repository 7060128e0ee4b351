//! Artifact sinks: where input arrays, solutions and diagnostics are written.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::{ArtifactBackend, ArtifactConfig};
use crate::error::{SchedError, SchedResult};
use crate::job::JobId;

const MEM_SCHEME: &str = "mem://";
const FILE_SCHEME: &str = "file://";

/// Write-sink contract for job artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist `bytes` under `key` and return a URI that `load` accepts.
    async fn store(&self, bytes: Vec<u8>, key: &str) -> SchedResult<String>;

    /// Read back bytes previously stored.
    async fn load(&self, uri: &str) -> SchedResult<Vec<u8>>;
}

/// Key for a named artifact of a job: `jobs/{id}/{name}`.
pub fn job_key(id: &JobId, name: &str) -> String {
    format!("jobs/{id}/{name}")
}

/// Build the sink described by the configuration.
pub fn sink_from_config(config: &ArtifactConfig) -> SchedResult<Arc<dyn ArtifactSink>> {
    match config.backend {
        ArtifactBackend::Memory => Ok(Arc::new(MemorySink::new())),
        ArtifactBackend::Filesystem => {
            let root = config.root.clone().ok_or_else(|| {
                SchedError::Config("filesystem artifacts need a root directory".into())
            })?;
            Ok(Arc::new(FsSink::new(root)))
        }
    }
}

fn check_key(key: &str) -> SchedResult<()> {
    let path = Path::new(key);
    if key.is_empty()
        || path.is_absolute()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(SchedError::Artifact(format!("invalid artifact key '{key}'")));
    }
    Ok(())
}

/// In-process sink, for tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    objects: RwLock<FxHashMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn store(&self, bytes: Vec<u8>, key: &str) -> SchedResult<String> {
        check_key(key)?;
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(format!("{MEM_SCHEME}{key}"))
    }

    async fn load(&self, uri: &str) -> SchedResult<Vec<u8>> {
        let key = uri
            .strip_prefix(MEM_SCHEME)
            .ok_or_else(|| SchedError::Artifact(format!("not a memory URI: {uri}")))?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| SchedError::Artifact(format!("no artifact at {uri}")))
    }
}

/// Sink writing one file per artifact under a root directory.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactSink for FsSink {
    async fn store(&self, bytes: Vec<u8>, key: &str) -> SchedResult<String> {
        check_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(format!("{FILE_SCHEME}{}", path.display()))
    }

    async fn load(&self, uri: &str) -> SchedResult<Vec<u8>> {
        let path = uri
            .strip_prefix(FILE_SCHEME)
            .map(PathBuf::from)
            .ok_or_else(|| SchedError::Artifact(format!("not a file URI: {uri}")))?;
        if !path.starts_with(&self.root) {
            return Err(SchedError::Artifact(format!(
                "{uri} is outside {}",
                self.root.display()
            )));
        }
        Ok(fs::read(&path).await?)
    }
}
