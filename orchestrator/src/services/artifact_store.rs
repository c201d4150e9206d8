//! Real artifact store implementation
//!
//! Writes variants and prepares analysis output directories under the roots
//! of an [`ArtifactLayout`]. Variant writes go through a temporary file and a
//! rename, so a reader never sees a partially written variant.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::config::OrchestratorConfig;
use crate::core::layout::{AnalysisOutputs, ArtifactLayout};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::ArtifactStore;
use shared::{process_debug, AnalysisMode, ArtifactKind, ProcessId, UnitKey};

pub struct RealArtifactStore {
    layout: ArtifactLayout,
}

impl RealArtifactStore {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(ArtifactLayout::from_config(config))
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    async fn ensure_parent(path: &Path) -> OrchestratorResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OrchestratorError::file_system("create_dir_all", parent, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for RealArtifactStore {
    async fn put(&self, key: &UnitKey, kind: ArtifactKind, bytes: &[u8]) -> OrchestratorResult<PathBuf> {
        if kind != ArtifactKind::VariantCsv {
            return Err(OrchestratorError::config(format!(
                "{kind:?} artifacts are written by the analysis process, not stored directly"
            )));
        }

        let path = self.layout.variant_path(key);
        Self::ensure_parent(&path).await?;

        let mut staging = path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        fs::write(&staging, bytes)
            .await
            .map_err(|e| OrchestratorError::file_system("write", &staging, e))?;
        fs::rename(&staging, &path)
            .await
            .map_err(|e| OrchestratorError::file_system("rename", &path, e))?;

        process_debug!(ProcessId::current(), "💾 Stored {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }

    async fn remove(&self, path: &Path) -> OrchestratorResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OrchestratorError::file_system("remove_file", path, e)),
        }
    }

    fn path_for(&self, key: &UnitKey, mode: AnalysisMode, kind: ArtifactKind) -> PathBuf {
        self.layout.path_for(key, mode, kind)
    }

    async fn prepare_analysis_outputs(&self, key: &UnitKey, mode: AnalysisMode) -> OrchestratorResult<AnalysisOutputs> {
        let outputs = self.layout.analysis_outputs(key, mode);
        for path in outputs.paths() {
            Self::ensure_parent(path).await?;
            if self.exists(path).await {
                process_debug!(ProcessId::current(), "🧹 Removing stale output {}", path.display());
                self.remove(path).await?;
            }
        }
        Ok(outputs)
    }
}
