//! Artifact path layout
//!
//! Every artifact path is computed from its key, never discovered by
//! scanning, so distinct keys can never collide on disk.

use std::path::{Path, PathBuf};

use crate::config::OrchestratorConfig;
use shared::{AnalysisMode, ArtifactKind, Iteration, Mechanism, MissingRate, UnitKey};

pub const FIGURES_DIR: &str = "Figures";
pub const ANOMALIES_DIR: &str = "Anomalies";

/// Suffix shared by every variant file of one (mechanism, rate, iteration)
pub fn variant_file_suffix(mechanism: Mechanism, rate: MissingRate, iteration: Iteration) -> String {
    format!("_hr_{}_{}_{}.csv", mechanism.short_name(), rate, iteration)
}

/// Output paths handed to one analysis invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutputs {
    pub figure: PathBuf,
    pub anomalies: PathBuf,
    /// Only produced in online mode
    pub alerts: Option<PathBuf>,
}

impl AnalysisOutputs {
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths = vec![self.figure.as_path(), self.anomalies.as_path()];
        if let Some(alerts) = &self.alerts {
            paths.push(alerts.as_path());
        }
        paths
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    missing_root: PathBuf,
    results_root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(missing_root: impl Into<PathBuf>, results_root: impl Into<PathBuf>) -> Self {
        Self {
            missing_root: missing_root.into(),
            results_root: results_root.into(),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(&config.missing_root, &config.results_root)
    }

    pub fn missing_root(&self) -> &Path {
        &self.missing_root
    }

    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// `{missing_root}/{MECH}/{rate}/{i}`
    pub fn variant_dir(&self, mechanism: Mechanism, rate: MissingRate, iteration: Iteration) -> PathBuf {
        self.missing_root
            .join(mechanism.short_name())
            .join(rate.to_string())
            .join(iteration.to_string())
    }

    pub fn variant_path(&self, key: &UnitKey) -> PathBuf {
        self.variant_dir(key.mechanism, key.rate, key.iteration).join(format!(
            "{}{}",
            key.subject,
            variant_file_suffix(key.mechanism, key.rate, key.iteration)
        ))
    }

    /// Path of any artifact kind; `mode` is ignored for variant files
    pub fn path_for(&self, key: &UnitKey, mode: AnalysisMode, kind: ArtifactKind) -> PathBuf {
        let (dir, stem) = match kind {
            ArtifactKind::VariantCsv => return self.variant_path(key),
            ArtifactKind::Figure => {
                let stem = match mode {
                    AnalysisMode::Offline => "offline".to_string(),
                    AnalysisMode::Online => "online_alerts".to_string(),
                };
                (FIGURES_DIR, stem)
            }
            ArtifactKind::AnomaliesCsv => (ANOMALIES_DIR, format!("{}_anomalies", mode.as_str())),
            ArtifactKind::AlertsCsv => (ANOMALIES_DIR, format!("{}_alerts", mode.as_str())),
        };

        self.results_root
            .join(mode.as_str())
            .join(key.subject.as_str())
            .join(dir)
            .join(key.mechanism.short_name())
            .join(key.rate.to_string())
            .join(format!("{}_{}_{}.{}", key.subject, stem, key.suffix(), kind.extension()))
    }

    pub fn analysis_outputs(&self, key: &UnitKey, mode: AnalysisMode) -> AnalysisOutputs {
        AnalysisOutputs {
            figure: self.path_for(key, mode, ArtifactKind::Figure),
            anomalies: self.path_for(key, mode, ArtifactKind::AnomaliesCsv),
            alerts: mode
                .output_kinds()
                .contains(&ArtifactKind::AlertsCsv)
                .then(|| self.path_for(key, mode, ArtifactKind::AlertsCsv)),
        }
    }
}
