//! Unit resolver
//!
//! Pairs each discovered variant file with the auxiliary (steps) file of its
//! subject. Discovery lists directories whose paths come from the layout.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;

use crate::config::OrchestratorConfig;
use crate::core::layout::{variant_file_suffix, ArtifactLayout};
use crate::error::{OrchestratorError, OrchestratorResult};
use shared::{process_debug, process_warn, Iteration, Mechanism, MissingRate, ProcessId, SubjectId, UnitKey};

pub const SOURCE_SUFFIX: &str = "_hr.csv";
pub const AUXILIARY_SUFFIX: &str = "_steps.csv";

/// A variant file found on disk together with the key it was generated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredVariant {
    pub key: UnitKey,
    pub path: PathBuf,
}

/// A variant paired with its auxiliary file, ready to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUnit {
    pub key: UnitKey,
    pub variant_path: PathBuf,
    pub auxiliary_path: PathBuf,
}

/// A variant with no auxiliary file for its subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedVariant {
    pub key: UnitKey,
    pub path: PathBuf,
}

impl UnmatchedVariant {
    pub fn to_error(&self) -> OrchestratorError {
        OrchestratorError::UnmatchedUnit {
            subject: self.key.subject.clone(),
            path: self.path.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub matched: Vec<ResolvedUnit>,
    pub unmatched: Vec<UnmatchedVariant>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Pair variants with auxiliary files
///
/// An auxiliary file matches when its name starts with the subject. Candidates
/// whose own subject prefix equals the variant subject are preferred, then
/// file name order decides, so `A1` resolves to `A1_steps.csv` and never to
/// `A10_steps.csv`.
pub fn resolve(variants: Vec<DiscoveredVariant>, auxiliary_files: &[PathBuf]) -> Resolution {
    let mut candidates: Vec<(String, &PathBuf)> = auxiliary_files.iter().map(|p| (file_name(p), p)).collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let mut resolution = Resolution::default();
    for variant in variants {
        let subject = variant.key.subject.as_str();
        let mut matches: Vec<&(String, &PathBuf)> =
            candidates.iter().filter(|(name, _)| name.starts_with(subject)).collect();
        // stable: keeps name order within each group
        matches.sort_by_key(|(name, _)| SubjectId::from_file_name(name).ok().as_ref() != Some(&variant.key.subject));

        match matches.first() {
            Some((_, auxiliary)) => {
                if matches.len() > 1 {
                    process_debug!(
                        ProcessId::current(),
                        "🔎 {} auxiliary candidates for {}; using {}",
                        matches.len(),
                        variant.key.subject,
                        auxiliary.display()
                    );
                }
                resolution.matched.push(ResolvedUnit {
                    key: variant.key,
                    variant_path: variant.path,
                    auxiliary_path: (*auxiliary).clone(),
                });
            }
            None => {
                let unmatched = UnmatchedVariant {
                    key: variant.key,
                    path: variant.path,
                };
                process_warn!(ProcessId::current(), "⚠️ {}", unmatched.to_error());
                resolution.unmatched.push(unmatched);
            }
        }
    }
    resolution
}

/// Sorted regular files in `dir` whose names end with `suffix`
async fn list_files(dir: &Path, suffix: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() && file_name(&entry.path()).ends_with(suffix) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

async fn list_required(dir: &Path, suffix: &str) -> OrchestratorResult<Vec<PathBuf>> {
    match list_files(dir, suffix).await {
        Ok(files) => Ok(files),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OrchestratorError::config(format!(
            "source root {} does not exist",
            dir.display()
        ))),
        Err(e) => Err(OrchestratorError::file_system("list", dir, e)),
    }
}

/// Source series files (`*_hr.csv`) under the source root
pub async fn discover_sources(config: &OrchestratorConfig) -> OrchestratorResult<Vec<PathBuf>> {
    list_required(&config.source_root, SOURCE_SUFFIX).await
}

/// Auxiliary files (`*_steps.csv`) under the source root
pub async fn discover_auxiliary(config: &OrchestratorConfig) -> OrchestratorResult<Vec<PathBuf>> {
    list_required(&config.source_root, AUXILIARY_SUFFIX).await
}

/// Variant files of one (mechanism, rate, iteration)
///
/// A missing iteration directory is logged and yields no variants.
pub async fn discover_variants(
    config: &OrchestratorConfig,
    mechanism: Mechanism,
    rate: MissingRate,
    iteration: Iteration,
) -> OrchestratorResult<Vec<DiscoveredVariant>> {
    let dir = ArtifactLayout::from_config(config).variant_dir(mechanism, rate, iteration);
    let suffix = variant_file_suffix(mechanism, rate, iteration);

    let files = match list_files(&dir, &suffix).await {
        Ok(files) => files,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            process_warn!(ProcessId::current(), "⚠️ No variants at {}; skipping", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(OrchestratorError::file_system("list", &dir, e)),
    };

    let mut variants = Vec::with_capacity(files.len());
    for path in files {
        match SubjectId::from_file_name(&file_name(&path)) {
            Ok(subject) => variants.push(DiscoveredVariant {
                key: UnitKey::new(subject, mechanism, rate, iteration),
                path,
            }),
            Err(e) => process_warn!(ProcessId::current(), "⚠️ Skipping {}: {}", path.display(), e),
        }
    }
    Ok(variants)
}
