//! Core identifiers for the missing-data experiment matrix

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::{SharedError, SharedResult};

/// Global process ID singleton - set once at startup
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Identity attached to every log line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// The orchestrator binary itself (singleton)
    Orchestrator,
    /// A batch executor worker with a 1-based number
    Worker(u32),
}

impl ProcessId {
    /// Initialize the global process ID for the orchestrator
    pub fn init_orchestrator() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }

    /// Get the global process ID, defaulting to the orchestrator when unset
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Orchestrator => write!(f, "orchestrator"),
            ProcessId::Worker(id) => write!(f, "worker_{id}"),
        }
    }
}

/// Missingness mechanism governing why values disappear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mechanism {
    /// Missing completely at random
    #[serde(rename = "MCAR")]
    RandomUniform,
    /// Missing at random, driven by an observed covariate (time of day)
    #[serde(rename = "MAR")]
    ObservedDependent,
    /// Missing not at random, driven by the value itself
    #[serde(rename = "MNAR")]
    ValueDependent,
}

impl Mechanism {
    pub const ALL: [Mechanism; 3] = [
        Mechanism::RandomUniform,
        Mechanism::ObservedDependent,
        Mechanism::ValueDependent,
    ];

    /// Short name used on disk and on the command line
    pub fn short_name(&self) -> &'static str {
        match self {
            Mechanism::RandomUniform => "MCAR",
            Mechanism::ObservedDependent => "MAR",
            Mechanism::ValueDependent => "MNAR",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Mechanism {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MCAR" => Ok(Mechanism::RandomUniform),
            "MAR" => Ok(Mechanism::ObservedDependent),
            "MNAR" => Ok(Mechanism::ValueDependent),
            _ => Err(SharedError::InvalidConfig {
                field: "mechanism".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Target percentage of entries to mask in the primary column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MissingRate(u8);

impl MissingRate {
    pub fn new(percent: u8) -> SharedResult<Self> {
        if (1..=99).contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(SharedError::InvalidConfig {
                field: "missing_rate".to_string(),
                value: percent.to_string(),
            })
        }
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    pub fn fraction(&self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl TryFrom<u8> for MissingRate {
    type Error = SharedError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MissingRate> for u8 {
    fn from(rate: MissingRate) -> Self {
        rate.0
    }
}

impl fmt::Display for MissingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MissingRate {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let percent = s.trim().parse::<u8>().map_err(|_| SharedError::InvalidConfig {
            field: "missing_rate".to_string(),
            value: s.to_string(),
        })?;
        Self::new(percent)
    }
}

/// 1-based index of an independently re-sampled variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Iteration(u32);

impl Iteration {
    pub fn new(index: u32) -> SharedResult<Self> {
        if index == 0 {
            return Err(SharedError::InvalidConfig {
                field: "iteration".to_string(),
                value: index.to_string(),
            });
        }
        Ok(Self(index))
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    /// Iterations `1..=count`
    pub fn range(count: u32) -> impl Iterator<Item = Iteration> {
        (1..=count).map(Iteration)
    }
}

impl TryFrom<u32> for Iteration {
    type Error = SharedError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Iteration> for u32 {
    fn from(iteration: Iteration) -> Self {
        iteration.0
    }
}

impl fmt::Display for Iteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subject identifier, the filename prefix up to the first separator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    pub const SEPARATOR: char = '_';

    pub fn new(id: impl Into<String>) -> SharedResult<Self> {
        let id = id.into();
        if id.is_empty() || id.contains(Self::SEPARATOR) || id.contains(['/', '\\']) {
            return Err(SharedError::InvalidSubject { input: id });
        }
        Ok(Self(id))
    }

    /// Extract the subject from a file name such as `A0NVTRV_hr_MCAR_10_1.csv`
    pub fn from_file_name(file_name: &str) -> SharedResult<Self> {
        let prefix = file_name.split(Self::SEPARATOR).next().unwrap_or_default();
        Self::new(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of one execution unit: (subject, mechanism, rate, iteration)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub subject: SubjectId,
    pub mechanism: Mechanism,
    pub rate: MissingRate,
    pub iteration: Iteration,
}

impl UnitKey {
    pub fn new(subject: SubjectId, mechanism: Mechanism, rate: MissingRate, iteration: Iteration) -> Self {
        Self {
            subject,
            mechanism,
            rate,
            iteration,
        }
    }

    /// `{MECH}_{rate}_{iteration}` suffix shared by every artifact name
    pub fn suffix(&self) -> String {
        format!("{}_{}_{}", self.mechanism, self.rate, self.iteration)
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.subject, self.suffix())
    }
}

/// Which anomaly-detection variant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Offline,
    Online,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Offline => "offline",
            AnalysisMode::Online => "online",
        }
    }

    /// Output artifact kinds produced by one invocation in this mode
    pub fn output_kinds(&self) -> &'static [ArtifactKind] {
        match self {
            AnalysisMode::Offline => &[ArtifactKind::Figure, ArtifactKind::AnomaliesCsv],
            AnalysisMode::Online => &[
                ArtifactKind::Figure,
                ArtifactKind::AnomaliesCsv,
                ArtifactKind::AlertsCsv,
            ],
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "offline" => Ok(AnalysisMode::Offline),
            "online" => Ok(AnalysisMode::Online),
            _ => Err(SharedError::InvalidConfig {
                field: "mode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Kind of artifact addressed by the artifact store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    VariantCsv,
    Figure,
    AnomaliesCsv,
    AlertsCsv,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Figure => "pdf",
            ArtifactKind::VariantCsv | ArtifactKind::AnomaliesCsv | ArtifactKind::AlertsCsv => "csv",
        }
    }
}
