//! Missingness strategies
//!
//! Each [`Mechanism`] is bound to exactly one [`MissingnessStrategy`] through
//! a [`StrategySet`]. Strategies only decide *which* entries disappear; they
//! never change the length or order of the column they are given.

use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use std::cmp::Ordering;
use thiserror::Error;

use shared::{Mechanism, MissingRate};

/// Errors raised by a strategy; surfaced as `GenerationFailure`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("strategy requires an observed covariate column")]
    MissingCovariate,

    #[error("covariate length {covariate} does not match column length {values}")]
    CovariateLength { covariate: usize, values: usize },

    #[error("strategy requires a threshold in [0, 1]")]
    MissingThreshold,

    #[error("{0}")]
    Other(String),
}

/// Everything a strategy may look at
#[derive(Debug, Clone, PartialEq)]
pub struct MaskInput {
    /// Primary column; `None` entries are already missing in the source
    pub values: Vec<Option<f64>>,
    /// Observed covariate aligned with `values` (time of day for MAR)
    pub covariate: Option<Vec<f64>>,
    /// Quantile anchor for value-dependent masking
    pub threshold: Option<f64>,
    pub rate: MissingRate,
}

/// Masked column plus the ground-truth removal indicator
#[derive(Debug, Clone, PartialEq)]
pub struct MaskOutput {
    pub masked: Vec<Option<f64>>,
    pub removed: Vec<bool>,
}

impl MaskOutput {
    /// Null out `chosen` indices of `values`
    pub fn from_indices(values: &[Option<f64>], chosen: &[usize]) -> Self {
        let mut masked = values.to_vec();
        let mut removed = vec![false; values.len()];
        for &idx in chosen {
            masked[idx] = None;
            removed[idx] = true;
        }
        Self { masked, removed }
    }
}

/// Pluggable masking algorithm for one mechanism
#[mockall::automock]
pub trait MissingnessStrategy: Send + Sync {
    fn mask(&self, input: &MaskInput, seed: u64) -> Result<MaskOutput, StrategyError>;
}

/// Number of entries to remove for a column of `len` at `rate`
pub fn target_count(len: usize, rate: MissingRate) -> usize {
    (len as f64 * rate.fraction()).round() as usize
}

fn observed_indices(values: &[Option<f64>]) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| value.map(|_| idx))
        .collect()
}

/// Order `candidates` by `score`, breaking ties at random, and keep the first `k`
fn lowest_scored(candidates: Vec<usize>, k: usize, rng: &mut StdRng, score: impl Fn(usize) -> f64) -> Vec<usize> {
    let mut ordered = candidates;
    ordered.shuffle(rng);
    // stable sort keeps the shuffled order among equal scores
    ordered.sort_by(|a, b| score(*a).partial_cmp(&score(*b)).unwrap_or(Ordering::Equal));
    ordered.truncate(k);
    ordered
}

/// MCAR: every observed entry is equally likely to be removed
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformRandomStrategy;

impl MissingnessStrategy for UniformRandomStrategy {
    fn mask(&self, input: &MaskInput, seed: u64) -> Result<MaskOutput, StrategyError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let observed = observed_indices(&input.values);
        let k = target_count(input.values.len(), input.rate).min(observed.len());
        let chosen: Vec<usize> = index::sample(&mut rng, observed.len(), k)
            .into_iter()
            .map(|i| observed[i])
            .collect();
        Ok(MaskOutput::from_indices(&input.values, &chosen))
    }
}

/// MAR: entries with the lowest observed covariate are removed first
#[derive(Debug, Default, Clone, Copy)]
pub struct LowestCovariateStrategy;

impl MissingnessStrategy for LowestCovariateStrategy {
    fn mask(&self, input: &MaskInput, seed: u64) -> Result<MaskOutput, StrategyError> {
        let covariate = input.covariate.as_ref().ok_or(StrategyError::MissingCovariate)?;
        if covariate.len() != input.values.len() {
            return Err(StrategyError::CovariateLength {
                covariate: covariate.len(),
                values: input.values.len(),
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let observed = observed_indices(&input.values);
        let k = target_count(input.values.len(), input.rate).min(observed.len());
        let chosen = lowest_scored(observed, k, &mut rng, |idx| covariate[idx]);
        Ok(MaskOutput::from_indices(&input.values, &chosen))
    }
}

/// MNAR: entries closest to the threshold quantile of the column itself are removed
///
/// A threshold of 0 removes the lowest values, 1 the highest.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueThresholdStrategy;

impl MissingnessStrategy for ValueThresholdStrategy {
    fn mask(&self, input: &MaskInput, seed: u64) -> Result<MaskOutput, StrategyError> {
        let threshold = input
            .threshold
            .filter(|t| (0.0..=1.0).contains(t))
            .ok_or(StrategyError::MissingThreshold)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let observed = observed_indices(&input.values);
        let k = target_count(input.values.len(), input.rate).min(observed.len());
        if observed.is_empty() {
            return Ok(MaskOutput::from_indices(&input.values, &[]));
        }

        let mut sorted: Vec<f64> = observed.iter().filter_map(|&idx| input.values[idx]).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let anchor_pos = (threshold * (sorted.len() - 1) as f64).round() as usize;
        let anchor = sorted[anchor_pos];

        let chosen = lowest_scored(observed, k, &mut rng, |idx| {
            input.values[idx].map(|v| (v - anchor).abs()).unwrap_or(f64::INFINITY)
        });
        Ok(MaskOutput::from_indices(&input.values, &chosen))
    }
}

/// One strategy per mechanism, resolved once at the generator boundary
pub struct StrategySet {
    random_uniform: Box<dyn MissingnessStrategy>,
    observed_dependent: Box<dyn MissingnessStrategy>,
    value_dependent: Box<dyn MissingnessStrategy>,
}

impl Default for StrategySet {
    fn default() -> Self {
        Self {
            random_uniform: Box::new(UniformRandomStrategy),
            observed_dependent: Box::new(LowestCovariateStrategy),
            value_dependent: Box::new(ValueThresholdStrategy),
        }
    }
}

impl StrategySet {
    /// Replace the strategy bound to `mechanism` (fluent API)
    pub fn with_strategy(mut self, mechanism: Mechanism, strategy: Box<dyn MissingnessStrategy>) -> Self {
        match mechanism {
            Mechanism::RandomUniform => self.random_uniform = strategy,
            Mechanism::ObservedDependent => self.observed_dependent = strategy,
            Mechanism::ValueDependent => self.value_dependent = strategy,
        }
        self
    }

    pub fn for_mechanism(&self, mechanism: Mechanism) -> &dyn MissingnessStrategy {
        match mechanism {
            Mechanism::RandomUniform => self.random_uniform.as_ref(),
            Mechanism::ObservedDependent => self.observed_dependent.as_ref(),
            Mechanism::ValueDependent => self.value_dependent.as_ref(),
        }
    }
}
