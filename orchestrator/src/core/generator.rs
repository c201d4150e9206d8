//! Variant generator
//!
//! Selects the inputs each mechanism needs, hands them to the bound
//! strategy, and re-attaches the masked column to the full row set.

use crate::config::OrchestratorConfig;
use crate::core::series::{SourceSeries, Variant, VariantRow};
use crate::core::strategies::{MaskInput, StrategySet};
use crate::error::{OrchestratorError, OrchestratorResult};
use shared::{Iteration, Mechanism, MissingRate, UnitKey};

/// Maps a unit key to the RNG seed used to mask it
///
/// The seed depends on every key field, so two iterations of the same
/// (subject, mechanism, rate) are independent while a re-run with the same
/// base seed reproduces the same variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPolicy {
    base: u64,
}

impl SeedPolicy {
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn seed_for(&self, key: &UnitKey) -> u64 {
        // FNV-1a over the subject so the seed is stable across platforms
        let subject_hash = key
            .subject
            .as_str()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
            });
        let mechanism_tag = Mechanism::ALL
            .iter()
            .position(|m| *m == key.mechanism)
            .unwrap_or_default() as u64;

        [
            subject_hash,
            mechanism_tag,
            u64::from(key.rate.percent()),
            u64::from(key.iteration.index()),
        ]
        .into_iter()
        .fold(splitmix64(self.base), |acc, part| splitmix64(acc ^ part))
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Produces masked variants of a source series
pub struct VariantGenerator {
    strategies: StrategySet,
    seeds: SeedPolicy,
    mnar_threshold: f64,
}

impl VariantGenerator {
    pub fn new(seeds: SeedPolicy, mnar_threshold: f64) -> Self {
        Self {
            strategies: StrategySet::default(),
            seeds,
            mnar_threshold,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(SeedPolicy::new(config.base_seed), config.mnar_threshold)
    }

    /// Replace the strategy set (fluent API)
    pub fn with_strategies(mut self, strategies: StrategySet) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn seeds(&self) -> SeedPolicy {
        self.seeds
    }

    /// Generate iterations `1..=count`, stopping at the first failure
    pub fn generate(
        &self,
        series: &SourceSeries,
        mechanism: Mechanism,
        rate: MissingRate,
        count: u32,
    ) -> OrchestratorResult<Vec<Variant>> {
        Iteration::range(count)
            .map(|iteration| self.generate_one(series, mechanism, rate, iteration))
            .collect()
    }

    /// Generate a single variant
    pub fn generate_one(
        &self,
        series: &SourceSeries,
        mechanism: Mechanism,
        rate: MissingRate,
        iteration: Iteration,
    ) -> OrchestratorResult<Variant> {
        let key = UnitKey::new(series.subject().clone(), mechanism, rate, iteration);
        let input = self.select_inputs(series, mechanism, rate)?;

        let output = self
            .strategies
            .for_mechanism(mechanism)
            .mask(&input, self.seeds.seed_for(&key))
            .map_err(|e| generation_failure(&key, e.to_string()))?;

        if output.masked.len() != series.len() || output.removed.len() != series.len() {
            return Err(generation_failure(
                &key,
                format!(
                    "strategy returned {} values / {} flags for {} rows",
                    output.masked.len(),
                    output.removed.len(),
                    series.len()
                ),
            ));
        }

        let rows = series
            .rows()
            .iter()
            .zip(output.masked)
            .zip(output.removed)
            .map(|((row, heartrate), removed)| VariantRow {
                user: row.user.clone(),
                datetime: row.datetime.clone(),
                heartrate,
                removed,
            })
            .collect();

        Ok(Variant::new(key, rows))
    }

    fn select_inputs(&self, series: &SourceSeries, mechanism: Mechanism, rate: MissingRate) -> OrchestratorResult<MaskInput> {
        let values = series.values();
        let input = match mechanism {
            Mechanism::RandomUniform => MaskInput {
                values,
                covariate: None,
                threshold: None,
                rate,
            },
            Mechanism::ObservedDependent => MaskInput {
                values,
                covariate: Some(series.time_of_day()?),
                threshold: None,
                rate,
            },
            Mechanism::ValueDependent => MaskInput {
                values,
                covariate: None,
                threshold: Some(self.mnar_threshold),
                rate,
            },
        };
        Ok(input)
    }
}

fn generation_failure(key: &UnitKey, reason: String) -> OrchestratorError {
    OrchestratorError::generation(&key.subject, key.mechanism, reason)
}
