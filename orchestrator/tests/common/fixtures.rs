//! Test fixtures and data for orchestrator tests
//!
//! This module provides consistent test data used across all test suites.

use shared::{Iteration, Mechanism, MissingRate, SubjectId, UnitKey};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Subject identifiers in the shape of the wearables data set
    pub const SUBJECT_A: &'static str = "A0NVTRV";
    pub const SUBJECT_B: &'static str = "AFPB8J2";
    pub const SUBJECT_C: &'static str = "AJWW3IY";

    /// Standard run parameters
    pub const DEFAULT_RATE: u8 = 10;
    pub const DEFAULT_ITERATIONS: u32 = 1;
    pub const DEFAULT_ROWS: usize = 120;
    pub const DEFAULT_CONCURRENCY: usize = 2;

    pub fn subjects() -> [&'static str; 3] {
        [Self::SUBJECT_A, Self::SUBJECT_B, Self::SUBJECT_C]
    }

    pub fn subject(id: &str) -> SubjectId {
        SubjectId::new(id).unwrap()
    }

    pub fn rate(percent: u8) -> MissingRate {
        MissingRate::new(percent).unwrap()
    }

    pub fn iteration(index: u32) -> Iteration {
        Iteration::new(index).unwrap()
    }

    pub fn key(subject: &str, rate: u8, iteration: u32) -> UnitKey {
        UnitKey::new(
            Self::subject(subject),
            Mechanism::RandomUniform,
            Self::rate(rate),
            Self::iteration(iteration),
        )
    }

    /// A minute-resolution heart-rate file
    pub fn heart_rate_csv(subject: &str, rows: usize) -> String {
        let mut csv = String::from("user,datetime,heartrate\n");
        for i in 0..rows {
            csv.push_str(&format!(
                "{subject},2020-03-{:02} {:02}:{:02}:00,{}\n",
                1 + i / 1440,
                (i / 60) % 24,
                i % 60,
                60 + (i * 7) % 40
            ));
        }
        csv
    }

    /// A matching steps file; its content is only read by the analysis
    pub fn steps_csv(subject: &str) -> String {
        format!("user,datetime,steps\n{subject},2020-03-01 00:00:00,12\n")
    }

    /// A readable heart-rate file whose timestamps cannot be parsed
    pub fn bad_datetime_csv(subject: &str) -> String {
        format!("user,datetime,heartrate\n{subject},yesterday,70\n{subject},today,72\n")
    }

    /// A heart-rate file missing the heartrate column
    pub fn malformed_csv(subject: &str) -> String {
        format!("user,datetime\n{subject},2020-03-01 00:00:00\n")
    }
}
