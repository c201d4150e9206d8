//! Service-specific tests
//!
//! Each service has its own test file; shared fixtures live in `common`.

#[cfg(test)]
mod analysis_runner;

// Common test utilities for services
#[cfg(test)]
pub mod common {
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tokio::time::timeout;

    use shared::{Iteration, Mechanism, MissingRate, SubjectId, UnitKey};

    /// Upper bound for anything that spawns a real child
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: std::future::Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await
    }

    pub fn test_key(subject: &str, rate: u8, iteration: u32) -> UnitKey {
        UnitKey::new(
            SubjectId::new(subject).expect("valid test subject"),
            Mechanism::RandomUniform,
            MissingRate::new(rate).expect("valid test rate"),
            Iteration::new(iteration).expect("valid test iteration"),
        )
    }

    /// Write an executable-free shell script; it is run as `sh <script> ...`
    pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).expect("write test script");
        path
    }
}
