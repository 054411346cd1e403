use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Operational settings of the harvesting engine.
///
/// Tax policy constants (eligibility threshold, holding period, wash-sale
/// window) are not here; they live next to the rules that use them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on a single price lookup
    pub quote_timeout: Duration,
    /// Upper bound on a single generative advisor call
    pub advisor_timeout: Duration,
    /// Maximum positions processed at the same time within one analysis
    pub max_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quote_timeout: Duration::from_secs(5),
            advisor_timeout: Duration::from_secs(45),
            max_concurrency: 4,
        }
    }
}

impl EngineConfig {
    /// Read overrides from `QUOTE_TIMEOUT_SECS`, `ADVISOR_TIMEOUT_SECS` and
    /// `HARVEST_MAX_CONCURRENCY`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let quote_timeout = match env::var("QUOTE_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse().context("QUOTE_TIMEOUT_SECS must be whole seconds")?),
            Err(_) => defaults.quote_timeout,
        };
        let advisor_timeout = match env::var("ADVISOR_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse().context("ADVISOR_TIMEOUT_SECS must be whole seconds")?),
            Err(_) => defaults.advisor_timeout,
        };
        let max_concurrency: usize = match env::var("HARVEST_MAX_CONCURRENCY") {
            Ok(v) => v.parse().context("HARVEST_MAX_CONCURRENCY must be a positive integer")?,
            Err(_) => defaults.max_concurrency,
        };

        let config = Self {
            quote_timeout,
            advisor_timeout,
            max_concurrency,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be at least 1");
        }
        if self.quote_timeout.is_zero() || self.advisor_timeout.is_zero() {
            anyhow::bail!("collaborator timeouts must be non-zero");
        }
        Ok(())
    }
}
