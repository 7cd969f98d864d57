// src/config/validate.rs

use tracing::debug;

use crate::config::model::{Config, RawConfig};
use crate::errors::{PerfrunError, Result};
use crate::orchestrator::CaseDescriptor;

impl TryFrom<RawConfig> for Config {
    type Error = PerfrunError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_globals(&raw)?;
        let cases = valid_cases(&raw)?;
        Ok(Config::new_unchecked(raw, cases))
    }
}

fn validate_globals(cfg: &RawConfig) -> Result<()> {
    if cfg.vendor.trim().is_empty() {
        return Err(PerfrunError::ConfigError(
            "`vendor` must not be empty".to_string(),
        ));
    }

    if cfg.hosts.is_empty() {
        return Err(PerfrunError::ConfigError(
            "`hosts` must list at least one host".to_string(),
        ));
    }

    let mut seen = std::collections::BTreeSet::new();
    if let Some(dup) = cfg.hosts.iter().find(|h| !seen.insert(h.trim())) {
        return Err(PerfrunError::ConfigError(format!(
            "`hosts` lists {dup:?} more than once"
        )));
    }

    if cfg.nproc_per_node == 0 {
        return Err(PerfrunError::ConfigError(
            "`nproc_per_node` must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.timeouts.poll_interval_secs == 0 {
        return Err(PerfrunError::ConfigError(
            "[timeouts].poll_interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

/// Parse the `[cases]` table into descriptors, preserving file order.
fn valid_cases(cfg: &RawConfig) -> Result<Vec<CaseDescriptor>> {
    let table = match &cfg.cases {
        Some(toml::Value::Table(table)) => table,
        Some(other) => {
            return Err(PerfrunError::NoValidCases(format!(
                "`cases` must be a table of case identifiers, got a {}",
                other.type_str()
            )));
        }
        None => {
            return Err(PerfrunError::NoValidCases(
                "config has no `[cases]` table".to_string(),
            ));
        }
    };

    let names: Vec<&str> = table.keys().map(String::as_str).collect();
    debug!(cases = %names.join(","), "checking configured cases");

    let cases = names
        .iter()
        .map(|name| CaseDescriptor::parse(name))
        .collect::<Result<Vec<_>>>()?;

    if cases.is_empty() {
        return Err(PerfrunError::NoValidCases(
            "`[cases]` is empty".to_string(),
        ));
    }

    Ok(cases)
}
