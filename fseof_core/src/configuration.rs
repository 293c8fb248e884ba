//! Process wide defaults used when building models and solving problems
use std::sync::{LazyLock, RwLock};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Configuration {
    /// Lower bound given to reactions which don't specify one
    pub lower_bound: f64,
    /// Upper bound given to reactions which don't specify one
    pub upper_bound: f64,
    /// Absolute tolerance used when pinning an objective to its optimum
    pub tolerance: f64,
    /// Number of worker threads for scans, variability analysis and knockout checks
    pub processes: u32,
    /// Wall clock limit for a single solve, in seconds (None means no limit)
    pub time_limit: Option<f64>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            lower_bound: -1000.,
            upper_bound: 1000.,
            tolerance: 1e-07,
            processes: 1,
            time_limit: None,
        }
    }
}

/// Snapshot of the current configuration
///
/// A poisoned lock still holds a valid configuration, so it is read through.
pub fn current() -> Configuration {
    match CONFIGURATION.read() {
        Ok(config) => *config,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Replace parts of the current configuration
pub fn update<F: FnOnce(&mut Configuration)>(f: F) {
    let mut guard = match CONFIGURATION.write() {
        Ok(config) => config,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Configuration::default();
        assert!((config.lower_bound + 1000.).abs() < 1e-25);
        assert!((config.upper_bound - 1000.).abs() < 1e-25);
        assert_eq!(config.processes, 1);
        assert!(config.time_limit.is_none());
    }
}
