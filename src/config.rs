//! Generator configuration.

use crate::error::GeneratorError;
use crate::traversal::TraversalOptions;

/// Parameters of one generator run.
///
/// Built once, validated, and passed by reference to the orchestrator. All
/// derived quantities (quota, prune threshold) are computed from it on demand.
///
/// # Example
///
/// ```
/// use eipgen::GeneratorConfig;
///
/// let config = GeneratorConfig::default()
///     .target_count(500)
///     .max_per_state(50)
///     .parallel_depth(2);
/// assert_eq!(config.prune_threshold(), 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    target_count: u64,
    min_state_probability: Option<f64>,
    max_per_state: u64,
    parallel_depth: usize,
    queue_capacity: Option<usize>,
    verbose: bool,
    passthrough: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            target_count: 1_000_000,
            min_state_probability: None,
            max_per_state: 1_000,
            parallel_depth: 4,
            queue_capacity: None,
            verbose: false,
            passthrough: false,
        }
    }
}

impl GeneratorConfig {
    /// Approximate number of addresses to generate.
    #[must_use]
    pub fn target_count(mut self, n: u64) -> Self {
        self.target_count = n;
        self
    }

    /// Minimum joint probability of a model state. Zero selects the
    /// threshold derived from the target count; a negative value disables
    /// pruning.
    #[must_use]
    pub fn min_state_probability(mut self, s: f64) -> Self {
        self.min_state_probability = if s == 0.0 { None } else { Some(s) };
        self
    }

    /// Maximum number of addresses sampled from one model state.
    #[must_use]
    pub fn max_per_state(mut self, m: u64) -> Self {
        self.max_per_state = m;
        self
    }

    /// Number of leading vertices whose branches run as separate tasks.
    ///
    /// Peak task count is the product of the branching factors of these
    /// vertices, so keep it small.
    #[must_use]
    pub fn parallel_depth(mut self, p: usize) -> Self {
        self.parallel_depth = p;
        self
    }

    /// Bound the queue between traversal and sampling. Unbounded by default.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Print the model before and a summary after generation.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Echo comment, segment and segment value lines of the input.
    #[must_use]
    pub fn passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    /// Checks that the parameters can drive a run.
    pub fn validate(&self) -> Result<(), GeneratorError> {
        if self.target_count == 0 {
            return Err(GeneratorError::invalid_config(
                "target address count must be positive",
            ));
        }
        if self.max_per_state == 0 {
            return Err(GeneratorError::invalid_config(
                "maximum addresses per state must be positive",
            ));
        }
        if let Some(s) = self.min_state_probability {
            if s.is_nan() || s > 1.0 {
                return Err(GeneratorError::invalid_config(format!(
                    "minimum state probability {s} is not a probability"
                )));
            }
        }
        if self.queue_capacity == Some(0) {
            return Err(GeneratorError::invalid_config(
                "queue capacity must be positive",
            ));
        }
        Ok(())
    }

    /// Target address count `N`.
    pub fn target(&self) -> u64 {
        self.target_count
    }

    /// Probability mass worth one address, `1/N`.
    pub fn quota(&self) -> f64 {
        1.0 / self.target_count as f64
    }

    /// Minimum state probability `S`, derived from `N` unless set.
    ///
    /// For `N < 1000` the derived threshold is `1e-6`, otherwise a thousandth
    /// of the quota.
    pub fn prune_threshold(&self) -> f64 {
        match self.min_state_probability {
            Some(s) => s,
            None if self.target_count < 1000 => 1.0 / 1e6,
            None => self.quota() / 1e3,
        }
    }

    /// Per-state address cap `M`.
    pub fn max_addresses_per_state(&self) -> u64 {
        self.max_per_state
    }

    /// Whether verbose output is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Whether input lines are echoed.
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Options for the traversal engine.
    pub fn traversal_options(&self) -> TraversalOptions {
        let options = TraversalOptions::default()
            .prune_threshold(self.prune_threshold())
            .parallel_depth(self.parallel_depth);
        match self.queue_capacity {
            Some(capacity) => options.queue_capacity(capacity),
            None => options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.target(), 1_000_000);
        assert_eq!(config.max_addresses_per_state(), 1_000);
        assert!(!config.is_verbose());
        assert!(!config.is_passthrough());
        assert!(config.validate().is_ok());

        let options = config.traversal_options();
        assert_eq!(options.depth(), 4);
        assert_eq!(options.capacity(), None);
    }

    #[test]
    fn test_derived_threshold() {
        let config = GeneratorConfig::default().target_count(500);
        assert_eq!(config.prune_threshold(), 1e-6);

        let config = GeneratorConfig::default().target_count(999);
        assert_eq!(config.prune_threshold(), 1e-6);

        let config = GeneratorConfig::default().target_count(2_000_000);
        assert_eq!(config.prune_threshold(), (1.0 / 2_000_000.0) / 1000.0);
        assert!((config.prune_threshold() - 5e-10).abs() < 1e-24);

        let config = GeneratorConfig::default().target_count(1000);
        assert_eq!(config.prune_threshold(), (1.0 / 1000.0) / 1000.0);
    }

    #[test]
    fn test_explicit_threshold() {
        let config = GeneratorConfig::default()
            .target_count(10)
            .min_state_probability(0.01);
        assert_eq!(config.prune_threshold(), 0.01);
        assert_eq!(config.traversal_options().threshold(), 0.01);

        // zero means derive
        let config = config.min_state_probability(0.0);
        assert_eq!(config.prune_threshold(), 1e-6);
    }

    #[test]
    fn test_negative_threshold_disables_pruning() {
        let config = GeneratorConfig::default()
            .target_count(5000)
            .min_state_probability(-1.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.prune_threshold(), -1.0);
        assert_eq!(config.traversal_options().threshold(), -1.0);
    }

    #[test]
    fn test_quota() {
        let config = GeneratorConfig::default().target_count(10);
        assert_eq!(config.quota(), 0.1);
    }

    #[test]
    fn test_validate_rejects() {
        for config in [
            GeneratorConfig::default().target_count(0),
            GeneratorConfig::default().max_per_state(0),
            GeneratorConfig::default().min_state_probability(1.5),
            GeneratorConfig::default().min_state_probability(f64::NAN),
            GeneratorConfig::default().queue_capacity(0),
        ] {
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, GeneratorError::InvalidConfig { .. }),
                "{config:?}: {err:?}"
            );
        }
    }
}
