//! Turning a target address count into per-state sampling budgets.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use log::debug;
use rand::Rng;

use crate::config::GeneratorConfig;
use crate::error::GeneratorError;
use crate::model::Model;
use crate::sampler::Sampler;
use crate::traversal::{traverse, TraversalReport};

/// Accumulates state probabilities until they are worth at least one address.
///
/// The accumulated mass is charged to the state that crosses the quota, so
/// many improbable states together buy addresses for one of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batcher {
    target: f64,
    quota: f64,
    acc: f64,
}

impl Batcher {
    /// Creates a batcher for `target` addresses in total.
    pub fn new(target: u64) -> Self {
        Batcher {
            target: target as f64,
            quota: 1.0 / target as f64,
            acc: 0.0,
        }
    }

    /// Adds a state's probability. Returns the budget to sample that state
    /// with once the accumulated mass reaches the quota.
    pub fn offer(&mut self, probability: f64) -> Option<f64> {
        self.acc += probability;
        if self.acc >= self.quota {
            // acc * N rather than acc / (1/N): 0.6 / 0.1 rounds below 6
            let budget = self.acc * self.target;
            self.acc = 0.0;
            Some(budget)
        } else {
            None
        }
    }

    /// Mass not yet charged to any state.
    pub fn pending(&self) -> f64 {
        self.acc
    }
}

/// Counters of one generator run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    /// States received from the traversal.
    pub states: u64,
    /// States that were sampled.
    pub batches: u64,
    /// Addresses written.
    pub addresses: u64,
    /// Sum of the probabilities of all received states.
    pub probability_mass: f64,
    /// Counters of the traversal.
    pub traversal: TraversalReport,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "visited {} states, sampled {} ({} addresses), Psum={:.6}, pruned {}, unreachable {}",
            self.states,
            self.batches,
            self.addresses,
            self.probability_mass,
            self.traversal.pruned,
            self.traversal.unreachable
        )
    }
}

/// Drives one traversal and samples addresses for its states.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use eipgen::{open_model, Generator, GeneratorConfig};
///
/// let model = Arc::new(open_model("test-data/two-vertex.eip").unwrap());
/// let generator = Generator::new(model, GeneratorConfig::default().target_count(10)).unwrap();
///
/// let mut out = Vec::new();
/// let summary = generator.run(rand::rng(), &mut out).unwrap();
/// assert_eq!(summary.addresses, 10);
/// ```
#[derive(Debug, Clone)]
pub struct Generator {
    model: Arc<Model>,
    config: GeneratorConfig,
}

impl Generator {
    /// Creates a generator after validating `config`.
    pub fn new(model: Arc<Model>, config: GeneratorConfig) -> Result<Self, GeneratorError> {
        config.validate()?;
        Ok(Generator { model, config })
    }

    /// The model being sampled.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The run configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Traverses the model and writes addresses to `out`, one per line.
    ///
    /// With verbose output the model is described before and the summary
    /// printed after the addresses.
    pub fn run<R: Rng, W: Write>(&self, rng: R, out: &mut W) -> Result<Summary, GeneratorError> {
        if self.config.is_verbose() {
            write!(out, "{}", self.model)?;
        }

        let mut sampler = Sampler::new(rng, self.config.max_addresses_per_state());
        let mut batcher = Batcher::new(self.config.target());
        let mut summary = Summary::default();

        debug!(
            "generating ~{} addresses, quota {:e}, threshold {:e}",
            self.config.target(),
            self.config.quota(),
            self.config.prune_threshold()
        );

        let mut states = traverse(Arc::clone(&self.model), self.config.traversal_options())?;
        for state in states.by_ref() {
            summary.states += 1;
            summary.probability_mass += state.probability();

            if let Some(budget) = batcher.offer(state.probability()) {
                summary.batches += 1;
                summary.addresses += sampler.materialize(&self.model, &state, budget, out)?;
            }
        }
        summary.traversal = states.finish()?;

        debug!("{summary}");
        if self.config.is_verbose() {
            writeln!(out, "{summary}")?;
        }
        Ok(summary)
    }
}
