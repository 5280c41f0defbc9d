//! Drawing concrete addresses from an abstract model state.

use std::fmt::Write as _;
use std::io::{self, Write};

use rand::Rng;

use crate::model::Model;
use crate::traversal::AbstractState;

/// Draws random address literals from model states.
///
/// Each sampler owns its random source. Use one sampler per thread when
/// sampling concurrently.
#[derive(Debug)]
pub struct Sampler<R> {
    rng: R,
    max_per_state: u64,
    line: String,
}

impl<R: Rng> Sampler<R> {
    /// Creates a sampler emitting at most `max_per_state` addresses per state.
    pub fn new(rng: R, max_per_state: u64) -> Self {
        Sampler {
            rng,
            max_per_state,
            line: String::with_capacity(64),
        }
    }

    /// Number of addresses [`Sampler::materialize`] writes for `budget`.
    ///
    /// The budget is raised to 1, capped at the per-state maximum and at the
    /// number of addresses the state covers, then rounded down.
    pub fn clamp(&self, state: &AbstractState, budget: f64) -> u64 {
        let mut budget = if budget >= 1.0 { budget } else { 1.0 };
        budget = budget.min(self.max_per_state as f64);
        budget = budget.min(state.cardinality());
        budget.floor() as u64
    }

    /// Draws one address literal for `state` into `line`, replacing its
    /// contents.
    ///
    /// Every segment gets a uniform draw from its value's range, rendered as
    /// lowercase hex padded to the segment width.
    pub fn draw_into(&mut self, model: &Model, state: &AbstractState, line: &mut String) {
        line.clear();
        for (vertex, &value) in model.vertices().iter().zip(state.assignment()) {
            let range = vertex.segment_value(value);
            let n = self.rng.random_range(range.start..=range.stop);
            let _ = write!(line, "{:0width$x}", n, width = vertex.segment().width());
        }
    }

    /// Draws one address literal for `state`.
    pub fn draw(&mut self, model: &Model, state: &AbstractState) -> String {
        let mut line = String::with_capacity(model.address_width());
        self.draw_into(model, state, &mut line);
        line
    }

    /// Writes `clamp(state, budget)` independent addresses of `state` to
    /// `out`, one per line, and returns how many were written.
    ///
    /// Addresses are not deduplicated.
    pub fn materialize<W: Write>(
        &mut self,
        model: &Model,
        state: &AbstractState,
        budget: f64,
        out: &mut W,
    ) -> io::Result<u64> {
        let count = self.clamp(state, budget);
        let mut line = std::mem::take(&mut self.line);
        for _ in 0..count {
            self.draw_into(model, state, &mut line);
            line.push('\n');
            if let Err(e) = out.write_all(line.as_bytes()) {
                self.line = line;
                return Err(e);
            }
        }
        self.line = line;
        Ok(count)
    }
}
