#![deny(trivial_casts, trivial_numeric_casts, unused_import_braces)]
//! # Entropy/IP address generator
//!
//! This library generates IPv6 target addresses from an Entropy/IP model: a
//! Bayesian network over fixed-width segments of the 32 hex digit address
//! representation.
//!
//! Generation has three stages:
//!
//! 1. **Traversal** ([`traverse`]) enumerates complete assignments of
//!    segment values, skipping any partial assignment whose probability falls
//!    below a threshold.
//! 2. **Batching** ([`Batcher`]) adds up state probabilities until they are
//!    worth at least one of the `N` requested addresses.
//! 3. **Sampling** ([`Sampler`]) draws that many random addresses from the
//!    state that crossed the quota.
//!
//! [`Generator`] ties the stages together.
//!
//! ## Input Format
//!
//! Models are read from the text format produced by `eip-convert.py`:
//!
//! ```text
//! >A:  0-3  (bits   1-16 )
//! >B:  4-31 (bits  17-128)
//! =A0  convert  60.00% 0-7
//! =A1  convert  40.00% 8-f
//! =B0  convert 100.00% 0-ffffff
//! { "A": { "parents": [], "values": ["0", "1"], "": { "0": 0.6 } },
//!   "B": { "parents": ["A"], "values": ["0"], "0": {}, "1": {} } }
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use eipgen::{open_model, Generator, GeneratorConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = Arc::new(open_model("test-data/two-vertex.eip")?);
//!     let config = GeneratorConfig::default().target_count(100);
//!
//!     let mut out = Vec::new();
//!     let summary = Generator::new(model, config)?.run(rand::rng(), &mut out)?;
//!     println!("wrote {} addresses", summary.addresses);
//!     Ok(())
//! }
//! ```
//!
//! ## Thread Safety
//!
//! A [`Model`] is immutable once built and is shared between traversal tasks
//! through an `Arc`. Each [`Sampler`] owns its random source.

mod config;
mod error;
mod generator;
mod input;
mod model;
mod sampler;
mod segment;
mod traversal;

pub use config::GeneratorConfig;
pub use error::GeneratorError;
pub use generator::{Batcher, Generator, Summary};
pub use input::{open_model, read_model};
pub use model::{Cpd, Lookup, Model, Vertex};
pub use sampler::Sampler;
pub use segment::{Segment, SegmentTable, SegmentValue, ADDRESS_NYBBLES};
pub use traversal::{traverse, AbstractState, States, TraversalOptions, TraversalReport};

#[cfg(test)]
mod generator_test;
