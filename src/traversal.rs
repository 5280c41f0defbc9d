//! Pruned, partially parallel enumeration of model states.
//!
//! The traversal assigns one value to each vertex in ordinal order, keeping
//! the running joint probability and address count. A branch is abandoned as
//! soon as its probability drops below the prune threshold, or when the
//! network has no distribution for the parents' values. Complete assignments
//! are sent to a channel and read back through [`States`].
//!
//! Branches at vertices below the parallel depth are spawned into a scope on
//! a thread pool owned by the traversal, and the scope doubles as the
//! completion barrier: the channel closes when the scope returns. Deeper
//! vertices recurse sequentially inside the task that reached them. The
//! number of logical tasks is the product of the surviving branching factors
//! of the first `parallel_depth` vertices and is not capped here; the pool
//! bounds the threads that run them.
//!
//! The pool is never rayon's global one, so a consumer blocked on the stream
//! from a global worker cannot starve the producers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, trace};

use crate::error::GeneratorError;
use crate::model::{Lookup, Model};

/// Options for a traversal.
///
/// # Example
///
/// ```
/// use eipgen::TraversalOptions;
///
/// let opts = TraversalOptions::default()
///     .prune_threshold(1e-9)
///     .parallel_depth(2)
///     .queue_capacity(4096);
/// assert_eq!(opts.depth(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraversalOptions {
    prune_threshold: f64,
    parallel_depth: usize,
    queue_capacity: Option<usize>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        TraversalOptions {
            prune_threshold: 0.0,
            parallel_depth: 4,
            queue_capacity: None,
        }
    }
}

impl TraversalOptions {
    /// Abandon partial assignments whose probability is below `threshold`.
    #[must_use]
    pub fn prune_threshold(mut self, threshold: f64) -> Self {
        self.prune_threshold = threshold;
        self
    }

    /// Spawn one task per surviving value at vertices below `depth`.
    #[must_use]
    pub fn parallel_depth(mut self, depth: usize) -> Self {
        self.parallel_depth = depth;
        self
    }

    /// Use a bounded output queue; producers block while it is full.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// The prune threshold.
    pub fn threshold(&self) -> f64 {
        self.prune_threshold
    }

    /// The parallel depth.
    pub fn depth(&self) -> usize {
        self.parallel_depth
    }

    /// The output queue bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.queue_capacity
    }
}

/// A complete assignment of values to all vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractState {
    assignment: Vec<usize>,
    probability: f64,
    cardinality: f64,
}

impl AbstractState {
    /// Value index chosen for each vertex, in ordinal order.
    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    /// Joint probability of the assignment.
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Number of addresses covered by the assignment.
    pub fn cardinality(&self) -> f64 {
        self.cardinality
    }

    /// Probability per covered address.
    pub fn density(&self) -> f64 {
        self.probability / self.cardinality
    }

    /// The assignment as network symbols, e.g. `["0", "3", "1"]`.
    pub fn symbols<'m>(&self, model: &'m Model) -> Vec<&'m str> {
        self.assignment
            .iter()
            .zip(model.vertices())
            .map(|(&value, vertex)| vertex.symbol(value))
            .collect()
    }
}

/// Counters collected over one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalReport {
    /// States sent to the consumer.
    pub states: u64,
    /// Tasks spawned above the parallel depth.
    pub tasks: u64,
    /// Branches abandoned below the prune threshold.
    pub pruned: u64,
    /// Branches abandoned because the parents' values had no distribution.
    pub unreachable: u64,
}

#[derive(Debug, Default)]
struct Counters {
    states: AtomicU64,
    tasks: AtomicU64,
    pruned: AtomicU64,
    unreachable: AtomicU64,
}

impl Counters {
    fn report(&self) -> TraversalReport {
        TraversalReport {
            states: self.states.load(Ordering::Relaxed),
            tasks: self.tasks.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            unreachable: self.unreachable.load(Ordering::Relaxed),
        }
    }
}

/// Lazy stream of states produced by [`traverse`].
///
/// States arrive in no particular order across parallel branches. Dropping
/// the stream early makes the producers stop at their next emission.
#[derive(Debug)]
pub struct States {
    rx: Receiver<AbstractState>,
    handle: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl Iterator for States {
    type Item = AbstractState;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

impl States {
    /// Stops reading, waits for the traversal to end and returns its counters.
    pub fn finish(self) -> Result<TraversalReport, GeneratorError> {
        let States {
            rx,
            handle,
            counters,
        } = self;
        drop(rx);
        handle
            .join()
            .map_err(|_| GeneratorError::traversal("traversal thread panicked"))?;
        Ok(counters.report())
    }
}

/// Starts enumerating the states of `model` on a background thread.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use eipgen::{traverse, Model, SegmentTable, Segment, TraversalOptions};
///
/// let mut table = SegmentTable::new();
/// table.push_segment(Segment::new('A', 0, 31).unwrap()).unwrap();
/// table.push_value("=A0 convert 70% 0-f".parse().unwrap()).unwrap();
/// table.push_value("=A1 convert 30% 10".parse().unwrap()).unwrap();
/// let model = Model::from_json(
///     r#"{ "A": { "parents": [], "values": ["0", "1"], "": { "0": 0.7 } } }"#,
///     table,
/// ).unwrap();
///
/// let states: Vec<_> = traverse(Arc::new(model), TraversalOptions::default())
///     .unwrap()
///     .collect();
/// assert_eq!(states.len(), 2);
/// ```
pub fn traverse(model: Arc<Model>, options: TraversalOptions) -> Result<States, GeneratorError> {
    let (tx, rx) = match options.queue_capacity {
        Some(capacity) => bounded(capacity),
        None => unbounded(),
    };
    let counters = Arc::new(Counters::default());
    let worker_counters = Arc::clone(&counters);

    debug!(
        "traversing {} vertices, threshold {:e}, parallel depth {}",
        model.len(),
        options.prune_threshold,
        options.parallel_depth
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("eip-walk-{i}"))
        .build()
        .map_err(|e| GeneratorError::traversal(format!("cannot build traversal pool: {e}")))?;

    let handle = thread::Builder::new()
        .name("eip-traversal".to_owned())
        .spawn(move || {
            let walker = Walker {
                model: model.as_ref(),
                threshold: options.prune_threshold,
                parallel_depth: options.parallel_depth,
                tx,
                counters: worker_counters.as_ref(),
                disconnected: AtomicBool::new(false),
            };
            pool.scope(|scope| {
                let mut assignment = Vec::with_capacity(walker.model.len());
                walker.dive(scope, &mut assignment, 1.0, 1.0);
            });
            debug!("traversal done: {:?}", worker_counters.report());
        })
        .map_err(|e| GeneratorError::traversal(format!("cannot start traversal thread: {e}")))?;

    Ok(States {
        rx,
        handle,
        counters,
    })
}

struct Walker<'a> {
    model: &'a Model,
    threshold: f64,
    parallel_depth: usize,
    tx: Sender<AbstractState>,
    counters: &'a Counters,
    disconnected: AtomicBool,
}

impl Walker<'_> {
    fn dive<'s>(
        &'s self,
        scope: &rayon::Scope<'s>,
        assignment: &mut Vec<usize>,
        probability: f64,
        cardinality: f64,
    ) {
        if self.disconnected.load(Ordering::Relaxed) {
            return;
        }

        let vid = assignment.len();
        let Some(vertex) = self.model.vertices().get(vid) else {
            self.emit(assignment, probability, cardinality);
            return;
        };

        let parent_values: Vec<usize> = vertex.parents().iter().map(|&p| assignment[p]).collect();
        let cpd = match vertex.distribution(&parent_values) {
            Lookup::Distribution(cpd) => cpd,
            Lookup::NoDistribution => {
                self.counters.unreachable.fetch_add(1, Ordering::Relaxed);
                trace!(
                    "no distribution for {} given parent values {:?}",
                    vertex.name(),
                    parent_values
                );
                return;
            }
        };

        for value in 0..vertex.value_count() {
            let p = probability * cpd.probability(value);
            if p < self.threshold {
                self.counters.pruned.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            let c = cardinality * vertex.cardinality(value);

            if vid < self.parallel_depth {
                let mut branch = Vec::with_capacity(self.model.len());
                branch.extend_from_slice(assignment);
                branch.push(value);
                self.counters.tasks.fetch_add(1, Ordering::Relaxed);
                scope.spawn(move |scope| {
                    let mut branch = branch;
                    self.dive(scope, &mut branch, p, c);
                });
            } else {
                assignment.push(value);
                self.dive(scope, assignment, p, c);
                assignment.pop();
            }
        }
    }

    fn emit(&self, assignment: &[usize], probability: f64, cardinality: f64) {
        let state = AbstractState {
            assignment: assignment.to_vec(),
            probability,
            cardinality,
        };
        if self.tx.send(state).is_ok() {
            self.counters.states.fetch_add(1, Ordering::Relaxed);
        } else if !self.disconnected.swap(true, Ordering::Relaxed) {
            debug!("state consumer went away, stopping traversal");
        }
    }
}
