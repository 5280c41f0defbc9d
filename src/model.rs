//! The Bayesian network over address segments.
//!
//! A [`Model`] is an arena of [`Vertex`] records addressed by ordinal. Every
//! cross reference (parents, segment values, distribution keys) is resolved
//! to an index when the model is built, so the traversal never touches
//! strings and the whole structure can be shared read-only between threads.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::debug;
use serde::Deserialize;

use crate::error::GeneratorError;
use crate::segment::{ordinal_of, Segment, SegmentTable, SegmentValue};

/// Conditional distribution of one vertex for one combination of parent
/// values.
///
/// Values missing from the table share the residual mass evenly through the
/// wildcard probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Cpd {
    explicit: Vec<Option<f64>>,
    wildcard: f64,
}

impl Cpd {
    fn new(explicit: Vec<Option<f64>>) -> Self {
        let listed = explicit.iter().flatten().count();
        let unlisted = explicit.len() - listed;
        let wildcard = if unlisted > 0 {
            let sum: f64 = explicit.iter().flatten().sum();
            (1.0 - sum) / unlisted as f64
        } else {
            0.0
        };
        Cpd { explicit, wildcard }
    }

    /// Probability of the value at `index`.
    #[inline]
    pub fn probability(&self, index: usize) -> f64 {
        self.explicit
            .get(index)
            .copied()
            .flatten()
            .unwrap_or(self.wildcard)
    }

    /// Explicitly listed probability of the value at `index`, if any.
    pub fn explicit(&self, index: usize) -> Option<f64> {
        self.explicit.get(index).copied().flatten()
    }

    /// Residual probability assigned to each unlisted value.
    pub fn wildcard(&self) -> f64 {
        self.wildcard
    }

    /// Number of values without an explicit probability.
    pub fn unlisted(&self) -> usize {
        self.explicit.iter().filter(|p| p.is_none()).count()
    }

    /// Explicit mass plus wildcard mass over all unlisted values.
    pub fn total_mass(&self) -> f64 {
        let explicit: f64 = self.explicit.iter().flatten().sum();
        explicit + self.wildcard * self.unlisted() as f64
    }
}

/// Result of looking up a vertex's distribution for a parent assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// The network has a distribution for this parent combination.
    Distribution(&'a Cpd),
    /// The parent combination never occurred while the network was learned.
    NoDistribution,
}

/// One network node, aligned with the segment of the same ordinal.
#[derive(Debug, Clone)]
pub struct Vertex {
    segment: Segment,
    parents: Vec<usize>,
    symbols: Vec<String>,
    values: Vec<SegmentValue>,
    cardinalities: Vec<f64>,
    cpds: HashMap<Vec<usize>, Cpd>,
}

impl Vertex {
    /// Segment letter, also the vertex name.
    pub fn name(&self) -> char {
        self.segment.name()
    }

    /// Position of the vertex in the model.
    pub fn ordinal(&self) -> usize {
        self.segment.ordinal()
    }

    /// The address segment this vertex describes.
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Ordinals of the parent vertices, all smaller than this vertex's.
    pub fn parents(&self) -> &[usize] {
        &self.parents
    }

    /// Number of values this vertex can take.
    pub fn value_count(&self) -> usize {
        self.symbols.len()
    }

    /// Symbol of the value at `index`, as written in the network.
    pub fn symbol(&self, index: usize) -> &str {
        &self.symbols[index]
    }

    /// Segment value backing the value at `index`.
    pub fn segment_value(&self, index: usize) -> &SegmentValue {
        &self.values[index]
    }

    /// Number of addresses covered by the value at `index`.
    #[inline]
    pub fn cardinality(&self, index: usize) -> f64 {
        self.cardinalities[index]
    }

    /// Distribution over this vertex's values given the parents' value
    /// indices, listed in the order of [`Vertex::parents`].
    pub fn distribution(&self, parent_values: &[usize]) -> Lookup<'_> {
        match self.cpds.get(parent_values) {
            Some(cpd) => Lookup::Distribution(cpd),
            None => Lookup::NoDistribution,
        }
    }

    /// All populated distributions keyed by parent value indices.
    pub fn distributions(&self) -> impl Iterator<Item = (&[usize], &Cpd)> {
        self.cpds.iter().map(|(k, v)| (k.as_slice(), v))
    }
}

#[derive(Deserialize, Debug)]
struct RawVertex {
    parents: Vec<String>,
    values: Vec<String>,
    #[serde(flatten)]
    cpds: BTreeMap<String, BTreeMap<String, f64>>,
}

/// An immutable Bayesian network over address segments.
#[derive(Debug, Clone)]
pub struct Model {
    vertices: Vec<Vertex>,
}

impl Model {
    /// Builds a model from the JSON network description and the segments it
    /// refers to.
    ///
    /// Every vertex must name a declared segment, each value symbol must be
    /// the index of one of that segment's values, parents must precede their
    /// children, and distribution keys must list one value per parent.
    pub fn from_json(json: &str, table: SegmentTable) -> Result<Model, GeneratorError> {
        let raw: BTreeMap<String, RawVertex> = serde_json::from_str(json)?;
        let (segments, segment_values) = table.into_parts();

        if raw.len() != segments.len() {
            return Err(GeneratorError::invalid_network(format!(
                "network has {} vertices but {} segments are declared",
                raw.len(),
                segments.len()
            )));
        }

        // first pass: place vertices and resolve their value symbols
        let mut slots: Vec<Option<(Vertex, BTreeMap<String, BTreeMap<String, f64>>)>> =
            Vec::with_capacity(segments.len());
        slots.resize_with(segments.len(), || None);
        for (name, rv) in raw {
            let ordinal = vertex_ordinal(&name)?;
            let segment = segments.get(ordinal).ok_or_else(|| {
                GeneratorError::invalid_network(format!("vertex {name} has no segment"))
            })?;

            let mut parents = Vec::with_capacity(rv.parents.len());
            for parent in &rv.parents {
                let pid = vertex_ordinal(parent)?;
                if pid >= ordinal {
                    return Err(GeneratorError::invalid_network(format!(
                        "vertex {name} depends on {parent}, which does not precede it"
                    )));
                }
                parents.push(pid);
            }

            let available = &segment_values[ordinal];
            let mut values = Vec::with_capacity(rv.values.len());
            for (i, symbol) in rv.values.iter().enumerate() {
                if rv.values[..i].contains(symbol) {
                    return Err(GeneratorError::invalid_network(format!(
                        "vertex {name}: value '{symbol}' is listed twice"
                    )));
                }
                let value = symbol
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| available.get(i))
                    .ok_or_else(|| {
                        GeneratorError::invalid_network(format!(
                            "vertex {name}: value '{symbol}' is not one of the {} values of segment {name}",
                            available.len()
                        ))
                    })?;
                values.push(value.clone());
            }

            let vertex = Vertex {
                segment: segment.clone(),
                parents,
                cardinalities: values.iter().map(SegmentValue::cardinality).collect(),
                symbols: rv.values,
                values,
                cpds: HashMap::new(),
            };
            slots[ordinal] = Some((vertex, rv.cpds));
        }

        let mut pending = Vec::with_capacity(slots.len());
        for (ordinal, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(entry) => pending.push(entry),
                None => {
                    return Err(GeneratorError::invalid_network(format!(
                        "no vertex for segment {}",
                        segments[ordinal].name()
                    )))
                }
            }
        }

        // second pass: resolve distribution keys against parent symbols
        let mut vertices: Vec<Vertex> = Vec::with_capacity(pending.len());
        for (mut vertex, raw_cpds) in pending {
            for (key, table) in raw_cpds {
                let parent_values = resolve_key(&vertex, &vertices, &key)?;
                let mut explicit = vec![None; vertex.value_count()];
                for (symbol, probability) in table {
                    let index = vertex
                        .symbols
                        .iter()
                        .position(|s| *s == symbol)
                        .ok_or_else(|| {
                            GeneratorError::invalid_network(format!(
                                "vertex {}: distribution '{key}' lists unknown value '{symbol}'",
                                vertex.name()
                            ))
                        })?;
                    explicit[index] = Some(probability);
                }
                vertex.cpds.insert(parent_values, Cpd::new(explicit));
            }
            vertices.push(vertex);
        }

        debug!(
            "built model with {} vertices and {} distributions",
            vertices.len(),
            vertices.iter().map(|v| v.cpds.len()).sum::<usize>()
        );

        Ok(Model { vertices })
    }

    /// Vertices in ordinal order.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the model has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Length of a generated address literal in hex digits.
    pub fn address_width(&self) -> usize {
        self.vertices.iter().map(|v| v.segment.width()).sum()
    }
}

fn vertex_ordinal(name: &str) -> Result<usize, GeneratorError> {
    let mut chars = name.chars();
    match (chars.next().and_then(ordinal_of), chars.next()) {
        (Some(ordinal), None) => Ok(ordinal),
        _ => Err(GeneratorError::invalid_network(format!(
            "'{name}' is not a vertex name"
        ))),
    }
}

fn resolve_key(
    vertex: &Vertex,
    built: &[Vertex],
    key: &str,
) -> Result<Vec<usize>, GeneratorError> {
    if vertex.parents.is_empty() {
        if key.is_empty() {
            return Ok(Vec::new());
        }
        return Err(GeneratorError::invalid_network(format!(
            "root vertex {} has a distribution for parent state '{key}'",
            vertex.name()
        )));
    }

    let symbols: Vec<&str> = key.split(',').collect();
    if symbols.len() != vertex.parents.len() {
        return Err(GeneratorError::invalid_network(format!(
            "vertex {}: parent state '{key}' has {} values, expected {}",
            vertex.name(),
            symbols.len(),
            vertex.parents.len()
        )));
    }

    vertex
        .parents
        .iter()
        .zip(symbols)
        .map(|(&pid, symbol)| {
            let parent = &built[pid];
            parent
                .symbols
                .iter()
                .position(|s| s == symbol)
                .ok_or_else(|| {
                    GeneratorError::invalid_network(format!(
                        "vertex {}: parent state '{key}' uses unknown value '{symbol}' of {}",
                        vertex.name(),
                        parent.name()
                    ))
                })
        })
        .collect()
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for vertex in &self.vertices {
            writeln!(f, "{}:", vertex.name())?;
            let parents: Vec<char> = vertex
                .parents
                .iter()
                .map(|&p| self.vertices[p].name())
                .collect();
            writeln!(f, "  parents: {parents:?}")?;
            writeln!(f, "  values: {:?}", vertex.symbols)?;

            let mut keys: Vec<&Vec<usize>> = vertex.cpds.keys().collect();
            keys.sort();
            for key in keys {
                let label: Vec<&str> = key
                    .iter()
                    .zip(&vertex.parents)
                    .map(|(&v, &p)| self.vertices[p].symbol(v))
                    .collect();
                let cpd = &vertex.cpds[key];
                write!(f, "  [{}]:", label.join(","))?;
                for (i, symbol) in vertex.symbols.iter().enumerate() {
                    if let Some(p) = cpd.explicit(i) {
                        write!(f, " {symbol}={p:.4}")?;
                    }
                }
                if cpd.unlisted() > 0 {
                    write!(f, " *={:.4}", cpd.wildcard())?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
