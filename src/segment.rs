//! Address segments and the values each segment can take.

use std::str::FromStr;

use crate::error::GeneratorError;

/// Number of hex digits (nybbles) in an IPv6 address.
pub const ADDRESS_NYBBLES: usize = 32;

/// Maps a segment letter (`A`..`Z`) to its ordinal.
pub(crate) fn ordinal_of(name: char) -> Option<usize> {
    if name.is_ascii_uppercase() {
        Some((name as u8 - b'A') as usize)
    } else {
        None
    }
}

/// A fixed-width field of the 32 hex digit address representation.
///
/// Offsets are inclusive nybble positions, so `A: 0-3` covers the first
/// 16 bits of the address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    name: char,
    start: usize,
    stop: usize,
}

impl Segment {
    /// Creates a segment covering nybbles `start..=stop`.
    pub fn new(name: char, start: usize, stop: usize) -> Result<Self, GeneratorError> {
        if ordinal_of(name).is_none() {
            return Err(GeneratorError::invalid_segment(format!(
                "segment name '{name}' is not a letter A-Z"
            )));
        }
        if start > stop || stop >= ADDRESS_NYBBLES {
            return Err(GeneratorError::invalid_segment(format!(
                "segment {name}: range {start}-{stop} is outside 0-{}",
                ADDRESS_NYBBLES - 1
            )));
        }
        Ok(Segment { name, start, stop })
    }

    /// Segment letter.
    pub fn name(&self) -> char {
        self.name
    }

    /// Position of this segment, equal to its network vertex ordinal.
    pub fn ordinal(&self) -> usize {
        (self.name as u8 - b'A') as usize
    }

    /// First nybble covered.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last nybble covered.
    pub fn stop(&self) -> usize {
        self.stop
    }

    /// Number of hex digits this segment renders to.
    pub fn width(&self) -> usize {
        self.stop - self.start + 1
    }

    /// Largest value representable in this segment's width.
    pub fn max_value(&self) -> u128 {
        if self.width() >= ADDRESS_NYBBLES {
            u128::MAX
        } else {
            (1u128 << (4 * self.width())) - 1
        }
    }
}

/// Parses a segment descriptor line such as `>A:  0-3  (bits   1-16 )`.
///
/// Only the name and the first token after the colon are significant; the
/// bit annotation is informational.
impl FromStr for Segment {
    type Err = GeneratorError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let body = line
            .strip_prefix('>')
            .ok_or_else(|| GeneratorError::invalid_segment("line does not start with '>'"))?;
        let (name, rest) = body
            .split_once(':')
            .ok_or_else(|| GeneratorError::invalid_segment("missing ':' after segment name"))?;

        let mut chars = name.trim().chars();
        let name = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(GeneratorError::invalid_segment(format!(
                    "segment name '{name}' is not a single letter"
                )))
            }
        };

        let range = rest.split_whitespace().next().ok_or_else(|| {
            GeneratorError::invalid_segment(format!("segment {name}: missing nybble range"))
        })?;
        let (start, stop) = range.split_once('-').ok_or_else(|| {
            GeneratorError::invalid_segment(format!("segment {name}: malformed range '{range}'"))
        })?;
        let parse = |s: &str| {
            s.parse::<usize>().map_err(|e| {
                GeneratorError::invalid_segment(format!("segment {name}: '{s}': {e}"))
            })
        };

        Segment::new(name, parse(start)?, parse(stop)?)
    }
}

/// One symbolic value of a segment: an inclusive numeric range together with
/// the frequency it was observed at.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentValue {
    /// Value code, e.g. `A0`.
    pub code: String,
    /// Name of the mining stage that produced the value, e.g. `convert`.
    pub miner: String,
    /// First value of the range.
    pub start: u128,
    /// Last value of the range (inclusive).
    pub stop: u128,
    /// Observed frequency as a fraction of all addresses.
    pub frequency: f64,
}

impl SegmentValue {
    /// Number of distinct numbers this value covers.
    pub fn cardinality(&self) -> f64 {
        (self.stop - self.start) as f64 + 1.0
    }

    /// Letter of the segment this value belongs to, taken from its code.
    pub fn segment_name(&self) -> Option<char> {
        self.code.chars().next()
    }
}

/// Parses a segment value line such as `=A0  convert  60.00% 0-7`.
///
/// The last token is either a single hex number or a `start-stop` hex range.
impl FromStr for SegmentValue {
    type Err = GeneratorError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let body = line.strip_prefix('=').ok_or_else(|| {
            GeneratorError::invalid_segment_value("line does not start with '='")
        })?;
        let fields: Vec<&str> = body.split_whitespace().collect();
        let [code, miner, frequency, range] = fields[..] else {
            return Err(GeneratorError::invalid_segment_value(format!(
                "expected 4 fields, found {}",
                fields.len()
            )));
        };

        if !code.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            return Err(GeneratorError::invalid_segment_value(format!(
                "code '{code}' does not start with a segment letter"
            )));
        }

        let frequency = frequency
            .strip_suffix('%')
            .unwrap_or(frequency)
            .parse::<f64>()
            .map_err(|e| {
                GeneratorError::invalid_segment_value(format!(
                    "{code}: frequency '{frequency}': {e}"
                ))
            })?
            / 100.0;

        let parse = |s: &str| {
            u128::from_str_radix(s, 16).map_err(|e| {
                GeneratorError::invalid_segment_value(format!("{code}: value '{s}': {e}"))
            })
        };
        let (start, stop) = match range.split_once('-') {
            Some((start, stop)) => (parse(start)?, parse(stop)?),
            None => {
                let v = parse(range)?;
                (v, v)
            }
        };
        if stop < start {
            return Err(GeneratorError::invalid_segment_value(format!(
                "{code}: range {range} is reversed"
            )));
        }

        Ok(SegmentValue {
            code: code.to_owned(),
            miner: miner.to_owned(),
            start,
            stop,
            frequency,
        })
    }
}

/// Segments in ordinal order together with the values of each.
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    segments: Vec<Segment>,
    values: Vec<Vec<SegmentValue>>,
}

impl SegmentTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the next segment. Segments must arrive in letter order.
    pub fn push_segment(&mut self, segment: Segment) -> Result<(), GeneratorError> {
        if segment.ordinal() != self.segments.len() {
            return Err(GeneratorError::invalid_segment(format!(
                "segment {} out of order, expected {}",
                segment.name(),
                (b'A' + self.segments.len() as u8) as char
            )));
        }
        self.segments.push(segment);
        self.values.push(Vec::new());
        Ok(())
    }

    /// Appends a value to the segment named by its code.
    pub fn push_value(&mut self, value: SegmentValue) -> Result<(), GeneratorError> {
        let segment = value
            .segment_name()
            .and_then(ordinal_of)
            .and_then(|ordinal| self.segments.get(ordinal))
            .ok_or_else(|| {
                GeneratorError::invalid_segment_value(format!(
                    "value {} refers to an undeclared segment",
                    value.code
                ))
            })?;
        if value.stop > segment.max_value() {
            return Err(GeneratorError::invalid_segment_value(format!(
                "value {} ({:x}-{:x}) does not fit in {} hex digits",
                value.code,
                value.start,
                value.stop,
                segment.width()
            )));
        }
        let ordinal = segment.ordinal();
        self.values[ordinal].push(value);
        Ok(())
    }

    /// All segments in ordinal order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Values of the segment at `ordinal`, in input order.
    pub fn values(&self, ordinal: usize) -> &[SegmentValue] {
        self.values.get(ordinal).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of hex digits covered by all segments.
    pub fn address_width(&self) -> usize {
        self.segments.iter().map(Segment::width).sum()
    }

    pub(crate) fn into_parts(self) -> (Vec<Segment>, Vec<Vec<SegmentValue>>) {
        (self.segments, self.values)
    }
}
