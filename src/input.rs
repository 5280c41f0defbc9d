//! Reading a model from its line-oriented text form.
//!
//! The input mixes four kinds of lines, told apart by their first byte:
//!
//! - `/` entropy summary comments, ignored
//! - `>` segment descriptors, in letter order
//! - `=` segment values
//! - everything else is part of the JSON network description
//!
//! Comment, segment and value lines can be echoed to a writer as they are
//! read, so the generator output can carry its own model header.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use log::debug;

use crate::error::GeneratorError;
use crate::model::Model;
use crate::segment::{Segment, SegmentTable, SegmentValue};

/// Reads a model from `reader`, echoing non-network lines to `echo`.
pub fn read_model<R: Read>(
    reader: R,
    mut echo: Option<&mut dyn Write>,
) -> Result<Model, GeneratorError> {
    let mut table = SegmentTable::new();
    let mut network = String::new();

    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        let lineno = index + 1;

        match line.as_bytes().first() {
            Some(b'/') => {}
            Some(b'>') => {
                line.parse::<Segment>()
                    .and_then(|segment| table.push_segment(segment))
                    .map_err(|e| e.with_line(lineno))?;
            }
            Some(b'=') => {
                line.parse::<SegmentValue>()
                    .and_then(|value| table.push_value(value))
                    .map_err(|e| e.with_line(lineno))?;
            }
            _ => {
                network.push_str(line);
                network.push('\n');
                continue;
            }
        }

        if let Some(out) = echo.as_mut() {
            writeln!(out, "{line}")?;
        }
    }

    debug!(
        "read {} segments, {} bytes of network description",
        table.segments().len(),
        network.len()
    );

    Model::from_json(&network, table)
}

/// Reads a model from a file.
///
/// # Example
///
/// ```
/// let model = eipgen::open_model("test-data/two-vertex.eip").unwrap();
/// assert_eq!(model.address_width(), 32);
/// ```
pub fn open_model<P: AsRef<Path>>(path: P) -> Result<Model, GeneratorError> {
    let file = File::open(path)?;
    read_model(file, None)
}
