//! Error types for model reading and address generation.

use std::io;

use thiserror::Error;

/// Error returned while reading a model or generating addresses.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GeneratorError {
    /// A `>` segment descriptor line is malformed or out of order.
    #[error("{}", format_line_error("invalid segment", .message, .line))]
    InvalidSegment {
        /// Description of what is invalid.
        message: String,
        /// 1-based input line where the error was detected.
        line: Option<usize>,
    },

    /// A `=` segment value line is malformed.
    #[error("{}", format_line_error("invalid segment value", .message, .line))]
    InvalidSegmentValue {
        /// Description of what is invalid.
        message: String,
        /// 1-based input line where the error was detected.
        line: Option<usize>,
    },

    /// The network description is structurally inconsistent with the
    /// segments it describes.
    #[error("invalid network: {message}")]
    InvalidNetwork {
        /// Description of what is invalid.
        message: String,
    },

    /// The network description is not valid JSON of the expected shape.
    #[error("malformed network description: {0}")]
    Json(
        #[from]
        #[source]
        serde_json::Error,
    ),

    /// An I/O error occurred while reading input or writing addresses.
    #[error("i/o error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),

    /// The generator configuration cannot be used.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what is invalid.
        message: String,
    },

    /// The traversal could not be started or did not run to completion.
    #[error("traversal failed: {message}")]
    Traversal {
        /// Description of the failure.
        message: String,
    },
}

fn format_line_error(kind: &str, message: &str, line: &Option<usize>) -> String {
    match line {
        Some(line) => format!("{kind} on line {line}: {message}"),
        None => format!("{kind}: {message}"),
    }
}

impl GeneratorError {
    /// Creates an InvalidSegment error with just a message.
    pub fn invalid_segment(message: impl Into<String>) -> Self {
        GeneratorError::InvalidSegment {
            message: message.into(),
            line: None,
        }
    }

    /// Creates an InvalidSegment error with message and input line.
    pub fn invalid_segment_at(message: impl Into<String>, line: usize) -> Self {
        GeneratorError::InvalidSegment {
            message: message.into(),
            line: Some(line),
        }
    }

    /// Creates an InvalidSegmentValue error with just a message.
    pub fn invalid_segment_value(message: impl Into<String>) -> Self {
        GeneratorError::InvalidSegmentValue {
            message: message.into(),
            line: None,
        }
    }

    /// Creates an InvalidSegmentValue error with message and input line.
    pub fn invalid_segment_value_at(message: impl Into<String>, line: usize) -> Self {
        GeneratorError::InvalidSegmentValue {
            message: message.into(),
            line: Some(line),
        }
    }

    /// Creates an InvalidNetwork error.
    pub fn invalid_network(message: impl Into<String>) -> Self {
        GeneratorError::InvalidNetwork {
            message: message.into(),
        }
    }

    /// Creates an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        GeneratorError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a Traversal error.
    pub fn traversal(message: impl Into<String>) -> Self {
        GeneratorError::Traversal {
            message: message.into(),
        }
    }

    /// Attaches an input line number to segment errors that lack one.
    pub(crate) fn with_line(self, line: usize) -> Self {
        match self {
            GeneratorError::InvalidSegment {
                message,
                line: None,
            } => GeneratorError::InvalidSegment {
                message,
                line: Some(line),
            },
            GeneratorError::InvalidSegmentValue {
                message,
                line: None,
            } => GeneratorError::InvalidSegmentValue {
                message,
                line: Some(line),
            },
            other => other,
        }
    }
}
