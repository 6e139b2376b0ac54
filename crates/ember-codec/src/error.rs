//! Error types for tagged-record encoding and decoding

use crate::tag::Tag;
use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while writing or reading tagged records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    // === Reader ===
    /// Input ended in the middle of a record
    #[error("Truncated record at offset {offset}")]
    Truncated { offset: usize },

    /// A record carried a different tag than the caller expected
    #[error("Unexpected tag at offset {offset}: expected {expected}, found {found}")]
    UnexpectedTag {
        offset: usize,
        expected: Tag,
        found: Tag,
    },

    /// Length octets are malformed or exceed the enclosing record
    #[error("Invalid length at offset {offset}")]
    InvalidLength { offset: usize },

    /// Indefinite-length form is not supported
    #[error("Indefinite length at offset {offset} is not supported")]
    IndefiniteLength { offset: usize },

    /// Integer does not fit the requested width
    #[error("Integer overflow at offset {offset}")]
    IntegerOverflow { offset: usize },

    /// String payload is not valid UTF-8
    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// High-form tag number does not fit in 32 bits
    #[error("Tag number overflow at offset {offset}")]
    TagNumberOverflow { offset: usize },

    // === Writer ===
    /// `end_sequence` called with no open sequence
    #[error("end_sequence called without a matching start_sequence")]
    UnbalancedSequence,

    /// `finish` called while sequences are still open
    #[error("{0} sequence(s) still open at finish")]
    UnclosedSequences(usize),
}

impl CodecError {
    /// Byte offset the reader was at when the error was detected
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Truncated { offset }
            | Self::UnexpectedTag { offset, .. }
            | Self::InvalidLength { offset }
            | Self::IndefiniteLength { offset }
            | Self::IntegerOverflow { offset }
            | Self::InvalidUtf8 { offset }
            | Self::TagNumberOverflow { offset } => Some(*offset),
            Self::UnbalancedSequence | Self::UnclosedSequences(_) => None,
        }
    }
}
