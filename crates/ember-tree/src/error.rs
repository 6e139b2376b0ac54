//! Error types for element tree operations

use ember_codec::{CodecError, Tag};
use thiserror::Error;

use crate::element::ElementId;

/// Result type alias for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors that can occur while encoding, decoding or merging elements
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Malformed or truncated tagged record
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Update called with an element of a different identity
    #[error(
        "Attempt to update different element: number {expected_number}/{found_number} \
         tag {expected_tag}/{found_tag}"
    )]
    IdentityMismatch {
        expected_number: i32,
        found_number: i32,
        expected_tag: Tag,
        found_tag: Tag,
    },

    /// Handle refers to an element that has been freed
    #[error("Stale element handle: {0:?}")]
    StaleElement(ElementId),

    /// Child is the parent itself or one of its ancestors
    #[error("Element {0:?} cannot become its own descendant")]
    CyclicChild(ElementId),

    /// Content record found for a tag with no registered factory
    #[error("No content factory registered for {tag}")]
    NoContentFactory { tag: Tag },

    /// Address record is neither a number nor a path
    #[error("Unexpected address encoding in {tag}")]
    UnexpectedAddress { tag: Tag },

    /// Element number that has no path component, or the reverse
    #[error("Element number {0} is outside the path range")]
    NumberOutOfRange(i64),

    /// Path does not resolve in the resident tree
    #[error("Unresolved path: {0}")]
    UnresolvedPath(String),

    /// Signal number outside the encodable range
    #[error("Invalid signal number: {0}")]
    InvalidSignal(i64),

    /// Error annotated with the frame it occurred in
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<TreeError>,
    },
}

impl TreeError {
    /// Wrap this error with positional context
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any context wrappers
    pub fn root_cause(&self) -> &TreeError {
        let mut err = self;
        while let Self::Context { source, .. } = err {
            err = source;
        }
        err
    }

    pub fn is_identity_mismatch(&self) -> bool {
        matches!(self.root_cause(), Self::IdentityMismatch { .. })
    }

    pub fn is_codec(&self) -> bool {
        matches!(self.root_cause(), Self::Codec(_))
    }
}

/// Attach context to the error of a fallible step
pub(crate) trait ResultExt<T> {
    fn frame<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: Into<TreeError>> ResultExt<T> for std::result::Result<T, E> {
    fn frame<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| err.into().context(context()))
    }
}
