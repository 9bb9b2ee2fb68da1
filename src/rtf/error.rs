//! Error types for RTF parsing, editing and merging.

use thiserror::Error;

/// Result type for RTF operations.
pub type RtfResult<T> = Result<T, RtfError>;

/// RTF errors.
#[derive(Error, Debug)]
pub enum RtfError {
    /// Reading or writing an RTF stream failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Groups were still open when the token stream ended
    #[error("Malformed RTF document: {depth} group(s) left open at end of input")]
    UnbalancedGroups { depth: usize },

    /// A `}` appeared with no group open
    #[error("Malformed RTF document: unexpected group end at byte {offset}")]
    UnexpectedGroupEnd { offset: usize },

    /// A structural edit would break a tree invariant
    #[error("Invalid RTF structure: {0}")]
    InvalidStructure(String),

    /// A node handle that does not belong to the tree
    #[error("Node does not belong to this tree")]
    UnknownNode,

    /// Placeholder text that cannot be searched for
    #[error("Invalid placeholder: {0}")]
    InvalidPlaceholder(String),

    /// Code page without an available encoding
    #[error("Unsupported code page: {0}")]
    UnsupportedCodePage(u32),
}

impl RtfError {
    /// Whether the error describes malformed input rather than a failed
    /// operation. A tree loaded with such an error still holds everything
    /// parsed up to the failure.
    #[inline]
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            RtfError::UnbalancedGroups { .. } | RtfError::UnexpectedGroupEnd { .. }
        )
    }
}
