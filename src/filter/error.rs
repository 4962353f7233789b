use thiserror::Error;

/// Errors that can occur when compiling filter expressions
///
/// Positions are byte offsets into the trimmed filter text.
#[derive(Debug, Error)]
pub enum FilterParseError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Invalid regex '{pattern}' at position {position}: {source}")]
    InvalidRegex {
        position: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl FilterParseError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        FilterParseError::Syntax {
            position,
            message: message.into(),
        }
    }

    /// Byte offset of the offending token
    pub fn position(&self) -> usize {
        match self {
            FilterParseError::Syntax { position, .. } => *position,
            FilterParseError::InvalidRegex { position, .. } => *position,
        }
    }
}
