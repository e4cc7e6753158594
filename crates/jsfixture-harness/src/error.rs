//! Harness error types

use thiserror::Error;

/// Malformed fixture text. Aborts discovery for the file it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unterminated block comment")]
    UnterminatedComment { line: usize },

    #[error("line {line}: OUTPUT block is never closed with */")]
    UnterminatedOutput { line: usize },

    #[error("line {line}: unknown output mode '{tag}'")]
    UnknownMode { line: usize, tag: String },

    #[error("line {line}: Index {found} does not follow Index {previous}")]
    NonMonotonicIndex {
        line: usize,
        previous: u64,
        found: u64,
    },
}

impl ParseError {
    /// 1-based source line the error points at
    pub fn line(&self) -> usize {
        match self {
            Self::UnterminatedComment { line }
            | Self::UnterminatedOutput { line }
            | Self::UnknownMode { line, .. }
            | Self::NonMonotonicIndex { line, .. } => *line,
        }
    }
}

/// Errors surfaced by the harness itself. Script failures are data, never one of these.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{path}: {source}")]
    Parse { path: String, source: ParseError },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid override pattern '{pattern}': {source}")]
    InvalidOverride {
        pattern: String,
        source: regex::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::NonMonotonicIndex {
            line: 12,
            previous: 4,
            found: 3,
        };
        assert_eq!(err.line(), 12);
        assert_eq!(err.to_string(), "line 12: Index 3 does not follow Index 4");

        let wrapped = HarnessError::Parse {
            path: "Promise.js".to_string(),
            source: ParseError::UnknownMode {
                line: 3,
                tag: "OUTPUT-LATER".to_string(),
            },
        };
        assert_eq!(
            wrapped.to_string(),
            "Promise.js: line 3: unknown output mode 'OUTPUT-LATER'"
        );
    }
}
