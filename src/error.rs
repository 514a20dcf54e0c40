use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid UTF-8 input: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// A line that could not be parsed. Parsing stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: {line:?} {kind}")]
pub struct FormatError {
    /// 1-based line number after newline normalization.
    pub line_number: u32,
    /// Exact text of the offending line.
    pub line: String,
    pub kind: FormatErrorKind,
}

impl FormatError {
    pub(crate) fn new(line_number: u32, line: &str, kind: FormatErrorKind) -> Self {
        Self {
            line_number,
            line: line.to_owned(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatErrorKind {
    #[error("doesn't match format")]
    Malformed,
    #[error("has an unset variable `{name}`")]
    UnsetVariable { name: String },
}
