use std::fmt;

/// An error from loading or parsing a `.tsx` tileset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsxError {
    pub message: String,
    /// 1-based source line, or 0 when the error has no source position
    /// (e.g. the file could not be read).
    pub line: usize,
    /// 1-based source column, or 0 alongside `line == 0`.
    pub column: usize,
}

impl TsxError {
    pub(crate) fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }

    pub(crate) fn unpositioned(message: impl Into<String>) -> Self {
        Self::new(message, 0, 0)
    }
}

impl fmt::Display for TsxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "tsx error: {}", self.message)
        } else {
            write!(
                f,
                "tsx error at {}:{}: {}",
                self.line, self.column, self.message
            )
        }
    }
}

impl std::error::Error for TsxError {}

pub type TsxResult<T> = Result<T, TsxError>;
