use thiserror::Error;

/// Outcome class carried by an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The request was not understood.
    What,
    /// The request was understood but could not be carried out.
    Fail,
}

impl ErrorCode {
    pub fn as_word(self) -> &'static str {
        match self {
            ErrorCode::What => "WHAT",
            ErrorCode::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckError {
    pub code: ErrorCode,
    pub message: String,
}

impl AckError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn what(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::What, message)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Fail, message)
    }
}

/// Failures tokenising or packing a wire line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),
    #[error("trailing backslash")]
    TrailingBackslash,
    #[error("message needs a tag and a word, got {0} word(s)")]
    TooFewWords(usize),
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Failures talking to a controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("controller has shut down")]
    ShutDown,
}
