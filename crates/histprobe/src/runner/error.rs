use crate::model::{ErrorCode, ErrorInfo};
use miette::Diagnostic;
use serde_json::Value;
use std::fmt;

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error raised anywhere in the harness.
///
/// Carries a stable [`ErrorCode`], a short message and optional structured
/// context that is copied verbatim into JSON reports.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct HarnessError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<Value>,
}

impl HarnessError {
    pub fn new(code: ErrorCode, message: impl Into<String>, context: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            context,
        }
    }

    pub fn timeout(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Timeout, message, context.into())
    }

    pub fn process_exit(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::ProcessExit, message, context.into())
    }

    pub fn protocol(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Protocol, message, context.into())
    }

    pub fn io(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Io,
            message,
            Some(serde_json::json!({ "source": err.to_string() })),
        )
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code,
            message: self.message.clone(),
            context: self.context.clone(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

impl Diagnostic for HarnessError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let hint = match self.code {
            ErrorCode::Timeout => "check that --prompt matches what the shell prints when idle",
            ErrorCode::ProcessExit => "the shell exited early; run with -v to see its output",
            ErrorCode::MissingArtifact => {
                "the shell did not write its history log; check the namespace and data directory"
            }
            _ => return None,
        };
        Some(Box::new(hint))
    }
}

impl From<HarnessError> for ErrorInfo {
    fn from(err: HarnessError) -> Self {
        ErrorInfo {
            code: err.code,
            message: err.message,
            context: err.context,
        }
    }
}
