//! The tagged result every tool hands back to the model.
//!
//! Internally an [`Outcome`] is a plain enum; only at the model-facing boundary is it
//! rendered as `Success: ...`, `Warning: ...` or `Error: ...` text.

use serde::{Deserialize, Serialize};
use std::fmt;

const SUCCESS_PREFIX: &str = "Success:";
const WARNING_PREFIX: &str = "Warning:";
const ERROR_PREFIX: &str = "Error:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum Outcome {
    Success(String),
    Warning(String),
    Error(String),
}

impl Outcome {
    pub fn success(detail: impl Into<String>) -> Self {
        Outcome::Success(detail.into())
    }

    pub fn warning(detail: impl Into<String>) -> Self {
        Outcome::Warning(detail.into())
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Outcome::Error(detail.into())
    }

    /// Parses text that already carries one of the recognized prefixes.
    pub fn parse(text: &str) -> Option<Self> {
        let strip = |prefix: &str| {
            text.strip_prefix(prefix)
                .map(|rest| rest.strip_prefix(' ').unwrap_or(rest).to_string())
        };

        if let Some(detail) = strip(SUCCESS_PREFIX) {
            Some(Outcome::Success(detail))
        } else if let Some(detail) = strip(WARNING_PREFIX) {
            Some(Outcome::Warning(detail))
        } else {
            strip(ERROR_PREFIX).map(Outcome::Error)
        }
    }

    /// Prefixed text keeps its tag, anything else is treated as an error description.
    pub fn normalize(text: &str) -> Self {
        Self::parse(text).unwrap_or_else(|| Outcome::Error(text.to_string()))
    }

    pub fn detail(&self) -> &str {
        match self {
            Outcome::Success(detail) | Outcome::Warning(detail) | Outcome::Error(detail) => {
                detail
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Outcome::Warning(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    fn prefix(&self) -> &'static str {
        match self {
            Outcome::Success(_) => SUCCESS_PREFIX,
            Outcome::Warning(_) => WARNING_PREFIX,
            Outcome::Error(_) => ERROR_PREFIX,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.prefix(), self.detail())
    }
}

impl From<String> for Outcome {
    fn from(text: String) -> Self {
        Outcome::normalize(&text)
    }
}

impl From<&str> for Outcome {
    fn from(text: &str) -> Self {
        Outcome::normalize(text)
    }
}
