//! Dialog response types and the USSD wire format.

use serde::Serialize;
use std::fmt;

/// Wire prefix for a response that expects more input.
pub const CONTINUE_PREFIX: &str = "CON";
/// Wire prefix for a response that ends the session.
pub const END_PREFIX: &str = "END";

/// Outcome of one dialog turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum DialogResponse {
    /// Prompt shown to the user; the session stays open.
    Continuation(String),
    /// Final text; the telecom gateway closes the session.
    Terminal(String),
}

impl DialogResponse {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::Continuation(text.into())
    }

    pub fn end(text: impl Into<String>) -> Self {
        Self::Terminal(text.into())
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Continuation(text) | Self::Terminal(text) => text,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    const fn prefix(&self) -> &'static str {
        match self {
            Self::Continuation(_) => CONTINUE_PREFIX,
            Self::Terminal(_) => END_PREFIX,
        }
    }

    /// Serialize to the two-token wire format (`CON ...` / `END ...`).
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DialogResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.prefix(), self.text())
    }
}
