//! Rejection reasons
//!
//! A future settles on exactly one error channel: [`Reason`]. A cancellation
//! is an ordinary rejection whose reason was supplied through `cancel` rather
//! than through `fail`; the two variants let downstream code tell "I was
//! cancelled" apart from "the operation failed" without a second propagation
//! path.

use thiserror::Error;

/// Why a future was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// The computation itself failed.
    #[error("operation failed: {0}")]
    Failed(String),

    /// A consumer cancelled the computation while it was still pending.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl Reason {
    /// A failure reason.
    pub fn failed(message: impl Into<String>) -> Self {
        Reason::Failed(message.into())
    }

    /// A cancellation reason. `cancel` stores whatever reason it is handed
    /// verbatim; this constructor is the conventional one to hand it.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Reason::Cancelled(message.into())
    }

    /// Whether this rejection originated from a `cancel` call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Reason::Cancelled(_))
    }

    /// The human-readable part of the reason.
    pub fn message(&self) -> &str {
        match self {
            Reason::Failed(message) | Reason::Cancelled(message) => message,
        }
    }
}
