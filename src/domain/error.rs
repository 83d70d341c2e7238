//! Trade engine error taxonomy.
//!
//! Every use case returns `Result<T, TradeError>`. The HTTP adapter maps
//! each variant onto a status code; deterministic variants are surfaced to
//! the caller verbatim.

use thiserror::Error;

/// Errors produced by the trade engine use cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    /// Malformed commodity, quantity, date or unit.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Wrong role or organization mismatch.
    #[error("forbidden: {0}")]
    Authorization(String),
    /// Unknown bid or offer.
    #[error("not found: {0}")]
    NotFound(String),
    /// Duplicate active offer, bid not open, or re-close of a closed bid.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Offer submission throttle exceeded.
    #[error("rate limit exceeded: at most {limit} submissions per {window_secs}s")]
    RateLimited { limit: u32, window_secs: u64 },
    /// A collaborator in the critical path failed.
    #[error("dependency failure: {0}")]
    Dependency(String),
}

impl TradeError {
    /// Wrap a collaborator failure that sits in the critical path.
    pub fn dependency(context: &str, err: &anyhow::Error) -> Self {
        Self::Dependency(format!("{context}: {err:#}"))
    }

    /// Short machine-readable kind, used for metrics labels and audit.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Authorization(_) => "authorization",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::RateLimited { .. } => "rate_limited",
            Self::Dependency(_) => "dependency",
        }
    }
}

/// Convenience alias used across the use case layer.
pub type TradeResult<T> = Result<T, TradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_message() {
        let err = TradeError::RateLimited {
            limit: 4,
            window_secs: 60,
        };
        assert_eq!(
            err.to_string(),
            "rate limit exceeded: at most 4 submissions per 60s"
        );
        assert_eq!(err.kind(), "rate_limited");
    }

    #[test]
    fn test_dependency_keeps_context() {
        let err = TradeError::dependency(
            "approval lookup",
            &anyhow::anyhow!("registry offline"),
        );
        assert_eq!(
            err,
            TradeError::Dependency("approval lookup: registry offline".to_string())
        );
    }
}
