//! Error taxonomy for route-table construction and request dispatch.
//!
//! Two families, deliberately kept apart:
//!
//! - [`ConfigError`]: route-table construction mistakes (conflicting
//!   parameters, malformed patterns, duplicate registrations). These are
//!   programmer errors: the registration surface converts them into panics so
//!   a broken route table can never reach request time.
//! - [`DispatchError`]: per-request outcomes. Every variant maps to a
//!   concrete HTTP status via [`DispatchError::status`], and all of them are
//!   funneled through the dispatcher's single error→response translation step.

use http::Method;
use thiserror::Error;

/// Fatal route-table construction error.
///
/// Raised while compiling patterns into the trie. Never recoverable at
/// runtime: `Router::handle` panics on any of these at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Pattern did not start with `/`.
    #[error("pattern {pattern:?} must start with '/'")]
    MissingLeadingSlash {
        /// The offending pattern.
        pattern: String,
    },
    /// Pattern contained a double slash (`/a//b`).
    #[error("pattern {pattern:?} contains an empty interior segment")]
    EmptySegment {
        /// The offending pattern.
        pattern: String,
    },
    /// A wildcard segment was not the last segment of the pattern.
    #[error("pattern {pattern:?} continues past wildcard segment :{name}*")]
    SegmentAfterWildcard {
        /// The offending pattern.
        pattern: String,
        /// The wildcard parameter name.
        name: String,
    },
    /// A segment used parameter syntax but could not be parsed.
    #[error("malformed segment {segment:?} in pattern {pattern:?}")]
    MalformedSegment {
        /// The offending pattern.
        pattern: String,
        /// The segment that failed to parse.
        segment: String,
    },
    /// A `:name(regex)` constraint failed to compile.
    #[error("invalid regex constraint in pattern {pattern:?}: {source}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// The regex compilation failure.
        #[source]
        source: regex::Error,
    },
    /// Two patterns disagree about the vary child at the same trie position.
    #[error("pattern {pattern:?} conflicts with existing parameter {existing:?} (redefined as {requested:?})")]
    VaryConflict {
        /// The offending pattern.
        pattern: String,
        /// Description of the vary child already in place.
        existing: String,
        /// Description of the conflicting redefinition.
        requested: String,
    },
}

/// Per-request dispatch outcome that is not a plain success.
///
/// `RouteNotFound` and `MethodNotAllowed` are ordinary router outcomes with
/// dedicated status codes; the remaining variants flow through the generic
/// error translator.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No registered pattern terminates at the requested path.
    #[error("no route matched {path:?}")]
    RouteNotFound {
        /// The request path that failed to match.
        path: String,
    },
    /// The path matched an endpoint, but the method has no handler chain.
    #[error("method {method} not allowed (allow: {allow})")]
    MethodNotAllowed {
        /// The request method.
        method: Method,
        /// Comma-separated methods registered at the endpoint.
        allow: String,
    },
    /// Application error with an explicit status code.
    #[error("{message}")]
    Http {
        /// Status code to render.
        status: u16,
        /// Human-readable reason.
        message: String,
    },
    /// Opaque application error from a middleware or route handler.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
    /// A handler panicked; the panic was caught at the dispatcher boundary.
    #[error("handler panicked: {message}")]
    PanicRecovered {
        /// Panic payload rendered as text.
        message: String,
        /// Captured call stack, pruned of runtime frames.
        backtrace: String,
    },
    /// The request's cancellation scope fired before completion.
    #[error("request cancelled by client")]
    Cancelled,
    /// The request-wide deadline elapsed before completion.
    #[error("request timed out after {timeout_ms} ms")]
    TimedOut {
        /// Configured deadline in milliseconds.
        timeout_ms: u64,
    },
}

impl DispatchError {
    /// Build an application error with an explicit status code.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        DispatchError::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code this error renders as.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::RouteNotFound { .. } => 501,
            DispatchError::MethodNotAllowed { .. } => 405,
            DispatchError::Http { status, .. } => *status,
            DispatchError::Handler(_) | DispatchError::PanicRecovered { .. } => 500,
            DispatchError::Cancelled => 499,
            DispatchError::TimedOut { .. } => 504,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            DispatchError::RouteNotFound {
                path: "/x".to_string()
            }
            .status(),
            501
        );
        assert_eq!(
            DispatchError::MethodNotAllowed {
                method: Method::PUT,
                allow: "GET".to_string()
            }
            .status(),
            405
        );
        assert_eq!(DispatchError::http(404, "missing").status(), 404);
        assert_eq!(
            DispatchError::Handler(anyhow::anyhow!("boom")).status(),
            500
        );
        assert_eq!(DispatchError::Cancelled.status(), 499);
        assert_eq!(DispatchError::TimedOut { timeout_ms: 5 }.status(), 504);
    }

    #[test]
    fn test_anyhow_conversion() {
        fn fails() -> Result<(), DispatchError> {
            Err(anyhow::anyhow!("db unreachable"))?;
            Ok(())
        }
        let err = fails().expect_err("must fail");
        assert_eq!(err.status(), 500);
        assert_eq!(err.to_string(), "db unreachable");
    }
}
