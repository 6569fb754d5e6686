//! Error types for the resolver
//!
//! Provides unified error handling using thiserror.

use std::net::SocketAddr;
use std::time::Duration;

use hickory_proto::error::ProtoError;
use thiserror::Error;

// == Resolver Error Enum ==
/// Unified error type for the resolver.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Malformed inbound or upstream DNS message
    #[error("Format error: {0}")]
    Format(String),

    /// Upstream did not answer before the deadline
    #[error("Upstream {upstream} timed out after {timeout:?}")]
    UpstreamTimeout {
        upstream: SocketAddr,
        timeout: Duration,
    },

    /// Upstream could not be reached at all
    #[error("Upstream {upstream} unreachable: {reason}")]
    UpstreamUnreachable { upstream: SocketAddr, reason: String },

    /// Upstream answered with a message that does not belong to the query
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Snapshot could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolverError {
    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolverError::Format(_) => "format",
            ResolverError::UpstreamTimeout { .. } => "upstream_timeout",
            ResolverError::UpstreamUnreachable { .. } => "upstream_unreachable",
            ResolverError::UnexpectedResponse(_) => "unexpected_response",
            ResolverError::Config(_) => "config",
            ResolverError::Persistence(_) => "persistence",
            ResolverError::Io(_) => "io",
        }
    }
}

impl From<ProtoError> for ResolverError {
    fn from(err: ProtoError) -> Self {
        ResolverError::Format(err.to_string())
    }
}

impl From<serde_json::Error> for ResolverError {
    fn from(err: serde_json::Error) -> Self {
        ResolverError::Persistence(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the resolver.
pub type Result<T> = std::result::Result<T, ResolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        let upstream: SocketAddr = "127.0.0.1:53".parse().unwrap();

        assert_eq!(ResolverError::Format("bad".into()).kind(), "format");
        assert_eq!(
            ResolverError::UpstreamTimeout {
                upstream,
                timeout: Duration::from_secs(3)
            }
            .kind(),
            "upstream_timeout"
        );
        assert_eq!(
            ResolverError::UpstreamUnreachable {
                upstream,
                reason: "refused".into()
            }
            .kind(),
            "upstream_unreachable"
        );
        assert_eq!(ResolverError::Config("bad".into()).kind(), "config");
    }

    #[test]
    fn test_json_error_maps_to_persistence() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(matches!(
            ResolverError::from(err),
            ResolverError::Persistence(_)
        ));
    }
}
