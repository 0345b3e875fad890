//! Error taxonomy for ASH.
//!
//! The error codes below are the stable, closed set that crosses the wire
//! boundary (see spec §6). `AshError` wraps exactly one `AshErrorCode` plus
//! an optional human-readable message; the code is what callers switch on.

use thiserror::Error;

/// Stable wire error codes. Never add a variant without updating the
/// external-interface documentation that names this set as closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AshErrorCode {
    MissingHeaders,
    InvalidContext,
    ContextExpired,
    ReplayDetected,
    EndpointMismatch,
    CanonicalizationFailed,
    UnsupportedContentType,
    IntegrityFailed,
}

impl AshErrorCode {
    /// The stable wire string, e.g. `ASH_REPLAY_DETECTED`.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::MissingHeaders => "ASH_MISSING_HEADERS",
            Self::InvalidContext => "ASH_INVALID_CONTEXT",
            Self::ContextExpired => "ASH_CONTEXT_EXPIRED",
            Self::ReplayDetected => "ASH_REPLAY_DETECTED",
            Self::EndpointMismatch => "ASH_ENDPOINT_MISMATCH",
            Self::CanonicalizationFailed => "ASH_CANONICALIZATION_FAILED",
            Self::UnsupportedContentType => "ASH_UNSUPPORTED_CONTENT_TYPE",
            Self::IntegrityFailed => "ASH_INTEGRITY_FAILED",
        }
    }

    /// HTTP status class a framework adapter should map this code to.
    /// Canonicalization faults are deterministic input errors (400);
    /// everything else is a failed security check (401).
    pub fn http_status(&self) -> u16 {
        match self {
            Self::CanonicalizationFailed | Self::UnsupportedContentType => 400,
            _ => 401,
        }
    }
}

impl std::fmt::Display for AshErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

/// ASH protocol errors.
#[derive(Debug, Error)]
pub enum AshError {
    /// A `verify`/`issue_context` failure carrying one of the closed codes.
    #[error("{code}: {message}")]
    Protocol {
        code: AshErrorCode,
        message: String,
    },

    /// Transport/I/O error from the demonstration server or client.
    #[error("transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AshError {
    pub fn new(code: AshErrorCode, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// The stable error code this error maps to on the wire, where
    /// applicable. Transport errors have no wire code of their own — they
    /// never reach `verify`'s ordered pipeline.
    pub fn code(&self) -> Option<AshErrorCode> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            Self::Serialization(_) => Some(AshErrorCode::CanonicalizationFailed),
            Self::Transport(_) => None,
        }
    }
}

pub type AshResult<T> = Result<T, AshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_are_stable() {
        assert_eq!(AshErrorCode::ReplayDetected.as_wire_str(), "ASH_REPLAY_DETECTED");
        assert_eq!(
            AshErrorCode::CanonicalizationFailed.as_wire_str(),
            "ASH_CANONICALIZATION_FAILED"
        );
    }

    #[test]
    fn http_status_classes() {
        assert_eq!(AshErrorCode::CanonicalizationFailed.http_status(), 400);
        assert_eq!(AshErrorCode::UnsupportedContentType.http_status(), 400);
        assert_eq!(AshErrorCode::IntegrityFailed.http_status(), 401);
        assert_eq!(AshErrorCode::ReplayDetected.http_status(), 401);
    }

    #[test]
    fn error_carries_code() {
        let err = AshError::new(AshErrorCode::EndpointMismatch, "binding mismatch");
        assert_eq!(err.code(), Some(AshErrorCode::EndpointMismatch));
    }

    #[test]
    fn transport_error_has_no_wire_code() {
        let err = AshError::Transport("connection reset".to_string());
        assert_eq!(err.code(), None);
    }
}
