//! Request-handling errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Boxed error returned by transport implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that end a request with an error response.
#[derive(Debug, Error)]
pub enum EdgeError {
    /// The inbound request already carried the loop guard header.
    #[error("Loop Detected")]
    LoopDetected,

    /// The outbound call failed at the transport level.
    #[error("Bad Gateway: unable to reach {origin}")]
    Unreachable {
        origin: String,
        #[source]
        source: BoxError,
    },

    /// Anything else; the message is returned to the client.
    #[error("{0}")]
    Internal(String),
}

impl EdgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            EdgeError::LoopDetected => StatusCode::LOOP_DETECTED,
            EdgeError::Unreachable { .. } => StatusCode::BAD_GATEWAY,
            EdgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(EdgeError::LoopDetected.status().as_u16(), 508);
        let unreachable = EdgeError::Unreachable {
            origin: "https://app.example.com".into(),
            source: "connection refused".into(),
        };
        assert_eq!(unreachable.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            unreachable.to_string(),
            "Bad Gateway: unable to reach https://app.example.com"
        );
        assert_eq!(
            EdgeError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
