//! Request failure taxonomy shared by the token and query calls.

use reqwest::StatusCode;
use thiserror::Error;

/// A failed request against an Azure endpoint
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {message}")]
    Timeout {
        message: String,
        body: Option<String>,
    },

    /// Transport failure, non-success status or an unusable response.
    #[error("Request failed: {message}")]
    Failed {
        message: String,
        body: Option<String>,
    },
}

impl RequestError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            RequestError::Timeout {
                message,
                body: None,
            }
        } else {
            RequestError::Failed {
                message,
                body: None,
            }
        }
    }

    pub fn status(status: StatusCode, body: String) -> Self {
        RequestError::Failed {
            message: format!("HTTP status {status}"),
            body: (!body.trim().is_empty()).then_some(body),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Timeout { .. })
    }

    /// Upstream response body, when the server sent one
    pub fn body(&self) -> Option<&str> {
        match self {
            RequestError::Timeout { body, .. } | RequestError::Failed { body, .. } => {
                body.as_deref()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_keeps_body() {
        let err = RequestError::status(StatusCode::FORBIDDEN, r#"{"error":"denied"}"#.into());

        assert!(!err.is_timeout());
        assert_eq!(err.body(), Some(r#"{"error":"denied"}"#));
        assert_eq!(err.to_string(), "Request failed: HTTP status 403 Forbidden");
    }

    #[test]
    fn test_blank_body_is_dropped() {
        let err = RequestError::status(StatusCode::BAD_GATEWAY, "  ".into());
        assert_eq!(err.body(), None);
    }
}
