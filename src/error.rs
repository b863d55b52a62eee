/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The watchdog fired before the response body was fully received.
    #[error("request timeout after {after_ms}ms")]
    Timeout { after_ms: u64 },
    /// Non-success HTTP status code with raw response body.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// Transport failure from `reqwest` (connect, reset, TLS, ...).
    #[error("network error: {0}")]
    Network(reqwest::Error),
    /// Permission or scope failure reported by a collaborator service.
    #[error("authorization error: {0}")]
    Authorization(String),
    /// Response body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// A caller-supplied header name or value is not valid HTTP.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// A retry or timeout policy failed validation.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}

impl RequestError {
    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether callers should treat this failure as "not signed in".
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Authorization(_) => true,
            Self::Http { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }
}

/// Fail-soft handling for background loads.
///
/// Screens that load data in the background degrade to placeholder values
/// instead of surfacing an error state. The failure is still logged.
pub trait FailSoft<T> {
    /// Returns the success value, or `fallback()` when the call failed.
    fn fail_soft(self, fallback: impl FnOnce() -> T) -> T;
}

impl<T> FailSoft<T> for Result<T, RequestError> {
    fn fail_soft(self, fallback: impl FnOnce() -> T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "request failed, using fallback value");

                #[cfg(not(feature = "tracing"))]
                let _ = err;

                fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FailSoft, RequestError};

    #[test]
    fn status_only_for_http_errors() {
        let http = RequestError::Http {
            status: 503,
            body: "unavailable".to_owned(),
        };
        assert_eq!(http.status(), Some(503));
        assert_eq!(RequestError::Timeout { after_ms: 10 }.status(), None);
        assert_eq!(RequestError::Decode("bad".to_owned()).status(), None);
    }

    #[test]
    fn unauthenticated_covers_scope_failures_and_auth_statuses() {
        assert!(RequestError::Authorization("missing scope account".to_owned()).is_unauthenticated());
        for status in [401, 403] {
            let err = RequestError::Http {
                status,
                body: String::new(),
            };
            assert!(err.is_unauthenticated());
        }
        let not_found = RequestError::Http {
            status: 404,
            body: String::new(),
        };
        assert!(!not_found.is_unauthenticated());
    }

    #[test]
    fn http_message_keeps_status_and_body() {
        let err = RequestError::Http {
            status: 404,
            body: "Not Found".to_owned(),
        };
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }

    #[test]
    fn fail_soft_returns_fallback_on_error() {
        let failed: Result<Vec<&str>, RequestError> = Err(RequestError::Timeout { after_ms: 5 });
        assert_eq!(failed.fail_soft(|| vec!["example case"]), vec!["example case"]);

        let ok: Result<u32, RequestError> = Ok(7);
        assert_eq!(ok.fail_soft(|| 0), 7);
    }
}
