//! API error taxonomy.
//!
//! Flat and HTTP-status driven: callers branch on `kind()` and render
//! `presentation()`. Messages come from the backend error body whenever
//! one is available.

use serde_json::Value;

/// Fallback when neither the body nor the status line says anything.
pub const GENERIC_MESSAGE: &str = "Something went wrong";

/// Raised locally when there is no session token to send.
pub const NOT_AUTHENTICATED_MESSAGE: &str = "Not authenticated. Please sign in.";

/// Errors from backend API calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx response (or a locally synthesized 401).
    #[error("{message} (status {status})")]
    Status {
        status: u16,
        message: String,
        code: Option<String>,
    },

    #[error("Backend is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("HTTP client error: {0}")]
    Transport(String),

    #[error("{0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Coarse classification used by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    Server,
    Network,
    Client,
}

/// How a failure is surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPresentation {
    /// Session missing or rejected: send the user to `/login`.
    RedirectToLogin,
    /// Inline "not found" panel with an optional retry.
    NotFoundPanel { message: String, retryable: bool },
    /// Generic failure panel with a retry action.
    FailurePanel { message: String, retryable: bool },
    /// Toast or inline message; retrying the same request will not help.
    Inline { message: String },
}

impl ApiError {
    pub fn not_authenticated() -> Self {
        Self::Status {
            status: 401,
            message: NOT_AUTHENTICATED_MESSAGE.to_string(),
            code: None,
        }
    }

    /// Build the error for a non-2xx response from its raw body.
    pub fn from_response(status: u16, status_text: Option<&str>, body: &[u8]) -> Self {
        let (message, code) = extract_error_message(body, status_text);
        Self::Status {
            status,
            message,
            code,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Machine error code from `error.code`, when the backend sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Human-readable message without the status suffix.
    pub fn message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { status: 401, .. } => ErrorKind::Unauthorized,
            Self::Status { status: 404, .. } => ErrorKind::NotFound,
            Self::Status { status, .. } if *status >= 500 => ErrorKind::Server,
            Self::Status { .. } | Self::Rejected(_) | Self::Io(_) => ErrorKind::Client,
            Self::Connection(_) | Self::Timeout | Self::Decode(_) | Self::Transport(_) => {
                ErrorKind::Network
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn presentation(&self) -> ErrorPresentation {
        match self.kind() {
            ErrorKind::Unauthorized => ErrorPresentation::RedirectToLogin,
            ErrorKind::NotFound => ErrorPresentation::NotFoundPanel {
                message: self.message(),
                retryable: true,
            },
            ErrorKind::Server | ErrorKind::Network => ErrorPresentation::FailurePanel {
                message: self.message(),
                retryable: true,
            },
            ErrorKind::Client => ErrorPresentation::Inline {
                message: self.message(),
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_connect() {
            let target = e
                .url()
                .map(|u| format!("{}://{}", u.scheme(), u.authority()))
                .unwrap_or_else(|| "the configured URL".to_string());
            ApiError::Connection(target)
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Io(e.to_string())
    }
}

/// Pull a human message and optional code out of an error body.
///
/// Priority: `error.message`, `detail`, `message`. A JSON body with none of
/// them yields the generic message; a non-JSON body yields the status text.
pub fn extract_error_message(body: &[u8], status_text: Option<&str>) -> (String, Option<String>) {
    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        let message = status_text
            .filter(|s| !s.is_empty())
            .unwrap_or(GENERIC_MESSAGE)
            .to_string();
        return (message, None);
    };

    let message = json
        .pointer("/error/message")
        .and_then(message_text)
        .or_else(|| json.get("detail").and_then(message_text))
        .or_else(|| json.get("message").and_then(message_text))
        .unwrap_or_else(|| GENERIC_MESSAGE.to_string());

    let code = json
        .pointer("/error/code")
        .and_then(Value::as_str)
        .map(str::to_string);

    (message, code)
}

/// Text of a message-bearing field. FastAPI validation errors put a list of
/// `{loc, msg}` objects in `detail`; those are joined.
fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) if !items.is_empty() => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                Some(value.to_string())
            } else {
                Some(msgs.join("; "))
            }
        }
        Value::Object(map) if !map.is_empty() => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_error_message_wins() {
        let body = br#"{"data": null, "error": {"message": "Client not found", "code": "NOT_FOUND"}, "detail": "ignored"}"#;
        let (message, code) = extract_error_message(body, Some("Not Found"));
        assert_eq!(message, "Client not found");
        assert_eq!(code.as_deref(), Some("NOT_FOUND"));
    }

    #[test]
    fn detail_used_when_no_envelope_message() {
        let body = br#"{"detail": "Project is already processing"}"#;
        let (message, code) = extract_error_message(body, Some("Conflict"));
        assert_eq!(message, "Project is already processing");
        assert!(code.is_none());
    }

    #[test]
    fn plain_message_is_last_resort_field() {
        let body = br#"{"message": "Rate limited"}"#;
        assert_eq!(extract_error_message(body, None).0, "Rate limited");
    }

    #[test]
    fn empty_strings_are_skipped() {
        let body = br#"{"error": {"message": ""}, "detail": "Real reason"}"#;
        assert_eq!(extract_error_message(body, None).0, "Real reason");
    }

    #[test]
    fn validation_detail_list_is_joined() {
        let body = br#"{"detail": [{"loc": ["body", "name"], "msg": "field required"}, {"loc": ["body", "pan"], "msg": "invalid"}]}"#;
        assert_eq!(
            extract_error_message(body, None).0,
            "field required; invalid"
        );
    }

    #[test]
    fn json_without_message_uses_generic() {
        let body = br#"{"data": null}"#;
        assert_eq!(extract_error_message(body, Some("Bad Request")).0, GENERIC_MESSAGE);
    }

    #[test]
    fn non_json_body_uses_status_text() {
        let body = b"<html>502 Bad Gateway</html>";
        assert_eq!(extract_error_message(body, Some("Bad Gateway")).0, "Bad Gateway");
        assert_eq!(extract_error_message(body, None).0, GENERIC_MESSAGE);
    }

    #[test]
    fn unauthorized_redirects_to_login() {
        let err = ApiError::not_authenticated();
        assert_eq!(err.status(), Some(401));
        assert!(err.is_unauthorized());
        assert_eq!(err.presentation(), ErrorPresentation::RedirectToLogin);
    }

    #[test]
    fn not_found_renders_panel_with_retry() {
        let err = ApiError::from_response(404, Some("Not Found"), br#"{"detail": "Project not found"}"#);
        assert!(err.is_not_found());
        assert_eq!(
            err.presentation(),
            ErrorPresentation::NotFoundPanel {
                message: "Project not found".into(),
                retryable: true
            }
        );
    }

    #[test]
    fn server_and_network_failures_are_retryable() {
        let server = ApiError::from_response(503, Some("Service Unavailable"), b"");
        assert_eq!(server.kind(), ErrorKind::Server);
        assert!(matches!(
            server.presentation(),
            ErrorPresentation::FailurePanel { retryable: true, .. }
        ));
        assert_eq!(ApiError::Timeout.kind(), ErrorKind::Network);
        assert_eq!(
            ApiError::Connection("http://localhost:8000".into()).kind(),
            ErrorKind::Network
        );
    }

    #[test]
    fn other_client_errors_are_inline() {
        let err = ApiError::from_response(409, None, br#"{"detail": "Duplicate PAN"}"#);
        assert_eq!(
            err.presentation(),
            ErrorPresentation::Inline {
                message: "Duplicate PAN".into()
            }
        );
    }

    #[test]
    fn display_includes_status() {
        let err = ApiError::from_response(500, None, br#"{"detail": "boom"}"#);
        assert_eq!(err.to_string(), "boom (status 500)");
        assert_eq!(err.message(), "boom");
    }
}
