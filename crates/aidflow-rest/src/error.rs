//! Mapping HTTP failures onto store error kinds

use aidflow_core::StoreError;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Postgres unique violation, surfaced by the gateway in the error body
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE class 23: integrity constraint violations
const INTEGRITY_CLASS: &str = "23";

/// Failures building the client; request-time failures are [`StoreError`]s
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid backend url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid api key header value")]
    InvalidApiKey,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Error body returned by the gateway
#[derive(Debug, Default, Deserialize)]
struct GatewayError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl GatewayError {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn describe(&self, status: StatusCode, body: &str) -> String {
        let mut text = match (&self.message, &self.details) {
            (Some(m), Some(d)) => format!("{m} ({d})"),
            (Some(m), None) => m.clone(),
            _ if body.trim().is_empty() => status.to_string(),
            _ => body.trim().to_string(),
        };
        if let Some(code) = &self.code {
            text = format!("{code}: {text}");
        }
        text
    }
}

/// Transport-level failure: nothing reached, or nothing came back in time
pub(crate) fn from_transport(err: &reqwest::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Classify a non-success response
pub(crate) fn from_status(status: StatusCode, body: &str) -> StoreError {
    let parsed = GatewayError::parse(body);
    let text = parsed.describe(status, body);
    match parsed.code.as_deref() {
        Some(UNIQUE_VIOLATION) => return StoreError::Conflict(text),
        // foreign key, check and not-null violations arrive as 409 too
        Some(code) if code.starts_with(INTEGRITY_CLASS) => return StoreError::Rejected(text),
        _ => {}
    }
    match status {
        StatusCode::CONFLICT => StoreError::Conflict(text),
        StatusCode::NOT_FOUND => StoreError::NotFound(text),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Unavailable(text)
        }
        s if s.is_server_error() => StoreError::Unavailable(text),
        _ => StoreError::Rejected(text),
    }
}

pub(crate) fn from_decode(table: &str, err: &serde_json::Error) -> StoreError {
    StoreError::Decode(format!("{table}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert!(matches!(
            from_status(StatusCode::CONFLICT, ""),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            from_status(StatusCode::NOT_FOUND, ""),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            from_status(StatusCode::BAD_GATEWAY, "upstream"),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            from_status(StatusCode::UNAUTHORIZED, ""),
            StoreError::Rejected(_)
        ));
    }

    #[test]
    fn unique_violation_is_conflict_whatever_the_status() {
        let body = r#"{"code":"23505","message":"duplicate key value","details":"Key (phone)"}"#;
        let err = from_status(StatusCode::BAD_REQUEST, body);
        assert_eq!(
            err,
            StoreError::Conflict("23505: duplicate key value (Key (phone))".to_string())
        );
    }

    #[test]
    fn foreign_key_violation_is_rejected() {
        let body = r#"{"code":"23503","message":"violates foreign key constraint"}"#;
        assert!(matches!(
            from_status(StatusCode::BAD_REQUEST, body),
            StoreError::Rejected(m) if m.contains("23503")
        ));
    }

    #[test]
    fn integrity_violations_on_409_are_rejected() {
        for code in ["23503", "23514", "23502"] {
            let body = format!(r#"{{"code":"{code}","message":"insert on table \"allocations\" violates constraint"}}"#);
            assert!(matches!(
                from_status(StatusCode::CONFLICT, &body),
                StoreError::Rejected(m) if m.contains(code)
            ));
        }
        let guard = r#"{"code":"P0001","message":"recent allocation exists"}"#;
        assert!(matches!(
            from_status(StatusCode::CONFLICT, guard),
            StoreError::Conflict(_)
        ));
    }

    #[test]
    fn plain_text_body_is_kept() {
        let err = from_status(StatusCode::SERVICE_UNAVAILABLE, "maintenance");
        assert_eq!(err, StoreError::Unavailable("maintenance".to_string()));
    }
}
