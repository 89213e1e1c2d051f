use thiserror::Error;

/// Failures surfaced by [`super::ApiClient`]. Every variant is recoverable;
/// callers decide whether to show an inline error, redirect to login or log
/// and move on.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("authentication required")]
    Unauthorized,

    #[error("{path} not found")]
    NotFound { path: String },

    #[error("server returned {status} for {path}: {detail}")]
    Status {
        path: String,
        status: u16,
        detail: String,
    },

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unusable record from {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("local storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// FastAPI puts the human-readable reason in `detail`; anything else is
/// passed through verbatim.
pub(crate) fn extract_detail(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        detail: serde_json::Value,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "<empty body>".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
