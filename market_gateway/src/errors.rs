use reqwest::StatusCode;
use thiserror::Error;

/// Boxed transport-level cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by every gateway operation.
///
/// The client never retries or swallows these; callers decide.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced an HTTP response (connection failure,
    /// timeout, broken body stream).
    #[error("Transport error on {path}: {source}")]
    Transport {
        path: String,
        timed_out: bool,
        #[source]
        source: BoxError,
    },

    /// The gateway rejected the session or credentials (HTTP 401), or the
    /// session could not be re-established.
    #[error("Authentication rejected on {path}: {message}")]
    Authentication { path: String, message: String },

    /// Any other non-2xx response.
    #[error("HTTP {status} from {path}: {body}")]
    HttpStatus {
        path: String,
        status: StatusCode,
        body: String,
    },

    /// A 2xx response whose body did not match the expected shape.
    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl GatewayError {
    pub(crate) fn transport(path: &str, err: reqwest::Error) -> Self {
        Self::Transport {
            path: path.to_string(),
            timed_out: err.is_timeout(),
            source: Box::new(err),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Transport { path, .. }
            | Self::Authentication { path, .. }
            | Self::HttpStatus { path, .. }
            | Self::Decode { path, .. } => path,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
