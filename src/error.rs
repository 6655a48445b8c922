pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that come from talking to the expense service. These travel inside `anyhow::Error`
/// and can be recovered with `downcast_ref::<ApiError>()` when the caller needs to know the class.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("Unable to reach the expense service at {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The service rejected the session token (HTTP 401 or 403).
    #[error("Not authorized to call {path} (HTTP {status}), please run 'expenses login'")]
    Unauthorized {
        status: u16,
        path: String,
        /// True when this failure is the one that sent the user back to login.
        redirected: bool,
    },

    /// Any other non-success status.
    #[error("{message}")]
    Backend { status: u16, message: String },

    /// A success status whose body did not have the expected shape.
    #[error("Unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { status, .. } | ApiError::Backend { status, .. } => {
                Some(*status)
            }
            ApiError::Transport { .. } | ApiError::Decode { .. } => None,
        }
    }
}
