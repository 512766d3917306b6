/// Errors raised while establishing or running a session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("directory lookup failed: {0}")]
    Directory(String),

    #[error("service `{0}` not found in directory")]
    MissingService(&'static str),

    #[error("login rejected with HTTP {status}: {body}")]
    Login {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The platform refused the credentials or the bearer token, so the
    /// cached token must not be reused.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            Self::Login { status, .. } => {
                matches!(status.as_u16(), 401 | 403)
            },
            Self::WebSocket(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                matches!(response.status().as_u16(), 401 | 403)
            },
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
