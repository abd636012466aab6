use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetError>;

#[derive(Error, Debug)]
pub enum NetError {
    /// Connectivity-level failure; surfaced upward as a generic
    /// connection-lost notification, never fatal to the store.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx HTTP status. 401 while a session exists is recognized by
    /// the client layer as session expiry.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("login response carried no session token")]
    EmptyToken,

    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid server address: {0}")]
    Url(#[from] url::ParseError),
}

impl NetError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
