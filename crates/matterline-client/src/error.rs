use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Net(#[from] matterline_net::NetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("no platform config directory available")]
    NoConfigDir,

    #[error("not logged in")]
    NotLoggedIn,
}

impl ClientError {
    /// True for an HTTP 401, the "session expired" signal when a session
    /// was previously established.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Net(net) if net.status() == Some(401))
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Net(net) => net.status(),
            _ => None,
        }
    }
}
