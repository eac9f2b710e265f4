use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the telemetry client and pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("session expired, please log in again")]
    SessionExpired,

    #[error("not logged in, run `login` first")]
    NotLoggedIn,

    #[error("registration rejected: {0}")]
    RegistrationRejected(String),

    #[error("no device found for serial '{0}'")]
    SerialNotFound(String),

    #[error("invalid time range: end must be after start")]
    InvalidTimeRange,

    #[error("unrecognized timestamp format: '{0}'")]
    Timestamp(String),

    #[error("backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the failure means the stored session is no longer usable
    /// and the user has to authenticate again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Error::SessionExpired | Error::NotLoggedIn | Error::InvalidCredentials
        )
    }
}
