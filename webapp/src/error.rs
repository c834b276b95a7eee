/// Request level failures. Problems with a single item of a request are never reported
/// through this type, they only leave that item out of the answer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("'{0}' is a required property")]
    MissingField(&'static str),
    #[error("[] is too short - '{0}'")]
    EmptyList(&'static str),
    #[error("'{0}' is a required property")]
    InvalidModule(&'static str),
    #[error("Invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
    #[error("Cache is not loaded yet")]
    CacheUnavailable,
    #[error("Unsupported API version {0}")]
    UnsupportedVersion(u8),
    #[error("Invalid request: {0}")]
    Json(#[from] json::Error),
}

impl Error {
    /// HTTP-style status code of the failure.
    pub fn status(&self) -> u16 {
        match self {
            Error::CacheUnavailable => 503,
            Error::UnsupportedVersion(_) => 404,
            _ => 400,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
