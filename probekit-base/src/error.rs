use thiserror::Error;

/// Errors a check can hit during one poll
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {reason}")]
    Payload { url: String, reason: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-HTTP backends (message brokers)
    #[error("broker request failed: {0}")]
    Broker(String),
}

pub type CheckResult<T> = Result<T, CheckError>;

impl CheckError {
    pub fn payload(url: impl Into<String>, reason: impl Into<String>) -> Self {
        CheckError::Payload {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for CheckError {
    fn from(e: serde_yaml::Error) -> Self {
        CheckError::Config(e.to_string())
    }
}
