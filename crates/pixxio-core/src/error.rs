//! Error types shared by the pixx.io client, mapper and asset source.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PixxioError>;

#[derive(Debug, Error)]
pub enum PixxioError {
    /// The token exchange failed or the access token was rejected mid-session.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The asset exists but the account may not access it.
    #[error("access to asset {identifier} denied: {message}")]
    AccessDenied { identifier: String, message: String },

    #[error("asset {identifier} not found: {message}")]
    AssetNotFound { identifier: String, message: String },

    /// Transport-level failure, including timeouts and DNS errors.
    #[error("connection to pixx.io failed: {0}")]
    ConnectionFailed(String),

    #[error("malformed response from pixx.io: {0}")]
    MalformedResponse(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("no client secret found for account {account}, please set up the pixx.io credentials")]
    MissingClientSecret { account: String },

    #[error("asset proxy cache failure: {0}")]
    Cache(String),

    #[error(transparent)]
    Secrets(#[from] SecretsError),
}

impl PixxioError {
    /// Classifies a transport error from reqwest.
    pub(crate) fn from_transport(context: &str, error: reqwest::Error) -> Self {
        PixxioError::ConnectionFailed(format!("{}: {}", context, error))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid asset source identifier \"{0}\", it must match /^[a-z][a-z0-9-]{{0,62}}[a-z]$/")]
    InvalidIdentifier(String),

    #[error("missing required option \"{0}\"")]
    MissingOption(&'static str),

    #[error("invalid value for option \"{option}\": {reason}")]
    InvalidOption { option: &'static str, reason: String },

    #[error("unknown media type \"{0}\" in mediaTypes")]
    UnknownMediaType(String),

    #[error("could not parse asset source options: {0}")]
    Parse(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(error: serde_yaml::Error) -> Self {
        ConfigError::Parse(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::Parse(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("could not access secrets file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decrypt secrets file: {0}")]
    Decrypt(String),

    #[error("secrets file contains invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),

    #[error("no client secret stored for account '{0}'")]
    NotFound(String),
}
