use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegsyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failures loading, reading or persisting the configuration store.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {0} not found")]
    NotFound(String),

    #[error("configuration file {path} is not valid JSON: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration file {0} must contain a JSON object")]
    NotAnObject(String),

    #[error("missing configuration key: {0}")]
    MissingKey(&'static str),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("failed to persist configuration: {0}")]
    Persist(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no token configured: set {key} or {env}")]
    Missing { key: &'static str, env: &'static str },

    #[error("failed to read token file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("token file {0} is empty")]
    Empty(String),

    #[error("no spreadsheet credentials configured: set GS_CREDENTIAL_FILE, GS_TOKEN_FILE or GS_ACCESS_TOKEN")]
    NoSheetsCredentials,

    #[error("service account key {path} is unusable: {reason}")]
    ServiceAccount { path: String, reason: String },

    #[error("service account token exchange failed: {0}")]
    TokenExchange(String),
}

/// Failures talking to the ticket tracker.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("ticket tracker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ticket tracker returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("ticket tracker returned an unreadable page: {0}")]
    Decode(String),
}

/// Failures talking to the spreadsheet backend.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("spreadsheet request failed during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("spreadsheet backend returned {status} during {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("spreadsheet authorization failed: {0}")]
    Auth(#[from] CredentialError),

    #[error("{0}")]
    Rejected(String),
}

/// Raised inside a single field extraction; always collapsed to an empty cell.
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("history entry {index} has a scalar old value")]
    ScalarOldValue { index: usize },

    #[error("history entry {index} has no new value")]
    MissingNewValue { index: usize },
}

pub type Result<T> = std::result::Result<T, RegsyncError>;
