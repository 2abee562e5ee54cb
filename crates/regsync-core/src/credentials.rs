use crate::config::{self, ConfigStore};
use crate::error::CredentialError;
use crate::service_account::{ServiceAccountAuth, SHEETS_SCOPE};
use std::path::Path;

pub const MANTIS_TOKEN_ENV: &str = "MANTIS_TOKEN";
pub const SHEETS_TOKEN_ENV: &str = "GS_ACCESS_TOKEN";

/// Tracker API token: `MANTIS_TOKEN` if set, else the first line of the file
/// named by `TOKEN_FILE`.
pub fn mantis_token(store: &ConfigStore) -> Result<String, CredentialError> {
    resolve(store, config::TOKEN_FILE, MANTIS_TOKEN_ENV)
}

/// How requests to the spreadsheet API are authorized.
#[derive(Debug)]
pub enum SheetsAuth {
    /// A ready-made bearer token, used as given until it stops working.
    Static(String),
    /// A service-account key that mints and refreshes its own tokens.
    ServiceAccount(Box<ServiceAccountAuth>),
}

impl SheetsAuth {
    pub fn bearer(&self) -> Result<String, CredentialError> {
        match self {
            SheetsAuth::Static(token) => Ok(token.clone()),
            SheetsAuth::ServiceAccount(auth) => auth.access_token(),
        }
    }
}

impl From<&str> for SheetsAuth {
    fn from(token: &str) -> Self {
        SheetsAuth::Static(token.to_string())
    }
}

impl From<String> for SheetsAuth {
    fn from(token: String) -> Self {
        SheetsAuth::Static(token)
    }
}

impl From<ServiceAccountAuth> for SheetsAuth {
    fn from(auth: ServiceAccountAuth) -> Self {
        SheetsAuth::ServiceAccount(Box::new(auth))
    }
}

/// Spreadsheet authorization, first match wins: `GS_ACCESS_TOKEN`, the token
/// file named by `GS_TOKEN_FILE`, then the service-account key named by
/// `GS_CREDENTIAL_FILE`.
pub fn sheets_auth(store: &ConfigStore) -> Result<SheetsAuth, CredentialError> {
    if let Some(token) = env_token(SHEETS_TOKEN_ENV) {
        return Ok(SheetsAuth::Static(token));
    }
    if let Some(path) = store.get_str(config::GS_TOKEN_FILE) {
        return read_token_file(Path::new(&path)).map(SheetsAuth::Static);
    }
    if let Some(path) = store.get_str(config::GS_CREDENTIAL_FILE) {
        return ServiceAccountAuth::from_file(Path::new(&path), SHEETS_SCOPE).map(SheetsAuth::from);
    }
    Err(CredentialError::NoSheetsCredentials)
}

fn env_token(env: &str) -> Option<String> {
    let token = std::env::var(env).ok()?;
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn resolve(
    store: &ConfigStore,
    key: &'static str,
    env: &'static str,
) -> Result<String, CredentialError> {
    if let Some(token) = env_token(env) {
        return Ok(token);
    }
    let path = store
        .get_str(key)
        .ok_or(CredentialError::Missing { key, env })?;
    read_token_file(Path::new(&path))
}

pub fn read_token_file(path: &Path) -> Result<String, CredentialError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.display().to_string(),
        source,
    })?;
    raw.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CredentialError::Empty(path.display().to_string()))
}
