//! Google service-account authentication.
//!
//! A signed JWT assertion is exchanged at the account's token endpoint for a
//! short-lived access token. Tokens are cached and refreshed shortly before
//! they expire, so a long-lived client keeps working past the first hour.

use crate::error::CredentialError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a downloaded service-account key file this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let invalid = |reason: String| CredentialError::ServiceAccount {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    scope: String,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.key.client_email)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, scope: impl Into<String>) -> Result<Self, CredentialError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            CredentialError::ServiceAccount {
                path: key.client_email.clone(),
                reason: format!("unusable private key: {e}"),
            }
        })?;
        let client = Client::builder()
            .build()
            .map_err(|e| CredentialError::TokenExchange(e.to_string()))?;
        Ok(Self {
            key,
            signing_key,
            scope: scope.into(),
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn from_file(path: &Path, scope: impl Into<String>) -> Result<Self, CredentialError> {
        Self::new(ServiceAccountKey::from_file(path)?, scope).map_err(|e| match e {
            CredentialError::ServiceAccount { reason, .. } => CredentialError::ServiceAccount {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// A valid access token, exchanging a fresh assertion when the cached
    /// one is missing or about to expire.
    pub fn access_token(&self) -> Result<String, CredentialError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.token.clone());
            }
        }
        let fresh = self.exchange(now)?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, CredentialError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| CredentialError::TokenExchange(format!("cannot sign assertion: {e}")))
    }

    fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, CredentialError> {
        let assertion = self.assertion(now)?;
        debug!(account = %self.key.client_email, "requesting service account token");
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .map_err(|e| CredentialError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CredentialError::TokenExchange(format!(
                "token endpoint returned {}: {body}",
                status.as_u16()
            )));
        }
        let parsed: TokenResponse = response
            .json()
            .map_err(|e| CredentialError::TokenExchange(format!("unreadable token response: {e}")))?;
        let lifetime = parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        Ok(CachedToken {
            token: parsed.access_token,
            expires_at: now + Duration::seconds(lifetime),
        })
    }
}
