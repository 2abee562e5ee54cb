//! Ticket source gateway: paged filter queries against the tracker.

use crate::config::{self, ConfigStore};
use crate::error::{RegsyncError, SourceError};
use crate::ticket::Ticket;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, error, warn};

/// One page of a filter query.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub tickets: Vec<Ticket>,
    /// Records the tracker returned, including any that failed to decode.
    /// Short-page detection uses this count.
    pub returned: usize,
}

pub trait TicketSource {
    /// Fetch page `page` (1-based) of the saved filter `filter_id`.
    fn fetch_page(&self, filter_id: &str, page: u32, page_size: u32) -> Result<Page, SourceError>;
}

/// Page through `filter_id` until a short page or the first error.
///
/// An error ends pagination but keeps what was already fetched.
pub fn fetch_all<S: TicketSource + ?Sized>(source: &S, filter_id: &str, page_size: u32) -> Vec<Ticket> {
    let mut tickets = Vec::new();
    let mut page = 1;
    loop {
        match source.fetch_page(filter_id, page, page_size) {
            Ok(p) => {
                debug!(filter_id, page, returned = p.returned, "fetched ticket page");
                let short = p.returned < page_size as usize;
                tickets.extend(p.tickets);
                if short {
                    break;
                }
                page += 1;
            }
            Err(e) => {
                error!(filter_id, page, error = %e, "error fetching tickets from filter");
                break;
            }
        }
    }
    tickets
}

// ---------------------------------------------------------------------------
// MantisClient
// ---------------------------------------------------------------------------

/// Blocking client for the Mantis REST API.
pub struct MantisClient {
    client: Client,
    base: String,
}

impl MantisClient {
    pub fn new(base: impl Into<String>, token: &str) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(token)
            .map_err(|e| SourceError::Decode(format!("token is not a valid header value: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(store: &ConfigStore) -> Result<Self, RegsyncError> {
        let base = store.require_str(config::MANTIS_PATH)?;
        let token = crate::credentials::mantis_token(store)?;
        Ok(Self::new(base, &token)?)
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl TicketSource for MantisClient {
    fn fetch_page(&self, filter_id: &str, page: u32, page_size: u32) -> Result<Page, SourceError> {
        let url = format!("{}/api/rest/issues", self.base);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("filter_id", filter_id.to_string()),
                ("page", page.to_string()),
                ("limit", page_size.to_string()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json()?;
        decode_page(body)
    }
}

fn decode_page(body: serde_json::Value) -> Result<Page, SourceError> {
    let issues = match body {
        serde_json::Value::Object(mut map) => match map.remove("issues") {
            Some(serde_json::Value::Array(items)) => items,
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(other) => {
                return Err(SourceError::Decode(format!(
                    "'issues' is not an array: {other}"
                )))
            }
        },
        other => return Err(SourceError::Decode(format!("expected an object, got {other}"))),
    };

    let returned = issues.len();
    let tickets = issues
        .into_iter()
        .filter_map(|raw| {
            let id = raw.get("id").cloned();
            match serde_json::from_value::<Ticket>(raw) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(ticket = ?id, error = %e, "dropping undecodable ticket");
                    None
                }
            }
        })
        .collect();
    Ok(Page { tickets, returned })
}
