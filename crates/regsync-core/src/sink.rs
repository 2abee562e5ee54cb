//! Spreadsheet sink gateway: clear and rewrite ranges of a worksheet.

use crate::config::{self, ConfigStore};
use crate::credentials::{self, SheetsAuth};
use crate::derive::Row;
use crate::error::{RegsyncError, SinkError};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Target region
// ---------------------------------------------------------------------------

/// The block of the worksheet this tool owns, plus the skip-counter cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegion {
    pub first_column: char,
    pub last_column: char,
    pub first_row: usize,
    pub last_row: usize,
    pub counter_cell: &'static str,
}

impl Default for TargetRegion {
    fn default() -> Self {
        Self {
            first_column: 'A',
            last_column: 'R',
            first_row: 3,
            last_row: 2000,
            counter_cell: "G1",
        }
    }
}

impl TargetRegion {
    /// The whole region, e.g. `A3:R2000`.
    pub fn full_range(&self) -> String {
        self.rows_range(self.first_row, self.last_row)
    }

    /// Range covering `count` rows from the first row, or `None` when
    /// `count` is zero.
    pub fn write_range(&self, count: usize) -> Option<String> {
        (count > 0).then(|| self.rows_range(self.first_row, self.first_row + count - 1))
    }

    pub fn capacity(&self) -> usize {
        self.last_row + 1 - self.first_row
    }

    fn rows_range(&self, from: usize, to: usize) -> String {
        format!("{}{from}:{}{to}", self.first_column, self.last_column)
    }
}

/// Qualify an A1 range with a worksheet name: `'Sheet 1'!A1:B2`.
pub fn qualified_range(sheet: &str, range: &str) -> String {
    format!("'{}'!{range}", sheet.replace('\'', "''"))
}

// ---------------------------------------------------------------------------
// SheetSink
// ---------------------------------------------------------------------------

pub trait SheetSink {
    fn clear_range(&self, spreadsheet: &str, sheet: &str, range: &str) -> Result<(), SinkError>;

    /// Write `rows` into `range`. Cell text is interpreted as if typed by a
    /// user, so `=HYPERLINK(...)` becomes a live formula.
    fn write_rows(&self, spreadsheet: &str, sheet: &str, range: &str, rows: &[Row]) -> Result<(), SinkError>;

    fn write_cell(&self, spreadsheet: &str, sheet: &str, cell: &str, value: Value) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// SheetsClient
// ---------------------------------------------------------------------------

/// Blocking client for the Google Sheets v4 values API.
pub struct SheetsClient {
    client: Client,
    base: Url,
    auth: SheetsAuth,
}

impl SheetsClient {
    pub fn new(base: &str, auth: impl Into<SheetsAuth>) -> Result<Self, SinkError> {
        let base = Url::parse(base)
            .map_err(|e| SinkError::Rejected(format!("invalid spreadsheet API base '{base}': {e}")))?;
        let client = Client::builder()
            .build()
            .map_err(|source| SinkError::Transport {
                operation: "client setup",
                source,
            })?;
        Ok(Self {
            client,
            base,
            auth: auth.into(),
        })
    }

    pub fn from_config(store: &ConfigStore) -> Result<Self, RegsyncError> {
        let base = store
            .get_str(config::SHEETS_API_BASE)
            .unwrap_or_else(|| config::DEFAULT_SHEETS_API_BASE.to_string());
        let auth = credentials::sheets_auth(store)?;
        Ok(Self::new(&base, auth)?)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SinkError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| SinkError::Rejected(format!("spreadsheet API base {} cannot hold a path", self.base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<(), SinkError> {
        let token = self.auth.bearer()?;
        let response = request
            .bearer_auth(token)
            .send()
            .map_err(|source| SinkError::Transport { operation, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                operation,
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn put_values(&self, operation: &'static str, spreadsheet: &str, a1: &str, values: Value) -> Result<(), SinkError> {
        let url = self.url(&[spreadsheet, "values", a1])?;
        let body = json!({
            "range": a1,
            "majorDimension": "ROWS",
            "values": values,
        });
        self.send(
            operation,
            self.client
                .put(url)
                .query(&[("valueInputOption", "USER_ENTERED")])
                .json(&body),
        )
    }
}

impl SheetSink for SheetsClient {
    fn clear_range(&self, spreadsheet: &str, sheet: &str, range: &str) -> Result<(), SinkError> {
        let target = format!("{spreadsheet}:batchClear");
        let url = self.url(&[target.as_str()])?;
        let body = json!({ "ranges": [qualified_range(sheet, range)] });
        self.send("clear", self.client.post(url).json(&body))
    }

    fn write_rows(&self, spreadsheet: &str, sheet: &str, range: &str, rows: &[Row]) -> Result<(), SinkError> {
        let values = json!(rows.iter().map(Row::cells).collect::<Vec<_>>());
        self.put_values("write rows", spreadsheet, &qualified_range(sheet, range), values)
    }

    fn write_cell(&self, spreadsheet: &str, sheet: &str, cell: &str, value: Value) -> Result<(), SinkError> {
        self.put_values("write cell", spreadsheet, &qualified_range(sheet, cell), json!([[value]]))
    }
}
