//! Row derivation: one tracker ticket in, one 18-cell spreadsheet row (or a
//! skip) out.
//!
//! Every extraction that inspects history is fallible internally but never
//! fails the row. Errors are logged against the ticket id and the affected
//! cell falls back to an empty string.

use crate::error::DeriveError;
use crate::ticket::{FieldValue, HistoryEntry, Ticket};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::warn;

pub const ROW_WIDTH: usize = 18;

pub const TECH_DEBT_FAUCET: &str = "Technical Debt.";
pub const CODE_MOVE: &str = "Code Move";

const FIXED_RESOLUTIONS: &[&str] = &[
    "Fixed",
    "For QA",
    "For Submitter",
    "Deployable on Hold",
    "For Product Management",
];

const OPEN_STATUSES: &[&str] = &[
    "New",
    "Partially Fixed",
    "Not Fixed",
    "In Progress",
    "Investigation in Progress",
];

const CURRENT_STATUS_LABEL: &str = "Current Status";
const CHANGESET_LABEL: &str = "Source_changeset_attached";
const ROOT_CAUSE_NAME: &str = "Root Cause";

// ---------------------------------------------------------------------------
// Row / Derived
// ---------------------------------------------------------------------------

/// One spreadsheet row. The width is fixed by the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row([String; ROW_WIDTH]);

impl Row {
    pub fn cells(&self) -> &[String] {
        &self.0
    }

    pub fn cell(&self, column: usize) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derived {
    Row(Box<Row>),
    Skip,
}

/// Tickets classified as technical debt are excluded unless they are code
/// moves. The faucet value is compared literally, trailing period included.
pub fn is_excluded(ticket: &Ticket) -> bool {
    ticket.faucet() == TECH_DEBT_FAUCET && ticket.record_type() != CODE_MOVE
}

/// Tracker view URL for a ticket.
pub fn ticket_url(base: &str, id: u64) -> String {
    format!("{}/view.php?id={id}", base.trim_end_matches('/'))
}

/// Derive the spreadsheet row for `ticket`. `view_base` is the tracker's
/// base URL used for the hyperlink cell.
pub fn derive(ticket: &Ticket, view_base: &str) -> Derived {
    if is_excluded(ticket) {
        return Derived::Skip;
    }

    let (fixed_date, fixed_by) = or_empty(ticket.id, "status transition", last_fix_transition(ticket));
    let root_cause = or_empty(ticket.id, "root cause", latest_root_cause(ticket));

    let row = Row([
        hyperlink(&ticket_url(view_base, ticket.id), ticket.id),
        ticket.category_name().to_string(),
        ticket.project_name().to_string(),
        ticket.record_type(),
        ticket.summary().to_string(),
        ticket.handler_name().to_string(),
        ticket.qa_owner(),
        ticket.resolution_label().to_string(),
        ticket.status_label().to_string(),
        ticket.priority_label().to_string(),
        format_date(ticket.created_at()),
        fixed_date,
        has_source_changeset(ticket).to_string(),
        fixed_by,
        root_cause,
        join_tags(ticket),
        ticket.faucet(),
        ticket.efforts_dev(),
    ]);
    Derived::Row(Box::new(row))
}

fn or_empty<T: Default>(ticket: u64, what: &str, result: Result<T, DeriveError>) -> T {
    result.unwrap_or_else(|e| {
        warn!(ticket, error = %e, "failed to extract {what}");
        T::default()
    })
}

fn hyperlink(url: &str, id: u64) -> String {
    format!("=HYPERLINK(\"{}\", \"{id}\")", url.replace('"', "\"\""))
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Reformat an ISO 8601 timestamp as `MM/DD/YYYY`. Empty or unparseable
/// input yields `""`; parse failures are logged.
pub fn format_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    match parse_iso8601(raw) {
        Some(date) => date.format("%m/%d/%Y").to_string(),
        None => {
            warn!(input = raw, "date parsing error");
            String::new()
        }
    }
}

fn parse_iso8601(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

// ---------------------------------------------------------------------------
// History scans
// ---------------------------------------------------------------------------

/// Date and author of the latest move out of an open status, for tickets
/// whose resolution marks them as fixed.
///
/// "Latest" means last in the order the tracker returned the history, not
/// the greatest timestamp. An old value without a label never matches; a
/// scalar old value means the history is malformed and ends the scan.
pub fn last_fix_transition(ticket: &Ticket) -> Result<(String, String), DeriveError> {
    if !FIXED_RESOLUTIONS.contains(&ticket.resolution_label()) {
        return Ok(Default::default());
    }

    for (index, entry) in ticket.history.iter().enumerate().rev() {
        if entry.field_label() != Some(CURRENT_STATUS_LABEL) {
            continue;
        }
        let old_label = match &entry.old_value {
            None => "",
            Some(FieldValue::Labelled(reference)) => reference.label.as_deref().unwrap_or_default(),
            Some(_) => return Err(DeriveError::ScalarOldValue { index }),
        };
        if OPEN_STATUSES.contains(&old_label) {
            return Ok((format_date(entry.created_at()), entry.user_name().to_string()));
        }
    }
    Ok(Default::default())
}

pub fn has_source_changeset(ticket: &Ticket) -> &'static str {
    if ticket
        .history
        .iter()
        .any(|h| h.field_label() == Some(CHANGESET_LABEL))
    {
        "Yes"
    } else {
        ""
    }
}

/// New value of the most recent "Root Cause" change by timestamp. Ties keep
/// the tracker's order.
pub fn latest_root_cause(ticket: &Ticket) -> Result<String, DeriveError> {
    let mut entries: Vec<(usize, &HistoryEntry)> = ticket
        .history
        .iter()
        .enumerate()
        .filter(|(_, h)| h.field_name() == Some(ROOT_CAUSE_NAME))
        .collect();
    if entries.is_empty() {
        return Ok(String::new());
    }

    entries.sort_by(|(_, a), (_, b)| b.created_at().cmp(a.created_at()));
    let (index, latest) = entries[0];
    latest
        .new_value
        .as_ref()
        .map(|v| v.to_text())
        .ok_or(DeriveError::MissingNewValue { index })
}

pub fn join_tags(ticket: &Ticket) -> String {
    ticket
        .tags
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
