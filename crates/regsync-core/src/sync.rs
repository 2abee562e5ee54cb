//! End-to-end synchronization run: fetch, derive, clear, rewrite, count.
//!
//! [`Synchronizer::run`] never fails. Every problem is logged and reported
//! through the returned [`RunSummary`]. Sink mutations applied before a
//! failure are not rolled back, so a failed run may leave the target region
//! cleared but not rewritten.

use crate::config::{self, ConfigStore};
use crate::derive::{derive, Derived, Row};
use crate::error::ConfigError;
use crate::sink::{SheetSink, SheetsClient, TargetRegion};
use crate::source::{fetch_all, MantisClient, TicketSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// The filter matched nothing; the sheet was left alone.
    NoTickets,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetched: usize,
    pub processed: usize,
    pub skipped: usize,
    pub outcome: RunOutcome,
}

impl RunSummary {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            finished_at: now,
            fetched: 0,
            processed: 0,
            skipped: 0,
            outcome: RunOutcome::Completed,
        }
    }

    fn finish(mut self, outcome: RunOutcome) -> Self {
        self.finished_at = Utc::now();
        self.outcome = outcome;
        self
    }

    fn fail(self, reason: impl std::fmt::Display) -> Self {
        self.finish(RunOutcome::Failed {
            reason: reason.to_string(),
        })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, RunOutcome::Failed { .. })
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

pub struct Synchronizer<S, K> {
    store: Arc<ConfigStore>,
    source: S,
    sink: K,
    region: TargetRegion,
}

impl Synchronizer<MantisClient, SheetsClient> {
    /// Build the production tracker and spreadsheet clients from `store`.
    pub fn from_config(store: Arc<ConfigStore>) -> crate::Result<Self> {
        let source = MantisClient::from_config(&store)?;
        let sink = SheetsClient::from_config(&store)?;
        Ok(Self::new(store, source, sink))
    }
}

impl<S: TicketSource, K: SheetSink> Synchronizer<S, K> {
    pub fn new(store: Arc<ConfigStore>, source: S, sink: K) -> Self {
        Self {
            store,
            source,
            sink,
            region: TargetRegion::default(),
        }
    }

    pub fn with_region(mut self, region: TargetRegion) -> Self {
        self.region = region;
        self
    }

    pub fn run(&self) -> RunSummary {
        let mut summary = RunSummary::begin();
        info!(run = %summary.id, "starting regression progress update");

        let Some(filter_id) = self.store.get_str(config::FILTER_ID) else {
            error!(run = %summary.id, "filter id not found in config");
            return summary.fail(ConfigError::MissingKey(config::FILTER_ID));
        };
        let page_size = match self.store.page_size() {
            Ok(n) => n,
            Err(e) => {
                error!(run = %summary.id, error = %e, "invalid page size");
                return summary.fail(e);
            }
        };
        let view_base = self.store.get_str(config::MANTIS_PATH).unwrap_or_default();

        info!(filter_id = %filter_id, "fetching tickets using filter");
        let tickets = fetch_all(&self.source, &filter_id, page_size);
        summary.fetched = tickets.len();
        if tickets.is_empty() {
            warn!(filter_id = %filter_id, "no issues found with the given filter");
            return summary.finish(RunOutcome::NoTickets);
        }
        info!(total = tickets.len(), "total issues fetched");

        let mut rows: Vec<Row> = Vec::with_capacity(tickets.len());
        for ticket in &tickets {
            match derive(ticket, &view_base) {
                Derived::Row(row) => rows.push(*row),
                Derived::Skip => summary.skipped += 1,
            }
        }
        summary.processed = rows.len();
        info!(skipped = summary.skipped, processed = summary.processed, "derived rows");

        match self.publish(&rows, summary.skipped) {
            Ok(()) => {
                info!(run = %summary.id, "regression progress sheet updated successfully");
                summary.finish(RunOutcome::Completed)
            }
            Err(e) => {
                error!(run = %summary.id, error = %e, "failed to update spreadsheet");
                summary.fail(e)
            }
        }
    }

    /// Clear the region, write `rows` from its first row and record the skip
    /// count. The clear and the counter write happen even with no rows.
    fn publish(&self, rows: &[Row], skipped: usize) -> crate::Result<()> {
        let spreadsheet = self.store.require_str(config::SHEET_KEY)?;
        let sheet = self.store.require_str(config::SHEET_NAME)?;
        info!(spreadsheet = %spreadsheet, sheet = %sheet, "updating spreadsheet");

        self.sink
            .clear_range(&spreadsheet, &sheet, &self.region.full_range())?;

        if let Some(range) = self.region.write_range(rows.len()) {
            if rows.len() > self.region.capacity() {
                warn!(
                    rows = rows.len(),
                    capacity = self.region.capacity(),
                    "row count exceeds the cleared region; stale cells below it are not cleared"
                );
            }
            self.sink.write_rows(&spreadsheet, &sheet, &range, rows)?;
        }

        self.sink.write_cell(
            &spreadsheet,
            &sheet,
            self.region.counter_cell,
            serde_json::Value::from(skipped),
        )?;
        Ok(())
    }
}

/// Build the production clients from `store` and run once. Client
/// construction failures are reported as a failed run.
pub fn run_once(store: Arc<ConfigStore>) -> RunSummary {
    match Synchronizer::from_config(store) {
        Ok(sync) => sync.run(),
        Err(e) => {
            error!(error = %e, "could not initialise synchronization clients");
            RunSummary::begin().fail(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SinkError, SourceError};
    use crate::source::Page;
    use crate::ticket::Ticket;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    // -- fakes -------------------------------------------------------------

    struct FakeSource {
        tickets: Vec<Ticket>,
        requested: RefCell<Vec<u32>>,
    }

    impl FakeSource {
        fn new(tickets: Vec<Ticket>) -> Self {
            Self {
                tickets,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl TicketSource for FakeSource {
        fn fetch_page(&self, _filter: &str, page: u32, size: u32) -> Result<Page, SourceError> {
            self.requested.borrow_mut().push(page);
            let start = (page as usize - 1) * size as usize;
            let tickets: Vec<Ticket> = self.tickets.iter().skip(start).take(size as usize).cloned().collect();
            Ok(Page {
                returned: tickets.len(),
                tickets,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Clear(String),
        Rows(String, usize),
        Cell(String, Value),
    }

    /// Records calls and keeps a sparse grid of written cells.
    #[derive(Default)]
    struct FakeSheet {
        calls: RefCell<Vec<Call>>,
        grid: RefCell<BTreeMap<usize, Vec<String>>>,
        cells: RefCell<BTreeMap<String, Value>>,
        fail_on_write: bool,
    }

    fn row_bounds(range: &str) -> (usize, usize) {
        let num = |s: &str| s.trim_start_matches(char::is_alphabetic).parse::<usize>().unwrap();
        let (a, b) = range.split_once(':').unwrap();
        (num(a), num(b))
    }

    impl SheetSink for FakeSheet {
        fn clear_range(&self, _ss: &str, _sheet: &str, range: &str) -> Result<(), SinkError> {
            self.calls.borrow_mut().push(Call::Clear(range.to_string()));
            let (from, to) = row_bounds(range);
            self.grid.borrow_mut().retain(|r, _| *r < from || *r > to);
            Ok(())
        }

        fn write_rows(&self, _ss: &str, _sheet: &str, range: &str, rows: &[Row]) -> Result<(), SinkError> {
            self.calls.borrow_mut().push(Call::Rows(range.to_string(), rows.len()));
            if self.fail_on_write {
                return Err(SinkError::Rejected("quota exceeded".into()));
            }
            let (from, _) = row_bounds(range);
            let mut grid = self.grid.borrow_mut();
            for (i, row) in rows.iter().enumerate() {
                grid.insert(from + i, row.cells().to_vec());
            }
            Ok(())
        }

        fn write_cell(&self, _ss: &str, _sheet: &str, cell: &str, value: Value) -> Result<(), SinkError> {
            self.calls.borrow_mut().push(Call::Cell(cell.to_string(), value.clone()));
            self.cells.borrow_mut().insert(cell.to_string(), value);
            Ok(())
        }
    }

    // -- helpers -----------------------------------------------------------

    fn store(dir: &TempDir, filter: Option<&str>) -> Arc<ConfigStore> {
        let mut initial = serde_json::Map::new();
        initial.insert(config::MANTIS_PATH.into(), json!("https://mantis.example.com"));
        initial.insert(config::SHEET_KEY.into(), json!("sheet-key"));
        initial.insert(config::SHEET_NAME.into(), json!("Nexus E6"));
        if let Some(f) = filter {
            initial.insert(config::FILTER_ID.into(), json!(f));
        }
        Arc::new(ConfigStore::create(dir.path().join("config.json"), initial).unwrap())
    }

    fn ticket(id: u64, faucet: &str, record_type: &str) -> Ticket {
        serde_json::from_value(json!({
            "id": id,
            "summary": format!("ticket {id}"),
            "custom_fields": [
                {"field": {"name": "Faucet"}, "value": faucet},
                {"field": {"name": "Record Type"}, "value": record_type}
            ]
        }))
        .unwrap()
    }

    // -- scenarios ---------------------------------------------------------

    #[test]
    fn three_tickets_one_skipped() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::new(vec![
            ticket(1, "Technical Debt.", "Bug"),
            ticket(2, "Regression", "Bug"),
            ticket(3, "Customer", "Enhancement"),
        ]);
        let sync = Synchronizer::new(store(&dir, Some("55")), source, FakeSheet::default());

        let summary = sync.run();

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            *sync.sink.calls.borrow(),
            vec![
                Call::Clear("A3:R2000".into()),
                Call::Rows("A3:R4".into(), 2),
                Call::Cell("G1".into(), json!(1)),
            ]
        );
        let grid = sync.sink.grid.borrow();
        assert_eq!(grid[&3][4], "ticket 2");
        assert_eq!(grid[&4][4], "ticket 3");
    }

    #[test]
    fn zero_tickets_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let sync = Synchronizer::new(store(&dir, Some("55")), FakeSource::new(vec![]), FakeSheet::default());

        let summary = sync.run();

        assert_eq!(summary.outcome, RunOutcome::NoTickets);
        assert_eq!((summary.processed, summary.skipped), (0, 0));
        assert!(sync.sink.calls.borrow().is_empty());
    }

    #[test]
    fn missing_filter_aborts_before_fetch() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::new(vec![ticket(1, "", "")]);
        let sync = Synchronizer::new(store(&dir, None), source, FakeSheet::default());

        let summary = sync.run();

        assert!(summary.is_failure());
        assert_eq!((summary.processed, summary.skipped), (0, 0));
        assert!(sync.source.requested.borrow().is_empty());
        assert!(sync.sink.calls.borrow().is_empty());
    }

    #[test]
    fn all_skipped_still_clears_and_counts() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::new(vec![
            ticket(1, "Technical Debt.", "Bug"),
            ticket(2, "Technical Debt.", "Task"),
        ]);
        let sync = Synchronizer::new(store(&dir, Some("55")), source, FakeSheet::default());

        let summary = sync.run();

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(
            *sync.sink.calls.borrow(),
            vec![Call::Clear("A3:R2000".into()), Call::Cell("G1".into(), json!(2))]
        );
    }

    #[test]
    fn rerun_produces_identical_region() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::new(vec![ticket(1, "Regression", "Bug"), ticket(2, "Technical Debt.", "Bug")]);
        let sync = Synchronizer::new(store(&dir, Some("55")), source, FakeSheet::default());

        sync.run();
        let first_grid = sync.sink.grid.borrow().clone();
        let first_cells = sync.sink.cells.borrow().clone();
        sync.run();

        assert_eq!(*sync.sink.grid.borrow(), first_grid);
        assert_eq!(*sync.sink.cells.borrow(), first_cells);
    }

    #[test]
    fn shrinking_result_leaves_no_stale_rows() {
        let dir = TempDir::new().unwrap();
        let sheet = FakeSheet::default();
        sheet.grid.borrow_mut().insert(10, vec!["stale".into()]);
        let sync = Synchronizer::new(store(&dir, Some("55")), FakeSource::new(vec![ticket(1, "", "")]), sheet);

        sync.run();

        let grid = sync.sink.grid.borrow();
        assert_eq!(grid.keys().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn sink_failure_aborts_remaining_steps() {
        let dir = TempDir::new().unwrap();
        let sheet = FakeSheet {
            fail_on_write: true,
            ..Default::default()
        };
        let sync = Synchronizer::new(store(&dir, Some("55")), FakeSource::new(vec![ticket(1, "", "")]), sheet);

        let summary = sync.run();

        assert!(summary.is_failure());
        assert_eq!(
            *sync.sink.calls.borrow(),
            vec![Call::Clear("A3:R2000".into()), Call::Rows("A3:R3".into(), 1)]
        );
    }

    #[test]
    fn missing_sheet_key_fails_without_touching_sheet() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Some("55"));
        store.set(config::SHEET_KEY, Value::Null).unwrap();
        let sync = Synchronizer::new(store, FakeSource::new(vec![ticket(1, "", "")]), FakeSheet::default());

        let summary = sync.run();

        assert!(summary.is_failure());
        assert!(sync.sink.calls.borrow().is_empty());
    }

    #[test]
    fn pages_through_configured_page_size() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Some("55"));
        store.set(config::PAGE_SIZE, json!(2)).unwrap();
        let tickets = (1..=3).map(|i| ticket(i, "", "")).collect();
        let sync = Synchronizer::new(store, FakeSource::new(tickets), FakeSheet::default());

        let summary = sync.run();

        assert_eq!(summary.processed, 3);
        assert_eq!(*sync.source.requested.borrow(), vec![1, 2]);
    }

    #[test]
    fn overflowing_region_still_writes_every_row() {
        let dir = TempDir::new().unwrap();
        let tickets = (1..=3).map(|i| ticket(i, "", "")).collect();
        let region = TargetRegion {
            last_row: 4,
            ..TargetRegion::default()
        };
        let sync = Synchronizer::new(store(&dir, Some("55")), FakeSource::new(tickets), FakeSheet::default())
            .with_region(region);

        sync.run();

        assert_eq!(
            *sync.sink.calls.borrow(),
            vec![
                Call::Clear("A3:R4".into()),
                Call::Rows("A3:R5".into(), 3),
                Call::Cell("G1".into(), json!(0)),
            ]
        );
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let failed = RunOutcome::Failed {
            reason: "boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"status": "failed", "reason": "boom"})
        );
        assert_eq!(
            serde_json::to_value(RunOutcome::NoTickets).unwrap(),
            json!({"status": "no_tickets"})
        );
    }
}
