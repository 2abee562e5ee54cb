//! Core of `regsync`: pulls tracker tickets matching a saved filter, derives
//! one spreadsheet row per ticket and rewrites a fixed worksheet region.
//!
//! ```text
//! ConfigStore ──► Synchronizer::run
//!                   │ fetch_all (TicketSource, paged)
//!                   │ derive    (Ticket → Row | Skip)
//!                   ▼
//!                 SheetSink: clear region → write rows → write skip count
//! ```

pub mod config;
pub mod credentials;
pub mod derive;
pub mod error;
pub mod io;
pub mod service_account;
pub mod sink;
pub mod source;
pub mod sync;
pub mod ticket;

pub use error::{RegsyncError, Result};
pub use sync::{run_once, RunOutcome, RunSummary, Synchronizer};
