// Fee Ledger - Core Library
// Exposes the ledger engine, the store, and whole-store sync for the CLI,
// the server binary, and tests

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod slip;
pub mod snapshot;
pub mod sync;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    NewPerson, PaymentEvent, Person, PersonUpdate, Store,
    delete_group, delete_person, get_payments_for_person, get_person, insert_person,
    list_groups, list_persons, setup_database, update_person,
};
pub use error::{ConfigError, LedgerError, LedgerResult, SyncError};
pub use ledger::{
    LedgerSummary, MonthRecord, MonthStatus,
    compute_schedule, ledger_summary, month_name, payment_schedule, set_payment,
};
pub use slip::{export_slip, write_slip};
pub use snapshot::Snapshot;
pub use sync::{SyncClient, SyncOutcome, SyncReport, SyncStage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
