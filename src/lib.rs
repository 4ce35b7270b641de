//! Smart sync core
//!
//! The sync/event-log heart of a relay between mobile and web clients and an
//! ERP backend: an append-only, coalesced change-event log, per-device
//! watermark tracking, a tiered archival and retention sweep, and the pull
//! protocol that ties them together. Designed as best-effort with idempotent
//! replays; the surrounding host owns transport, auth and scheduling.

pub mod config;
pub mod infrastructure;
pub mod sync;

pub use config::SyncConfig;
pub use infrastructure::database::Database;
pub use infrastructure::retry::RetryPolicy;
pub use sync::{
    AppType, ArchiveStats, ArchiveSweeper, EventKind, EventRecord, EventWriter, PullRequest,
    PullResponse, RecordOutcome, Result, SweepReport, SyncError, SyncPuller, SyncService,
    SyncStateSnapshot,
};
