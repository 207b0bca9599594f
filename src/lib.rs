// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod metrics;
pub mod notify;
pub mod source;
pub mod store;
pub mod watch;

// ---- Re-exports for stable public API ----
pub use crate::coordinator::{RunCoordinator, RunReport, RunSummary};
pub use crate::error::CheckError;
pub use crate::extract::ExtractionStrategy;
pub use crate::notify::{NotificationDispatcher, Notifier};
pub use crate::source::Source;
pub use crate::watch::{CheckResult, Outcome, SourceWatch};
