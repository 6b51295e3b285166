pub mod jsonl;
pub mod log;
pub mod reconcile;

pub use log::EventLog;
pub use reconcile::{MergeMode, MergeReport, Reconciler, StaleRejection};
