pub mod config;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod types;
pub mod usage;

pub use config::RewindConfig;
pub use error::RewindError;
pub use types::*;
pub use usage::UsageSummary;
