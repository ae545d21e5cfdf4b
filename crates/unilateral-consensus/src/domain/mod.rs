//! Domain layer for the commit engine
//!
//! Plain values only: errors, configuration, guard reports and receipts.
//! Nothing in here touches storage or the bus.

mod config;
mod error;
mod receipt;
mod report;

pub use config::*;
pub use error::*;
pub use receipt::*;
pub use report::*;
