//! Adapters layer (Hexagonal Architecture)

mod notifier;
mod storage;

pub use notifier::*;
pub use storage::*;
