//! # Ledger Test Suite
//!
//! Cross-crate tests of the commit engine, its stores and the ledger bus.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/              # Criterion benchmarks (hashing, append path)
//! └── src/integration/
//!     ├── chain_flows.rs    # Genesis → operations → configuration changes
//!     └── concurrency.rs    # Racing writers on one ledger
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ledger-tests
//!
//! # By category
//! cargo test -p ledger-tests integration::chain_flows::
//! cargo test -p ledger-tests integration::concurrency::
//!
//! # Benchmarks
//! cargo bench -p ledger-tests
//! ```

pub mod integration;
