//! # Backplane Test Suite
//!
//! Unified test crate for flows that span several crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── sequencing.rs  # many publishers, one key: gap-free ordering
//!     ├── lifecycle.rs   # reconnect, restore, dispose
//!     └── facade.rs      # Connection addressing over a live bus
//! tests/benches/
//! └── backplane_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p backplane-tests
//! cargo test -p backplane-tests integration::lifecycle
//! cargo bench -p backplane-tests
//! ```

pub mod integration;
