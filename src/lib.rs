//! # HelixKV
//!
//! A polymorphic, embeddable key-value store with:
//! - Pluggable ordered/unordered storage backends
//! - Atomic compare-and-exchange, multi-record exchange, and rekeying
//! - Order-aware cursors that stay safe beside concurrent writers
//! - An asynchronous façade over a bounded worker pool
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Callers (any thread)                     │
//! └──────────┬─────────────────────────────┬────────────────────┘
//!            │ direct calls                │ submissions
//! ┌──────────▼──────────┐        ┌─────────▼─────────┐
//! │   Store / Cursor    │◀───────│    AsyncStore     │
//! │  (shared readers /  │ workers│  (FIFO queue +    │
//! │ exclusive mutators) │        │   worker pool)    │──▶ Future
//! └──────────┬──────────┘        └───────────────────┘
//!            │
//! ┌──────────▼──────────┐
//! │      Backend        │
//! │   (tree | hash)     │
//! └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod backend;
pub mod store;
pub mod index;
pub mod search;
pub mod flat;
pub mod task;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HelixError, Result, StatusCode};
pub use config::OpenOptions;
pub use store::{CasValue, Cursor, RecordAction, Store, INCREMENT_NOOP};
pub use index::{Index, IndexCursor};
pub use task::{AsyncStore, Future};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of HelixKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
