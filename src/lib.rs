//! # blocklog
//!
//! A log-structured block store: callers hand in opaque payloads and get back
//! an identifier that later retrieves the exact bytes.
//! - Append-only segments of length-prefixed, checksummed chunks
//! - Durable checkpoint as the single recovery anchor
//! - Crash recovery that trims torn tails and never serves partial frames
//! - Segment rotation at a size threshold
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      StoreManager                           │
//! │             write / read / close, recovery                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Segments   │          │ IndexStore  │
//!   │ writer/scan │          │  (RocksDB)  │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Chunk codec │          │ Checkpoint  │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod segment;
pub mod index;
pub mod manager;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BlockLogError, Result};
pub use config::Config;
pub use manager::{RecoveryReport, SegmentReport, StoreManager};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of blocklog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
