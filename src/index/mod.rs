//! Index Module
//!
//! Durable metadata kept beside the segments.
//!
//! ## Responsibilities
//! - Map each block id to `{segment seq, frame offset}`
//! - Hold the single checkpoint record under a reserved key
//! - Remember frame ranges that recovery adopted without an acknowledgement
//! - Honor a per-write durability flag
//!
//! ## Checkpoint Format
//! ```text
//! ┌──────────────────────┬──────────────────────┐
//! │ SegmentSeq (varint)  │ GoodOffset (varint)  │
//! └──────────────────────┴──────────────────────┘
//! ```

mod checkpoint;
mod store;

pub use checkpoint::Checkpoint;
pub use store::{AdoptedRange, BlockIndex, IndexStore, RocksIndexStore, ADOPTED_KEY, CHECKPOINT_KEY};
