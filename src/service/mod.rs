//! The bundled Rekor service.
//!
//! The gateway only ever sees the `Rekor` trait; this module provides an
//! implementation small enough to host in one process, so the binary runs
//! standalone and the integration tests have a real log behind both
//! listeners.

pub mod memory;
pub mod merkle;

pub use memory::{MemoryLog, TILE_WIDTH};
pub use merkle::MerkleTree;
