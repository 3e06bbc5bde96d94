//! Chain data structures and byte-level parsing for the Flux blockchain.
//!
//! Flux is a Zcash-Sapling-derived chain with extra transaction versions
//! for fluxnode registration operations and, from block version 100, a
//! proof-of-node block header. This crate decodes raw block bytes into
//! typed structures and exposes the capability surface the batch indexer
//! consumes: transparent inputs/outputs, shielded flow scalars, and
//! fluxnode operations with their daemon-rule txids.

pub mod amount;
pub mod block;
pub mod fluxnode;
pub mod parameters;
pub mod serialization;
pub mod transaction;
pub mod transparent;

pub use amount::Amount;
pub use serialization::{ByteCursor, FluxSerialize, ParseError};
