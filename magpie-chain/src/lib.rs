//! Consensus-critical types for magpie, a parametric Bitcoin-family node.
//!
//! This crate contains the data structures that cross the wire or the
//! disk: blocks, transactions, scripts-as-bytes, amounts, difficulty, and
//! the `Coin` parameter record that selects a concrete chain. The wire
//! encoding lives in [`serialization`] and is shared by the network codec
//! and the stores.

#![allow(clippy::unit_arg)]

pub mod amount;
pub mod block;
pub mod cached;
pub mod compactint;
pub mod parameters;
pub mod serialization;
pub mod transaction;
pub mod transparent;
pub mod work;

pub use amount::Amount;
pub use cached::Cached;
pub use compactint::CompactInt;
pub use serialization::{
    SerializationError, WireDeserialize, WireDeserializeInto, WireSerialize,
};
