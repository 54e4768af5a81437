/// A Tokio codec that transforms an `AsyncRead` into a `Stream` of
/// `Message`s.
pub mod codec;
/// Inventory items.
mod inv;
/// An enum of all supported message types.
mod message;

/// The twelve-byte command field of the message frame.
mod command;
/// Newtype wrappers for primitive types.
pub mod types;

pub use codec::Codec;
pub use command::Command;
pub use inv::InventoryHash;
pub use message::{Alert, AlertPayload, GetBlocks, GetHeaders, Message, RejectReason, Version};
