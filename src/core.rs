//! Conversation engine
//!
//! Capability negotiation, debounced detection, the persisted message store
//! and the controller that ties them together.

pub mod capability;
pub mod conversation;
pub mod debounce;
pub mod languages;
pub mod operations;
pub mod storage;
pub mod store;
pub mod text;

#[cfg(test)]
pub(crate) mod testutil;

pub use capability::{CapabilityGateway, CapabilityPlatform};
pub use conversation::{Conversation, MessageState};
pub use debounce::{DebouncedDetector, Detection};
pub use storage::StorageBackend;
