//! santa-core: shared pieces of the SuperSanta client SDK
//!
//! Holds what every other crate needs and nothing more: client
//! configuration, the wire data models, and the local persistence
//! abstraction the session and identity contexts write through.

pub mod config;
pub mod storage;
pub mod types;

pub use config::ClientConfig;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use types::{Group, GroupInfo, User, UserSelf};
