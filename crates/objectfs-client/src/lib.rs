//! objectfs Client - File data path
//!
//! This crate turns file reads and writes into object operations on storage
//! nodes (OSDs) and executes them with replica failover, address resolution
//! and capability renewal.

pub mod capability;
pub mod execute;
pub mod file;
pub mod striping;
pub mod uuid_iterator;
pub mod uuid_resolver;

// Re-exports
pub use capability::{XCapHandler, XCapHolder};
pub use execute::{RequestTarget, RetryPolicy, SyncRequest};
pub use file::{ObjectRead, ObjectWrite, OsdClient, StripedFile};
pub use striping::{
    ErasureTranslator, Raid0Translator, ReadOperation, ShardLayout, StripeTranslator,
    WriteOperation, translator_for,
};
pub use uuid_iterator::UuidIterator;
pub use uuid_resolver::{CachingUuidResolver, DirectoryService, UuidResolver};
