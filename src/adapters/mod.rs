//! Infrastructure Adapters
//!
//! Implementations of the domain ports. Production deployments plug in the
//! network-facing adapters of the surrounding system (DHT directory, TLS
//! piece-store client, durable metadata/queue backends); this module ships
//! the in-memory set used by tests and local harnesses.

mod memory;

pub use memory::{
    MemoryMetadataStore, MemoryPieceNetwork, MemoryRepairQueue, StaticNodeDirectory,
};
