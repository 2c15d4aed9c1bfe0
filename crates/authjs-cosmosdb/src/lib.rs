#![doc = include_str!("../README.md")]

pub mod adapter;
pub mod containers;
pub mod format;
pub mod memory;
pub mod options;
pub mod query;
#[cfg(feature = "rest")]
pub mod rest;
pub mod store;

pub use adapter::CosmosAdapter;
pub use containers::{ContainerKind, ContainerResolver};
pub use memory::MemoryStore;
pub use options::CosmosAdapterOptions;
pub use query::{SqlParameter, SqlQuerySpec};
#[cfg(feature = "rest")]
pub use rest::CosmosRestStore;
pub use store::{ContainerRef, Document, DocumentStore, ItemOptions};
