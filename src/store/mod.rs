//! Store Subsystem
//!
//! The coordinator never owns data. Everything it reads or writes goes through
//! `DocumentStoreClient`, and everything it writes is shaped as `WriteOp`s.
//!
//! This module provides:
//! - `DocumentStoreClient` - the external store contract
//! - `WriteOp` / `BulkResponse` - the bulk protocol
//! - `InMemoryStore` - a reference store with fault injection
//! - `DocumentSerializer` - the injected body codec

mod client;
mod errors;
mod memory;
pub mod messages;
mod serializer;

pub use client::{BulkItem, BulkOutcome, BulkResponse, DocumentStoreClient, PutMode, WriteOp};
pub use errors::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use serializer::{DocumentSerializer, JsonSerializer, SerializeError};
