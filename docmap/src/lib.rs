//! Main docmap crate: a typed object-document mapper over BSON document stores.
//!
//! This crate is the primary entry point for users of docmap. It re-exports the core types,
//! the `Entity` derive and the storage backends.
//!
//! # Features
//!
//! - **Typed collections** - Read and write plain serde structs instead of raw documents
//! - **Identifier translation** - Work with hex text identifiers while the store keeps
//!   native ObjectIds
//! - **Query by example** - Use a partially filled entity as a filter or a projection
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
//! #[entity(collection = "mockObject")]
//! pub struct MockObject {
//!     #[entity(id, object_id)]
//!     #[serde(rename = "_id")]
//!     pub id: Option<String>,
//!     pub string: Option<String>,
//!     pub integer: Option<i32>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> OdmResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let mocks = store.mapped_collection::<MockObject>();
//!
//!     // The saved id is hex text; the stored `_id` is an ObjectId.
//!     let saved = mocks
//!         .insert(MockObject { id: None, string: Some("ten".into()), integer: Some(10) })
//!         .await?;
//!     let id = saved.saved_id().cloned().unwrap_or_default();
//!
//!     let found = mocks.find_one_by_id(&id).await?;
//!
//!     // Query by example: only the set fields constrain the match.
//!     let example = MockObject { id: None, string: Some("ten".into()), integer: None };
//!     let tens = mocks.find(&example).await?.to_vec().await?;
//!
//!     // Explicit filters use the store's operator syntax.
//!     mocks.remove(doc! { "integer": { "$gte": 100 } }).await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docmap;

pub mod prelude;

pub use docmap_core::{
    backend, binding, collection, cursor, entity, error, identity, query, store, translate,
    write,
};
pub use docmap_macros::Entity;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmap_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmap_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
