//! Storage backend abstraction for mapped collections.
//!
//! The [`StoreBackend`] trait is the boundary between the mapper and a concrete document
//! store. Backends only ever see BSON documents: filters and projections have already been
//! translated, identifiers already encoded. Whatever wire protocol the store speaks is the
//! backend's business.
//!
//! ```ignore
//! use docmap::backend::StoreBackend;
//! use docmap::query::Query;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! backend.insert_documents(vec![doc! { "_id": 1, "name": "Alice" }], "users").await?;
//!
//! let cursor = backend
//!     .find_documents(Query::builder().filter(doc! { "name": "Alice" }).build(), "users")
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::{error::OdmResult, query::Query, write::WriteAck};

/// A lazily consumed stream of raw documents produced by a backend query.
pub type RawCursor = BoxStream<'static, OdmResult<Document>>;

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks.
///
/// # Error Handling
///
/// Failures are reported as [`OdmError::Store`](crate::error::OdmError::Store) and are
/// never retried by the mapper.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts documents into a collection, creating the collection if needed.
    ///
    /// Documents without an `_id` are assigned one by the backend. Inserting a document whose
    /// `_id` already exists fails.
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> OdmResult<WriteAck>;

    /// Runs a query, returning a cursor over matching documents in store order.
    ///
    /// A missing collection yields an empty cursor.
    async fn find_documents(&self, query: Query, collection: &str) -> OdmResult<RawCursor>;

    /// Deletes every document matching `filter`.
    async fn delete_documents(&self, filter: Document, collection: &str) -> OdmResult<WriteAck>;

    /// Replaces the first document matching `filter`, inserting `document` when nothing
    /// matches and `upsert` is set.
    async fn replace_document(
        &self,
        filter: Document,
        document: Document,
        upsert: bool,
        collection: &str,
    ) -> OdmResult<WriteAck>;

    /// Counts the documents matching `filter`.
    async fn count_documents(&self, filter: Document, collection: &str) -> OdmResult<u64>;

    /// Creates a new collection.
    async fn create_collection(&self, name: &str) -> OdmResult<()>;

    /// Drops a collection and all of its documents.
    async fn drop_collection(&self, name: &str) -> OdmResult<()>;

    /// Lists all collection names.
    async fn list_collections(&self) -> OdmResult<Vec<String>>;

    /// Shuts down the backend, releasing any resources.
    async fn shutdown(self) -> OdmResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory for backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> OdmResult<Self::Backend>;
}
