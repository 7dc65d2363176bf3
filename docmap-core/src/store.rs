//! Main document store interface.
//!
//! A [`DocumentStore`] owns a backend and hands out collection handles borrowing it:
//!
//! - [`DocumentStore::collection`] - Untyped handle over raw documents
//! - [`DocumentStore::mapped_collection`] - Handle bound to an entity type, named after it
//!
//! # Example
//!
//! ```ignore
//! use docmap::store::DocumentStore;
//! use docmap::memory::MemoryStoreBackend;
//!
//! let store = DocumentStore::new(MemoryStoreBackend::new());
//! let mocks = store.mapped_collection::<MockObject>();
//! ```

use tracing::info;

use crate::{
    backend::StoreBackend,
    collection::{Collection, MappedCollection},
    entity::Entity,
    error::OdmResult,
};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets a collection bound to the entity type `E`.
    ///
    /// The collection name is taken from [`Entity::collection_name`].
    pub fn mapped_collection<'a, E: Entity>(&'a self) -> MappedCollection<'a, B, E> {
        self.collection(E::collection_name()).bind()
    }

    /// Gets an untyped collection with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the collection
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Creates a new collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection already exists or creation fails.
    pub async fn create_collection(&self, name: &str) -> OdmResult<()> {
        self.backend
            .create_collection(name)
            .await
    }

    /// Drops a collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection does not exist or deletion fails.
    pub async fn drop_collection(&self, name: &str) -> OdmResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> OdmResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// This consumes the store and should be called when no longer needed.
    pub async fn shutdown(self) -> OdmResult<()> {
        info!("shutting down document store");

        self.backend.shutdown().await
    }
}
