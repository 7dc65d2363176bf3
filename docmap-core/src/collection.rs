//! Collection handles.
//!
//! - [`Collection`] - Untyped handle working with raw BSON documents
//! - [`MappedCollection`] - A collection bound to one entity type, speaking in entities,
//!   example objects and application-level identifiers
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//! use bson::doc;
//!
//! let mocks = store.collection("mockObject").bind::<MockObject>();
//!
//! let saved = mocks.insert(MockObject::new("ten", 10)).await?;
//! let found = mocks.find_one_by_id(saved.saved_id().unwrap()).await?;
//!
//! let tens = mocks.find(&MockObject::example(Some("ten"), None)).await?.to_vec().await?;
//! mocks.remove(doc! { "string": "ten" }).await?;
//! ```

use bson::Document;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::{
    backend::{RawCursor, StoreBackend},
    binding::Binding,
    cursor::TypedCursor,
    entity::Entity,
    error::{OdmError, OdmResult},
    query::{FindOptions, Query},
    translate::{IntoFilter, IntoProjection},
    write::{WriteAck, WriteResult},
};

/// An untyped collection with a reference to a storage backend.
///
/// All documents are plain BSON, with no identifier translation. This is the handle a
/// [`MappedCollection`] is bound to, and the escape hatch back out of one.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Clone for Collection<'a, B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            backend: self.backend,
        }
    }
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    /// Creates a new collection reference (internal use).
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds this collection to the entity type `E`.
    pub fn bind<E: Entity>(self) -> MappedCollection<'a, B, E> {
        MappedCollection::bind(self)
    }

    /// Inserts raw documents.
    ///
    /// # Errors
    ///
    /// Returns an [`OdmError::Store`] if the backend rejects the write.
    pub async fn insert(&self, documents: Vec<Document>) -> OdmResult<WriteAck> {
        self.backend.insert_documents(documents, self.name()).await
    }

    /// Runs a query, returning a cursor over raw documents.
    pub async fn find(&self, query: Query) -> OdmResult<RawCursor> {
        self.backend.find_documents(query, self.name()).await
    }

    /// Deletes every document matching `filter`.
    pub async fn delete(&self, filter: Document) -> OdmResult<WriteAck> {
        self.backend.delete_documents(filter, self.name()).await
    }

    /// Replaces the first document matching `filter`.
    pub async fn replace(
        &self,
        filter: Document,
        document: Document,
        upsert: bool,
    ) -> OdmResult<WriteAck> {
        self.backend.replace_document(filter, document, upsert, self.name()).await
    }

    /// Counts documents matching `filter`.
    pub async fn count(&self, filter: Document) -> OdmResult<u64> {
        self.backend.count_documents(filter, self.name()).await
    }

    /// Drops this collection and all of its documents.
    pub async fn drop_collection(&self) -> OdmResult<()> {
        self.backend.drop_collection(self.name()).await
    }
}

/// A collection bound to the entity type `E`.
///
/// The identity descriptor and field table of `E` are derived once, when the collection is
/// bound, and never change afterwards. Apart from that binding the handle holds no state, so
/// it can be shared freely between tasks.
///
/// Filters accept an explicit [`Document`], an [`Expr`](crate::query::Expr), or a reference
/// to an example entity whose set fields constrain the match. Projections accept an explicit
/// [`Document`] or an example entity whose set fields are included.
#[derive(Debug)]
pub struct MappedCollection<'a, B: StoreBackend, E: Entity> {
    raw: Collection<'a, B>,
    binding: Arc<Binding<E>>,
}

impl<'a, B: StoreBackend, E: Entity> Clone for MappedCollection<'a, B, E> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            binding: Arc::clone(&self.binding),
        }
    }
}

impl<'a, B: StoreBackend, E: Entity> MappedCollection<'a, B, E> {
    /// Binds a raw collection to the entity type `E`.
    pub fn bind(raw: Collection<'a, B>) -> Self {
        let binding = Arc::new(Binding::new(raw.name()));

        debug!(
            collection = raw.name(),
            id_key = binding.id().key(),
            codec = ?binding.codec(),
            fields = binding.fields().len(),
            "bound entity to collection"
        );

        Self { raw, binding }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.raw.name()
    }

    /// The untyped collection this handle is bound to.
    pub fn raw(&self) -> &Collection<'a, B> {
        &self.raw
    }

    pub fn binding(&self) -> &Binding<E> {
        &self.binding
    }

    /// Rebinds the same collection to a different entity type.
    pub fn with_type<T: Entity>(&self) -> MappedCollection<'a, B, T> {
        MappedCollection::bind(self.raw.clone())
    }

    /// Finds every entity matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter cannot be translated or the backend query fails.
    pub async fn find(&self, filter: impl IntoFilter<E>) -> OdmResult<TypedCursor<E>> {
        self.query(filter.into_filter(&self.binding)?, None, FindOptions::default()).await
    }

    /// Finds every entity in the collection.
    pub async fn find_all(&self) -> OdmResult<TypedCursor<E>> {
        self.query(Document::new(), None, FindOptions::default()).await
    }

    /// Finds every entity matching `filter`, loading only the fields named by `keys`.
    ///
    /// Fields left out of the projection decode to their unset value.
    pub async fn find_projected(
        &self,
        filter: impl IntoFilter<E>,
        keys: impl IntoProjection<E>,
    ) -> OdmResult<TypedCursor<E>> {
        let filter = filter.into_filter(&self.binding)?;
        let projection = keys.into_projection(&self.binding)?;

        self.query(filter, Some(projection), FindOptions::default()).await
    }

    /// Finds entities matching `filter`, with paging and sorting.
    pub async fn find_with_options(
        &self,
        filter: impl IntoFilter<E>,
        options: FindOptions,
    ) -> OdmResult<TypedCursor<E>> {
        self.query(filter.into_filter(&self.binding)?, None, options).await
    }

    /// Finds the first entity matching `filter`.
    pub async fn find_one(&self, filter: impl IntoFilter<E>) -> OdmResult<Option<E>> {
        self.query(filter.into_filter(&self.binding)?, None, FindOptions::new().limit(1))
            .await?
            .next_entity()
            .await
    }

    /// Finds the entity with the given application-level identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OdmError::MalformedIdentifier`] if `id` cannot be encoded.
    pub async fn find_one_by_id(&self, id: &E::Id) -> OdmResult<Option<E>> {
        self.query(self.binding.filter_by_id(id)?, None, FindOptions::new().limit(1))
            .await?
            .next_entity()
            .await
    }

    /// Counts the entities matching `filter`.
    pub async fn count(&self, filter: impl IntoFilter<E>) -> OdmResult<u64> {
        let filter = filter.into_filter(&self.binding)?;

        trace!(collection = self.name(), ?filter, "count");

        self.raw.count(filter).await
    }

    /// Inserts one entity, generating its identifier if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`OdmError::MissingIdentifier`] if the entity has no identifier and none can be
    /// generated, or [`OdmError::Store`] if the backend rejects the write.
    pub async fn insert(&self, entity: E) -> OdmResult<WriteResult<E>> {
        self.insert_many(vec![entity]).await
    }

    /// Inserts several entities in one write, generating identifiers where missing.
    ///
    /// An empty batch writes nothing and reports zero affected documents.
    pub async fn insert_many(&self, entities: Vec<E>) -> OdmResult<WriteResult<E>> {
        if entities.is_empty() {
            return Ok(WriteResult::from_ack(WriteAck::acknowledged(0)));
        }

        let mut objects = Vec::with_capacity(entities.len());
        let mut ids = Vec::with_capacity(entities.len());
        let mut documents = Vec::with_capacity(entities.len());

        for mut entity in entities {
            let (id, document) = self.prepare(&mut entity)?;

            objects.push(entity);
            ids.push(id);
            documents.push(document);
        }

        debug!(collection = self.name(), count = documents.len(), "insert");

        let ack = self.raw.insert(documents.clone()).await?;

        Ok(WriteResult::new(ack, objects, ids, documents))
    }

    /// Inserts the entity, or replaces the stored document with the same identifier.
    pub async fn save(&self, mut entity: E) -> OdmResult<WriteResult<E>> {
        if entity.id().is_none() {
            return self.insert(entity).await;
        }

        let (id, document) = self.prepare(&mut entity)?;
        let filter = self.binding.filter_by_id(&id)?;

        debug!(collection = self.name(), ?filter, "save");

        let ack = self.raw.replace(filter, document.clone(), true).await?;

        Ok(WriteResult::new(ack, vec![entity], vec![id], vec![document]))
    }

    /// Replaces the stored document whose identifier is `id` with `entity`.
    ///
    /// The entity's own identifier is overwritten with `id`. Nothing is written when no
    /// document has that identifier; the result then reports zero affected documents.
    pub async fn update_by_id(&self, id: &E::Id, mut entity: E) -> OdmResult<WriteResult<E>> {
        entity.set_id(id.clone());

        let (id, document) = self.prepare(&mut entity)?;
        let filter = self.binding.filter_by_id(&id)?;

        debug!(collection = self.name(), ?filter, "update by id");

        let ack = self.raw.replace(filter, document.clone(), false).await?;

        Ok(WriteResult::new(ack, vec![entity], vec![id], vec![document]))
    }

    /// Removes every entity matching `filter`.
    pub async fn remove(&self, filter: impl IntoFilter<E>) -> OdmResult<WriteResult<E>> {
        let filter = filter.into_filter(&self.binding)?;

        debug!(collection = self.name(), ?filter, "remove");

        Ok(WriteResult::from_ack(self.raw.delete(filter).await?))
    }

    /// Removes the entity with the given application-level identifier.
    pub async fn remove_by_id(&self, id: &E::Id) -> OdmResult<WriteResult<E>> {
        self.remove(self.binding.filter_by_id(id)?).await
    }

    /// Drops the underlying collection and all of its documents.
    pub async fn drop_collection(&self) -> OdmResult<()> {
        debug!(collection = self.name(), "drop collection");

        self.raw.drop_collection().await
    }

    async fn query(
        &self,
        filter: Document,
        projection: Option<Document>,
        options: FindOptions,
    ) -> OdmResult<TypedCursor<E>> {
        debug!(collection = self.name(), ?filter, ?projection, "find");

        let mut query = Query::builder().filter(filter).options(options);

        if let Some(projection) = projection {
            query = query.projection(projection);
        }

        let raw = self.raw.find(query.build()).await?;

        Ok(TypedCursor::new(raw, Arc::clone(&self.binding)))
    }

    // Assigns a missing identifier and encodes the entity for the store.
    fn prepare(&self, entity: &mut E) -> OdmResult<(E::Id, Document)> {
        self.binding.assign_id(entity)?;

        let id = entity
            .id()
            .cloned()
            .ok_or_else(|| OdmError::MissingIdentifier(self.name().to_string()))?;
        let document = self.binding.encode_entity(entity)?;

        Ok((id, document))
    }
}
