//! In-memory storage implementation for document stores.
//!
//! Documents are kept per collection in insertion order, behind an async-aware
//! read-write lock. Filters are parsed into expressions and evaluated document by
//! document; there is no indexing.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use tracing::{debug, trace};

use docmap_core::{
    backend::{RawCursor, StoreBackend, StoreBackendBuilder},
    error::{OdmError, OdmResult},
    identity::ID_KEY,
    query::{Expr, Query, SortDirection, is_truthy, parse_filter},
    write::WriteAck,
};

use crate::evaluator::{Comparable, DocumentEvaluator};

type CollectionData = Vec<Document>;
type StoreMap = HashMap<String, CollectionData>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share
/// the same underlying data and can be handed to separate tasks.
///
/// Like a real document store it assigns an ObjectId `_id` to documents inserted without
/// one, and rejects inserts that would duplicate an existing `_id`.
///
/// # Example
///
/// ```ignore
/// use docmap_memory::InMemoryStore;
/// use docmap::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_documents(vec![doc! { "name": "Alice", "age": 30 }], "users").await?;
/// assert_eq!(store.count_documents(doc! { "name": "Alice" }, "users").await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

fn matching(documents: &[Document], expr: &Expr) -> OdmResult<Vec<usize>> {
    let mut positions = Vec::new();

    for (position, document) in documents.iter().enumerate() {
        if DocumentEvaluator::matches(document, expr)? {
            positions.push(position);
        }
    }

    Ok(positions)
}

fn duplicate_key(id: &Bson, collection: &str) -> OdmError {
    OdmError::Store(format!("duplicate key {ID_KEY}: {id} in collection {collection}"))
}

// Puts `_id` first, generating one when the document has none.
fn with_id(mut document: Document, fallback: impl FnOnce() -> Bson) -> Document {
    let id = document.remove(ID_KEY).unwrap_or_else(fallback);
    let mut stored = Document::new();

    stored.insert(ID_KEY, id);

    for (key, value) in document {
        stored.insert(key, value);
    }

    stored
}

fn project(document: Document, projection: &Document) -> Document {
    let include_id = projection.get(ID_KEY).is_none_or(is_truthy);
    let inclusive = projection.values().any(is_truthy);

    document
        .into_iter()
        .filter(|(key, _)| {
            if key == ID_KEY {
                include_id
            } else if inclusive {
                projection.get(key).is_some_and(is_truthy)
            } else {
                projection.get(key).is_none_or(is_truthy)
            }
        })
        .collect()
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> OdmResult<WriteAck> {
        let mut store = self.store.write().await;
        let existing = store.entry(collection.to_string()).or_default();

        let mut batch = Vec::with_capacity(documents.len());

        for document in documents {
            let document = with_id(document, || Bson::ObjectId(ObjectId::new()));
            let id = document.get(ID_KEY);

            let taken = existing
                .iter()
                .chain(batch.iter())
                .any(|stored: &Document| stored.get(ID_KEY) == id);

            if taken {
                return Err(duplicate_key(id.unwrap_or(&Bson::Null), collection));
            }

            batch.push(document);
        }

        let inserted = batch.len() as u64;
        existing.extend(batch);

        trace!(collection, inserted, "inserted documents");

        Ok(WriteAck::acknowledged(inserted))
    }

    async fn find_documents(&self, query: Query, collection: &str) -> OdmResult<RawCursor> {
        let expr = parse_filter(&query.filter)?;
        let store = self.store.read().await;

        let Some(documents) = store.get(collection) else {
            return Ok(stream::empty().boxed());
        };

        let mut found: Vec<Document> = matching(documents, &expr)?
            .into_iter()
            .map(|position| documents[position].clone())
            .collect();

        if let Some(sort) = &query.sort {
            found.sort_by(|a, b| {
                let left = a.get(&sort.field).map(Comparable::from).unwrap_or(Comparable::Null);
                let right = b.get(&sort.field).map(Comparable::from).unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.sort_cmp(&right),
                    SortDirection::Desc => right.sort_cmp(&left),
                }
            });
        }

        let results: Vec<OdmResult<Document>> = found
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|document| match &query.projection {
                Some(projection) => project(document, projection),
                None => document,
            })
            .map(Ok)
            .collect();

        debug!(collection, filter = ?query.filter, found = results.len(), "query");

        Ok(stream::iter(results).boxed())
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> OdmResult<WriteAck> {
        let expr = parse_filter(&filter)?;
        let mut store = self.store.write().await;

        let Some(documents) = store.get_mut(collection) else {
            return Ok(WriteAck::acknowledged(0));
        };

        let mut removed = 0;
        let mut kept = Vec::with_capacity(documents.len());

        for document in documents.drain(..) {
            if DocumentEvaluator::matches(&document, &expr)? {
                removed += 1;
            } else {
                kept.push(document);
            }
        }

        *documents = kept;

        trace!(collection, removed, "deleted documents");

        Ok(WriteAck::acknowledged(removed))
    }

    async fn replace_document(
        &self,
        filter: Document,
        document: Document,
        upsert: bool,
        collection: &str,
    ) -> OdmResult<WriteAck> {
        let expr = parse_filter(&filter)?;
        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        if let Some(&position) = matching(documents, &expr)?.first() {
            let current = documents[position].get(ID_KEY).cloned().unwrap_or(Bson::Null);

            if document.get(ID_KEY).is_some_and(|id| *id != current) {
                return Err(OdmError::Store(format!(
                    "replacement would change the immutable field {ID_KEY} in collection {collection}"
                )));
            }

            documents[position] = with_id(document, || current);

            return Ok(WriteAck::acknowledged(1));
        }

        if !upsert {
            return Ok(WriteAck::acknowledged(0));
        }

        // An upsert takes its identifier from the replacement, then from an equality filter.
        let document = with_id(document, || match filter.get(ID_KEY) {
            Some(Bson::Document(_)) | None => Bson::ObjectId(ObjectId::new()),
            Some(id) => id.clone(),
        });
        let id = document.get(ID_KEY).cloned().unwrap_or(Bson::Null);

        if documents.iter().any(|stored| stored.get(ID_KEY) == Some(&id)) {
            return Err(duplicate_key(&id, collection));
        }

        documents.push(document);

        trace!(collection, upserted = %id, "upserted document");

        Ok(WriteAck::acknowledged(1).with_upserted_id(id))
    }

    async fn count_documents(&self, filter: Document, collection: &str) -> OdmResult<u64> {
        let expr = parse_filter(&filter)?;
        let store = self.store.read().await;

        match store.get(collection) {
            Some(documents) => Ok(matching(documents, &expr)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn create_collection(&self, name: &str) -> OdmResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> OdmResult<()> {
        // Dropping a missing collection is not an error.
        if self.store.write().await.remove(name).is_some() {
            debug!(collection = name, "dropped collection");
        }

        Ok(())
    }

    async fn list_collections(&self) -> OdmResult<Vec<String>> {
        let mut names: Vec<String> = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect();

        names.sort();

        Ok(names)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use docmap_memory::InMemoryStore;
/// use docmap::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> OdmResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use futures::TryStreamExt;
    use docmap_core::query::{FindOptions, Query};

    use super::*;

    async fn find(store: &InMemoryStore, query: Query) -> Vec<Document> {
        store
            .find_documents(query, "items")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_generates_missing_ids() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![doc! { "name": "a" }, doc! { "_id": 7, "name": "b" }], "items")
            .await
            .unwrap();

        let documents = find(&store, Query::new()).await;

        assert!(matches!(documents[0].get(ID_KEY), Some(Bson::ObjectId(_))));
        assert_eq!(documents[0].keys().next().map(String::as_str), Some(ID_KEY));
        assert_eq!(documents[1], doc! { "_id": 7, "name": "b" });
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryStore::new();
        store.insert_documents(vec![doc! { "_id": "id1" }], "items").await.unwrap();

        let err = store
            .insert_documents(vec![doc! { "_id": "id2" }, doc! { "_id": "id1" }], "items")
            .await
            .unwrap_err();

        assert!(matches!(err, OdmError::Store(_)));
        assert_eq!(store.count_documents(doc! {}, "items").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn queries_keep_insertion_order_and_page() {
        let store = InMemoryStore::new();
        store
            .insert_documents(
                (1..=5).map(|n| doc! { "_id": n, "n": 6 - n }).collect(),
                "items",
            )
            .await
            .unwrap();

        let ids = |documents: Vec<Document>| {
            documents.iter().map(|d| d.get_i32(ID_KEY).unwrap()).collect::<Vec<_>>()
        };

        let all = find(&store, Query::new()).await;
        assert_eq!(ids(all), vec![1, 2, 3, 4, 5]);

        let paged = find(
            &store,
            Query::builder()
                .options(FindOptions::new().offset(1).limit(2).sort("n", SortDirection::Asc))
                .build(),
        )
        .await;
        assert_eq!(ids(paged), vec![4, 3]);
    }

    #[tokio::test]
    async fn projection_keeps_listed_fields_and_id() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![doc! { "_id": 1, "a": 1, "b": 2 }], "items")
            .await
            .unwrap();

        let documents = find(&store, Query::builder().projection(doc! { "b": true }).build()).await;

        assert_eq!(documents, vec![doc! { "_id": 1, "b": 2 }]);

        let documents = find(&store, Query::builder().projection(doc! { "b": 0 }).build()).await;

        assert_eq!(documents, vec![doc! { "_id": 1, "a": 1 }]);
    }

    #[tokio::test]
    async fn projection_on_the_id_alone_drops_other_fields() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![doc! { "_id": 1, "a": 1, "b": 2 }], "items")
            .await
            .unwrap();

        let documents = find(&store, Query::builder().projection(doc! { "_id": 1 }).build()).await;
        assert_eq!(documents, vec![doc! { "_id": 1 }]);

        let documents = find(&store, Query::builder().projection(doc! { "_id": 0 }).build()).await;
        assert_eq!(documents, vec![doc! { "a": 1, "b": 2 }]);
    }

    #[tokio::test]
    async fn delete_removes_only_matches() {
        let store = InMemoryStore::new();
        store
            .insert_documents(
                vec![doc! { "s": "ten" }, doc! { "s": "ten" }, doc! { "s": "five" }],
                "items",
            )
            .await
            .unwrap();

        let ack = store.delete_documents(doc! { "s": "ten" }, "items").await.unwrap();

        assert_eq!(ack.affected, 2);
        assert_eq!(store.count_documents(doc! {}, "items").await.unwrap(), 1);
        assert_eq!(
            store.delete_documents(doc! {}, "missing").await.unwrap().affected,
            0
        );
    }

    #[tokio::test]
    async fn replace_and_upsert() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![doc! { "_id": "id1", "v": 1 }], "items")
            .await
            .unwrap();

        let ack = store
            .replace_document(doc! { "_id": "id1" }, doc! { "v": 2 }, false, "items")
            .await
            .unwrap();
        assert_eq!(ack.affected, 1);
        assert_eq!(find(&store, Query::new()).await, vec![doc! { "_id": "id1", "v": 2 }]);

        let ack = store
            .replace_document(doc! { "_id": "id2" }, doc! { "v": 3 }, false, "items")
            .await
            .unwrap();
        assert_eq!(ack.affected, 0);

        let ack = store
            .replace_document(doc! { "_id": "id2" }, doc! { "v": 3 }, true, "items")
            .await
            .unwrap();
        assert_eq!(ack.upserted_id, Some(Bson::from("id2")));
        assert_eq!(store.count_documents(doc! {}, "items").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn replace_cannot_change_id() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![doc! { "_id": "id1" }], "items")
            .await
            .unwrap();

        let result = store
            .replace_document(doc! { "_id": "id1" }, doc! { "_id": "other" }, false, "items")
            .await;

        assert!(matches!(result, Err(OdmError::Store(_))));
    }

    #[tokio::test]
    async fn collections_can_be_listed_and_dropped() {
        let store = InMemoryStore::builder().build().await.unwrap();
        store.create_collection("b").await.unwrap();
        store.insert_documents(vec![doc! {}], "a").await.unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["a", "b"]);

        store.drop_collection("a").await.unwrap();
        store.drop_collection("missing").await.unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["b"]);
        assert!(find(&store, Query::new()).await.is_empty());
    }
}
