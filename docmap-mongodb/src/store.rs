use async_trait::async_trait;
use bson::{Document, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use tracing::{debug, info};

use docmap_core::{
    backend::{RawCursor, StoreBackend, StoreBackendBuilder},
    error::{OdmError, OdmResult},
    query::{Query, SortDirection},
    write::WriteAck,
};

fn store_error(err: mongodb::error::Error) -> OdmError {
    OdmError::Store(err.to_string())
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    fn find_options(query: &Query) -> FindOptions {
        let mut options = FindOptions::default();

        options.projection = query.projection.clone();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(doc! {
                sort.field.clone(): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            })
        }

        options
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> OdmResult<WriteAck> {
        if documents.is_empty() {
            return Ok(WriteAck::acknowledged(0));
        }

        let result = self
            .get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(store_error)?;

        Ok(WriteAck::acknowledged(result.inserted_ids.len() as u64))
    }

    async fn find_documents(&self, query: Query, collection: &str) -> OdmResult<RawCursor> {
        debug!(collection, filter = ?query.filter, "query");

        let options = Self::find_options(&query);
        let cursor = self
            .get_collection(collection)
            .find(query.filter)
            .with_options(options)
            .await
            .map_err(store_error)?;

        Ok(cursor.map_err(store_error).boxed())
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> OdmResult<WriteAck> {
        let result = self
            .get_collection(collection)
            .delete_many(filter)
            .await
            .map_err(store_error)?;

        Ok(WriteAck::acknowledged(result.deleted_count))
    }

    async fn replace_document(
        &self,
        filter: Document,
        document: Document,
        upsert: bool,
        collection: &str,
    ) -> OdmResult<WriteAck> {
        let result = self
            .get_collection(collection)
            .replace_one(filter, document)
            .upsert(upsert)
            .await
            .map_err(store_error)?;

        Ok(match result.upserted_id {
            Some(id) => WriteAck::acknowledged(result.matched_count + 1).with_upserted_id(id),
            None => WriteAck::acknowledged(result.matched_count),
        })
    }

    async fn count_documents(&self, filter: Document, collection: &str) -> OdmResult<u64> {
        self
            .get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(store_error)
    }

    async fn create_collection(&self, name: &str) -> OdmResult<()> {
        self.client
            .database(&self.database)
            .create_collection(name)
            .await
            .map_err(store_error)
    }

    async fn drop_collection(&self, name: &str) -> OdmResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(store_error)
    }

    async fn list_collections(&self) -> OdmResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(store_error)
    }

    async fn shutdown(self) -> OdmResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Connection settings for a [`MongoDbStore`].
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
        }
    }

    /// Sets the application name reported to the server in the connection handshake.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> OdmResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| OdmError::Initialization(e.to_string()))?;

        if self.app_name.is_some() {
            options.app_name = self.app_name;
        }

        let client = Client::with_options(options)
            .map_err(|e| OdmError::Initialization(e.to_string()))?;

        info!(database = %self.database, "connected to mongodb");

        Ok(MongoDbStore::new(client, self.database))
    }
}

#[cfg(test)]
mod tests {
    use docmap_core::query::FindOptions as QueryOptions;

    use super::*;

    #[test]
    fn query_options_map_onto_driver_options() {
        let query = Query::builder()
            .projection(doc! { "string": true })
            .options(QueryOptions::new().offset(5).limit(10).sort("integer", SortDirection::Desc))
            .build();

        let options = MongoDbStore::find_options(&query);

        assert_eq!(options.projection, Some(doc! { "string": true }));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.skip, Some(5));
        assert_eq!(options.sort, Some(doc! { "integer": -1 }));
    }

    #[test]
    fn builder_keeps_the_app_name() {
        let builder =
            MongoDbStoreBuilder::new("mongodb://localhost:27017", "test").app_name("docmap");

        assert_eq!(builder.app_name.as_deref(), Some("docmap"));
        assert_eq!(builder.database, "test");
    }
}
