//! Outcomes of write operations.
//!
//! Backends answer every write with a raw [`WriteAck`]. Mapped collections wrap it in a
//! [`WriteResult`] together with the entities as they were persisted, the documents that
//! were actually sent, and the application-level identifiers.
//!
//! A write can fail in two distinct ways: the call returns an
//! [`OdmError::Store`](crate::error::OdmError::Store) and no result exists, or the call
//! succeeds with a result whose [`WriteResult::is_success`] is `false` because the store
//! did not acknowledge it or reported an error.

use bson::{Bson, Document};

use crate::entity::Entity;

/// Raw acknowledgement returned by a backend for a write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteAck {
    /// Whether the store acknowledged the write.
    pub acknowledged: bool,
    /// Number of documents inserted, replaced or deleted.
    pub affected: u64,
    /// Identifier of a document created by an upsert.
    pub upserted_id: Option<Bson>,
    /// Error reported in the acknowledgement itself.
    pub error: Option<String>,
}

impl WriteAck {
    /// An acknowledged write touching `affected` documents.
    pub fn acknowledged(affected: u64) -> Self {
        Self {
            acknowledged: true,
            affected,
            upserted_id: None,
            error: None,
        }
    }

    pub fn with_upserted_id(mut self, id: Bson) -> Self {
        self.upserted_id = Some(id);
        self
    }
}

/// Typed outcome of an insert, save, update or remove on a mapped collection.
#[derive(Debug, Clone)]
pub struct WriteResult<E: Entity> {
    ack: WriteAck,
    objects: Vec<E>,
    ids: Vec<E::Id>,
    db_objects: Vec<Document>,
}

impl<E: Entity> WriteResult<E> {
    /// Creates a result for a write that persisted `objects` as `db_objects`.
    ///
    /// `ids` holds the application-level identifier of each object, in the same order.
    pub fn new(ack: WriteAck, objects: Vec<E>, ids: Vec<E::Id>, db_objects: Vec<Document>) -> Self {
        Self { ack, objects, ids, db_objects }
    }

    /// Creates a result for a write that carries no objects, such as a remove.
    pub fn from_ack(ack: WriteAck) -> Self {
        Self::new(ack, Vec::new(), Vec::new(), Vec::new())
    }

    /// Whether the store acknowledged the write and reported no error.
    pub fn is_success(&self) -> bool {
        self.ack.acknowledged && self.ack.error.is_none()
    }

    /// The error reported by the acknowledgement, if any.
    pub fn error(&self) -> Option<&str> {
        self.ack.error.as_deref()
    }

    /// Number of documents the store reported as written or removed.
    pub fn affected(&self) -> u64 {
        self.ack.affected
    }

    pub fn ack(&self) -> &WriteAck {
        &self.ack
    }

    /// The first persisted object, with its identity field populated.
    pub fn saved_object(&self) -> Option<&E> {
        self.objects.first()
    }

    pub fn saved_objects(&self) -> &[E] {
        &self.objects
    }

    /// The application-level identifier of the first persisted object.
    pub fn saved_id(&self) -> Option<&E::Id> {
        self.ids.first()
    }

    pub fn saved_ids(&self) -> &[E::Id] {
        &self.ids
    }

    /// The first raw document sent to the store.
    pub fn db_object(&self) -> Option<&Document> {
        self.db_objects.first()
    }

    pub fn db_objects(&self) -> &[Document] {
        &self.db_objects
    }

    /// Consumes the result, returning the persisted objects.
    pub fn into_saved_objects(self) -> Vec<E> {
        self.objects
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::fixtures::Mock;

    #[test]
    fn exposes_the_first_saved_object() {
        let object = Mock::with_id("id1", "ten", 10);
        let result = WriteResult::new(
            WriteAck::acknowledged(1),
            vec![object.clone()],
            vec!["id1".to_string()],
            vec![doc! { "_id": "id1", "string": "ten", "integer": 10 }],
        );

        assert!(result.is_success());
        assert_eq!(result.affected(), 1);
        assert_eq!(result.saved_object(), Some(&object));
        assert_eq!(result.saved_id().map(String::as_str), Some("id1"));
        assert_eq!(result.db_object().and_then(|d| d.get("_id")), Some(&Bson::from("id1")));
    }

    #[test]
    fn ack_errors_mark_failure() {
        let ack = WriteAck {
            error: Some("write concern timeout".into()),
            ..WriteAck::acknowledged(0)
        };
        let result = WriteResult::<Mock>::from_ack(ack);

        assert!(!result.is_success());
        assert_eq!(result.error(), Some("write concern timeout"));
        assert!(result.saved_object().is_none());
        assert!(result.saved_id().is_none());
    }

    #[test]
    fn unacknowledged_writes_are_not_successful() {
        let result = WriteResult::<Mock>::from_ack(WriteAck::default());

        assert!(!result.is_success());
        assert_eq!(result.error(), None);
    }
}
