//! Per-entity mapping state derived once when a collection is bound.

use std::fmt::{self, Debug};

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};

use crate::{
    entity::{Entity, EntityExt, FieldDescriptor},
    error::{OdmError, OdmResult},
    identity::{ID_KEY, IdCodec, IdDescriptor},
};

/// The identity descriptor and field table of an entity type.
///
/// A binding is immutable and shared (behind an `Arc`) by a mapped collection and every
/// cursor it produces.
pub struct Binding<E: Entity> {
    collection: String,
    id: IdDescriptor,
    fields: Vec<FieldDescriptor<E>>,
}

impl<E: Entity> Binding<E> {
    /// Derives the binding for `E` in the named collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: E::id_descriptor(),
            fields: E::field_descriptors(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &IdDescriptor {
        &self.id
    }

    pub fn codec(&self) -> IdCodec {
        self.id.codec()
    }

    pub fn fields(&self) -> &[FieldDescriptor<E>] {
        &self.fields
    }

    /// Converts an application-level identifier into the value stored under `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`OdmError::MalformedIdentifier`] if the codec rejects the value.
    pub fn encode_id(&self, id: &E::Id) -> OdmResult<Bson> {
        self.id.codec().encode(serialize_to_bson(id)?)
    }

    /// Converts a stored `_id` value into the application-level identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OdmError::Decode`] if the decoded value does not fit `E::Id`.
    pub fn decode_id(&self, value: Bson) -> OdmResult<E::Id> {
        deserialize_from_bson(self.id.codec().decode(value))
            .map_err(|e| OdmError::Decode(format!("identifier in {}: {e}", self.collection)))
    }

    /// Makes sure the entity carries an identifier, generating one if the codec allows it.
    ///
    /// # Errors
    ///
    /// Returns [`OdmError::MissingIdentifier`] if the entity has no identifier and the codec
    /// cannot generate one.
    pub fn assign_id(&self, entity: &mut E) -> OdmResult<()> {
        if entity.id().is_some() {
            return Ok(());
        }

        let generated = self
            .id
            .codec()
            .generate()
            .ok_or_else(|| OdmError::MissingIdentifier(self.collection.clone()))?;
        let id: E::Id = deserialize_from_bson(generated).map_err(|e| {
            OdmError::InvalidDocument(format!(
                "generated identifier does not fit the identity field of {}: {e}",
                self.collection
            ))
        })?;

        entity.set_id(id);

        Ok(())
    }

    /// Serializes an entity into the document sent to the store.
    ///
    /// The identity field is moved to `_id`, encoded, and placed first. An entity without an
    /// identifier produces a document without `_id`.
    pub fn encode_entity(&self, entity: &E) -> OdmResult<Document> {
        let mut fields = entity.to_document()?;
        let mut document = Document::new();

        match fields.remove(self.id.key()) {
            Some(Bson::Null) | None => {}
            Some(value) => {
                document.insert(ID_KEY, self.id.codec().encode(value)?);
            }
        }

        for (key, value) in fields {
            document.insert(key, value);
        }

        Ok(document)
    }

    /// Deserializes a document returned by the store into an entity.
    ///
    /// # Errors
    ///
    /// Returns [`OdmError::Decode`] if the document cannot be mapped onto `E`.
    pub fn decode_document(&self, mut document: Document) -> OdmResult<E> {
        if let Some(value) = document.remove(ID_KEY) {
            document.insert(self.id.key(), self.id.codec().decode(value));
        }

        E::from_document(document)
    }
}

impl<E: Entity> Debug for Binding<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("collection", &self.collection)
            .field("id", &self.id)
            .field("fields", &self.fields)
            .finish()
    }
}
