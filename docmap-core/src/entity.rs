//! Core traits for typed entities stored through a mapped collection.
//!
//! An entity is a plain serde type with one designated identity field and a table of
//! [`FieldDescriptor`]s. The table is what makes by-example queries possible: it lets the
//! mapper ask, per field, whether a value is present and what its BSON form is, without
//! any runtime reflection.
//!
//! The trait is normally derived:
//!
//! ```ignore
//! use docmap::Entity;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
//! #[entity(collection = "users")]
//! pub struct User {
//!     #[entity(id, object_id)]
//!     #[serde(rename = "_id")]
//!     pub id: Option<String>,
//!     pub name: Option<String>,
//!     pub age: Option<i32>,
//! }
//! ```

use std::fmt::{self, Debug};

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{OdmError, OdmResult},
    identity::IdDescriptor,
};

/// A typed record that can be mapped onto a document in a collection.
///
/// # Implementing by hand
///
/// ```ignore
/// impl Entity for Note {
///     type Id = String;
///
///     fn collection_name() -> &'static str { "notes" }
///
///     fn id_descriptor() -> IdDescriptor { IdDescriptor::new("_id", IdCodec::Text) }
///
///     fn field_descriptors() -> Vec<FieldDescriptor<Self>> {
///         vec![
///             FieldDescriptor::new("_id", |n| n.id.is_some(), |n| field_to_bson(&n.id)),
///             FieldDescriptor::new("body", |n| n.body.is_some(), |n| field_to_bson(&n.body)),
///         ]
///     }
///
///     fn id(&self) -> Option<&String> { self.id.as_ref() }
///
///     fn set_id(&mut self, id: String) { self.id = Some(id); }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// The application-level representation of the identity field.
    type Id: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static;

    /// The default collection name for this entity type.
    fn collection_name() -> &'static str;

    /// Describes the identity field and how it is translated for the store.
    fn id_descriptor() -> IdDescriptor;

    /// One descriptor per serialized field, in declaration order, including the identity field.
    fn field_descriptors() -> Vec<FieldDescriptor<Self>>;

    /// Returns the identifier, or `None` when it has not been assigned yet.
    fn id(&self) -> Option<&Self::Id>;

    /// Assigns the identifier.
    fn set_id(&mut self, id: Self::Id);
}

/// Presence and value accessors for one field of an entity.
pub struct FieldDescriptor<E> {
    name: &'static str,
    is_set: fn(&E) -> bool,
    value: fn(&E) -> OdmResult<Bson>,
}

impl<E> FieldDescriptor<E> {
    /// Creates a descriptor.
    ///
    /// * `name` - the key the field serializes under
    /// * `is_set` - whether the field holds a value on a given entity
    /// * `value` - the BSON form of the field's value
    pub fn new(
        name: &'static str,
        is_set: fn(&E) -> bool,
        value: fn(&E) -> OdmResult<Bson>,
    ) -> Self {
        Self { name, is_set, value }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_set(&self, entity: &E) -> bool {
        (self.is_set)(entity)
    }

    pub fn value(&self, entity: &E) -> OdmResult<Bson> {
        (self.value)(entity)
    }
}

impl<E> Clone for FieldDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            is_set: self.is_set,
            value: self.value,
        }
    }
}

impl<E> Debug for FieldDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Serializes a single field value into BSON. Used by derived field descriptors.
pub fn field_to_bson<T: Serialize + ?Sized>(value: &T) -> OdmResult<Bson> {
    Ok(serialize_to_bson(value)?)
}

/// Extension trait providing BSON conversion for entities.
///
/// Automatically implemented for every [`Entity`].
pub trait EntityExt: Entity {
    /// Serializes this entity into a BSON document, keyed by the entity's own field names.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the entity does not serialize to a document.
    fn to_document(&self) -> OdmResult<Document>;

    /// Deserializes an entity from a BSON document keyed by the entity's own field names.
    ///
    /// # Errors
    ///
    /// Returns [`OdmError::Decode`] if the document does not fit the entity's structure.
    fn from_document(document: Document) -> OdmResult<Self>;
}

impl<E: Entity> EntityExt for E {
    fn to_document(&self) -> OdmResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(OdmError::InvalidDocument(format!(
                "entity for collection {} serialized to {:?}, expected a document",
                E::collection_name(),
                other.element_type()
            ))),
        }
    }

    fn from_document(document: Document) -> OdmResult<Self> {
        deserialize_from_bson(Bson::Document(document))
            .map_err(|e| OdmError::Decode(format!("{}: {e}", E::collection_name())))
    }
}
