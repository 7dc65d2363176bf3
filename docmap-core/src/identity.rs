//! Identifier translation between the application and the store.
//!
//! Every entity has exactly one identity field. The store always keeps that value under
//! [`ID_KEY`], in its own representation, while the entity may hold a more natural form.
//! The [`IdCodec`] chosen when a collection is bound decides how the two are related:
//!
//! | codec                      | entity holds      | store holds        |
//! |----------------------------|-------------------|--------------------|
//! | [`IdCodec::Native`]        | any value         | the same value     |
//! | [`IdCodec::Text`]          | `String`          | `String`           |
//! | [`IdCodec::ObjectIdText`]  | hex `String`      | `ObjectId`         |
//! | [`IdCodec::ObjectId`]      | `ObjectId`        | `ObjectId`         |

use bson::{Bson, oid::ObjectId};

use crate::error::{OdmError, OdmResult};

/// The document key under which the store keeps the identity value.
pub const ID_KEY: &str = "_id";

/// Translation strategy for an entity's identity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdCodec {
    /// Stored exactly as supplied. Values are never generated.
    Native,
    /// Stored as text. Missing values are generated as the hex form of a fresh ObjectId.
    Text,
    /// Held as hex text by the entity and stored as a native ObjectId.
    ObjectIdText,
    /// Held and stored as a native ObjectId.
    ObjectId,
}

impl IdCodec {
    /// Converts an application-level identifier into its store representation.
    ///
    /// # Errors
    ///
    /// Returns [`OdmError::MalformedIdentifier`] when an [`IdCodec::ObjectIdText`] value is
    /// not a 24 digit hex string.
    pub fn encode(&self, value: Bson) -> OdmResult<Bson> {
        match self {
            IdCodec::ObjectIdText => match value {
                Bson::String(text) => ObjectId::parse_str(&text)
                    .map(Bson::ObjectId)
                    .map_err(|e| OdmError::MalformedIdentifier(format!("{text:?}: {e}"))),
                Bson::ObjectId(oid) => Ok(Bson::ObjectId(oid)),
                other => Err(OdmError::MalformedIdentifier(format!(
                    "expected hex object id text, found {other}"
                ))),
            },
            IdCodec::Native | IdCodec::Text | IdCodec::ObjectId => Ok(value),
        }
    }

    /// Converts a stored identifier back into its application-level representation.
    pub fn decode(&self, value: Bson) -> Bson {
        match (self, value) {
            (IdCodec::ObjectIdText, Bson::ObjectId(oid)) => Bson::String(oid.to_hex()),
            (_, value) => value,
        }
    }

    /// Generates a fresh application-level identifier, if this codec supports generation.
    pub fn generate(&self) -> Option<Bson> {
        match self {
            IdCodec::Native => None,
            IdCodec::Text | IdCodec::ObjectIdText => Some(Bson::String(ObjectId::new().to_hex())),
            IdCodec::ObjectId => Some(Bson::ObjectId(ObjectId::new())),
        }
    }
}

/// Describes the identity field of an entity type.
///
/// Created once per entity type (normally by `#[derive(Entity)]`) and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdDescriptor {
    key: &'static str,
    codec: IdCodec,
}

impl IdDescriptor {
    pub const fn new(key: &'static str, codec: IdCodec) -> Self {
        Self { key, codec }
    }

    /// The key the identity field serializes under in the entity's own document.
    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn codec(&self) -> IdCodec {
        self.codec
    }

    /// Whether `key` names the identity field, either by its entity key or by [`ID_KEY`].
    pub fn is_id_key(&self, key: &str) -> bool {
        key == ID_KEY || key == self.key
    }
}
