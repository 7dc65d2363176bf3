//! Hand-written entities shared by the unit tests.

use serde::{Deserialize, Serialize};

use crate::{
    entity::{Entity, FieldDescriptor, field_to_bson},
    identity::{IdCodec, IdDescriptor},
};

/// Text identifier stored as text, under `_id` on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Mock {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub string: Option<String>,
    pub integer: Option<i32>,
}

impl Mock {
    pub fn new(string: &str, integer: i32) -> Self {
        Self {
            id: None,
            string: Some(string.to_string()),
            integer: Some(integer),
        }
    }

    pub fn with_id(id: &str, string: &str, integer: i32) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::new(string, integer)
        }
    }

    pub fn example(string: Option<&str>, integer: Option<i32>) -> Self {
        Self {
            id: None,
            string: string.map(str::to_string),
            integer,
        }
    }
}

impl Entity for Mock {
    type Id = String;

    fn collection_name() -> &'static str {
        "mockObject"
    }

    fn id_descriptor() -> IdDescriptor {
        IdDescriptor::new("_id", IdCodec::Text)
    }

    fn field_descriptors() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::new("_id", |e| e.id.is_some(), |e| field_to_bson(&e.id)),
            FieldDescriptor::new("string", |e| e.string.is_some(), |e| {
                field_to_bson(&e.string)
            }),
            FieldDescriptor::new("integer", |e| e.integer.is_some(), |e| {
                field_to_bson(&e.integer)
            }),
        ]
    }

    fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Hex text identifier under the entity key `id`, stored as a native ObjectId.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Keyed {
    pub id: Option<String>,
    pub label: Option<String>,
}

impl Entity for Keyed {
    type Id = String;

    fn collection_name() -> &'static str {
        "keyed"
    }

    fn id_descriptor() -> IdDescriptor {
        IdDescriptor::new("id", IdCodec::ObjectIdText)
    }

    fn field_descriptors() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::new("id", |e| e.id.is_some(), |e| field_to_bson(&e.id)),
            FieldDescriptor::new("label", |e| e.label.is_some(), |e| field_to_bson(&e.label)),
        ]
    }

    fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Integer identifier that must always be supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Numbered {
    #[serde(rename = "_id")]
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl Entity for Numbered {
    type Id = i64;

    fn collection_name() -> &'static str {
        "numbered"
    }

    fn id_descriptor() -> IdDescriptor {
        IdDescriptor::new("_id", IdCodec::Native)
    }

    fn field_descriptors() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::new("_id", |e| e.id.is_some(), |e| field_to_bson(&e.id)),
            FieldDescriptor::new("name", |e| e.name.is_some(), |e| field_to_bson(&e.name)),
        ]
    }

    fn id(&self) -> Option<&i64> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
