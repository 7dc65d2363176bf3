//! Convenient re-exports of commonly used types from docmap.
//!
//! ```ignore
//! use docmap::prelude::*;
//! ```

pub use bson::doc;

pub use docmap_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::{Collection, MappedCollection},
    cursor::TypedCursor,
    entity::{Entity, EntityExt},
    error::{OdmError, OdmResult},
    identity::{IdCodec, IdDescriptor},
    query::{Expr, FieldOp, Filter, FindOptions, Query, QueryBuilder, Sort, SortDirection},
    store::DocumentStore,
    translate::{IntoFilter, IntoProjection},
    write::{WriteAck, WriteResult},
};
pub use docmap_macros::Entity;
