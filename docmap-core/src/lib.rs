//! A typed object-document mapper over pluggable document stores.
//!
//! This crate is the core of the docmap project and provides:
//!
//! - **Entity traits** ([`entity`]) - Describing how a type maps to a stored document
//! - **Identity handling** ([`identity`]) - Encoding application identifiers into store identifiers
//! - **Bindings** ([`binding`]) - The per-type descriptor derived once for a mapped collection
//! - **Query and filtering API** ([`query`]) - Filter expressions, sorting and paging
//! - **Translation** ([`translate`]) - Turning documents and example objects into filters and projections
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Collections interface** ([`collection`]) - Raw and entity-mapped collection handles
//! - **Cursors** ([`cursor`]) - Lazily decoded query results
//! - **Write results** ([`write`]) - Typed outcomes of inserts, saves and removes
//! - **Document store** ([`store`]) - Owning entry point over a backend
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docmap::Entity;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! #[entity(collection = "mockObject")]
//! pub struct MockObject {
//!     #[entity(id)]
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<String>,
//!     pub string: Option<String>,
//!     pub integer: Option<i32>,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_core;

pub mod backend;
pub mod binding;
pub mod collection;
pub mod cursor;
pub mod entity;
pub mod error;
pub mod identity;
pub mod query;
pub mod store;
pub mod translate;
pub mod write;

#[cfg(test)]
mod fixtures;
