//! Procedural macros for the docmap project.
//!
//! ## `Entity`
//!
//! Derives the `Entity` trait for structs with named fields, generating the identity
//! descriptor and the field-descriptor table used for by-example queries and projections.
//!
//! - **Container attribute**: `#[entity(collection = "...")]` sets the collection name
//!   (defaults to the struct name with a lowercase first letter)
//! - **Field attribute**: `#[entity(id)]` marks the identity field, `#[entity(id, object_id)]`
//!   additionally stores a hex `String` identifier as a native ObjectId
//!
//! Field keys follow the struct's serde attributes: `rename`, `rename_all` and `skip` are
//! honored. Without an `#[entity(id)]` marker, the field serialized as `_id` is the identity.
//!
//! ```rust,ignore
//! use docmap::Entity;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! #[entity(collection = "mockObject")]
//! pub struct MockObject {
//!     #[entity(id, object_id)]
//!     #[serde(rename = "_id")]
//!     pub id: Option<String>,
//!     pub string: Option<String>,
//!     pub integer: Option<i32>,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_macros;

extern crate proc_macro;
mod entity;

use proc_macro::TokenStream;
use syn::{Data, DeriveInput, parse_macro_input};

use crate::entity::generate_entity_for_struct;

/// Derives the `Entity` trait for a struct with named fields.
///
/// # Errors
///
/// Returns a compile error if:
/// - Applied to an enum, a union, a tuple struct or a unit struct
/// - No identity field can be found, or more than one is marked
/// - An attribute is unknown or malformed
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    match ast.data {
        Data::Struct(ref data) => match generate_entity_for_struct(&ast, data) {
            Ok(token_stream) => token_stream.into(),
            Err(e) => e.to_compile_error().into(),
        },
        Data::Enum(_) => syn::Error::new_spanned(
            &ast,
            "Cannot derive Entity for enums. Only structs with named fields are supported.",
        )
        .to_compile_error()
        .into(),
        Data::Union(_) => syn::Error::new_spanned(
            &ast,
            "Cannot derive Entity for unions. Only structs with named fields are supported.",
        )
        .to_compile_error()
        .into(),
    }
}
