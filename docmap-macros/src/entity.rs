use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{
    DataStruct, DeriveInput, Fields, GenericArgument, Ident, LitStr, PathArguments, Result,
    Token, Type, ext::IdentExt, meta::ParseNestedMeta,
};

/// A serialized field of the deriving struct.
struct EntityField<'a> {
    ident: &'a Ident,
    key: String,
    ty: &'a Type,
    optional: Option<&'a Type>,
    is_id: bool,
    object_id: bool,
}

impl EntityField<'_> {
    /// The type held when the field is set.
    fn value_type(&self) -> &Type {
        self.optional.unwrap_or(self.ty)
    }
}

pub(crate) fn generate_entity_for_struct(
    ast: &DeriveInput,
    data: &DataStruct,
) -> Result<TokenStream> {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let mut collection: Option<String> = None;
    let mut rename_all: Option<RenameRule> = None;

    for attr in &ast.attrs {
        if attr.path().is_ident("entity") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("collection") {
                    let s: LitStr = meta.value()?.parse()?;
                    collection = Some(s.value());
                    Ok(())
                } else {
                    Err(meta.error("Unknown entity attribute, expected `collection`"))
                }
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                    let s: LitStr = meta.value()?.parse()?;
                    rename_all = Some(RenameRule::parse(&s)?);
                    Ok(())
                } else {
                    skip_meta(&meta)
                }
            })?;
        }
    }

    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            ast,
            format!(
                "Cannot derive Entity for '{name}': only structs with named fields are supported.\n\
                 Example: #[derive(Entity)] pub struct MyEntity {{ #[entity(id)] id: Option<String> }}"
            ),
        ));
    };

    let mut fields = Vec::with_capacity(named.named.len());

    for field in &named.named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };

        let mut key: Option<String> = None;
        let mut skip = false;
        let mut is_id = false;
        let mut object_id = false;

        for attr in &field.attrs {
            if attr.path().is_ident("entity") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("id") {
                        is_id = true;
                        Ok(())
                    } else if meta.path.is_ident("object_id") {
                        object_id = true;
                        Ok(())
                    } else {
                        Err(meta.error("Unknown entity field attribute, expected `id` or `object_id`"))
                    }
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                        let s: LitStr = meta.value()?.parse()?;
                        key = Some(s.value());
                        Ok(())
                    } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                        skip = true;
                        Ok(())
                    } else {
                        skip_meta(&meta)
                    }
                })?;
            }
        }

        if object_id && !is_id {
            return Err(syn::Error::new_spanned(
                field,
                "`object_id` is only valid together with `id`: #[entity(id, object_id)]",
            ));
        }

        if skip {
            if is_id {
                return Err(syn::Error::new_spanned(
                    field,
                    "The identity field cannot be skipped by serde",
                ));
            }
            continue;
        }

        let field_name = ident.unraw().to_string();
        let key = key.unwrap_or_else(|| match rename_all {
            Some(rule) => rule.apply(&field_name),
            None => field_name,
        });

        fields.push(EntityField {
            ident,
            key,
            ty: &field.ty,
            optional: option_inner(&field.ty),
            is_id,
            object_id,
        });
    }

    let id_field = identity_field(ast, &fields)?;
    let codec = select_codec(id_field)?;

    let collection = collection.unwrap_or_else(|| default_collection_name(&name.to_string()));
    let id_ident = id_field.ident;
    let id_key = &id_field.key;
    let id_type = id_field.value_type();

    let (id_get, id_set) = if id_field.optional.is_some() {
        (
            quote!(self.#id_ident.as_ref()),
            quote!(self.#id_ident = ::core::option::Option::Some(id)),
        )
    } else {
        (
            quote!(::core::option::Option::Some(&self.#id_ident)),
            quote!(self.#id_ident = id),
        )
    };

    let descriptors = fields.iter().map(|field| {
        let ident = field.ident;
        let key = &field.key;
        let is_set = if field.optional.is_some() {
            quote!(|e: &Self| e.#ident.is_some())
        } else {
            quote!(|_: &Self| true)
        };

        quote! {
            ::docmap::entity::FieldDescriptor::new(
                #key,
                #is_set,
                |e: &Self| ::docmap::entity::field_to_bson(&e.#ident),
            )
        }
    });

    Ok(quote! {
        impl #impl_generics ::docmap::entity::Entity for #name #ty_generics #where_clause {
            type Id = #id_type;

            fn collection_name() -> &'static str {
                #collection
            }

            fn id_descriptor() -> ::docmap::identity::IdDescriptor {
                ::docmap::identity::IdDescriptor::new(
                    #id_key,
                    ::docmap::identity::IdCodec::#codec,
                )
            }

            fn field_descriptors() -> ::std::vec::Vec<::docmap::entity::FieldDescriptor<Self>> {
                ::std::vec![#(#descriptors),*]
            }

            fn id(&self) -> ::core::option::Option<&Self::Id> {
                #id_get
            }

            fn set_id(&mut self, id: Self::Id) {
                #id_set
            }
        }
    })
}

// The marked field, or else the one serialized as `_id`.
fn identity_field<'a, 'f>(
    ast: &DeriveInput,
    fields: &'a [EntityField<'f>],
) -> Result<&'a EntityField<'f>> {
    let mut marked = fields.iter().filter(|field| field.is_id);

    match (marked.next(), marked.next()) {
        (Some(field), None) => Ok(field),
        (Some(_), Some(second)) => Err(syn::Error::new_spanned(
            second.ident,
            "Multiple id attributes are not allowed",
        )),
        (None, _) => fields
            .iter()
            .find(|field| field.key == "_id")
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    ast,
                    format!(
                        "No identity field found in '{}'. Mark one with #[entity(id)] \
                         or serialize one as `_id`.",
                        ast.ident
                    ),
                )
            }),
    }
}

fn select_codec(field: &EntityField<'_>) -> Result<Ident> {
    let ty = field.value_type();
    let last = last_segment(ty);
    let span = proc_macro2::Span::call_site();

    let codec = match last.as_deref() {
        Some("ObjectId") => "ObjectId",
        Some("String") if field.object_id => "ObjectIdText",
        _ if field.object_id => {
            return Err(syn::Error::new_spanned(
                ty,
                format!(
                    "`object_id` requires a `String` identity field, found `{}`",
                    ty.to_token_stream()
                ),
            ));
        }
        Some("String") => "Text",
        _ => "Native",
    };

    Ok(Ident::new(codec, span))
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;

    if segment.ident != "Option" {
        return None;
    }

    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };

    match args.args.first() {
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}

fn last_segment(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

fn default_collection_name(struct_name: &str) -> String {
    let mut chars = struct_name.chars();

    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// Consumes a serde option this macro has no use for.
fn skip_meta(meta: &ParseNestedMeta) -> Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<TokenStream>()?;
    }

    Ok(())
}

/// The subset of serde's `rename_all` rules applied to field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> Result<Self> {
        Ok(match lit.value().as_str() {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            other => {
                return Err(syn::Error::new(
                    lit.span(),
                    format!("Unknown rename_all rule `{other}`"),
                ));
            }
        })
    }

    /// Applies the rule to a snake_case field name.
    fn apply(self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
            RenameRule::Pascal => field
                .split('_')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect(),
            RenameRule::Camel => default_collection_name(&RenameRule::Pascal.apply(field)),
        }
    }
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    #[test]
    fn unwraps_option_types() {
        let ty: Type = parse_quote!(Option<String>);
        let inner = option_inner(&ty).map(|t| t.to_token_stream().to_string());

        assert_eq!(inner.as_deref(), Some("String"));
        assert!(option_inner(&parse_quote!(String)).is_none());
        assert!(option_inner(&parse_quote!(Vec<Option<i32>>)).is_none());
    }

    #[test]
    fn lowercases_default_collection_names() {
        assert_eq!(default_collection_name("MockObject"), "mockObject");
        assert_eq!(default_collection_name("user"), "user");
    }

    #[test]
    fn applies_rename_rules() {
        assert_eq!(RenameRule::Camel.apply("created_at_ms"), "createdAtMs");
        assert_eq!(RenameRule::Pascal.apply("created_at"), "CreatedAt");
        assert_eq!(RenameRule::ScreamingKebab.apply("created_at"), "CREATED-AT");
        assert_eq!(RenameRule::Snake.apply("created_at"), "created_at");
    }

    #[test]
    fn selects_codecs_from_identity_types() {
        let input: DeriveInput = parse_quote! {
            struct Annotated {
                #[entity(id, object_id)]
                #[serde(rename = "_id")]
                id: Option<String>,
                #[serde(skip)]
                cache: u8,
                name: String,
            }
        };
        let syn::Data::Struct(data) = &input.data else {
            panic!("expected a struct");
        };

        let output = generate_entity_for_struct(&input, data).unwrap().to_string();

        assert!(output.contains("IdCodec :: ObjectIdText"));
        assert!(output.contains("\"annotated\""));
        assert!(!output.contains("cache"));
    }

    #[test]
    fn rejects_object_id_on_non_text_identity() {
        let input: DeriveInput = parse_quote! {
            struct Numbered {
                #[entity(id, object_id)]
                id: Option<i64>,
            }
        };
        let syn::Data::Struct(data) = &input.data else {
            panic!("expected a struct");
        };

        assert!(generate_entity_for_struct(&input, data).is_err());
    }

    #[test]
    fn falls_back_to_the_underscore_id_field() {
        let input: DeriveInput = parse_quote! {
            #[entity(collection = "mockObject")]
            struct Mock {
                #[serde(rename = "_id")]
                id: Option<String>,
            }
        };
        let syn::Data::Struct(data) = &input.data else {
            panic!("expected a struct");
        };

        let output = generate_entity_for_struct(&input, data).unwrap().to_string();

        assert!(output.contains("IdCodec :: Text"));
        assert!(output.contains("\"mockObject\""));
    }
}
