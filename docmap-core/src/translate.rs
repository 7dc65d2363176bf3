//! Translation of explicit documents and typed example objects into filters and projections.
//!
//! A filter or projection can be given in one of two forms, never both at once:
//!
//! - **explicit**: a BSON [`Document`] (or, for filters, an [`Expr`]) passed through almost
//!   verbatim;
//! - **by example**: a reference to an entity whose set fields become the constraints.
//!
//! In both forms the identity field is renamed to `_id` and its values are run through the
//! entity's [`IdCodec`](crate::identity::IdCodec), so callers always speak in the
//! application-level identifier.
//!
//! By-example filters cannot tell an unset field from one explicitly set to `None`: both
//! leave the field unconstrained.

use bson::{Bson, Document};

use crate::{
    binding::Binding,
    entity::Entity,
    error::{OdmError, OdmResult},
    identity::ID_KEY,
    query::{Expr, is_operator_map},
};

/// Input that can be translated into a filter document for entity type `E`.
pub trait IntoFilter<E: Entity> {
    /// Produces the filter document sent to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be serialized or an identifier cannot be encoded.
    fn into_filter(self, binding: &Binding<E>) -> OdmResult<Document>;
}

/// Input that can be translated into a projection document for entity type `E`.
pub trait IntoProjection<E: Entity> {
    /// Produces the projection document sent to the store.
    fn into_projection(self, binding: &Binding<E>) -> OdmResult<Document>;
}

impl<E: Entity> IntoFilter<E> for Document {
    fn into_filter(self, binding: &Binding<E>) -> OdmResult<Document> {
        binding.filter_from_document(self)
    }
}

impl<E: Entity> IntoFilter<E> for Expr {
    fn into_filter(self, binding: &Binding<E>) -> OdmResult<Document> {
        binding.filter_from_document(self.to_document()?)
    }
}

impl<E: Entity> IntoFilter<E> for &E {
    fn into_filter(self, binding: &Binding<E>) -> OdmResult<Document> {
        binding.filter_from_example(self)
    }
}

impl<E: Entity> IntoProjection<E> for Document {
    fn into_projection(self, binding: &Binding<E>) -> OdmResult<Document> {
        Ok(binding.projection_from_document(self))
    }
}

impl<E: Entity> IntoProjection<E> for &E {
    fn into_projection(self, binding: &Binding<E>) -> OdmResult<Document> {
        Ok(binding.projection_from_example(self))
    }
}

// Comparison operators whose operand is a single identifier.
const ID_SCALAR_OPERATORS: [&str; 6] = ["$eq", "$ne", "$gt", "$gte", "$lt", "$lte"];
// Membership operators whose operand is an array of identifiers.
const ID_ARRAY_OPERATORS: [&str; 2] = ["$in", "$nin"];
// Logical operators whose operand is an array of filter clauses.
const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];

impl<E: Entity> Binding<E> {
    /// Builds a filter from the set fields of `example`, in field declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be serialized or the identifier cannot be encoded.
    pub fn filter_from_example(&self, example: &E) -> OdmResult<Document> {
        let mut filter = Document::new();

        for field in self.fields().iter().filter(|field| field.is_set(example)) {
            let value = field.value(example)?;

            if self.id().is_id_key(field.name()) {
                filter.insert(ID_KEY, self.codec().encode(value)?);
            } else {
                filter.insert(field.name(), value);
            }
        }

        Ok(filter)
    }

    /// Passes an explicit filter through, encoding every identity constraint.
    ///
    /// Clauses of `$and`, `$or` and `$nor` are translated the same way. When the identity is
    /// named twice, by [`ID_KEY`] and by its entity key, both conditions are kept under `$and`.
    ///
    /// # Errors
    ///
    /// Returns [`OdmError::MalformedIdentifier`] if an identity value cannot be encoded, or
    /// [`OdmError::InvalidDocument`] if a logical operator is not given an array of clauses.
    pub fn filter_from_document(&self, document: Document) -> OdmResult<Document> {
        let mut filter = Document::new();

        for (key, value) in document {
            if self.id().is_id_key(&key) {
                let condition = self.encode_id_condition(value)?;

                match filter.remove(ID_KEY) {
                    Some(previous) => {
                        conjoin(&mut filter, vec![id_clause(previous), id_clause(condition)])?
                    }
                    None => {
                        filter.insert(ID_KEY, condition);
                    }
                }
            } else if key == "$and" {
                let clauses = self.encode_clauses(&key, value)?;
                conjoin(&mut filter, clauses)?;
            } else if LOGICAL_OPERATORS.contains(&key.as_str()) {
                let clauses = self.encode_clauses(&key, value)?;
                filter.insert(key, clauses);
            } else {
                filter.insert(key, value);
            }
        }

        Ok(filter)
    }

    /// Builds a filter constraining only the identity field.
    pub fn filter_by_id(&self, id: &E::Id) -> OdmResult<Document> {
        let mut filter = Document::new();
        filter.insert(ID_KEY, self.encode_id(id)?);

        Ok(filter)
    }

    /// Builds a projection including every set field of `keys`.
    pub fn projection_from_example(&self, keys: &E) -> Document {
        self.fields()
            .iter()
            .filter(|field| field.is_set(keys))
            .map(|field| (self.store_key(field.name()).to_string(), Bson::Boolean(true)))
            .collect()
    }

    /// Builds a projection including every key of `keys`, whatever its value.
    pub fn projection_from_document(&self, keys: Document) -> Document {
        keys.keys()
            .map(|key| (self.store_key(key).to_string(), Bson::Boolean(true)))
            .collect()
    }

    fn store_key<'k>(&self, key: &'k str) -> &'k str {
        if self.id().is_id_key(key) { ID_KEY } else { key }
    }

    fn encode_clauses(&self, operator: &str, value: Bson) -> OdmResult<Vec<Bson>> {
        let Bson::Array(clauses) = value else {
            return Err(OdmError::InvalidDocument(format!("{operator} expects an array")));
        };

        clauses
            .into_iter()
            .map(|clause| match clause {
                Bson::Document(clause) => self.filter_from_document(clause).map(Bson::Document),
                clause => Ok(clause),
            })
            .collect()
    }

    fn encode_id_condition(&self, value: Bson) -> OdmResult<Bson> {
        let codec = self.codec();

        let operators = match value {
            Bson::Document(operators) if is_operator_map(&operators) => operators,
            value => return codec.encode(value),
        };

        let mut encoded = Document::new();

        for (operator, operand) in operators {
            let operand = match (operator.as_str(), operand) {
                (op, operand) if ID_SCALAR_OPERATORS.contains(&op) => codec.encode(operand)?,
                (op, Bson::Array(values)) if ID_ARRAY_OPERATORS.contains(&op) => Bson::Array(
                    values
                        .into_iter()
                        .map(|value| codec.encode(value))
                        .collect::<OdmResult<Vec<_>>>()?,
                ),
                ("$not", operand @ Bson::Document(_)) => self.encode_id_condition(operand)?,
                (_, operand) => operand,
            };

            encoded.insert(operator, operand);
        }

        Ok(Bson::Document(encoded))
    }
}

fn id_clause(condition: Bson) -> Bson {
    let mut clause = Document::new();
    clause.insert(ID_KEY, condition);

    Bson::Document(clause)
}

// Appends `clauses` to the filter's `$and`, creating it if needed.
fn conjoin(filter: &mut Document, clauses: Vec<Bson>) -> OdmResult<()> {
    match filter.get_mut("$and") {
        Some(Bson::Array(existing)) => existing.extend(clauses),
        Some(_) => return Err(OdmError::InvalidDocument("$and expects an array".into())),
        None => {
            filter.insert("$and", clauses);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        fixtures::{Keyed, Mock},
        query::Filter,
    };

    #[test]
    fn example_filter_skips_unset_fields() {
        let binding = Binding::<Mock>::new("mockObject");
        let filter = (&Mock::example(Some("ten"), None)).into_filter(&binding).unwrap();

        assert_eq!(filter, doc! { "string": "ten" });
    }

    #[test]
    fn example_filter_matches_explicit_filter() {
        let binding = Binding::<Mock>::new("mockObject");
        let by_example = (&Mock::new("ten", 10)).into_filter(&binding).unwrap();
        let explicit = doc! { "string": "ten", "integer": 10 }.into_filter(&binding).unwrap();

        assert_eq!(by_example, explicit);
    }

    #[test]
    fn empty_example_matches_everything() {
        let binding = Binding::<Mock>::new("mockObject");

        assert_eq!(
            (&Mock::example(None, None)).into_filter(&binding).unwrap(),
            Document::new()
        );
    }

    #[test]
    fn example_filter_encodes_identity() {
        let binding = Binding::<Keyed>::new("keyed");
        let hex = ObjectId::new().to_hex();
        let example = Keyed { id: Some(hex.clone()), label: None };

        assert_eq!(
            (&example).into_filter(&binding).unwrap(),
            doc! { "_id": ObjectId::parse_str(&hex).unwrap() }
        );
    }

    #[test]
    fn example_filter_rejects_malformed_identity() {
        let binding = Binding::<Keyed>::new("keyed");
        let example = Keyed { id: Some("id3".into()), label: None };

        assert!(matches!(
            (&example).into_filter(&binding),
            Err(OdmError::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn explicit_filter_encodes_identity_operands() {
        let binding = Binding::<Keyed>::new("keyed");
        let a = ObjectId::new();
        let b = ObjectId::new();

        let filter = doc! {
            "id": { "$in": [a.to_hex(), b.to_hex()] },
            "label": "x",
        }
        .into_filter(&binding)
        .unwrap();

        assert_eq!(filter, doc! { "_id": { "$in": [a, b] }, "label": "x" });

        let filter = doc! { "_id": { "$ne": a.to_hex(), "$exists": true } }
            .into_filter(&binding)
            .unwrap();

        assert_eq!(filter, doc! { "_id": { "$ne": a, "$exists": true } });
    }

    #[test]
    fn identity_inside_logical_clauses_is_encoded() {
        let binding = Binding::<Keyed>::new("keyed");
        let a = ObjectId::new();
        let b = ObjectId::new();

        let filter = doc! {
            "$and": [{ "id": a.to_hex() }, { "label": "x" }],
            "$or": [{ "_id": { "$ne": b.to_hex() } }, { "$nor": [{ "id": b.to_hex() }] }],
        }
        .into_filter(&binding)
        .unwrap();

        assert_eq!(
            filter,
            doc! {
                "$and": [{ "_id": a }, { "label": "x" }],
                "$or": [{ "_id": { "$ne": b } }, { "$nor": [{ "_id": b }] }],
            }
        );
    }

    #[test]
    fn combined_expressions_encode_identity() {
        let binding = Binding::<Keyed>::new("keyed");
        let a = ObjectId::new();

        let filter = Filter::eq("_id", a.to_hex())
            .and(Filter::eq("label", "x"))
            .into_filter(&binding)
            .unwrap();

        assert_eq!(
            filter,
            doc! { "$and": [{ "_id": { "$eq": a } }, { "label": { "$eq": "x" } }] }
        );

        let filter = Filter::ne("id", a.to_hex()).not().into_filter(&binding).unwrap();

        assert_eq!(filter, doc! { "$nor": [{ "_id": { "$ne": a } }] });
    }

    #[test]
    fn identity_named_twice_keeps_both_conditions() {
        let binding = Binding::<Keyed>::new("keyed");
        let a = ObjectId::new();

        let filter = doc! { "_id": a.to_hex(), "id": { "$exists": true } }
            .into_filter(&binding)
            .unwrap();

        assert_eq!(
            filter,
            doc! { "$and": [{ "_id": a }, { "_id": { "$exists": true } }] }
        );

        let filter = doc! {
            "$and": [{ "label": "x" }],
            "id": a.to_hex(),
            "_id": { "$exists": true },
        }
        .into_filter(&binding)
        .unwrap();

        assert_eq!(
            filter,
            doc! { "$and": [{ "label": "x" }, { "_id": a }, { "_id": { "$exists": true } }] }
        );
    }

    #[test]
    fn negated_identity_operators_are_encoded() {
        let binding = Binding::<Keyed>::new("keyed");
        let a = ObjectId::new();

        let filter = doc! { "id": { "$not": { "$in": [a.to_hex()] } } }
            .into_filter(&binding)
            .unwrap();

        assert_eq!(filter, doc! { "_id": { "$not": { "$in": [a] } } });
    }

    #[test]
    fn logical_operators_require_clause_arrays() {
        let binding = Binding::<Keyed>::new("keyed");

        assert!(matches!(
            doc! { "$or": { "id": "x" } }.into_filter(&binding),
            Err(OdmError::InvalidDocument(_))
        ));
    }

    #[test]
    fn expression_filters_are_translated() {
        let binding = Binding::<Mock>::new("mockObject");
        let filter = Filter::eq("string", "ten").into_filter(&binding).unwrap();

        assert_eq!(filter, doc! { "string": { "$eq": "ten" } });
    }

    #[test]
    fn example_projection_lists_set_fields() {
        let binding = Binding::<Mock>::new("mockObject");
        let projection = (&Mock::example(Some("something not null"), None))
            .into_projection(&binding)
            .unwrap();

        assert_eq!(projection, doc! { "string": true });
    }

    #[test]
    fn explicit_projection_includes_every_key() {
        let binding = Binding::<Keyed>::new("keyed");
        let projection = doc! { "label": "something not null", "id": 0 }
            .into_projection(&binding)
            .unwrap();

        assert_eq!(projection, doc! { "label": true, "_id": true });
    }
}
