//! Query expression evaluation for in-memory document filtering.
//!
//! Filters arrive as BSON documents, are parsed into an [`Expr`] and then evaluated
//! against each stored document by [`DocumentEvaluator`]. Only top-level fields are
//! addressed; dotted paths are compared as literal keys.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docmap_core::{
    error::{OdmError, OdmResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// Integers and floats are normalized to `f64` so that numeric values of different widths
/// compare as equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON value, compared structurally.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    // Cross-type ordering used when sorting, following the store's BSON type order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Other(_) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }

    /// Total order for sorting: by type first, then by value.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }

    /// Equality as a query sees it: an array field matches when any element matches.
    fn matches(&self, value: &Self) -> bool {
        match (self, value) {
            (Comparable::Array(items), value) if !matches!(value, Comparable::Array(_)) => {
                items.iter().any(|item| item == value)
            }
            (field, value) => field == value,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> OdmResult<bool> {
        self.visit_expr(expr)
    }

    /// Whether `document` satisfies `expr`.
    pub fn matches(document: &Document, expr: &Expr) -> OdmResult<bool> {
        DocumentEvaluator::new(document).evaluate(expr)
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = OdmError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error> {
        Ok(self.document.contains_key(field) == should_exist)
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        // A missing field compares like null.
        let field_value = match self.document.get(field) {
            Some(field_value) => Comparable::from(field_value),
            None => Comparable::Null,
        };
        let value = Comparable::from(value);

        let candidates = || match &value {
            Comparable::Array(values) => Ok(values),
            _ => Err(OdmError::InvalidDocument(format!(
                "{} on field {field} requires an array value",
                op.operator()
            ))),
        };

        Ok(match op {
            FieldOp::Eq => field_value.matches(&value),
            FieldOp::Ne => !field_value.matches(&value),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match field_value.partial_cmp(&value) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
            FieldOp::AnyOf => candidates()?
                .iter()
                .any(|candidate| field_value.matches(candidate)),
            FieldOp::NoneOf => !candidates()?
                .iter()
                .any(|candidate| field_value.matches(candidate)),
        })
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use docmap_core::query::{Filter, parse_filter};

    use super::*;

    fn matches(document: &Document, filter: Document) -> bool {
        DocumentEvaluator::matches(document, &parse_filter(&filter).unwrap()).unwrap()
    }

    #[test]
    fn equality_across_numeric_widths() {
        let document = doc! { "integer": 10_i32 };

        assert!(matches(&document, doc! { "integer": 10_i64 }));
        assert!(matches(&document, doc! { "integer": 10.0 }));
        assert!(!matches(&document, doc! { "integer": 11 }));
    }

    #[test]
    fn object_ids_are_compared_by_value() {
        let oid = ObjectId::new();
        let document = doc! { "_id": oid };

        assert!(matches(&document, doc! { "_id": oid }));
        assert!(!matches(&document, doc! { "_id": ObjectId::new() }));
        assert!(!matches(&document, doc! { "_id": oid.to_hex() }));
    }

    #[test]
    fn missing_fields_behave_like_null() {
        let document = doc! { "string": "ten" };

        assert!(matches(&document, doc! { "integer": { "$ne": 10 } }));
        assert!(matches(&document, doc! { "integer": { "$nin": [10, 100] } }));
        assert!(matches(&document, doc! { "integer": Bson::Null }));
        assert!(!matches(&document, doc! { "integer": { "$gte": 0 } }));
        assert!(!matches(&document, doc! { "integer": { "$exists": true } }));
    }

    #[test]
    fn array_fields_match_any_element() {
        let document = doc! { "tags": ["a", "b"] };

        assert!(matches(&document, doc! { "tags": "a" }));
        assert!(matches(&document, doc! { "tags": { "$in": ["z", "b"] } }));
        assert!(!matches(&document, doc! { "tags": { "$nin": ["b"] } }));
        assert!(matches(&document, doc! { "tags": ["a", "b"] }));
    }

    #[test]
    fn logical_operators() {
        let document = doc! { "string": "ten", "integer": 100 };
        let expr = Filter::or([Filter::eq("string", "nine"), Filter::gt("integer", 50)])
            .and(Filter::exists("integer").not().not());

        assert!(DocumentEvaluator::matches(&document, &expr).unwrap());
        assert!(!matches(&document, doc! { "$nor": [{ "string": "ten" }] }));
    }

    #[test]
    fn sort_order_ranks_types_before_values() {
        let null = Bson::Null;
        let one = Bson::Int32(1);
        let two = Bson::Double(2.0);
        let text = Bson::String("a".into());

        assert_eq!(Comparable::from(&null).sort_cmp(&Comparable::from(&one)), Ordering::Less);
        assert_eq!(Comparable::from(&two).sort_cmp(&Comparable::from(&one)), Ordering::Greater);
        assert_eq!(Comparable::from(&text).sort_cmp(&Comparable::from(&two)), Ordering::Greater);
    }
}
