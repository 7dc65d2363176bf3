//! Filter documents, filter expressions and query options.
//!
//! Backends receive a [`Query`]: a filter document in the store's operator syntax, an
//! optional projection document and paging/sorting options. Filters can be written by hand
//! as BSON documents, built with the [`Filter`] expression helpers, or derived from an
//! example entity (see [`crate::translate`]).
//!
//! ```ignore
//! use docmap::query::{Filter, SortDirection, FindOptions};
//!
//! let expr = Filter::eq("string", "ten").and(Filter::gt("integer", 5));
//! let options = FindOptions::new().limit(10).sort("integer", SortDirection::Desc);
//! ```
//!
//! The supported operator set is `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`,
//! `$exists`, `$not` (on a field) and `$and`, `$or`, `$nor` (at the top level).
//! [`DocumentTranslator`] turns an [`Expr`] into such a document, and [`parse_filter`]
//! turns a document back into an [`Expr`] for backends that evaluate filters themselves.

use bson::{Bson, Document, doc};

use crate::error::{OdmError, OdmResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field equals any of the values.
    AnyOf,
    /// Field equals none of the values.
    NoneOf,
}

impl FieldOp {
    /// The operator keyword used in filter documents.
    pub fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::AnyOf => "$in",
            FieldOp::NoneOf => "$nin",
        }
    }

    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::AnyOf,
            "$nin" => FieldOp::NoneOf,
            _ => return None,
        })
    }
}

/// A filter expression for querying documents.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Renders this expression as a filter document.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression cannot be represented as a document.
    pub fn to_document(&self) -> OdmResult<Document> {
        DocumentTranslator.visit_expr(self)
    }
}

/// Helper struct for constructing filter expressions.
///
/// All methods accept field names and values as `Into<String>` and `Into<Bson>`.
///
/// ```ignore
/// let expr = Filter::eq("name", "Alice").and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field is missing.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines multiple expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field (or any element of an array field) equals one of the values.
    pub fn any_of(
        field: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Bson>>,
    ) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::AnyOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches documents where the field equals none of the values.
    pub fn none_of(
        field: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Bson>>,
    ) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::NoneOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }
}

/// Visitor over filter expressions, implemented by translators and evaluators.
pub trait QueryVisitor {
    type Output;
    type Error: Into<OdmError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Translates filter expressions into filter documents.
pub struct DocumentTranslator;

impl QueryVisitor for DocumentTranslator {
    type Output = Document;
    type Error = OdmError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        // `$not` only applies to field operators, so negate whole expressions with `$nor`.
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        if matches!(op, FieldOp::AnyOf | FieldOp::NoneOf) && !matches!(value, Bson::Array(_)) {
            return Err(OdmError::InvalidDocument(format!(
                "{} on field {field} requires an array value",
                op.operator()
            )));
        }

        Ok(doc! {
            field: { op.operator(): value.clone() },
        })
    }
}

/// Parses a filter document into an expression.
///
/// An empty document parses to an empty `And`, which matches everything.
///
/// # Errors
///
/// Returns [`OdmError::InvalidDocument`] for operators outside the supported set or
/// operands of the wrong shape.
pub fn parse_filter(filter: &Document) -> OdmResult<Expr> {
    let mut exprs = Vec::with_capacity(filter.len());

    for (key, value) in filter {
        match key.as_str() {
            "$and" => exprs.push(Expr::And(parse_clauses(key, value)?)),
            "$or" => exprs.push(Expr::Or(parse_clauses(key, value)?)),
            "$nor" => {
                let mut clauses = parse_clauses(key, value)?;
                exprs.push(match clauses.len() {
                    1 => clauses.remove(0).not(),
                    _ => Expr::Or(clauses).not(),
                });
            }
            operator if operator.starts_with('$') => {
                return Err(OdmError::InvalidDocument(format!(
                    "unsupported top-level operator {operator}"
                )));
            }
            field => exprs.push(parse_condition(field, value)?),
        }
    }

    Ok(match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::And(exprs),
    })
}

fn parse_clauses(operator: &str, value: &Bson) -> OdmResult<Vec<Expr>> {
    let clauses = value.as_array().ok_or_else(|| {
        OdmError::InvalidDocument(format!("{operator} requires an array of documents"))
    })?;

    clauses
        .iter()
        .map(|clause| match clause {
            Bson::Document(document) => parse_filter(document),
            _ => Err(OdmError::InvalidDocument(format!(
                "{operator} requires an array of documents"
            ))),
        })
        .collect()
}

pub(crate) fn is_operator_document(value: &Bson) -> bool {
    value.as_document().is_some_and(is_operator_map)
}

pub(crate) fn is_operator_map(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn parse_condition(field: &str, value: &Bson) -> OdmResult<Expr> {
    let Some(operators) = value.as_document().filter(|_| is_operator_document(value)) else {
        return Ok(Expr::field(field.to_string(), FieldOp::Eq, value.clone()));
    };

    let mut exprs = Vec::with_capacity(operators.len());

    for (operator, operand) in operators {
        let expr = match operator.as_str() {
            "$exists" => Expr::Exists(field.to_string(), is_truthy(operand)),
            "$not" if is_operator_document(operand) => parse_condition(field, operand)?.not(),
            "$not" => {
                return Err(OdmError::InvalidDocument(format!(
                    "$not on field {field} requires an operator document"
                )));
            }
            other => {
                let op = FieldOp::from_operator(other).ok_or_else(|| {
                    OdmError::InvalidDocument(format!("unsupported operator {other} on field {field}"))
                })?;

                if matches!(op, FieldOp::AnyOf | FieldOp::NoneOf)
                    && !matches!(operand, Bson::Array(_))
                {
                    return Err(OdmError::InvalidDocument(format!(
                        "{other} on field {field} requires an array value"
                    )));
                }

                Expr::field(field.to_string(), op, operand.clone())
            }
        };

        exprs.push(expr);
    }

    Ok(match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::And(exprs),
    })
}

/// Whether a projection or `$exists` operand counts as "on".
///
/// `false`, `null` and numeric zero are off; everything else is on.
pub fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Null => false,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

/// Paging and sorting options for a find.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip.
    pub offset: Option<usize>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(Sort { field: field.into(), direction });
        self
    }
}

/// A fully translated query, as handed to a storage backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Filter document; empty matches every document.
    pub filter: Document,
    /// Fields to include; `None` returns whole documents.
    pub projection: Option<Document>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip (for pagination).
    pub offset: Option<usize>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
}

impl Query {
    /// Creates a query matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter document.
    pub fn filter(mut self, filter: Document) -> Self {
        self.query.filter = filter;
        self
    }

    /// Sets the projection document.
    pub fn projection(mut self, projection: Document) -> Self {
        self.query.projection = Some(projection);
        self
    }

    /// Applies paging and sorting options.
    pub fn options(mut self, options: FindOptions) -> Self {
        self.query.limit = options.limit;
        self.query.offset = options.offset;
        self.query.sort = options.sort;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn translates_expressions_to_documents() {
        let expr = Filter::eq("string", "ten")
            .and(Filter::gt("integer", 5))
            .and(Filter::any_of("tag", ["a", "b"]));

        assert_eq!(
            expr.to_document().unwrap(),
            doc! {
                "$and": [
                    { "string": { "$eq": "ten" } },
                    { "integer": { "$gt": 5 } },
                    { "tag": { "$in": ["a", "b"] } },
                ]
            }
        );
    }

    #[test]
    fn negation_uses_nor() {
        let expr = Filter::exists("integer").not();

        assert_eq!(
            expr.to_document().unwrap(),
            doc! { "$nor": [{ "integer": { "$exists": true } }] }
        );
    }

    #[test]
    fn membership_requires_arrays() {
        let expr = Expr::field("tag".into(), FieldOp::AnyOf, Bson::String("a".into()));

        assert!(matches!(expr.to_document(), Err(OdmError::InvalidDocument(_))));
    }

    #[test]
    fn parses_plain_equality() {
        assert_eq!(
            parse_filter(&doc! { "string": "ten" }).unwrap(),
            Filter::eq("string", "ten")
        );
    }

    #[test]
    fn parses_multiple_fields_and_operators() {
        let parsed = parse_filter(&doc! {
            "string": "ten",
            "integer": { "$gte": 10, "$lt": 100 },
        })
        .unwrap();

        assert_eq!(
            parsed,
            Expr::And(vec![
                Filter::eq("string", "ten"),
                Expr::And(vec![Filter::gte("integer", 10), Filter::lt("integer", 100)]),
            ])
        );
    }

    #[test]
    fn parses_what_it_translates() {
        let expr = Filter::or([Filter::eq("a", 1), Filter::ne("b", "x")])
            .and(Filter::none_of("c", [1, 2]))
            .and(Filter::not_exists("d").not());

        assert_eq!(parse_filter(&expr.to_document().unwrap()).unwrap(), expr);
    }

    #[test]
    fn embedded_documents_are_values() {
        let parsed = parse_filter(&doc! { "address": { "city": "Berlin" } }).unwrap();

        assert_eq!(parsed, Filter::eq("address", doc! { "city": "Berlin" }));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(parse_filter(&Document::new()).unwrap(), Expr::And(vec![]));
    }

    #[test]
    fn rejects_unknown_operators() {
        assert!(parse_filter(&doc! { "$where": "1" }).is_err());
        assert!(parse_filter(&doc! { "a": { "$regex": "x" } }).is_err());
        assert!(parse_filter(&doc! { "a": { "$in": 1 } }).is_err());
        assert!(parse_filter(&doc! { "$or": { "a": 1 } }).is_err());
    }

    #[test]
    fn truthiness_follows_projection_rules() {
        assert!(is_truthy(&Bson::Boolean(true)));
        assert!(is_truthy(&Bson::Int32(1)));
        assert!(is_truthy(&Bson::String("something not null".into())));
        assert!(!is_truthy(&Bson::Int32(0)));
        assert!(!is_truthy(&Bson::Boolean(false)));
        assert!(!is_truthy(&Bson::Null));
    }

    #[test]
    fn options_flow_into_queries() {
        let query = Query::builder()
            .filter(doc! { "a": 1 })
            .options(FindOptions::new().limit(3).offset(1).sort("a", SortDirection::Desc))
            .build();

        assert_eq!(query.limit, Some(3));
        assert_eq!(query.offset, Some(1));
        assert_eq!(
            query.sort,
            Some(Sort { field: "a".into(), direction: SortDirection::Desc })
        );
    }
}
