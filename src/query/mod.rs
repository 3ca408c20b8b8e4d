//! Query model: a thin filter/sort/page descriptor.
//!
//! This is deliberately not a relational algebra. A [`Query`] selects a page
//! of records matching a predicate tree under a sort order; evaluating one
//! never mutates state.

use crate::record::{Record, Value};

/// Sort direction for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Comparison operators usable in filter leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        }
    }
}

/// Filter predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field op value`
    Cmp {
        field: String,
        op: CmpOp,
        value: Value,
    },
    /// `field IN (values...)`; an empty list matches nothing.
    In { field: String, values: Vec<Value> },
    /// `field LIKE pattern`
    Like { field: String, pattern: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            field: field.into(),
            op: CmpOp::Eq,
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            field: field.into(),
            op: CmpOp::Ne,
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            field: field.into(),
            op: CmpOp::Gt,
            value: value.into(),
        }
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            field: field.into(),
            op: CmpOp::Ge,
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            field: field.into(),
            op: CmpOp::Lt,
            value: value.into(),
        }
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            field: field.into(),
            op: CmpOp::Le,
            value: value.into(),
        }
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In {
            field: field.into(),
            values,
        }
    }

    /// Render the predicate as a parameterized SQL fragment.
    pub(crate) fn to_sql(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Filter::Cmp { field, op, value } => {
                sql.push_str(field);
                sql.push(' ');
                sql.push_str(op.sql());
                sql.push_str(" ?");
                params.push(value.clone());
            }
            Filter::In { field, values } => {
                if values.is_empty() {
                    sql.push_str("1 = 0");
                    return;
                }
                sql.push_str(field);
                sql.push_str(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('?');
                    params.push(value.clone());
                }
                sql.push(')');
            }
            Filter::Like { field, pattern } => {
                sql.push_str(field);
                sql.push_str(" LIKE ?");
                params.push(Value::String(pattern.clone()));
            }
            Filter::And(children) | Filter::Or(children) => {
                if children.is_empty() {
                    sql.push_str("1 = 1");
                    return;
                }
                let joiner = if matches!(self, Filter::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                sql.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(joiner);
                    }
                    child.to_sql(sql, params);
                }
                sql.push(')');
            }
            Filter::Not(child) => {
                sql.push_str("NOT (");
                child.to_sql(sql, params);
                sql.push(')');
            }
        }
    }
}

/// Marker page size meaning "no paging".
pub(crate) const UNPAGED: u64 = u64::MAX;

/// A page descriptor over a filtered, sorted record set.
///
/// Page numbers are 1-based; page number and page size are clamped to at
/// least 1 by the builder methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    page_num: u64,
    page_size: u64,
    filter: Option<Filter>,
    sorts: Vec<Sort>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    /// An unpaged, unfiltered query: page 1, everything.
    pub fn new() -> Self {
        Self {
            page_num: 1,
            page_size: UNPAGED,
            filter: None,
            sorts: Vec::new(),
        }
    }

    /// Select a 1-based page number.
    pub fn page(mut self, page_num: u64) -> Self {
        self.page_num = page_num.max(1);
        self
    }

    /// Set the page size.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the filter predicate.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append a sort key.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sorts.push(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn page_num(&self) -> u64 {
        self.page_num
    }

    pub fn get_page_size(&self) -> u64 {
        self.page_size
    }

    /// Whether paging applies.
    pub fn is_paged(&self) -> bool {
        self.page_size != UNPAGED
    }

    pub fn get_filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }
}

/// One page of query results plus the total page count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    /// Total number of pages for the query's page size.
    pub page_count: u64,
    /// Records on the requested page, in sort order.
    pub records: Vec<Record>,
}

impl QueryResult {
    /// The empty result: zero pages, no records.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(filter: &Filter) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        filter.to_sql(&mut sql, &mut params);
        (sql, params)
    }

    #[test]
    fn test_cmp_renders_placeholder() {
        let (sql, params) = render(&Filter::eq("name", "x"));
        assert_eq!(sql, "name = ?");
        assert_eq!(params, vec![Value::String("x".into())]);
    }

    #[test]
    fn test_nested_and_or() {
        let filter = Filter::And(vec![
            Filter::gt("age", 18i64),
            Filter::Or(vec![Filter::eq("role", "admin"), Filter::eq("role", "op")]),
        ]);
        let (sql, params) = render(&filter);
        assert_eq!(sql, "(age > ? AND (role = ? OR role = ?))");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let (sql, params) = render(&Filter::one_of("id", vec![]));
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_not_wraps_child() {
        let (sql, _) = render(&Filter::Not(Box::new(Filter::eq("a", 1i64))));
        assert_eq!(sql, "NOT (a = ?)");
    }

    #[test]
    fn test_query_clamps_page_to_one() {
        let query = Query::new().page(0).page_size(0);
        assert_eq!(query.page_num(), 1);
        assert_eq!(query.get_page_size(), 1);
    }

    #[test]
    fn test_default_query_is_unpaged() {
        assert!(!Query::new().is_paged());
    }
}
