use std::fmt;

use serde_json::Value;

pub mod normalize;
pub mod scope;
pub mod visitor;

pub use scope::Scope;

/// Field name the parser emits for `select *`; the table scan resolves it to
/// the whole raw record.
pub const WILDCARD_FIELD: &str = "__all__";

/// A (table-alias, column-name) identity. Used both as an identifier in
/// expressions and as an output-column descriptor on logical operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Field {
    pub table_alias: Option<String>,
    pub field_name: String,
}

impl Field {
    pub fn new(table_alias: &str, field_name: &str) -> Self {
        Self { table_alias: Some(table_alias.to_string()), field_name: field_name.to_string() }
    }

    pub fn unqualified(field_name: &str) -> Self {
        Self { table_alias: None, field_name: field_name.to_string() }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table_alias {
            Some(alias) => write!(f, "{}.{}", alias, self.field_name),
            None => write!(f, "{}", self.field_name),
        }
    }
}

/// Any expression, scalar or aggregate. Constants carry the engine's dynamic
/// scalar type directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Function { name: String, parameters: Vec<Expression> },
    Constant(Value),
    // The table alias will always be None coming out of the parser: it can't
    // tell table_alias.field from field.subfield, so both arrive as a
    // two-argument idx() call that the qualification pass rewrites.
    Identifier(Field),
}

impl Expression {
    pub fn func(name: &str, parameters: Vec<Expression>) -> Self {
        Expression::Function { name: name.to_string(), parameters }
    }

    pub fn ident(field: Field) -> Self {
        Expression::Identifier(field)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Function { name, parameters } => {
                let params: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
                write!(f, "{}({})", name, params.join(", "))
            }
            Expression::Constant(value) => write!(f, "{}", value),
            Expression::Identifier(field) => write!(f, "{}", field),
        }
    }
}

/// Projection entry; the alias is filled in (`_col<N>` default) during
/// planning.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedExpr {
    pub expression: Expression,
    pub alias: Option<String>,
}

impl NamedExpr {
    pub fn new(expression: Expression, alias: Option<&str>) -> Self {
        Self { expression, alias: alias.map(|a| a.to_string()) }
    }
}

impl fmt::Display for NamedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} as {}", self.expression, alias),
            None => write!(f, "{}", self.expression),
        }
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderExpr {
    pub expression: Expression,
    pub ascending: bool,
}

impl fmt::Display for OrderExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expression, if self.ascending { "asc" } else { "desc" })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableType {
    Csv,
    Json,
    Dir,
}

/// A table reference. `fields` starts empty and is populated by the
/// field-pushdown pass with exactly the names everything downstream needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub table_type: TableType,
    pub path: String,
    pub fields: Vec<String>,
}

impl Table {
    pub fn new(table_type: TableType, path: &str) -> Self {
        Self { table_type, path: path.to_string(), fields: vec![] }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} \"{}\"", self.table_type, self.path)
    }
}

/// A query as we think about it from the SQL point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(Select),
    Describe { table: Table, table_output: bool },
    Explain(Box<Query>),
    Insert { query: Box<Query>, table: Table },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub expressions: Vec<NamedExpr>,
    pub source: SelectSource,
    pub predicate: Option<Expression>,
    pub group_by: Option<Vec<Expression>>,
    pub order_by: Option<Vec<OrderExpr>>,
    pub limit: Option<usize>,
}

impl Select {
    /// A bare `select <exprs> from <source>`.
    pub fn simple(expressions: Vec<NamedExpr>, source: SelectSource) -> Self {
        Self { expressions, source, predicate: None, group_by: None, order_by: None, limit: None }
    }
}

/// The source of a select query.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectSource {
    JustATable { table: Table, alias: Option<String> },
    InlineView { inner: Box<Query>, alias: Option<String> },
    LateralView { source: Box<SelectSource>, expression: NamedExpr },
    Join { left: Box<SelectSource>, right: Box<SelectSource>, condition: Expression },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_display_with_and_without_alias() {
        assert_eq!(Field::new("t", "a").to_string(), "t.a");
        assert_eq!(Field::unqualified("a").to_string(), "a");
    }

    #[test]
    fn expression_display_is_readable() {
        let e = Expression::func(
            "add",
            vec![Expression::ident(Field::new("t", "a")), Expression::Constant(json!(1))],
        );
        assert_eq!(e.to_string(), "add(t.a, 1)");
    }

    #[test]
    fn structural_equality_over_trees() {
        let a = Expression::func("idx", vec![Expression::ident(Field::unqualified("t")), Expression::Constant(json!("x"))]);
        let b = Expression::func("idx", vec![Expression::ident(Field::unqualified("t")), Expression::Constant(json!("x"))]);
        assert_eq!(a, b);
    }
}
