use std::collections::BTreeSet;

use crate::query::{Field, Query, Select, SelectSource};

/// What is visible at a given position in the query tree. Built while walking
/// the tree during the qualification passes and discarded once planning
/// completes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scope {
    pub table_aliases: BTreeSet<String>,
    pub fields: BTreeSet<Field>,
    pub location: Location,
    /// True when the source is a raw table and any column name may be asked
    /// for, even if we haven't seen it yet.
    pub any_fields: bool,
}

/// The clause kind the current expression sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    Project,
    Where,
    GroupBy,
    OrderBy,
    LateralView,
    JoinCondition,
    #[default]
    Undefined,
}

impl Scope {
    pub fn merge(&self, other: &Scope) -> Scope {
        Scope {
            table_aliases: self.table_aliases.union(&other.table_aliases).cloned().collect(),
            fields: self.fields.union(&other.fields).cloned().collect(),
            location: self.location,
            any_fields: self.any_fields || other.any_fields,
        }
    }

    pub fn at(&self, location: Location) -> Scope {
        Scope { location, ..self.clone() }
    }
}

impl Query {
    /// The scope this query exposes to whatever wraps it.
    pub fn outer_scope(&self) -> Scope {
        match self {
            Query::Select(select) => select.outer_scope(),
            Query::Insert { .. } => fixed_scope(&["result"]),
            Query::Explain(_) => fixed_scope(&["plan"]),
            Query::Describe { table_output, .. } => {
                if *table_output {
                    fixed_scope(&["table"])
                } else {
                    fixed_scope(&["column_name", "column_type"])
                }
            }
        }
    }
}

impl Select {
    pub fn outer_scope(&self) -> Scope {
        Scope {
            fields: self
                .expressions
                .iter()
                .filter_map(|e| e.alias.as_deref())
                .map(Field::unqualified)
                .collect(),
            ..Scope::default()
        }
    }

    /// The scope the select's own clauses see.
    pub fn inner_scope(&self) -> Scope {
        self.source.outer_scope()
    }
}

impl SelectSource {
    pub fn outer_scope(&self) -> Scope {
        match self {
            SelectSource::JustATable { alias, .. } => Scope {
                table_aliases: alias.iter().cloned().collect(),
                any_fields: true,
                ..Scope::default()
            },
            SelectSource::Join { left, right, .. } => left.outer_scope().merge(&right.outer_scope()),
            SelectSource::InlineView { inner, alias } => {
                let sub = inner.outer_scope();
                Scope {
                    table_aliases: alias.iter().cloned().collect(),
                    fields: sub
                        .fields
                        .into_iter()
                        .map(|f| Field { table_alias: alias.clone(), field_name: f.field_name })
                        .collect(),
                    any_fields: sub.any_fields,
                    ..Scope::default()
                }
            }
            SelectSource::LateralView { source, expression } => {
                let mut scope = source.outer_scope();
                if let Some(alias) = &expression.alias {
                    scope.fields.insert(Field::unqualified(alias));
                }
                scope
            }
        }
    }
}

fn fixed_scope(names: &[&str]) -> Scope {
    Scope { fields: names.iter().map(|n| Field::unqualified(n)).collect(), ..Scope::default() }
}
