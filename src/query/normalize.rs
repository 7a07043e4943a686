use serde_json::Value;

use crate::query::{
    Expression, Field, Query,
    scope::Scope,
    visitor::QueryVisitor,
};

/// Rewrites `idx(alias, 'member')` calls into qualified identifiers when
/// `alias` names a table alias visible in the clause's scope. The rewrite
/// applies innermost-first, so chained lookups such as
/// `idx(idx(t, 'user'), 'name')` collapse their head into `t.user` and leave
/// the outer `idx` as a runtime member access.
pub fn qualify_identifiers(query: Query) -> Query {
    QualifyIdentifiers.visit_query(query, &mut ())
}

struct QualifyIdentifiers;

impl QueryVisitor for QualifyIdentifiers {
    type Context = ();

    fn visit_function(
        &mut self,
        name: String,
        parameters: Vec<Expression>,
        scope: &Scope,
        ctx: &mut (),
    ) -> Expression {
        if name == "idx" {
            if let [Expression::Identifier(head), Expression::Constant(Value::String(member))] =
                &parameters[..]
            {
                if head.table_alias.is_none() && scope.table_aliases.contains(&head.field_name) {
                    return Expression::ident(Field::new(&head.field_name, member));
                }
            }
        }
        self.walk_function(name, parameters, scope, ctx)
    }
}
