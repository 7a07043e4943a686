use crate::{formats::FormatRegistry, logical::LogicalOperator};

/// Parallelism annotation. Decides, bottom-up, whether each subtree's output
/// may be produced concurrently and consumed out of order ("parallel-safe"),
/// and inserts a Gather exactly where safety flips from true to false, plus
/// one above the root when the whole tree is safe. A DataSource is safe iff
/// its format is splittable; row-local operators inherit their child's
/// safety; Sort, GroupBy, Limit, Join and Write are synchronization points.
pub fn parallelize(op: LogicalOperator, formats: &FormatRegistry) -> LogicalOperator {
    let (op, safe) = annotate(op, formats);
    if safe {
        tracing::debug!("inserting gather above parallel-safe root");
        LogicalOperator::Gather { source: Box::new(op) }
    } else {
        op
    }
}

fn annotate(op: LogicalOperator, formats: &FormatRegistry) -> (LogicalOperator, bool) {
    match op {
        LogicalOperator::DataSource { table, alias } => {
            let safe = formats
                .get(table.table_type)
                .map(|format| format.splittable())
                .unwrap_or(false);
            (LogicalOperator::DataSource { table, alias }, safe)
        }

        // Row-local operators: safe whenever their input is.
        LogicalOperator::Filter { predicate, source } => {
            let (source, safe) = annotate(*source, formats);
            (LogicalOperator::Filter { predicate, source: Box::new(source) }, safe)
        }
        LogicalOperator::Project { expressions, source, alias } => {
            let (source, safe) = annotate(*source, formats);
            (LogicalOperator::Project { expressions, source: Box::new(source), alias }, safe)
        }
        LogicalOperator::LateralView { expression, source } => {
            let (source, safe) = annotate(*source, formats);
            (LogicalOperator::LateralView { expression, source: Box::new(source) }, safe)
        }

        // Synchronization points: gather a safe child, never safe themselves.
        LogicalOperator::Sort { keys, source } => {
            let source = gather_if_safe(*source, formats);
            (LogicalOperator::Sort { keys, source: Box::new(source) }, false)
        }
        LogicalOperator::Limit { limit, source } => {
            let source = gather_if_safe(*source, formats);
            (LogicalOperator::Limit { limit, source: Box::new(source) }, false)
        }
        LogicalOperator::GroupBy { expressions, group_by, source, alias } => {
            let source = gather_if_safe(*source, formats);
            (
                LogicalOperator::GroupBy {
                    expressions,
                    group_by,
                    source: Box::new(source),
                    alias,
                },
                false,
            )
        }
        LogicalOperator::Join { left, right, condition } => {
            let left = gather_if_safe(*left, formats);
            let right = gather_if_safe(*right, formats);
            (
                LogicalOperator::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    condition,
                },
                false,
            )
        }
        LogicalOperator::Write { table, source } => {
            let source = gather_if_safe(*source, formats);
            (LogicalOperator::Write { table, source: Box::new(source) }, false)
        }

        // Explain still annotates its child so the rendered plan shows what
        // execution would really run.
        LogicalOperator::Explain { source } => {
            let source = parallelize(*source, formats);
            (LogicalOperator::Explain { source: Box::new(source) }, false)
        }
        leaf @ LogicalOperator::Describe { .. } => (leaf, false),

        // A pre-existing Gather already merged its subtree.
        LogicalOperator::Gather { source } => {
            let (source, _) = annotate(*source, formats);
            (LogicalOperator::Gather { source: Box::new(source) }, false)
        }
    }
}

fn gather_if_safe(op: LogicalOperator, formats: &FormatRegistry) -> LogicalOperator {
    let (op, safe) = annotate(op, formats);
    if safe {
        tracing::debug!("inserting gather at parallel-safety boundary");
        LogicalOperator::Gather { source: Box::new(op) }
    } else {
        op
    }
}
