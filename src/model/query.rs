//! The immutable query builder.
//!
//! Every builder method returns a new [`Query`]; the receiver is left as it
//! was. Clause order is preserved, so the first `order_by` is the primary
//! sort key and joins are emitted in the order they were added.

use super::clause::{
    Clause, ClauseKind, ClauseList, JoinClause, JoinKind, OrderByClause, OrderDirection,
    TotalCount,
};
use super::expr::SimpleExpression;
use super::reference::{ObjectReference, Projection};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    subject: ObjectReference,
    clauses: ClauseList,
}

impl Query {
    /// Start a query over `subject` (a top-level table reference).
    pub fn new(subject: ObjectReference) -> Self {
        Self {
            subject,
            clauses: ClauseList::new(),
        }
    }

    /// Shorthand for `Query::new(ObjectReference::from_path(name))`.
    pub fn table(name: &str) -> Self {
        Self::new(ObjectReference::from_path(name))
    }

    pub fn subject(&self) -> &ObjectReference {
        &self.subject
    }

    pub fn clauses(&self) -> &ClauseList {
        &self.clauses
    }

    fn with_clauses(&self, clauses: ClauseList) -> Self {
        Self {
            subject: self.subject.clone(),
            clauses,
        }
    }

    fn push(&self, clause: Clause) -> Self {
        self.with_clauses(self.clauses.push(clause))
    }

    fn replace(&self, clause: Clause) -> Self {
        self.with_clauses(self.clauses.replace(clause))
    }

    fn clear(&self, kind: ClauseKind) -> Self {
        self.with_clauses(self.clauses.without(kind))
    }

    // =========================================================================
    // Builder operations
    // =========================================================================

    /// Add a WHERE criterion; several are AND-combined.
    pub fn filter(&self, criteria: SimpleExpression) -> Self {
        self.push(Clause::Where(criteria))
    }

    pub fn skip(&self, count: u64) -> Self {
        self.replace(Clause::Skip(count))
    }

    pub fn take(&self, count: u64) -> Self {
        self.replace(Clause::Take(count))
    }

    /// Append an ascending sort key. Earlier keys are kept.
    pub fn order_by(&self, reference: ObjectReference) -> Self {
        self.push_order(reference, OrderDirection::Ascending)
    }

    /// Append a descending sort key. Earlier keys are kept.
    pub fn order_by_descending(&self, reference: ObjectReference) -> Self {
        self.push_order(reference, OrderDirection::Descending)
    }

    /// Append a secondary ascending sort key.
    ///
    /// Fails with `InvalidQueryState` when no `order_by` precedes it.
    pub fn then_by(&self, reference: ObjectReference) -> Result<Self> {
        self.require_order("ThenBy")?;
        Ok(self.push_order(reference, OrderDirection::Ascending))
    }

    pub fn then_by_descending(&self, reference: ObjectReference) -> Result<Self> {
        self.require_order("ThenByDescending")?;
        Ok(self.push_order(reference, OrderDirection::Descending))
    }

    fn require_order(&self, clause: &str) -> Result<()> {
        if self.clauses.contains(ClauseKind::OrderBy) {
            Ok(())
        } else {
            Err(Error::invalid_state(clause, "no preceding OrderBy"))
        }
    }

    fn push_order(&self, reference: ObjectReference, direction: OrderDirection) -> Self {
        self.push(Clause::OrderBy(OrderByClause {
            reference,
            direction,
        }))
    }

    /// INNER JOIN `table`. Follow with [`Query::on`] or leave the condition
    /// to be inferred from a foreign key.
    pub fn join(&self, table: ObjectReference) -> Self {
        self.push_join(table, None, JoinKind::Inner)
    }

    pub fn left_join(&self, table: ObjectReference) -> Self {
        self.push_join(table, None, JoinKind::Left)
    }

    pub fn join_on(&self, table: ObjectReference, on: SimpleExpression) -> Self {
        self.push_join(table, Some(on), JoinKind::Inner)
    }

    pub fn left_join_on(&self, table: ObjectReference, on: SimpleExpression) -> Self {
        self.push_join(table, Some(on), JoinKind::Left)
    }

    /// Attach a condition to the join added immediately before.
    pub fn on(&self, condition: SimpleExpression) -> Result<Self> {
        match self.clauses.last() {
            Some(Clause::Join(join)) if join.on.is_none() => {
                let join = JoinClause {
                    on: Some(condition),
                    ..join.clone()
                };
                Ok(self.with_clauses(self.clauses.pop().push(Clause::Join(join))))
            }
            Some(Clause::Join(join)) => Err(Error::invalid_state(
                "On",
                format!("join to '{}' already has a condition", join.table),
            )),
            _ => Err(Error::invalid_state("On", "no preceding Join")),
        }
    }

    fn push_join(
        &self,
        table: ObjectReference,
        on: Option<SimpleExpression>,
        kind: JoinKind,
    ) -> Self {
        self.push(Clause::Join(JoinClause { table, on, kind }))
    }

    /// Add a HAVING criterion; several are AND-combined.
    pub fn having(&self, criteria: SimpleExpression) -> Self {
        self.push(Clause::Having(criteria))
    }

    /// Lock selected rows. Replaces any earlier lock request.
    pub fn for_update(&self, skip_locked: bool) -> Self {
        self.replace(Clause::ForUpdate { skip_locked })
    }

    pub fn clear_for_update(&self) -> Self {
        self.clear(ClauseKind::ForUpdate)
    }

    /// Replace the projection list.
    pub fn select<I, P>(&self, projections: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        let projections = projections.into_iter().map(Into::into).collect();
        self.replace(Clause::Select(projections))
    }

    /// Eager-load a related table alongside the subject rows.
    pub fn with(&self, related: ObjectReference) -> Self {
        self.push(Clause::With(related))
    }

    /// Request a total row count (ignoring paging) alongside the results.
    ///
    /// The returned handle is filled in when the query is executed.
    pub fn with_total_count(&self) -> (Self, TotalCount) {
        let count = TotalCount::new();
        (self.replace(Clause::WithTotalCount(count.clone())), count)
    }

    pub fn clear_skip(&self) -> Self {
        self.clear(ClauseKind::Skip)
    }

    pub fn clear_take(&self) -> Self {
        self.clear(ClauseKind::Take)
    }

    pub fn clear_order_by(&self) -> Self {
        self.clear(ClauseKind::OrderBy)
    }

    pub fn clear_select(&self) -> Self {
        self.clear(ClauseKind::Select)
    }

    pub fn clear_with(&self) -> Self {
        self.clear(ClauseKind::With)
    }

    // =========================================================================
    // Clause views
    // =========================================================================

    /// All WHERE criteria AND-combined, in the order they were added.
    pub fn criteria(&self) -> Option<SimpleExpression> {
        combine(self.clauses.iter().filter_map(|c| match c {
            Clause::Where(e) => Some(e),
            _ => None,
        }))
    }

    /// All HAVING criteria AND-combined.
    pub fn having_criteria(&self) -> Option<SimpleExpression> {
        combine(self.clauses.iter().filter_map(|c| match c {
            Clause::Having(e) => Some(e),
            _ => None,
        }))
    }

    pub fn joins(&self) -> impl Iterator<Item = &JoinClause> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::Join(j) => Some(j),
            _ => None,
        })
    }

    pub fn order_keys(&self) -> impl Iterator<Item = &OrderByClause> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::OrderBy(o) => Some(o),
            _ => None,
        })
    }

    pub fn skip_count(&self) -> Option<u64> {
        last_of(&self.clauses, |c| match c {
            Clause::Skip(n) => Some(*n),
            _ => None,
        })
    }

    pub fn take_count(&self) -> Option<u64> {
        last_of(&self.clauses, |c| match c {
            Clause::Take(n) => Some(*n),
            _ => None,
        })
    }

    /// `Some(skip_locked)` when rows should be locked.
    pub fn lock(&self) -> Option<bool> {
        last_of(&self.clauses, |c| match c {
            Clause::ForUpdate { skip_locked } => Some(*skip_locked),
            _ => None,
        })
    }

    pub fn selection(&self) -> Option<&[Projection]> {
        last_of(&self.clauses, |c| match c {
            Clause::Select(p) => Some(p.as_slice()),
            _ => None,
        })
    }

    pub fn with_targets(&self) -> impl Iterator<Item = &ObjectReference> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::With(r) => Some(r),
            _ => None,
        })
    }

    pub fn total_count(&self) -> Option<&TotalCount> {
        last_of(&self.clauses, |c| match c {
            Clause::WithTotalCount(t) => Some(t),
            _ => None,
        })
    }
}

fn combine<'a>(mut criteria: impl Iterator<Item = &'a SimpleExpression>) -> Option<SimpleExpression> {
    let first = criteria.next()?.clone();
    Some(criteria.fold(first, |acc, next| acc.and(next)))
}

/// The latest clause `f` accepts; later clauses of a replaceable kind win.
fn last_of<'a, T>(clauses: &'a ClauseList, f: impl FnMut(&'a Clause) -> Option<T>) -> Option<T> {
    clauses.iter().filter_map(f).last()
}
