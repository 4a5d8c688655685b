//! Query clauses and the persistent list that holds them.

use std::fmt;
use std::sync::{Arc, Mutex};

use super::expr::SimpleExpression;
use super::reference::{ObjectReference, Projection};

/// Sort direction of an OrderBy clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// Target table; its alias (if any) names the joined instance.
    pub table: ObjectReference,
    /// Explicit join condition. `None` means "infer from a foreign key".
    pub on: Option<SimpleExpression>,
    pub kind: JoinKind,
}

impl JoinClause {
    /// Name the query uses to qualify columns of this join.
    pub fn qualifier(&self) -> &str {
        self.table.alias().unwrap_or(self.table.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub reference: ObjectReference,
    pub direction: OrderDirection,
}

/// Deferred total row count, filled in once the owning query has been executed.
///
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct TotalCount {
    slot: Arc<Mutex<Option<u64>>>,
}

impl TotalCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// The count, or `None` before the query has been materialised.
    pub fn get(&self) -> Option<u64> {
        match self.slot.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set(&self, count: u64) {
        match self.slot.lock() {
            Ok(mut guard) => *guard = Some(count),
            Err(poisoned) => *poisoned.into_inner() = Some(count),
        }
    }
}

impl fmt::Debug for TotalCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TotalCount").field(&self.get()).finish()
    }
}

impl PartialEq for TotalCount {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

/// One structural fragment of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Where(SimpleExpression),
    Join(JoinClause),
    OrderBy(OrderByClause),
    Skip(u64),
    Take(u64),
    Having(SimpleExpression),
    ForUpdate { skip_locked: bool },
    Select(Vec<Projection>),
    With(ObjectReference),
    WithTotalCount(TotalCount),
}

/// Discriminant of [`Clause`], used for replace/clear operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Where,
    Join,
    OrderBy,
    Skip,
    Take,
    Having,
    ForUpdate,
    Select,
    With,
    WithTotalCount,
}

impl Clause {
    pub fn kind(&self) -> ClauseKind {
        match self {
            Clause::Where(_) => ClauseKind::Where,
            Clause::Join(_) => ClauseKind::Join,
            Clause::OrderBy(_) => ClauseKind::OrderBy,
            Clause::Skip(_) => ClauseKind::Skip,
            Clause::Take(_) => ClauseKind::Take,
            Clause::Having(_) => ClauseKind::Having,
            Clause::ForUpdate { .. } => ClauseKind::ForUpdate,
            Clause::Select(_) => ClauseKind::Select,
            Clause::With(_) => ClauseKind::With,
            Clause::WithTotalCount(_) => ClauseKind::WithTotalCount,
        }
    }
}

// =============================================================================
// Persistent clause list
// =============================================================================

struct Node {
    clause: Clause,
    prev: Option<Arc<Node>>,
}

/// Append-only, structurally shared sequence of clauses.
///
/// `push` returns a new list sharing every existing node with the old one,
/// so two queries derived from the same parent never observe each other.
#[derive(Clone, Default)]
pub struct ClauseList {
    head: Option<Arc<Node>>,
    len: usize,
}

impl ClauseList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// New list with `clause` appended.
    pub fn push(&self, clause: Clause) -> Self {
        Self {
            head: Some(Arc::new(Node {
                clause,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// The most recently appended clause.
    pub fn last(&self) -> Option<&Clause> {
        self.head.as_ref().map(|node| &node.clause)
    }

    /// New list without the most recently appended clause.
    pub fn pop(&self) -> Self {
        match &self.head {
            Some(node) => Self {
                head: node.prev.clone(),
                len: self.len - 1,
            },
            None => self.clone(),
        }
    }

    /// New list without any clause of `kind`.
    pub fn without(&self, kind: ClauseKind) -> Self {
        if !self.iter().any(|c| c.kind() == kind) {
            return self.clone();
        }
        self.iter()
            .filter(|c| c.kind() != kind)
            .fold(Self::new(), |list, c| list.push(c.clone()))
    }

    /// New list where `clause` replaces every clause of the same kind.
    pub fn replace(&self, clause: Clause) -> Self {
        self.without(clause.kind()).push(clause)
    }

    /// Clauses in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        let mut nodes = Vec::with_capacity(self.len);
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            nodes.push(&node.clause);
            current = node.prev.as_deref();
        }
        nodes.into_iter().rev()
    }

    pub fn of_kind(&self, kind: ClauseKind) -> impl Iterator<Item = &Clause> {
        self.iter().filter(move |c| c.kind() == kind)
    }

    pub fn contains(&self, kind: ClauseKind) -> bool {
        self.iter().any(|c| c.kind() == kind)
    }
}

impl fmt::Debug for ClauseList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for ClauseList {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}
