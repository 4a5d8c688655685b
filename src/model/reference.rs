//! Object references - unbound paths naming tables, columns and joined sub-paths.
//!
//! A reference is a singly-linked chain of name segments: `Customers.Orders.OrderDate`
//! is the segment `OrderDate` owned by `Orders`, owned by the top-level `Customers`.
//! Nothing here knows about the schema; names are bound later by the compiler.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An immutable path expression identifying a table, column or aliased sub-path.
///
/// Cloning is cheap (the chain is shared). Owners are fixed at construction,
/// so a chain can never become cyclic.
#[derive(Clone)]
pub struct ObjectReference {
    node: Arc<Node>,
}

struct Node {
    name: String,
    owner: Option<ObjectReference>,
    alias: Option<String>,
}

impl ObjectReference {
    /// Create a top-level reference (a table, or a bare column of the query subject).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            node: Arc::new(Node {
                name: name.into(),
                owner: None,
                alias: None,
            }),
        }
    }

    /// Create a child reference owned by `self`: `users.field("Age")` is `users.Age`.
    pub fn field(&self, name: impl Into<String>) -> Self {
        Self {
            node: Arc::new(Node {
                name: name.into(),
                owner: Some(self.clone()),
                alias: None,
            }),
        }
    }

    /// Parse a dotted path (`"Customers.Orders.OrderDate"`) into a chain.
    pub fn from_path(path: &str) -> Self {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        segments.fold(Self::new(first), |owner, segment| owner.field(segment))
    }

    /// Return a copy of this reference re-parented under `owner`.
    pub fn with_owner(&self, owner: ObjectReference) -> Self {
        Self {
            node: Arc::new(Node {
                name: self.node.name.clone(),
                owner: Some(owner),
                alias: self.node.alias.clone(),
            }),
        }
    }

    /// Return a copy of this reference carrying `alias`.
    pub fn with_alias(&self, alias: impl Into<String>) -> Self {
        Self {
            node: Arc::new(Node {
                name: self.node.name.clone(),
                owner: self.node.owner.clone(),
                alias: Some(alias.into()),
            }),
        }
    }

    /// The last segment of the path.
    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.node.alias.as_deref()
    }

    pub fn owner(&self) -> Option<&ObjectReference> {
        self.node.owner.as_ref()
    }

    /// A reference without an owner names a table.
    pub fn is_top_level(&self) -> bool {
        self.node.owner.is_none()
    }

    /// Walk owners up to the root of the chain.
    pub fn top(&self) -> &ObjectReference {
        let mut current = self;
        while let Some(owner) = current.owner() {
            current = owner;
        }
        current
    }

    /// Name segments from the root down to this reference.
    pub fn segments(&self) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut current = Some(self);
        while let Some(r) = current {
            segments.push(r.name());
            current = r.owner();
        }
        segments.reverse();
        segments
    }

    /// Dotted path without aliases.
    pub fn path(&self) -> String {
        self.segments().join(".")
    }

    /// Number of segments in the chain.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self;
        while let Some(owner) = current.owner() {
            depth += 1;
            current = owner;
        }
        depth
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    pub fn count(&self) -> FunctionReference {
        FunctionReference::new(Aggregate::Count, self.clone())
    }

    pub fn sum(&self) -> FunctionReference {
        FunctionReference::new(Aggregate::Sum, self.clone())
    }

    pub fn average(&self) -> FunctionReference {
        FunctionReference::new(Aggregate::Average, self.clone())
    }

    pub fn min(&self) -> FunctionReference {
        FunctionReference::new(Aggregate::Min, self.clone())
    }

    pub fn max(&self) -> FunctionReference {
        FunctionReference::new(Aggregate::Max, self.clone())
    }
}

impl PartialEq for ObjectReference {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.node, &other.node) {
            return true;
        }
        self.node.name == other.node.name
            && self.node.alias == other.node.alias
            && self.node.owner == other.node.owner
    }
}

impl Eq for ObjectReference {}

impl Hash for ObjectReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.name.hash(state);
        self.node.alias.hash(state);
        if let Some(owner) = &self.node.owner {
            owner.hash(state);
        }
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = self.owner() {
            write!(f, "{}.", owner)?;
        }
        write!(f, "{}", self.name())?;
        if let Some(alias) = self.alias() {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectReference({})", self)
    }
}

impl From<&str> for ObjectReference {
    fn from(path: &str) -> Self {
        ObjectReference::from_path(path)
    }
}

// =============================================================================
// Aggregate function references
// =============================================================================

/// Aggregate functions usable in Select and Having.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    Count,
    Sum,
    Average,
    Min,
    Max,
}

impl Aggregate {
    pub fn sql_name(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Average => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// An aggregate applied to a column reference, e.g. `Orders.Total.sum()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionReference {
    pub aggregate: Aggregate,
    pub argument: ObjectReference,
    pub alias: Option<String>,
}

impl FunctionReference {
    pub fn new(aggregate: Aggregate, argument: ObjectReference) -> Self {
        Self {
            aggregate,
            argument,
            alias: None,
        }
    }

    pub fn with_alias(&self, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..self.clone()
        }
    }
}

impl fmt::Display for FunctionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.aggregate.sql_name(), self.argument.path())?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

// =============================================================================
// Projections
// =============================================================================

/// One item of an explicit Select list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    Column(ObjectReference),
    Aggregate(FunctionReference),
}

impl Projection {
    /// Name of the output column, when one is known before compilation.
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Projection::Column(r) => Some(r.alias().unwrap_or(r.name())),
            Projection::Aggregate(f) => f.alias.as_deref(),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Projection::Aggregate(_))
    }
}

impl From<ObjectReference> for Projection {
    fn from(r: ObjectReference) -> Self {
        Projection::Column(r)
    }
}

impl From<&ObjectReference> for Projection {
    fn from(r: &ObjectReference) -> Self {
        Projection::Column(r.clone())
    }
}

impl From<FunctionReference> for Projection {
    fn from(f: FunctionReference) -> Self {
        Projection::Aggregate(f)
    }
}
