//! Simple expressions - comparison and boolean trees over object references.
//!
//! Expressions are immutable. Combining two expressions with [`SimpleExpression::and`]
//! (or `&`) builds a new parent node; the operands are shared, never mutated.
//!
//! ```ignore
//! use dynaquery::model::{Comparable, ObjectReference};
//!
//! let users = ObjectReference::new("Users");
//! let adults = users.field("Age").greater_than(30);
//! let named = users.field("Name").equals(vec!["Bob", "Alice"]); // IN (...)
//! let criteria = adults & named;
//! ```

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use super::reference::{FunctionReference, ObjectReference};
use super::value::Value;
use crate::error::{Error, Result};

/// Operator tag of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Like,
    Between,
    In,
    NotIn,
    And,
    Or,
    Not,
}

impl ExpressionType {
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }
}

/// One side of an expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Reference(ObjectReference),
    Function(FunctionReference),
    Value(Value),
    /// Inclusive `(start, end)` pair, right side of Between.
    Range(Value, Value),
    /// Ordered literal sequence, right side of In / NotIn.
    Set(Vec<Value>),
    Expression(Arc<SimpleExpression>),
    /// Right side of the unary Not.
    Empty,
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<ObjectReference> for Operand {
    fn from(r: ObjectReference) -> Self {
        Operand::Reference(r)
    }
}

/// Right-hand side accepted by the comparison builders.
#[derive(Debug, Clone, PartialEq)]
pub struct Rhs(pub Operand);

macro_rules! scalar_rhs {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Rhs {
                fn from(v: $ty) -> Self {
                    Rhs(Operand::Value(Value::from(v)))
                }
            }
        )*
    };
}

scalar_rhs!(bool, i32, i64, u32, f64, &str, String, Value);

impl<T: Into<Value>> From<Vec<T>> for Rhs {
    fn from(values: Vec<T>) -> Self {
        Rhs(Operand::Set(values.into_iter().map(Into::into).collect()))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Rhs {
    fn from(values: [T; N]) -> Self {
        Rhs(Operand::Set(values.into_iter().map(Into::into).collect()))
    }
}

impl<T: Into<Value>> From<RangeInclusive<T>> for Rhs {
    fn from(range: RangeInclusive<T>) -> Self {
        let (start, end) = range.into_inner();
        Rhs(Operand::Range(start.into(), end.into()))
    }
}

impl From<ObjectReference> for Rhs {
    fn from(r: ObjectReference) -> Self {
        Rhs(Operand::Reference(r))
    }
}

impl From<&ObjectReference> for Rhs {
    fn from(r: &ObjectReference) -> Self {
        Rhs(Operand::Reference(r.clone()))
    }
}

impl From<FunctionReference> for Rhs {
    fn from(f: FunctionReference) -> Self {
        Rhs(Operand::Function(f))
    }
}

/// A node in a comparison/boolean tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleExpression {
    left: Operand,
    right: Operand,
    kind: ExpressionType,
}

impl SimpleExpression {
    pub fn new(left: Operand, right: Operand, kind: ExpressionType) -> Self {
        Self { left, right, kind }
    }

    pub fn left(&self) -> &Operand {
        &self.left
    }

    pub fn right(&self) -> &Operand {
        &self.right
    }

    pub fn kind(&self) -> ExpressionType {
        self.kind
    }

    /// `self AND other`.
    pub fn and(&self, other: &SimpleExpression) -> SimpleExpression {
        Self::new(
            Operand::Expression(Arc::new(self.clone())),
            Operand::Expression(Arc::new(other.clone())),
            ExpressionType::And,
        )
    }

    /// `self OR other`.
    pub fn or(&self, other: &SimpleExpression) -> SimpleExpression {
        Self::new(
            Operand::Expression(Arc::new(self.clone())),
            Operand::Expression(Arc::new(other.clone())),
            ExpressionType::Or,
        )
    }

    /// `NOT self`.
    pub fn negate(&self) -> SimpleExpression {
        Self::new(
            Operand::Expression(Arc::new(self.clone())),
            Operand::Empty,
            ExpressionType::Not,
        )
    }

    /// Check the structural invariants of the whole tree.
    ///
    /// Between needs a range, In/NotIn a non-empty set, And/Or two
    /// sub-expressions and Not one.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            ExpressionType::And | ExpressionType::Or => {
                match (&self.left, &self.right) {
                    (Operand::Expression(l), Operand::Expression(r)) => {
                        l.validate()?;
                        r.validate()
                    }
                    _ => Err(Error::invalid_state(
                        "Where",
                        format!("{:?} requires two sub-expressions", self.kind),
                    )),
                }
            }
            ExpressionType::Not => match &self.left {
                Operand::Expression(inner) => inner.validate(),
                _ => Err(Error::invalid_state("Where", "Not requires a sub-expression")),
            },
            ExpressionType::Between => match &self.right {
                Operand::Range(_, _) => Ok(()),
                other => Err(Error::invalid_state(
                    "Where",
                    format!("Between requires a (start, end) range, got {:?}", other),
                )),
            },
            ExpressionType::In | ExpressionType::NotIn => match &self.right {
                Operand::Set(values) if !values.is_empty() => Ok(()),
                Operand::Set(_) => Err(Error::invalid_state(
                    "Where",
                    format!("empty value list for {}", describe(&self.left)),
                )),
                other => Err(Error::invalid_state(
                    "Where",
                    format!("{:?} requires a value list, got {:?}", self.kind, other),
                )),
            },
            _ => match (&self.left, &self.right) {
                (Operand::Range(..) | Operand::Set(_), _) | (_, Operand::Range(..) | Operand::Set(_)) => {
                    Err(Error::invalid_state(
                        "Where",
                        format!("{:?} cannot compare ranges or value lists", self.kind),
                    ))
                }
                _ => Ok(()),
            },
        }
    }

    /// Whether any node of the tree applies an aggregate function.
    pub fn contains_aggregate(&self) -> bool {
        [&self.left, &self.right].into_iter().any(|op| match op {
            Operand::Function(_) => true,
            Operand::Expression(inner) => inner.contains_aggregate(),
            _ => false,
        })
    }
}

fn describe(op: &Operand) -> String {
    match op {
        Operand::Reference(r) => r.path(),
        Operand::Function(f) => f.to_string(),
        other => format!("{:?}", other),
    }
}

impl From<SimpleExpression> for Operand {
    fn from(e: SimpleExpression) -> Self {
        Operand::Expression(Arc::new(e))
    }
}

impl std::ops::BitAnd for SimpleExpression {
    type Output = SimpleExpression;

    fn bitand(self, rhs: SimpleExpression) -> SimpleExpression {
        self.and(&rhs)
    }
}

impl std::ops::BitOr for SimpleExpression {
    type Output = SimpleExpression;

    fn bitor(self, rhs: SimpleExpression) -> SimpleExpression {
        self.or(&rhs)
    }
}

impl std::ops::Not for SimpleExpression {
    type Output = SimpleExpression;

    fn not(self) -> SimpleExpression {
        self.negate()
    }
}

impl fmt::Display for SimpleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}, {})", self.kind, describe(&self.left), describe(&self.right))
    }
}

// =============================================================================
// Comparison builders
// =============================================================================

/// Comparison builders shared by column references and aggregate references.
///
/// `equals` with a list builds `In`, with an inclusive range builds `Between`;
/// `not_equals` with a list builds `NotIn`. A one-element list is still `In`.
pub trait Comparable {
    fn to_operand(&self) -> Operand;

    fn equals(&self, rhs: impl Into<Rhs>) -> SimpleExpression {
        let Rhs(right) = rhs.into();
        let kind = match right {
            Operand::Set(_) => ExpressionType::In,
            Operand::Range(..) => ExpressionType::Between,
            _ => ExpressionType::Equal,
        };
        SimpleExpression::new(self.to_operand(), right, kind)
    }

    fn not_equals(&self, rhs: impl Into<Rhs>) -> SimpleExpression {
        let Rhs(right) = rhs.into();
        match right {
            Operand::Set(_) => {
                SimpleExpression::new(self.to_operand(), right, ExpressionType::NotIn)
            }
            Operand::Range(..) => {
                SimpleExpression::new(self.to_operand(), right, ExpressionType::Between)
                    .negate()
            }
            _ => SimpleExpression::new(self.to_operand(), right, ExpressionType::NotEqual),
        }
    }

    fn greater_than(&self, rhs: impl Into<Rhs>) -> SimpleExpression {
        SimpleExpression::new(self.to_operand(), rhs.into().0, ExpressionType::GreaterThan)
    }

    fn less_than(&self, rhs: impl Into<Rhs>) -> SimpleExpression {
        SimpleExpression::new(self.to_operand(), rhs.into().0, ExpressionType::LessThan)
    }

    fn greater_or_equal(&self, rhs: impl Into<Rhs>) -> SimpleExpression {
        SimpleExpression::new(
            self.to_operand(),
            rhs.into().0,
            ExpressionType::GreaterOrEqual,
        )
    }

    fn less_or_equal(&self, rhs: impl Into<Rhs>) -> SimpleExpression {
        SimpleExpression::new(self.to_operand(), rhs.into().0, ExpressionType::LessOrEqual)
    }

    fn like(&self, pattern: impl Into<Value>) -> SimpleExpression {
        SimpleExpression::new(
            self.to_operand(),
            Operand::Value(pattern.into()),
            ExpressionType::Like,
        )
    }

    fn between(&self, start: impl Into<Value>, end: impl Into<Value>) -> SimpleExpression {
        SimpleExpression::new(
            self.to_operand(),
            Operand::Range(start.into(), end.into()),
            ExpressionType::Between,
        )
    }

    fn is_in<T: Into<Value>>(&self, values: impl IntoIterator<Item = T>) -> SimpleExpression {
        SimpleExpression::new(
            self.to_operand(),
            Operand::Set(values.into_iter().map(Into::into).collect()),
            ExpressionType::In,
        )
    }

    fn not_in<T: Into<Value>>(&self, values: impl IntoIterator<Item = T>) -> SimpleExpression {
        SimpleExpression::new(
            self.to_operand(),
            Operand::Set(values.into_iter().map(Into::into).collect()),
            ExpressionType::NotIn,
        )
    }
}

impl Comparable for ObjectReference {
    fn to_operand(&self) -> Operand {
        Operand::Reference(self.clone())
    }
}

impl Comparable for FunctionReference {
    fn to_operand(&self) -> Operand {
        Operand::Function(self.clone())
    }
}
