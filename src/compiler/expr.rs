//! Expression binding and emission for WHERE, HAVING and join conditions.
//!
//! Values never reach the SQL text: every literal becomes a named
//! parameter. Names come from one counter per statement, taken in text
//! order: `p1`, `p2` for scalars, `p1_start`/`p1_end` for a range and
//! `p1_0`, `p1_1`, ... for a value list.

use crate::error::{Error, Result};
use crate::model::{
    ExpressionType, FunctionReference, ObjectReference, Operand, SimpleExpression, Value,
};
use crate::sql::{Token, TokenStream};

use super::scope::Scope;
use super::Parameter;

/// Parameters of one statement, in the order they appear in its text.
#[derive(Debug, Default, Clone)]
pub(crate) struct Params {
    items: Vec<Parameter>,
    counter: usize,
}

impl Params {
    /// Next base name: `p1`, `p2`, ...
    fn next_name(&mut self) -> String {
        self.counter += 1;
        format!("p{}", self.counter)
    }

    fn bind(&mut self, name: String, value: Value) -> Token {
        self.items.push(Parameter {
            name: name.clone(),
            value,
        });
        Token::Param {
            name,
            ordinal: self.items.len(),
        }
    }

    pub fn items(&self) -> &[Parameter] {
        &self.items
    }
}

/// Resolve every reference in `expr`, registering implicit joins.
pub(crate) fn bind(scope: &mut Scope<'_>, expr: &SimpleExpression) -> Result<()> {
    for operand in [expr.left(), expr.right()] {
        match operand {
            Operand::Reference(r) => {
                scope.resolve_column(r)?;
            }
            Operand::Function(f) => {
                scope.resolve_column(&f.argument)?;
            }
            Operand::Expression(inner) => bind(scope, inner)?,
            Operand::Value(_) | Operand::Range(..) | Operand::Set(_) | Operand::Empty => {}
        }
    }
    Ok(())
}

/// Qualified column token for `reference`.
pub(crate) fn column(scope: &mut Scope<'_>, reference: &ObjectReference) -> Result<Token> {
    column_named(scope, reference).map(|(token, _)| token)
}

/// Qualified column token and the schema's spelling of the column name.
pub(crate) fn column_named(
    scope: &mut Scope<'_>,
    reference: &ObjectReference,
) -> Result<(Token, String)> {
    let bound = scope.resolve_column(reference)?;
    let mut parts = scope.instance(bound.instance).qualifier();
    parts.push(bound.column.name.clone());
    Ok((Token::QualifiedIdent(parts), bound.column.name.clone()))
}

/// `AGG(column)`, without the alias.
pub(crate) fn function(scope: &mut Scope<'_>, func: &FunctionReference) -> Result<TokenStream> {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName(func.aggregate.sql_name().into()))
        .lparen()
        .push(column(scope, &func.argument)?)
        .rparen();
    Ok(ts)
}

/// Emits one boolean expression tree.
pub(crate) struct ExprWriter<'a, 's> {
    scope: &'a mut Scope<'s>,
    params: &'a mut Params,
    clause: &'static str,
}

impl<'a, 's> ExprWriter<'a, 's> {
    pub fn new(scope: &'a mut Scope<'s>, params: &'a mut Params, clause: &'static str) -> Self {
        Self {
            scope,
            params,
            clause,
        }
    }

    pub fn write(&mut self, expr: &SimpleExpression, ts: &mut TokenStream) -> Result<()> {
        match expr.kind() {
            ExpressionType::And | ExpressionType::Or => {
                let op = if expr.kind() == ExpressionType::And {
                    Token::And
                } else {
                    Token::Or
                };
                ts.lparen();
                self.write_nested(expr.left(), ts)?;
                ts.keyword(op);
                self.write_nested(expr.right(), ts)?;
                ts.rparen();
            }
            ExpressionType::Not => {
                ts.push(Token::Not).space();
                match expr.left() {
                    // Already parenthesized.
                    Operand::Expression(inner)
                        if matches!(inner.kind(), ExpressionType::And | ExpressionType::Or) =>
                    {
                        self.write(inner, ts)?;
                    }
                    Operand::Expression(inner) => {
                        ts.lparen();
                        self.write(inner, ts)?;
                        ts.rparen();
                    }
                    other => return Err(self.misplaced(other, "Not")),
                }
            }
            ExpressionType::Equal | ExpressionType::NotEqual
                if expr.right() == &Operand::Value(Value::Null) =>
            {
                self.write_operand(expr.left(), ts)?;
                ts.space().push(if expr.kind() == ExpressionType::Equal {
                    Token::IsNull
                } else {
                    Token::IsNotNull
                });
            }
            ExpressionType::Between => {
                self.write_operand(expr.left(), ts)?;
                ts.keyword(Token::Between);
                match expr.right() {
                    Operand::Range(start, end) => {
                        let base = self.params.next_name();
                        ts.push(self.params.bind(format!("{}_start", base), start.clone()))
                            .keyword(Token::And)
                            .push(self.params.bind(format!("{}_end", base), end.clone()));
                    }
                    other => return Err(self.misplaced(other, "Between")),
                }
            }
            ExpressionType::In | ExpressionType::NotIn => {
                self.write_operand(expr.left(), ts)?;
                if expr.kind() == ExpressionType::NotIn {
                    ts.space().push(Token::Not);
                }
                ts.keyword(Token::In);
                match expr.right() {
                    Operand::Set(values) if !values.is_empty() => {
                        let base = self.params.next_name();
                        ts.lparen();
                        for (i, value) in values.iter().enumerate() {
                            if i > 0 {
                                ts.comma();
                            }
                            ts.push(self.params.bind(format!("{}_{}", base, i), value.clone()));
                        }
                        ts.rparen();
                    }
                    Operand::Set(_) => {
                        return Err(Error::invalid_state(self.clause, "empty value list for In"))
                    }
                    other => return Err(self.misplaced(other, "In")),
                }
            }
            kind => {
                let op = match kind {
                    ExpressionType::Equal => Token::Eq,
                    ExpressionType::NotEqual => Token::Ne,
                    ExpressionType::GreaterThan => Token::Gt,
                    ExpressionType::GreaterOrEqual => Token::Gte,
                    ExpressionType::LessThan => Token::Lt,
                    ExpressionType::LessOrEqual => Token::Lte,
                    _ => Token::Like,
                };
                self.write_operand(expr.left(), ts)?;
                ts.keyword(op);
                self.write_operand(expr.right(), ts)?;
            }
        }
        Ok(())
    }

    fn write_nested(&mut self, operand: &Operand, ts: &mut TokenStream) -> Result<()> {
        match operand {
            Operand::Expression(inner) => self.write(inner, ts),
            other => Err(self.misplaced(other, "And/Or")),
        }
    }

    fn write_operand(&mut self, operand: &Operand, ts: &mut TokenStream) -> Result<()> {
        match operand {
            Operand::Reference(r) => {
                ts.push(column(self.scope, r)?);
            }
            Operand::Function(f) => {
                ts.append(&function(self.scope, f)?);
            }
            Operand::Value(v) => {
                let name = self.params.next_name();
                ts.push(self.params.bind(name, v.clone()));
            }
            Operand::Expression(inner) => {
                ts.lparen();
                self.write(inner, ts)?;
                ts.rparen();
            }
            other => return Err(self.misplaced(other, "a comparison")),
        }
        Ok(())
    }

    fn misplaced(&self, operand: &Operand, context: &str) -> Error {
        Error::invalid_state(self.clause, format!("{:?} is not valid in {}", operand, context))
    }
}

/// Wrap a join condition in exactly one pair of parentheses.
pub(crate) fn write_condition(
    writer: &mut ExprWriter<'_, '_>,
    expr: &SimpleExpression,
    ts: &mut TokenStream,
) -> Result<()> {
    if matches!(expr.kind(), ExpressionType::And | ExpressionType::Or) {
        writer.write(expr, ts)
    } else {
        ts.lparen();
        writer.write(expr, ts)?;
        ts.rparen();
        Ok(())
    }
}
