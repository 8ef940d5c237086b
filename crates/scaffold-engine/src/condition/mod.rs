//! Inclusion conditions
//!
//! A [`Condition`] is parsed once at load time, type-checked against the
//! declared [`VariableSchema`] when the tree is built, and evaluated against a
//! [`VariableContext`] while planning. Evaluation is pure: the same condition
//! and context always give the same answer.

mod parser;

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

use thiserror::Error;
use tracing::trace;

pub use parser::ConditionSyntaxError;

use crate::context::{UnboundVariable, VariableContext, VariablePath};
use crate::schema::VariableSchema;
use crate::value::{Value, ValueKind};

/// Parsed condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant value
    Literal(Value),
    /// Variable reference
    Var(VariablePath),
    /// `defined(path)`: whether the path resolves
    Defined(VariablePath),
    /// Logical negation
    Not(Box<Expr>),
    /// Short-circuit conjunction
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit disjunction
    Or(Box<Expr>, Box<Expr>),
    /// Equality
    Eq(Box<Expr>, Box<Expr>),
    /// Inequality
    Ne(Box<Expr>, Box<Expr>),
    /// Sequence membership
    In(Box<Expr>, Box<Expr>),
}

/// A boolean expression gating a node or hook
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Parse a condition from its source text
    pub fn parse(source: &str) -> Result<Self, ConditionSyntaxError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.trim().to_string(),
            expr,
        })
    }

    /// Original source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed expression
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Conjunction of two conditions, `self` evaluated first
    pub fn and(self, other: Condition) -> Condition {
        Condition {
            source: format!("({}) and ({})", self.source, other.source),
            expr: Expr::And(Box::new(self.expr), Box::new(other.expr)),
        }
    }

    /// Statically check that the condition produces a boolean
    ///
    /// Root variables must be declared in `schema` unless the same
    /// condition tests them with `defined(...)`, in which case their kind is
    /// unknown. Fields of mappings are not checked.
    ///
    /// # Returns
    /// `Ok(())` or a description of the type error
    pub fn check(&self, schema: &VariableSchema) -> Result<(), String> {
        let mut guarded = HashSet::new();
        collect_guarded(&self.expr, &mut guarded);
        let scope = Scope { schema, guarded };

        match scope.infer(&self.expr)? {
            StaticKind::Known(ValueKind::Bool) | StaticKind::Any => Ok(()),
            StaticKind::Known(kind) => Err(format!(
                "condition `{}` produces a {}, expected bool",
                self.source, kind
            )),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaticKind {
    Known(ValueKind),
    Any,
}

fn collect_guarded<'a>(expr: &'a Expr, out: &mut HashSet<&'a str>) {
    match expr {
        Expr::Defined(path) => {
            out.insert(path.root());
        }
        Expr::Literal(_) | Expr::Var(_) => {}
        Expr::Not(inner) => collect_guarded(inner, out),
        Expr::And(l, r) | Expr::Or(l, r) | Expr::Eq(l, r) | Expr::Ne(l, r) | Expr::In(l, r) => {
            collect_guarded(l, out);
            collect_guarded(r, out);
        }
    }
}

struct Scope<'a> {
    schema: &'a VariableSchema,
    guarded: HashSet<&'a str>,
}

impl Scope<'_> {
    fn infer(&self, expr: &Expr) -> Result<StaticKind, String> {
        match expr {
            Expr::Literal(value) => Ok(StaticKind::Known(value.kind())),
            Expr::Var(path) => {
                let kind = match self.schema.kind_of(path.root()) {
                    Some(kind) => kind,
                    None if self.guarded.contains(path.root()) => return Ok(StaticKind::Any),
                    None => return Err(format!("variable `{}` is not declared", path.root())),
                };
                match (path.is_simple(), kind) {
                    (true, kind) => Ok(StaticKind::Known(kind)),
                    (false, ValueKind::Mapping) => Ok(StaticKind::Any),
                    (false, kind) => Err(format!(
                        "`{}` is a {} and has no fields (in `{}`)",
                        path.root(),
                        kind,
                        path
                    )),
                }
            }
            Expr::Defined(_) => Ok(StaticKind::Known(ValueKind::Bool)),
            Expr::Not(inner) => {
                self.require_bool(inner, "operand of `not`")?;
                Ok(StaticKind::Known(ValueKind::Bool))
            }
            Expr::And(l, r) => {
                self.require_bool(l, "operand of `and`")?;
                self.require_bool(r, "operand of `and`")?;
                Ok(StaticKind::Known(ValueKind::Bool))
            }
            Expr::Or(l, r) => {
                self.require_bool(l, "operand of `or`")?;
                self.require_bool(r, "operand of `or`")?;
                Ok(StaticKind::Known(ValueKind::Bool))
            }
            Expr::Eq(l, r) | Expr::Ne(l, r) => {
                if let (StaticKind::Known(a), StaticKind::Known(b)) = (self.infer(l)?, self.infer(r)?) {
                    if !a.comparable_with(b) {
                        return Err(format!("cannot compare {} with {}", a, b));
                    }
                }
                Ok(StaticKind::Known(ValueKind::Bool))
            }
            Expr::In(l, r) => {
                self.infer(l)?;
                match self.infer(r)? {
                    StaticKind::Known(ValueKind::Sequence) | StaticKind::Any => {
                        Ok(StaticKind::Known(ValueKind::Bool))
                    }
                    StaticKind::Known(kind) => {
                        Err(format!("right side of `in` must be a sequence, found {}", kind))
                    }
                }
            }
        }
    }

    fn require_bool(&self, expr: &Expr, what: &str) -> Result<(), String> {
        match self.infer(expr)? {
            StaticKind::Known(ValueKind::Bool) | StaticKind::Any => Ok(()),
            StaticKind::Known(kind) => Err(format!("{} must be bool, found {}", what, kind)),
        }
    }
}

/// Runtime evaluation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// A referenced variable is not bound
    #[error(transparent)]
    Unbound(#[from] UnboundVariable),

    /// An operand or the result has the wrong kind
    #[error("{0}")]
    TypeMismatch(String),
}

/// Evaluates conditions against a variable context
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Evaluate a condition
    ///
    /// # Arguments
    /// * `condition` - Condition to evaluate
    /// * `context` - Variables visible to the condition
    ///
    /// # Returns
    /// Whether the condition holds. Unbound variables are errors, never
    /// treated as false.
    pub fn evaluate(
        condition: &Condition,
        context: &VariableContext,
    ) -> Result<bool, ConditionError> {
        let value = eval(&condition.expr, context)?;
        let result = expect_bool(&value, "condition result")?;
        trace!(condition = %condition.source, result, "Evaluated condition");
        Ok(result)
    }
}

fn eval<'a>(expr: &'a Expr, ctx: &'a VariableContext) -> Result<Cow<'a, Value>, ConditionError> {
    let value = match expr {
        Expr::Literal(value) => Cow::Borrowed(value),
        Expr::Var(path) => Cow::Borrowed(ctx.resolve_path(path)?),
        Expr::Defined(path) => Cow::Owned(Value::Bool(ctx.is_bound(path))),
        Expr::Not(inner) => {
            let v = eval(inner, ctx)?;
            Cow::Owned(Value::Bool(!expect_bool(&v, "operand of `not`")?))
        }
        Expr::And(l, r) => {
            let left = expect_bool(&*eval(l, ctx)?, "operand of `and`")?;
            let result = left && expect_bool(&*eval(r, ctx)?, "operand of `and`")?;
            Cow::Owned(Value::Bool(result))
        }
        Expr::Or(l, r) => {
            let left = expect_bool(&*eval(l, ctx)?, "operand of `or`")?;
            let result = left || expect_bool(&*eval(r, ctx)?, "operand of `or`")?;
            Cow::Owned(Value::Bool(result))
        }
        Expr::Eq(l, r) => {
            let (a, b) = (eval(l, ctx)?, eval(r, ctx)?);
            Cow::Owned(Value::Bool(a.loosely_equals(&b)))
        }
        Expr::Ne(l, r) => {
            let (a, b) = (eval(l, ctx)?, eval(r, ctx)?);
            Cow::Owned(Value::Bool(!a.loosely_equals(&b)))
        }
        Expr::In(l, r) => {
            let needle = eval(l, ctx)?;
            let haystack = eval(r, ctx)?;
            match &*haystack {
                Value::Sequence(items) => {
                    Cow::Owned(Value::Bool(items.iter().any(|i| i.loosely_equals(&needle))))
                }
                other => {
                    return Err(ConditionError::TypeMismatch(format!(
                        "right side of `in` must be a sequence, found {}",
                        other.kind()
                    )))
                }
            }
        }
    };
    Ok(value)
}

fn expect_bool(value: &Value, what: &str) -> Result<bool, ConditionError> {
    value.as_bool().ok_or_else(|| {
        ConditionError::TypeMismatch(format!("{} must be bool, found {}", what, value.kind()))
    })
}
