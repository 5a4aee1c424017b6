use thiserror::Error;
use tracing::trace;

use crate::{
    ast::{BoolOp, CmpOp, Expr, Expression, Keyword},
    callables,
    limits::EvalLimits,
    operations,
    value::Value,
};

/// Errors that can occur while evaluating a parsed expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Node or operator kind outside the supported subset
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(&'static str),

    /// Call to a name that is not on the allow-list
    #[error("Unknown callable: {0}")]
    UnknownCallable(String),

    /// Operation or callable rejected the type of an operand
    #[error("Type error: {0}")]
    TypeError(String),

    /// Operand has the right type but an unusable value
    #[error("Value error: {0}")]
    ValueError(String),

    #[error("Division by zero")]
    ZeroDivision,

    /// Numeric result or built sequence is out of range
    #[error("Overflow: {0}")]
    Overflow(String),

    /// Expression tree is deeper than the evaluator will descend
    #[error("Expression nesting exceeds the limit of {0}")]
    RecursionLimit(usize),
}

/// Tree-walking evaluator for parsed expressions.
///
/// The evaluator holds no state besides its limits. Evaluating the same tree
/// twice yields the same result, and one evaluator can be shared between
/// threads.
#[derive(Debug, Default, Clone)]
pub struct Evaluator {
    limits: EvalLimits,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: EvalLimits) -> Self {
        Evaluator { limits }
    }

    pub fn limits(&self) -> &EvalLimits {
        &self.limits
    }

    /// Evaluates a parsed expression to a single value.
    ///
    /// # Examples
    ///
    /// ```
    /// use safe_expr::{Evaluator, Value, parser};
    ///
    /// let expression = parser::parse("1 in [1, 2] and 2 < 3").unwrap();
    /// let result = Evaluator::new().eval_expression(&expression).unwrap();
    /// assert_eq!(result, Value::Boolean(true));
    /// ```
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn eval_expression(&self, expression: &Expression) -> Result<Value, EvalError> {
        self.eval_expr(&expression.body, 0)
    }

    fn eval_expr(&self, expr: &Expr, depth: usize) -> Result<Value, EvalError> {
        if depth > self.limits.max_eval_depth {
            return Err(EvalError::RecursionLimit(self.limits.max_eval_depth));
        }
        let depth = depth + 1;

        match expr {
            Expr::Constant(value) => Ok(value.clone()),

            Expr::List(elements) => {
                let items = elements
                    .iter()
                    .map(|element| self.eval_expr(element, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(items))
            }

            Expr::UnaryOp { op, operand } => {
                let handler = operations::unary_handler(*op)?;
                let operand = self.eval_expr(operand, depth)?;
                handler(&operand)
            }

            Expr::BinOp { op, left, right } => {
                let handler = operations::binary_handler(*op)?;
                let left = self.eval_expr(left, depth)?;
                let right = self.eval_expr(right, depth)?;
                handler(&left, &right, &self.limits)
            }

            Expr::BoolOp { op, values } => self.eval_bool_op(*op, values, depth),

            Expr::Compare {
                left,
                ops,
                comparators,
            } => self.eval_compare(left, ops, comparators, depth),

            Expr::Call {
                func,
                args,
                keywords,
            } => self.eval_call(func, args, keywords, depth),

            Expr::Name(_)
            | Expr::Attribute { .. }
            | Expr::Subscript { .. }
            | Expr::Slice { .. }
            | Expr::Tuple(_)
            | Expr::Dict(_)
            | Expr::Set(_)
            | Expr::Lambda { .. }
            | Expr::IfExp { .. }
            | Expr::Starred(_)
            | Expr::ListComp { .. }
            | Expr::GeneratorExp { .. } => Err(EvalError::UnsupportedConstruct(expr.kind())),
        }
    }

    /// Evaluates `a and b and c` / `a or b or c`.
    ///
    /// Each neighbouring pair is combined with the bitwise operator after
    /// both sides are evaluated. The pair results are then joined with a
    /// lazy `and`: the first falsy pair result ends the chain, otherwise the
    /// last pair result is the value. `True or False or False` is therefore
    /// `False`.
    fn eval_bool_op(&self, op: BoolOp, values: &[Expr], depth: usize) -> Result<Value, EvalError> {
        if values.len() < 2 {
            return Err(EvalError::UnsupportedConstruct("BoolOp"));
        }
        let combine = operations::bool_combinator(op);

        let mut left = self.eval_expr(&values[0], depth)?;
        let mut result = Value::Null;
        for value in &values[1..] {
            let right = self.eval_expr(value, depth)?;
            result = combine(&left, &right, &self.limits)?;
            if !result.is_truthy() {
                return Ok(result);
            }
            left = right;
        }
        Ok(result)
    }

    /// Evaluates a comparison chain.
    ///
    /// Every pair is evaluated left to right, even after one is false. For
    /// `in` and `not in` the container is evaluated before the item. The
    /// pair results are folded from the right as `rest and current`.
    fn eval_compare(
        &self,
        left: &Expr,
        ops: &[CmpOp],
        comparators: &[Expr],
        depth: usize,
    ) -> Result<Value, EvalError> {
        if ops.is_empty() || ops.len() != comparators.len() {
            return Err(EvalError::UnsupportedConstruct("Compare"));
        }

        let mut results = Vec::with_capacity(ops.len());
        let mut previous: Option<Value> = None;
        for (op, comparator) in ops.iter().zip(comparators) {
            let compare = operations::compare_handler(*op);
            let (lhs, rhs) = match (op, previous.take()) {
                (CmpOp::In | CmpOp::NotIn, Some(lhs)) => {
                    (lhs, self.eval_expr(comparator, depth)?)
                }
                (CmpOp::In | CmpOp::NotIn, None) => {
                    let rhs = self.eval_expr(comparator, depth)?;
                    (self.eval_expr(left, depth)?, rhs)
                }
                (_, Some(lhs)) => (lhs, self.eval_expr(comparator, depth)?),
                (_, None) => {
                    let lhs = self.eval_expr(left, depth)?;
                    (lhs, self.eval_expr(comparator, depth)?)
                }
            };
            results.push(compare(&lhs, &rhs)?);
            previous = Some(rhs);
        }

        let mut pairs = results.into_iter().rev();
        let mut acc = pairs.next().unwrap_or(Value::Boolean(true));
        for current in pairs {
            if acc.is_truthy() {
                acc = current;
            }
        }
        Ok(acc)
    }

    fn eval_call(
        &self,
        func: &Expr,
        args: &[Expr],
        keywords: &[Keyword],
        depth: usize,
    ) -> Result<Value, EvalError> {
        let Expr::Name(name) = func else {
            return Err(EvalError::UnsupportedConstruct(func.kind()));
        };
        if !keywords.is_empty() {
            return Err(EvalError::UnsupportedConstruct("keyword"));
        }

        let args = args
            .iter()
            .map(|arg| self.eval_expr(arg, depth))
            .collect::<Result<Vec<_>, _>>()?;

        let callable = callables::lookup(name)?;
        trace!(name = %name, argc = args.len(), "calling");
        callable.call(&args)
    }
}
