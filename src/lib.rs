//! Safe evaluation of restricted Python-style expressions.
//!
//! An expression is parsed into a syntax tree and walked by an evaluator
//! that knows a fixed set of node kinds, operators and functions. Anything
//! outside that set fails with an error instead of running: there are no
//! variables, no attribute access, no assignments and no way to reach a
//! function that is not on the allow-list.
//!
//! ```
//! use safe_expr::{Value, safe_eval};
//!
//! assert_eq!(safe_eval("12 * 3 * 2").unwrap(), Value::Integer(72));
//! assert_eq!(safe_eval("sum([None, 1, 0, 2])").unwrap(), Value::Integer(3));
//! assert_eq!(safe_eval("round(1.234, 1)").unwrap(), Value::Float(1.2));
//! assert!(safe_eval("open('/etc/passwd')").is_err());
//! ```

pub mod ast;
pub mod callables;
#[cfg(feature = "cli")]
pub mod cli;
pub mod evaluator;
pub mod lexer;
pub mod limits;
pub mod operations;
pub mod output;
pub mod parser;
pub mod value;

pub use ast::{BinOp, BoolOp, CmpOp, Expr, Expression, Token, UnaryOp};
pub use callables::{Arity, Callable};
pub use evaluator::{EvalError, Evaluator};
pub use lexer::{LexError, Lexer, Position};
pub use limits::EvalLimits;
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parser};
pub use value::Value;

use thiserror::Error;
use tracing::trace;

/// Failure of [`safe_eval`]: the text did not parse, or the parsed
/// expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Parses and evaluates one expression with the default limits.
pub fn safe_eval(text: &str) -> Result<Value, Error> {
    safe_eval_with(text, &EvalLimits::default())
}

/// Parses and evaluates one expression under the given limits.
#[tracing::instrument(level = "debug", skip_all, fields(len = text.len()))]
pub fn safe_eval_with(text: &str, limits: &EvalLimits) -> Result<Value, Error> {
    let result = Parser::new(Lexer::new(text))
        .map(|parser| {
            parser
                .with_max_depth(limits.max_nesting)
                .with_max_height(limits.max_eval_depth)
        })
        .and_then(|mut parser| parser.parse())
        .map_err(Error::from)
        .and_then(|expression| {
            Evaluator::with_limits(*limits)
                .eval_expression(&expression)
                .map_err(Error::from)
        });

    if let Err(e) = &result {
        trace!(error = %e, "evaluation failed");
    }
    result
}
