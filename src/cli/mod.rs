//! CLI support for safe-expr
//!
//! The `safe-expr` binary is a thin shell over these functions, so other
//! tools can embed the same commands without going through a process.

mod check;
mod eval;
mod functions;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use eval::{EvalOptions, OutputFormat, execute_eval};
pub use functions::get_functions_overview;

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] crate::EvalError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Neither an argument nor piped stdin supplied an expression
    #[error("No expression provided. Pass one as an argument or pipe lines to stdin.")]
    NoInput,
}

impl From<crate::Error> for CliError {
    fn from(e: crate::Error) -> Self {
        match e {
            crate::Error::Parse(e) => CliError::Parse(e),
            crate::Error::Eval(e) => CliError::Eval(e),
        }
    }
}
