//! Resource limits applied while parsing and evaluating.

use crate::parser::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_HEIGHT};

/// Bounds on how much work a single expression may ask for.
///
/// The defaults are generous for rule conditions and computed fields while
/// keeping a hostile input from exhausting the stack or memory.
///
/// # Examples
///
/// ```
/// use safe_expr::{EvalLimits, safe_eval_with};
///
/// let limits = EvalLimits {
///     max_sequence_len: 8,
///     ..EvalLimits::default()
/// };
/// assert!(safe_eval_with("'ab' * 4", &limits).is_ok());
/// assert!(safe_eval_with("'ab' * 5", &limits).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    /// Maximum nesting of brackets and prefix operators accepted by the parser
    pub max_nesting: usize,
    /// Maximum height of the syntax tree, counting operator chains and
    /// trailers; enforced by the parser and again by the evaluator
    pub max_eval_depth: usize,
    /// Maximum length of a string or list built by `+` or `*`
    pub max_sequence_len: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        EvalLimits {
            max_nesting: DEFAULT_MAX_DEPTH,
            max_eval_depth: DEFAULT_MAX_HEIGHT,
            max_sequence_len: 1_000_000,
        }
    }
}
