//! The callable allow-list.
//!
//! A `Call` node can only reach a function registered here, by exact name.
//! The registry is assembled once, on first lookup, from two static tables:
//!
//! - [`math`]: the numeric library (`sqrt`, `floor`, `gcd`, `fsum`, ...)
//! - [`builtins`]: the fixed extra set `sum`, `any`, `all`, `round`, `int`,
//!   `str`, `float` and `Decimal`
//!
//! Nothing is ever added or removed afterwards, so lookups need no locking.
//!
//! ## Adding a function
//!
//! 1. Write it with the signature of [`NativeFn`]
//! 2. Add a [`Callable`] entry with its name and [`Arity`] to the module's
//!    `CALLABLES` table
//! 3. Cover it in `tests/callables_tests.rs`

pub mod builtins;
pub mod math;

use std::collections::HashMap;
use std::sync::LazyLock;

use tracing::debug;

use crate::{evaluator::EvalError, value::Value};

/// Signature shared by every allow-listed function. Arguments arrive already
/// evaluated, in call order.
pub type NativeFn = fn(&[Value]) -> Result<Value, EvalError>;

/// Number of positional arguments a callable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// At least n arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    pub fn accepts(&self, arg_count: usize) -> bool {
        match self {
            Arity::Exact(n) => arg_count == *n,
            Arity::AtLeast(n) => arg_count >= *n,
            Arity::Range(min, max) => (*min..=*max).contains(&arg_count),
            Arity::Any => true,
        }
    }

    /// Checks an argument count, naming the callable in the error.
    pub fn validate(&self, name: &str, arg_count: usize) -> Result<(), EvalError> {
        if self.accepts(arg_count) {
            return Ok(());
        }
        let expected = match self {
            Arity::Exact(1) => "exactly one argument".to_string(),
            Arity::Exact(n) => format!("exactly {} arguments", n),
            Arity::AtLeast(n) => format!("at least {} arguments", n),
            Arity::Range(min, max) => format!("from {} to {} arguments", min, max),
            Arity::Any => "any number of arguments".to_string(),
        };
        Err(EvalError::TypeError(format!(
            "{}() takes {} ({} given)",
            name, expected, arg_count
        )))
    }
}

/// One entry of the allow-list.
#[derive(Clone, Copy)]
pub struct Callable {
    name: &'static str,
    arity: Arity,
    func: NativeFn,
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl Callable {
    pub const fn new(name: &'static str, arity: Arity, func: NativeFn) -> Self {
        Callable { name, arity, func }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Validates the argument count, then runs the function.
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        self.arity.validate(self.name, args.len())?;
        (self.func)(args)
    }
}

static REGISTRY: LazyLock<HashMap<&'static str, &'static Callable>> = LazyLock::new(|| {
    // Builtins go in last so they shadow a math function of the same name
    let registry: HashMap<_, _> = math::CALLABLES
        .iter()
        .chain(builtins::CALLABLES)
        .map(|callable| (callable.name, callable))
        .collect();
    debug!(count = registry.len(), "callable registry built");
    registry
});

/// Finds an allow-listed callable by exact name.
pub fn lookup(name: &str) -> Result<&'static Callable, EvalError> {
    REGISTRY
        .get(name)
        .copied()
        .ok_or_else(|| EvalError::UnknownCallable(name.to_string()))
}

pub fn is_allowed(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

/// Every allow-listed name, sorted.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Elements of an iterable argument: list items, or the characters of a
/// string.
pub(crate) fn iterate(name: &str, value: &Value) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        other => Err(EvalError::TypeError(format!(
            "{}() argument must be iterable, not {}",
            name,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arity_validation() {
        assert!(Arity::Range(1, 2).validate("round", 2).is_ok());
        assert_eq!(
            Arity::Exact(1).validate("sqrt", 2),
            Err(EvalError::TypeError(
                "sqrt() takes exactly one argument (2 given)".to_string()
            ))
        );
        assert!(Arity::Any.accepts(0));
        assert!(!Arity::AtLeast(1).accepts(0));
    }

    #[test]
    fn test_registry_is_exact_match() {
        assert!(is_allowed("sqrt"));
        assert!(is_allowed("Decimal"));
        assert!(!is_allowed("decimal"));
        assert!(!is_allowed("__import__"));
        assert_eq!(
            lookup("exec").err(),
            Some(EvalError::UnknownCallable("exec".to_string()))
        );
    }

    #[test]
    fn test_table_names_are_unique() {
        let total = math::CALLABLES.len() + builtins::CALLABLES.len();
        assert_eq!(names().len(), total);
    }

    #[test]
    fn test_names_are_sorted() {
        let names = names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }
}
