//! Static support check for expressions

use super::CliError;
use crate::parser;

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The expression to check
    pub expression: String,
}

/// Result of a check operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    /// Every node and operator is in the supported subset
    Supported,
    /// The expression parses but contains the given unsupported kind
    Unsupported(&'static str),
}

/// Parses the expression and walks it for unsupported constructs without
/// evaluating anything.
///
/// Passing the check does not rule out run-time failures such as type
/// errors or calls to names outside the allow-list.
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let expression = parser::parse(&options.expression)?;
    Ok(match expression.first_unsupported() {
        None => CheckResult::Supported,
        Some(kind) => CheckResult::Unsupported(kind),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn check(expression: &str) -> Result<CheckResult, CliError> {
        execute_check(&CheckOptions {
            expression: expression.to_string(),
        })
    }

    #[test]
    fn test_supported_expression() {
        assert_eq!(check("round(1.5) + 2 > 3").unwrap(), CheckResult::Supported);
    }

    #[test]
    fn test_unsupported_expression() {
        assert_eq!(check("x + 1").unwrap(), CheckResult::Unsupported("Name"));
        assert_eq!(check("a.b").unwrap(), CheckResult::Unsupported("Attribute"));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(check("1 +"), Err(CliError::Parse(_))));
    }
}
