//! Evaluate expressions and render the results

use super::CliError;
use crate::{
    output::{to_json, to_json_pretty},
    safe_eval,
};

/// How a result is printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The value's display form (`True`, `1.5`, `[1, 'a']`)
    #[default]
    Display,
    /// Compact JSON
    Json,
    /// Indented JSON
    JsonPretty,
}

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// The expression to evaluate
    pub expression: String,
    pub format: OutputFormat,
}

/// Evaluates one expression and returns the rendered result.
pub fn execute_eval(options: &EvalOptions) -> Result<String, CliError> {
    let value = safe_eval(&options.expression)?;
    Ok(match options.format {
        OutputFormat::Display => value.to_string(),
        OutputFormat::Json => to_json(&value),
        OutputFormat::JsonPretty => to_json_pretty(&value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(expression: &str, format: OutputFormat) -> Result<String, CliError> {
        execute_eval(&EvalOptions {
            expression: expression.to_string(),
            format,
        })
    }

    #[test]
    fn test_display_output() {
        assert_eq!(eval("1 < 2", OutputFormat::Display).unwrap(), "True");
        assert_eq!(eval("[1, 'a']", OutputFormat::Display).unwrap(), "[1, 'a']");
    }

    #[test]
    fn test_json_output() {
        assert_eq!(eval("[1, None]", OutputFormat::Json).unwrap(), "[1,null]");
        assert_eq!(eval("1 / 2", OutputFormat::JsonPretty).unwrap(), "0.5");
    }

    #[test]
    fn test_errors_are_classified() {
        assert!(matches!(
            eval("open('x')", OutputFormat::Display),
            Err(CliError::Eval(crate::EvalError::UnknownCallable(_)))
        ));
        assert!(matches!(
            eval("(", OutputFormat::Display),
            Err(CliError::Parse(_))
        ));
    }
}
