//! Listing of the callable allow-list

use crate::callables::{self, Arity};

fn describe(arity: Arity) -> String {
    match arity {
        Arity::Exact(1) => "1 argument".to_string(),
        Arity::Exact(n) => format!("{} arguments", n),
        Arity::AtLeast(n) => format!("{}+ arguments", n),
        Arity::Range(min, max) => format!("{}-{} arguments", min, max),
        Arity::Any => "any arguments".to_string(),
    }
}

/// One line per allow-listed function with the number of arguments it
/// takes, sorted by name.
pub fn get_functions_overview() -> String {
    let names = callables::names();
    let width = names.iter().map(|name| name.len()).max().unwrap_or(0);

    let mut output = String::new();
    for name in names {
        if let Ok(callable) = callables::lookup(name) {
            output.push_str(&format!(
                "{:<width$}  {}\n",
                name,
                describe(callable.arity()),
                width = width
            ));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overview_lists_every_function() {
        let overview = get_functions_overview();
        assert_eq!(overview.lines().count(), callables::names().len());
        assert!(overview.lines().any(|line| line.starts_with("round") && line.ends_with("1-2 arguments")));
        assert!(!overview.contains("exec"));
    }
}
