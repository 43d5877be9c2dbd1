//! Built-in management commands.
//!
//! - [`routes`] - List the drawn routes
//! - [`recognize`] - Show what a request is recognized as
//! - [`generate`] - Generate a URL for a route
//! - [`check`] - Validate the route file

pub mod check;
pub mod generate;
pub mod recognize;
pub mod routes;

use switchyard_core::{RoutingError, RoutingResult};

use crate::command::CommandRegistry;

/// Registers all built-in commands with the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(routes::RoutesCommand));
    registry.register(Box::new(recognize::RecognizeCommand));
    registry.register(Box::new(generate::GenerateCommand));
    registry.register(Box::new(check::CheckCommand));
}

/// Splits `key=value` arguments at the first `=`.
pub(crate) fn parse_pairs<'a>(
    values: impl IntoIterator<Item = &'a String>,
) -> RoutingResult<Vec<(String, String)>> {
    values
        .into_iter()
        .map(|value| {
            value
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| {
                    RoutingError::Configuration(format!("Expected key=value, got '{value}'"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtin_commands() {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry);
        assert_eq!(registry.len(), 4);
        for name in ["routes", "recognize", "generate", "check"] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn test_parse_pairs() {
        let values = vec!["id=1".to_string(), "q=a=b".to_string()];
        assert_eq!(
            parse_pairs(&values).unwrap(),
            vec![
                ("id".to_string(), "1".to_string()),
                ("q".to_string(), "a=b".to_string())
            ]
        );

        let bad = vec!["oops".to_string()];
        assert!(parse_pairs(&bad).is_err());
    }
}
