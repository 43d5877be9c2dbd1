//! The `check` management command.
//!
//! Validates a route file: it must parse, every declaration must build, and
//! no route should be unreachable behind an earlier one.

use async_trait::async_trait;
use switchyard_core::{RoutingError, Settings};
use switchyard_http::routing::{RouteEntry, RouteTable};

use crate::command::{load_entries, routes_path, ManagementCommand};

/// Validates the route file and reports problems.
pub struct CheckCommand;

/// The result of a single check.
#[derive(Debug, Clone)]
pub struct CheckMessage {
    /// The severity level of this check result.
    pub level: CheckLevel,
    /// A human-readable description of the issue.
    pub msg: String,
    /// An optional hint for how to resolve the issue.
    pub hint: Option<String>,
    /// A unique identifier for this check (e.g. "routes.W001").
    pub id: String,
}

/// Severity levels for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
    /// Informational message.
    Info,
    /// A warning that may indicate a problem.
    Warning,
    /// An error that must be resolved.
    Error,
    /// The route file could not be read at all.
    Critical,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Runs the checks against loaded route entries.
///
/// `entries` is the outcome of reading the route file.
pub fn run_checks(
    entries: Result<Vec<RouteEntry>, RoutingError>,
    settings: &Settings,
) -> Vec<CheckMessage> {
    let entries = match entries {
        Ok(entries) => entries,
        Err(e) => {
            return vec![CheckMessage {
                level: CheckLevel::Critical,
                msg: e.to_string(),
                hint: Some("Fix the route file so it parses".to_string()),
                id: "routes.E001".to_string(),
            }];
        }
    };

    let table = match RouteTable::draw(entries, settings) {
        Ok(table) => table,
        Err(e) => {
            let hint = match &e {
                RoutingError::Pattern(_) => Some("Check the path pattern syntax".to_string()),
                RoutingError::ConstraintConfig(_) => Some(
                    "Constraints are strings, integers, booleans, arrays, or { regex = \"...\" }"
                        .to_string(),
                ),
                _ => None,
            };
            return vec![CheckMessage {
                level: CheckLevel::Error,
                msg: e.to_string(),
                hint,
                id: "routes.E002".to_string(),
            }];
        }
    };

    let mut messages = Vec::new();

    if table.is_empty() {
        messages.push(CheckMessage {
            level: CheckLevel::Warning,
            msg: "No routes are defined".to_string(),
            hint: None,
            id: "routes.W001".to_string(),
        });
    }

    let routes = table.routes();
    for (later_index, later) in routes.iter().enumerate() {
        let shadowing = routes[..later_index].iter().find(|earlier| {
            earlier.constraints().is_empty()
                && earlier.is_anchored() == later.is_anchored()
                && earlier.pattern().regex().as_str() == later.pattern().regex().as_str()
                && earlier.verbs().overlaps(later.verbs())
        });
        if let Some(earlier) = shadowing {
            messages.push(CheckMessage {
                level: CheckLevel::Warning,
                msg: format!(
                    "{} {} ({}) is shadowed by the earlier {}",
                    later.verbs(),
                    later.path(),
                    later.endpoint(),
                    earlier.endpoint()
                ),
                hint: Some(
                    "Remove one of the routes or add a constraint to the earlier one".to_string(),
                ),
                id: "routes.W002".to_string(),
            });
        }
    }

    messages
}

#[async_trait]
impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Validate the route file"
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), RoutingError> {
        let path = routes_path(matches);
        let messages = run_checks(load_entries(matches), settings);

        if messages.is_empty() {
            tracing::info!(path, "Route check identified no issues");
            return Ok(());
        }

        let errors = messages.iter().filter(|m| m.level >= CheckLevel::Error).count();
        let warnings = messages.iter().filter(|m| m.level == CheckLevel::Warning).count();

        for msg in &messages {
            let hint_text = msg
                .hint
                .as_ref()
                .map_or(String::new(), |h| format!("\n\tHINT: {h}"));
            tracing::warn!("{} ({}): {}{}", msg.level, msg.id, msg.msg, hint_text);
        }

        tracing::info!(
            "Route check identified {} issue(s) ({} error(s), {} warning(s))",
            messages.len(),
            errors,
            warnings
        );

        if errors > 0 {
            return Err(RoutingError::Configuration(format!(
                "Route check found {errors} error(s) in {path}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_http::routing::{Constraint, RouteDeclaration, RouteFile};

    fn check(entries: Vec<RouteEntry>) -> Vec<CheckMessage> {
        run_checks(Ok(entries), &Settings::default())
    }

    #[test]
    fn test_clean_routes() {
        let messages = check(vec![
            RouteDeclaration::get("/projects").to("projects#index").into(),
            RouteDeclaration::post("/projects").to("projects#create").into(),
        ]);
        assert!(messages.is_empty(), "{messages:?}");
    }

    #[test]
    fn test_unparseable_file_is_critical() {
        let entries = RouteFile::from_toml_str("routes = 3").and_then(RouteFile::into_entries);
        let messages = run_checks(entries, &Settings::default());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, CheckLevel::Critical);
        assert_eq!(messages[0].id, "routes.E001");
    }

    #[test]
    fn test_build_error() {
        let messages = check(vec![RouteDeclaration::get("/projects(/:id")
            .to("projects#show")
            .into()]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, CheckLevel::Error);
        assert_eq!(messages[0].id, "routes.E002");
        assert_eq!(messages[0].hint.as_deref(), Some("Check the path pattern syntax"));
    }

    #[test]
    fn test_empty_table_warns() {
        let messages = check(Vec::new());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "routes.W001");
    }

    #[test]
    fn test_shadowed_route() {
        let messages = check(vec![
            RouteDeclaration::get("/about").to("pages#about").into(),
            RouteDeclaration::get("/about").to("legacy#about").into(),
        ]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "routes.W002");
        assert_eq!(
            messages[0].msg,
            "GET /about(.:format) (legacy#about) is shadowed by the earlier pages#about"
        );
    }

    #[test]
    fn test_constrained_route_does_not_shadow() {
        let messages = check(vec![
            RouteDeclaration::get("/about")
                .to("pages#about")
                .constraint("subdomain", "www")
                .into(),
            RouteDeclaration::get("/about").to("legacy#about").into(),
            RouteDeclaration::get("/users/:id")
                .to("users#show")
                .constraint("id", Constraint::regex("[0-9]+").unwrap())
                .into(),
            RouteDeclaration::get("/users/:id").to("users#by_name").into(),
        ]);
        assert!(messages.is_empty(), "{messages:?}");
    }

    #[test]
    fn test_level_ordering_and_display() {
        assert!(CheckLevel::Critical > CheckLevel::Error);
        assert!(CheckLevel::Warning > CheckLevel::Info);
        assert_eq!(CheckLevel::Warning.to_string(), "WARNING");
    }
}
