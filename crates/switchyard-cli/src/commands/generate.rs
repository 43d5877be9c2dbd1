//! The `generate` management command.
//!
//! Generates a URL for a named route from `key=value` arguments, or from
//! positional values filling the required keys in order. With `--unnamed`,
//! the route is selected by its defaults (usually `controller` and `action`).

use async_trait::async_trait;
use switchyard_core::{RoutingError, RoutingResult, Settings};
use switchyard_http::routing::{GenerateTarget, ParamSource, RouteSet, UrlOptions};

use super::parse_pairs;
use crate::command::{load_route_set, ManagementCommand};

/// Generates a URL or path for a route.
pub struct GenerateCommand;

/// Builds the parameter source from command-line values.
///
/// Values are either all `key=value` pairs or all bare positional values.
pub fn param_source(values: &[String]) -> RoutingResult<ParamSource> {
    let keyed = values.iter().filter(|v| v.contains('=')).count();
    if keyed == values.len() {
        Ok(ParamSource::keyed(parse_pairs(values)?))
    } else if keyed == 0 {
        Ok(ParamSource::positional(values.iter().cloned()))
    } else {
        Err(RoutingError::Configuration(
            "Cannot mix key=value params with positional values".to_string(),
        ))
    }
}

/// Generates for `name` (or an unnamed route when `None`).
pub fn generate_url(
    set: &RouteSet,
    name: Option<&str>,
    values: &[String],
    options: &UrlOptions,
) -> RoutingResult<String> {
    let source = param_source(values)?;
    set.url_for(GenerateTarget::from(name), &source, options)
}

#[async_trait]
impl ManagementCommand for GenerateCommand {
    fn name(&self) -> &'static str {
        "generate"
    }

    fn help(&self) -> &'static str {
        "Generate a URL from a route name and params"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("name")
                .required_unless_present("unnamed")
                .help("Route name"),
        )
        .arg(
            clap::Arg::new("params")
                .num_args(0..)
                .help("Params as key=value, or positional values for the required keys"),
        )
        .arg(
            clap::Arg::new("unnamed")
                .long("unnamed")
                .action(clap::ArgAction::SetTrue)
                .help("Select the route by its defaults; every positional is a param"),
        )
        .arg(
            clap::Arg::new("only-path")
                .long("only-path")
                .action(clap::ArgAction::SetTrue)
                .help("Print only the path"),
        )
        .arg(clap::Arg::new("host").long("host").help("Host to link to"))
        .arg(
            clap::Arg::new("protocol")
                .long("protocol")
                .help("Protocol, e.g. https"),
        )
        .arg(
            clap::Arg::new("port")
                .long("port")
                .value_parser(clap::value_parser!(u16))
                .help("Port; standard ports are omitted"),
        )
        .arg(clap::Arg::new("anchor").long("anchor").help("Fragment to append"))
        .arg(
            clap::Arg::new("trailing-slash")
                .long("trailing-slash")
                .action(clap::ArgAction::SetTrue)
                .help("Append a trailing slash to the path"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), RoutingError> {
        let mut values: Vec<String> = matches
            .get_many::<String>("params")
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        let first = matches.get_one::<String>("name");
        let name = if matches.get_flag("unnamed") {
            values.splice(0..0, first.cloned());
            None
        } else {
            first.map(String::as_str)
        };
        let options = UrlOptions {
            only_path: matches.get_flag("only-path"),
            host: matches.get_one::<String>("host").cloned(),
            protocol: matches.get_one::<String>("protocol").cloned(),
            port: matches.get_one::<u16>("port").copied(),
            anchor: matches.get_one::<String>("anchor").cloned(),
            script_name: None,
            trailing_slash: matches.get_flag("trailing-slash"),
        };

        let set = load_route_set(matches, settings)?;
        println!("{}", generate_url(&set, name, &values, &options)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::UrlGenerationErrorKind;
    use switchyard_http::routing::RouteDeclaration;

    fn set() -> RouteSet {
        RouteSet::draw(
            vec![
                RouteDeclaration::get("/projects/:id")
                    .to("projects#show")
                    .name("project")
                    .into(),
                RouteDeclaration::get("/projects/:project_id/tasks/:id")
                    .to("tasks#show")
                    .name("project_task")
                    .into(),
            ],
            Settings::default(),
        )
        .unwrap()
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_keyed_params_with_query() {
        let url = generate_url(
            &set(),
            Some("project"),
            &args(&["id=7", "page=2"]),
            &UrlOptions::path_only(),
        )
        .unwrap();
        assert_eq!(url, "/projects/7?page=2");
    }

    #[test]
    fn test_positional_values() {
        let url = generate_url(
            &set(),
            Some("project_task"),
            &args(&["3", "9"]),
            &UrlOptions::path_only(),
        )
        .unwrap();
        assert_eq!(url, "/projects/3/tasks/9");
    }

    #[test]
    fn test_mixed_values_rejected() {
        let err = param_source(&args(&["3", "id=9"])).unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
    }

    #[test]
    fn test_full_url_options() {
        let options = UrlOptions {
            host: Some("example.com".to_string()),
            protocol: Some("https".to_string()),
            anchor: Some("top".to_string()),
            ..UrlOptions::default()
        };
        let url = generate_url(&set(), Some("project"), &args(&["id=1"]), &options).unwrap();
        assert_eq!(url, "https://example.com/projects/1#top");
    }

    #[test]
    fn test_full_url_without_host() {
        let err = generate_url(&set(), Some("project"), &args(&["id=1"]), &UrlOptions::default())
            .unwrap_err();
        let err = err.as_url_generation().unwrap();
        assert_eq!(err.kind, UrlGenerationErrorKind::MissingHost);
    }

    #[test]
    fn test_unnamed_generation() {
        let url = generate_url(
            &set(),
            None,
            &args(&["controller=tasks", "action=show", "project_id=1", "id=2"]),
            &UrlOptions::path_only(),
        )
        .unwrap();
        assert_eq!(url, "/projects/1/tasks/2");
    }

    #[test]
    fn test_missing_key_and_unknown_route() {
        let err = generate_url(&set(), Some("project"), &[], &UrlOptions::path_only()).unwrap_err();
        assert_eq!(err.as_url_generation().unwrap().missing_keys, vec!["id"]);

        let err = generate_url(&set(), Some("projct"), &args(&["id=1"]), &UrlOptions::path_only())
            .unwrap_err();
        let err = err.as_url_generation().unwrap();
        assert_eq!(err.kind, UrlGenerationErrorKind::UnknownRoute);
        assert_eq!(err.suggestion.as_deref(), Some("project"));
    }
}
