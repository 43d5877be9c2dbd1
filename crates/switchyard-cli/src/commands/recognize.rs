//! The `recognize` management command.

use async_trait::async_trait;
use http::Method;
use switchyard_core::{RoutingError, RoutingResult, Settings};
use switchyard_http::routing::{MatchResult, RouteSet};
use switchyard_http::RouteRequest;

use super::parse_pairs;
use crate::command::{load_route_set, ManagementCommand};

/// Shows which route a request would reach and with which params.
pub struct RecognizeCommand;

/// Builds the request for `method target`, where `target` is a path (with
/// optional query) or a full URL.
pub fn build_request(
    method: &str,
    target: &str,
    attributes: &[(String, String)],
) -> RoutingResult<RouteRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| RoutingError::Configuration(format!("Invalid HTTP method: {method}")))?;
    let mut request = RouteRequest::from_url(method, target);
    request.attributes_mut().extend(attributes.iter().cloned());
    Ok(request)
}

/// Recognizes the request and renders the outcome as text.
pub fn recognize_report(set: &RouteSet, request: &RouteRequest) -> RoutingResult<String> {
    let target = format!("{} {}", request.method(), request.path());
    let report = match set.recognize(request)? {
        MatchResult::Matched(m) => {
            let mut params: Vec<_> = m.params.iter().collect();
            params.sort();
            let params: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();

            let mut lines = vec![
                format!("Endpoint: {}", m.endpoint_handle()),
                format!(
                    "Route:    {} ({} {})",
                    m.route.name().unwrap_or("<unnamed>"),
                    m.route.verbs(),
                    m.route.path()
                ),
                format!("Params:   {}", params.join(", ")),
            ];
            if !m.remaining_path.is_empty() {
                lines.push(format!("Remaining: {}", m.remaining_path));
            }
            lines.join("\n")
        }
        MatchResult::PathOnly { allowed } if allowed.is_empty() => {
            format!("No route accepts {target}: constraints rejected every candidate")
        }
        MatchResult::PathOnly { allowed } => {
            let allowed: Vec<&str> = allowed.iter().map(Method::as_str).collect();
            format!("No route accepts {target} (allowed: {})", allowed.join(", "))
        }
        MatchResult::NoMatch => format!("No route matches {target}"),
    };
    Ok(report)
}

#[async_trait]
impl ManagementCommand for RecognizeCommand {
    fn name(&self) -> &'static str {
        "recognize"
    }

    fn help(&self) -> &'static str {
        "Show the route and params a request is recognized as"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("method")
                .required(true)
                .help("HTTP method, e.g. GET"),
        )
        .arg(
            clap::Arg::new("url")
                .required(true)
                .help("Path with optional query, or a full URL"),
        )
        .arg(
            clap::Arg::new("attr")
                .long("attr")
                .action(clap::ArgAction::Append)
                .help("Request attribute as key=value, for custom constraint keys"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), RoutingError> {
        let method = matches
            .get_one::<String>("method")
            .ok_or_else(|| RoutingError::Configuration("METHOD is required".to_string()))?;
        let url = matches
            .get_one::<String>("url")
            .ok_or_else(|| RoutingError::Configuration("URL is required".to_string()))?;
        let attributes = parse_pairs(matches.get_many::<String>("attr").into_iter().flatten())?;

        let set = load_route_set(matches, settings)?;
        let request = build_request(method, url, &attributes)?;
        println!("{}", recognize_report(&set, &request)?);
        Ok(())
    }
}
