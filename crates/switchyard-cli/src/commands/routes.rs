//! The `routes` management command.
//!
//! Lists the drawn routes in precedence order, one row per route.

use std::fmt::Write;

use async_trait::async_trait;
use switchyard_core::{RoutingError, Settings};
use switchyard_http::routing::{RouteDescription, RouteTable};

use crate::command::{load_route_set, ManagementCommand};

/// Lists every route with its name, verbs, path and endpoint.
pub struct RoutesCommand;

/// Returns the listing rows, keeping those whose name, path or endpoint
/// contains `grep`.
pub fn describe_routes(table: &RouteTable, grep: Option<&str>) -> Vec<RouteDescription> {
    let mut rows: Vec<RouteDescription> = table.routes().iter().map(|r| r.describe()).collect();
    if let Some(needle) = grep {
        rows.retain(|row| {
            row.name.contains(needle) || row.path.contains(needle) || row.endpoint.contains(needle)
        });
    }
    rows
}

/// Renders rows as an aligned table with a header line.
pub fn format_routes(rows: &[RouteDescription]) -> String {
    let header = RouteDescription {
        name: "Name".to_string(),
        verbs: "Verb".to_string(),
        path: "Path".to_string(),
        endpoint: "Endpoint".to_string(),
        constraints: Vec::new(),
    };
    let all: Vec<&RouteDescription> = std::iter::once(&header).chain(rows).collect();

    let name_width = all.iter().map(|r| r.name.len()).max().unwrap_or(0);
    let verb_width = all.iter().map(|r| r.verbs.len()).max().unwrap_or(0);
    let path_width = all.iter().map(|r| r.path.len()).max().unwrap_or(0);

    let mut out = String::new();
    for row in all {
        let mut line = format!(
            "{:>name_width$} {:<verb_width$} {:<path_width$} {}",
            row.name, row.verbs, row.path, row.endpoint
        );
        if !row.constraints.is_empty() {
            let _ = write!(line, " {{{}}}", row.constraints.join(", "));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[async_trait]
impl ManagementCommand for RoutesCommand {
    fn name(&self) -> &'static str {
        "routes"
    }

    fn help(&self) -> &'static str {
        "List all routes in match order"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("grep")
                .long("grep")
                .short('g')
                .help("Only list routes whose name, path or endpoint contains this text"),
        )
        .arg(
            clap::Arg::new("json")
                .long("json")
                .action(clap::ArgAction::SetTrue)
                .help("Print the listing as JSON"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), RoutingError> {
        let set = load_route_set(matches, settings)?;
        let grep = matches.get_one::<String>("grep").map(String::as_str);
        let rows = describe_routes(&set.load(), grep);

        if matches.get_flag("json") {
            let json = serde_json::to_string_pretty(&rows)
                .map_err(|e| RoutingError::Configuration(e.to_string()))?;
            println!("{json}");
        } else if rows.is_empty() {
            println!("No routes found.");
        } else {
            print!("{}", format_routes(&rows));
        }
        Ok(())
    }
}
