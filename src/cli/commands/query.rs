//! `query` subcommands: one-shot, read-only query-engine lookups, printed as
//! pretty-printed JSON to stdout (errors go to stderr with a non-zero
//! exit, matching the rest of this CLI's texture).

use std::path::Path;

use serde::Serialize;

use crate::cli::QueryCommand;
use crate::config::Settings;
use crate::query::QueryEngine;
use crate::store::RocksStore;
use crate::types::ElementKind;
use crate::workspace;

fn print_or_exit<T: Serialize>(result: crate::error::QueryResult<T>) {
    match result {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value).expect("JSON-serializable query result")),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn projects_or_exit(settings: &Settings, workspace_path: &Path) -> Vec<workspace::Project> {
    match workspace::find_projects(workspace_path, &settings.visit_pattern) {
        Ok(projects) => projects,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

pub fn run(settings: &Settings, query: QueryCommand) {
    let store = RocksStore::new(settings.store_path.clone());
    let engine = QueryEngine::new(&store);

    match query {
        QueryCommand::Definition { workspace: ws, file, start_line, end_line, snippet } => {
            let projects = projects_or_exit(settings, &ws);
            print_or_exit(engine.query_definitions(&ws, &projects, &file, start_line, end_line, snippet.as_deref()));
        }
        QueryCommand::Reference { workspace: ws, file, start_line, end_line, symbol } => {
            let projects = projects_or_exit(settings, &ws);
            print_or_exit(engine.query_relations(&ws, &projects, &file, start_line, end_line, symbol.as_deref(), 1));
        }
        QueryCommand::Callgraph { workspace: ws, file, start_line, end_line, symbol, max_layer } => {
            let projects = projects_or_exit(settings, &ws);
            print_or_exit(engine.query_relations(&ws, &projects, &file, start_line, end_line, symbol.as_deref(), max_layer));
        }
        QueryCommand::Structure { workspace: ws, file, kinds } => {
            let projects = projects_or_exit(settings, &ws);
            let parsed: Vec<ElementKind> = kinds.iter().filter_map(|k| ElementKind::from_label(k)).collect();
            let filter = if parsed.is_empty() { None } else { Some(parsed.as_slice()) };
            print_or_exit(engine.get_file_structure(&ws, &projects, &file, filter));
        }
        QueryCommand::Summary { workspace: ws } => {
            let projects = projects_or_exit(settings, &ws);
            print_or_exit(engine.get_summary(&projects));
        }
    }
}
