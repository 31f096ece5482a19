//! Route handlers for the HTTP API's search, callgraph, structure,
//! directory, index-management, and export endpoints. Each handler is
//! thin: it does nothing but parse query params, call straight into the
//! workspace walker, indexer, or query engine, and translate the result
//! through [`to_position`]/[`ApiResponse`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, WorkspaceError};
use crate::events::{Event, EventType};
use crate::http::response::{to_position, ApiError, ApiResponse, WirePosition};
use crate::http::state::AppState;
use crate::query::QueryEngine;
use crate::types::ElementKind;
use crate::workspace;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search/definition", get(search_definition))
        .route("/search/reference", get(search_reference))
        .route("/callgraph", get(callgraph))
        .route("/files/structure", get(files_structure))
        .route("/codebases/directory", get(codebases_directory))
        .route("/index/summary", get(index_summary))
        .route("/index/status", get(index_status))
        .route("/index", delete(delete_index))
        .route("/index/export", get(index_export))
        .route("/events", post(events))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn projects_for(state: &AppState, codebase_path: &Path) -> Result<Vec<workspace::Project>, ApiError> {
    if !workspace::exists(codebase_path) {
        return Err(WorkspaceError::WorkspaceNotFound { path: codebase_path.to_path_buf() }.into());
    }
    workspace::find_projects(codebase_path, state.visit_pattern()).map_err(ApiError::from)
}

fn parse_line_range(s: &str) -> Result<(u32, u32), ApiError> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| ApiError::BadRequest(format!("lineRange '{s}' is not of the form 'start-end'")))?;
    let start: u32 = start.parse().map_err(|_| ApiError::BadRequest(format!("invalid lineRange start in '{s}'")))?;
    let end: u32 = end.parse().map_err(|_| ApiError::BadRequest(format!("invalid lineRange end in '{s}'")))?;
    Ok((start, end))
}

#[derive(Debug, Serialize)]
struct DefinitionDto {
    path: String,
    name: String,
    position: WirePosition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionQuery {
    #[allow(dead_code)]
    client_id: String,
    codebase_path: PathBuf,
    file_path: PathBuf,
    start_line: Option<u32>,
    end_line: Option<u32>,
    code_snippet: Option<String>,
}

async fn search_definition(
    State(state): State<AppState>,
    Query(q): Query<DefinitionQuery>,
) -> Result<ApiResponse<Vec<DefinitionDto>>, ApiError> {
    let projects = projects_for(&state, &q.codebase_path)?;
    let engine = QueryEngine::new(state.store());
    let start = q.start_line.map(super::response::from_line);
    let end = q.end_line.map(super::response::from_line);
    let defs = engine.query_definitions(&q.codebase_path, &projects, &q.file_path, start, end, q.code_snippet.as_deref())?;
    let data = defs.into_iter().map(|d| DefinitionDto { path: d.path, name: d.name, position: to_position(d.range) }).collect();
    Ok(ApiResponse::ok(data))
}

#[derive(Debug, Serialize)]
struct RelationNodeDto {
    file_path: String,
    symbol_name: String,
    position: WirePosition,
    node_type: &'static str,
    children: Vec<RelationNodeDto>,
}

fn to_node_dto(node: crate::query::RelationNode) -> RelationNodeDto {
    RelationNodeDto {
        file_path: node.file_path,
        symbol_name: node.symbol_name,
        position: to_position(node.position),
        node_type: match node.node_type {
            crate::query::NodeType::Definition => "definition",
            crate::query::NodeType::Reference => "reference",
        },
        children: node.children.into_iter().map(to_node_dto).collect(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceQuery {
    #[allow(dead_code)]
    client_id: String,
    codebase_path: PathBuf,
    file_path: Option<PathBuf>,
    symbol_name: Option<String>,
}

/// `/search/reference`: direct references only (`maxLayer = 1`). Either
/// `filePath` locates the root element directly, or `symbolName` alone
/// resolves it via the project-wide symbol scan.
async fn search_reference(
    State(state): State<AppState>,
    Query(q): Query<ReferenceQuery>,
) -> Result<ApiResponse<Vec<RelationNodeDto>>, ApiError> {
    let projects = projects_for(&state, &q.codebase_path)?;
    let engine = QueryEngine::new(state.store());

    let roots = resolve_roots(&engine, &projects, &q.codebase_path, q.file_path.as_deref(), q.symbol_name.as_deref())?;
    let mut nodes = Vec::new();
    for (file_path, start_line, end_line) in roots {
        nodes.extend(engine.query_relations(&q.codebase_path, &projects, &file_path, start_line, end_line, q.symbol_name.as_deref(), 1)?);
    }
    Ok(ApiResponse::ok(nodes.into_iter().map(to_node_dto).collect()))
}

/// Shared by `/search/reference` and `/callgraph`: locate every candidate
/// root `(file_path, start_line, end_line)` to descend from. `symbolName`
/// resolves to a single definition project-wide; a bare `filePath` instead
/// yields one root per definition the file contains.
fn resolve_roots(
    engine: &QueryEngine<'_>,
    projects: &[workspace::Project],
    codebase_path: &Path,
    file_path: Option<&Path>,
    symbol_name: Option<&str>,
) -> Result<Vec<(PathBuf, u32, u32)>, ApiError> {
    if let Some(name) = symbol_name {
        let project = projects
            .iter()
            .find(|p| codebase_path.starts_with(&p.path) || p.path.starts_with(codebase_path))
            .ok_or_else(|| ApiError::NotFound(format!("no indexed project under '{}'", codebase_path.display())))?;
        let def = engine
            .find_definition_by_name(project, name)?
            .ok_or_else(|| IndexError::InvalidArgument { reason: format!("symbol '{name}' not found") })
            .map_err(ApiError::from)?;
        let full_path = codebase_path.join(&def.path);
        return Ok(vec![(full_path, def.range.start_line, def.range.end_line)]);
    }

    let fp = file_path.ok_or_else(|| ApiError::BadRequest("one of filePath or symbolName is required".into()))?;
    let entries = engine.get_file_structure(codebase_path, projects, fp, None)?;
    Ok(entries
        .into_iter()
        .filter(|e| e.kind.is_definition_kind())
        .map(|e| (fp.to_path_buf(), e.position.start_line, e.position.end_line))
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallgraphQuery {
    #[allow(dead_code)]
    client_id: String,
    codebase_path: PathBuf,
    file_path: Option<PathBuf>,
    line_range: Option<String>,
    symbol_name: Option<String>,
    max_layer: Option<u32>,
}

async fn callgraph(State(state): State<AppState>, Query(q): Query<CallgraphQuery>) -> Result<ApiResponse<Vec<RelationNodeDto>>, ApiError> {
    let projects = projects_for(&state, &q.codebase_path)?;
    let engine = QueryEngine::new(state.store());

    let mut roots = resolve_roots(&engine, &projects, &q.codebase_path, q.file_path.as_deref(), q.symbol_name.as_deref())?;
    if let Some(range) = &q.line_range {
        let (s, e) = parse_line_range(range)?;
        let (start_line, end_line) = (super::response::from_line(s), super::response::from_line(e));
        roots = roots.into_iter().map(|(fp, _, _)| (fp, start_line, end_line)).collect();
    }

    let max_layer = q.max_layer.unwrap_or(5);
    let mut nodes = Vec::new();
    for (file_path, start_line, end_line) in roots {
        nodes.extend(engine.query_relations(&q.codebase_path, &projects, &file_path, start_line, end_line, q.symbol_name.as_deref(), max_layer)?);
    }
    Ok(ApiResponse::ok(nodes.into_iter().map(to_node_dto).collect()))
}

#[derive(Debug, Serialize)]
struct FileStructureDto {
    kind: &'static str,
    name: String,
    position: WirePosition,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructureQuery {
    #[allow(dead_code)]
    client_id: String,
    codebase_path: PathBuf,
    file_path: PathBuf,
    /// Comma-separated `ElementKind` names; axum's query extractor doesn't
    /// decode repeated `types=a&types=b` keys into a `Vec`, so the wire
    /// format here is a single comma-joined parameter.
    types: Option<String>,
}

async fn files_structure(State(state): State<AppState>, Query(q): Query<StructureQuery>) -> Result<ApiResponse<Vec<FileStructureDto>>, ApiError> {
    let projects = projects_for(&state, &q.codebase_path)?;
    let engine = QueryEngine::new(state.store());

    let kinds: Option<Vec<ElementKind>> =
        q.types.as_ref().map(|s| s.split(',').filter_map(|t| ElementKind::from_label(t.trim())).collect());

    let entries = engine.get_file_structure(&q.codebase_path, &projects, &q.file_path, kinds.as_deref())?;
    let data = entries
        .into_iter()
        .map(|e| FileStructureDto { kind: e.kind.label(), name: e.name, position: to_position(e.position), content: e.content })
        .collect();
    Ok(ApiResponse::ok(data))
}

#[derive(Debug, Serialize)]
struct DirectoryEntryDto {
    name: String,
    path: String,
    is_dir: bool,
    children: Vec<DirectoryEntryDto>,
}

fn to_directory_dto(entry: workspace::DirectoryEntry) -> DirectoryEntryDto {
    DirectoryEntryDto {
        name: entry.name,
        path: entry.path.to_string_lossy().into_owned(),
        is_dir: entry.is_dir,
        children: entry.children.into_iter().map(to_directory_dto).collect(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryQuery {
    #[allow(dead_code)]
    client_id: String,
    codebase_path: PathBuf,
    depth: Option<usize>,
    include_files: Option<bool>,
    sub_dir: Option<String>,
}

async fn codebases_directory(State(state): State<AppState>, Query(q): Query<DirectoryQuery>) -> Result<ApiResponse<Vec<DirectoryEntryDto>>, ApiError> {
    let root = match &q.sub_dir {
        Some(sub) => q.codebase_path.join(sub),
        None => q.codebase_path.clone(),
    };
    let entries = workspace::list_directory(&root, state.visit_pattern(), q.depth.unwrap_or(3), q.include_files.unwrap_or(true))?;
    Ok(ApiResponse::ok(entries.into_iter().map(to_directory_dto).collect()))
}

#[derive(Debug, Serialize)]
struct SummaryDto {
    total_files: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryQuery {
    #[allow(dead_code)]
    client_id: String,
    codebase_path: PathBuf,
}

async fn index_summary(State(state): State<AppState>, Query(q): Query<SummaryQuery>) -> Result<ApiResponse<SummaryDto>, ApiError> {
    let projects = projects_for(&state, &q.codebase_path)?;
    let engine = QueryEngine::new(state.store());
    let summary = engine.get_summary(&projects)?;
    Ok(ApiResponse::ok(SummaryDto { total_files: summary.total_files }))
}

#[derive(Debug, Serialize)]
struct ProjectStatusDto {
    project_path: String,
    status: &'static str,
    total_files: usize,
    total_failed: usize,
    failed_paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    workspace: PathBuf,
}

async fn index_status(State(state): State<AppState>, Query(q): Query<StatusQuery>) -> Result<ApiResponse<Vec<ProjectStatusDto>>, ApiError> {
    let projects = projects_for(&state, &q.workspace)?;
    let data = projects
        .iter()
        .map(|p| {
            let progress = state.context.snapshot_progress(&p.uuid);
            ProjectStatusDto {
                project_path: p.path.to_string_lossy().into_owned(),
                status: match progress.status {
                    crate::indexer::ProjectStatus::Empty => "empty",
                    crate::indexer::ProjectStatus::Indexed => "indexed",
                    crate::indexer::ProjectStatus::Mutating => "mutating",
                },
                total_files: progress.total_files,
                total_failed: progress.total_failed,
                failed_paths: progress.failed_paths,
            }
        })
        .collect();
    Ok(ApiResponse::ok(data))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteQuery {
    #[allow(dead_code)]
    client_id: String,
    codebase_path: PathBuf,
    /// Any value triggers a full removal; this crate's `Indexer` doesn't
    /// support removing a single index type in isolation, so `indexType` is
    /// accepted (for wire compatibility) but not yet interpreted.
    #[allow(dead_code)]
    index_type: Option<String>,
}

async fn delete_index(State(state): State<AppState>, Query(q): Query<DeleteQuery>) -> Result<ApiResponse<()>, ApiError> {
    state.indexer.remove_all_indexes(&q.codebase_path)?;
    Ok(ApiResponse::ok(()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportQuery {
    #[allow(dead_code)]
    client_id: String,
    codebase_path: PathBuf,
}

/// Newline-delimited JSON dump of every project's store entries under the
/// workspace, one `{project, key, value}` line per record.
async fn index_export(State(state): State<AppState>, Query(q): Query<ExportQuery>) -> Result<String, ApiError> {
    let projects = projects_for(&state, &q.codebase_path)?;
    let mut out = String::new();
    for project in &projects {
        for item in state.store().iter(&project.uuid, "", tokio_util::sync::CancellationToken::new())? {
            let (key, bytes) = item?;
            let value: serde_json::Value = crate::store::decode_record(&bytes).unwrap_or(serde_json::Value::Null);
            let line = serde_json::json!({ "project": project.uuid, "key": key, "value": value });
            out.push_str(&line.to_string());
            out.push('\n');
        }
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct EventDto {
    event_type: String,
    event_time: u64,
    source_path: PathBuf,
    target_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct EventsBody {
    workspace: PathBuf,
    data: Vec<EventDto>,
}

fn parse_event_type(s: &str) -> Result<EventType, ApiError> {
    match s {
        "open_workspace" => Ok(EventType::OpenWorkspace),
        "add_file" => Ok(EventType::AddFile),
        "modify_file" => Ok(EventType::ModifyFile),
        "delete_file" => Ok(EventType::DeleteFile),
        "rename_file" => Ok(EventType::RenameFile),
        "delete_folder" => Ok(EventType::DeleteFolder),
        "rename_folder" => Ok(EventType::RenameFolder),
        other => Err(ApiError::BadRequest(format!("unknown event type '{other}'"))),
    }
}

async fn events(State(state): State<AppState>, Json(body): Json<EventsBody>) -> Result<ApiResponse<()>, ApiError> {
    let mut events = Vec::with_capacity(body.data.len());
    for dto in body.data {
        events.push(Event {
            event_type: parse_event_type(&dto.event_type)?,
            event_time: dto.event_time,
            source_path: dto.source_path,
            target_path: dto.target_path,
        });
    }
    state.events.route_batch(&body.workspace, events)?;
    Ok(ApiResponse::ok(()))
}

// Re-exported so `AppState` construction sites and tests don't need to
// reach into this module for the `Arc` alias.
pub type SharedState = Arc<AppState>;
