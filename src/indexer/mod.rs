//! Indexer / Orchestrator: full workspace indexing and the
//! incremental operations the event router drives. Batches graph-store
//! writes per project behind adaptive concurrency/batch-size tiering and
//! single-writer discipline per project.

mod adaptive;
mod context;
pub mod retention;

pub use context::{IndexerContext, ProjectProgress, ProjectStatus};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::MutexGuard;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::analyzer::DependencyAnalyzer;
use crate::error::{IndexError, IndexResult, ParseError, StoreError};
use crate::store::{GraphStore, decode_record, get_record, keys, put_record};
use crate::types::{FileElementTable, Language, SymbolDefinitionRecord};
use crate::workspace::{self, Project};

/// Result of a full or per-project index pass.
#[derive(Debug, Clone, Default)]
pub struct FullIndexReport {
    pub total_files: usize,
    pub total_failed: usize,
    pub failed_paths: Vec<String>,
}

impl FullIndexReport {
    fn merge(&mut self, other: FullIndexReport) {
        self.total_files += other.total_files;
        self.total_failed += other.total_failed;
        self.failed_paths.extend(other.failed_paths);
    }
}

struct BatchParseResult {
    tables: Vec<FileElementTable>,
    failed: usize,
    failed_paths: Vec<String>,
}

#[derive(Clone)]
pub struct Indexer {
    context: Arc<IndexerContext>,
}

impl Indexer {
    pub fn new(context: Arc<IndexerContext>) -> Self {
        Self { context }
    }

    fn store(&self) -> &dyn GraphStore {
        self.context.store.as_ref()
    }

    fn projects(&self, workspace_path: &Path) -> IndexResult<Vec<Project>> {
        if !workspace::exists(workspace_path) {
            return Err(crate::error::WorkspaceError::WorkspaceNotFound {
                path: workspace_path.to_path_buf(),
            }
            .into());
        }
        Ok(workspace::find_projects(workspace_path, &self.context.visit_pattern)?)
    }

    /// Full workspace index: walk, parse, resolve, and persist, one
    /// project at a time.
    pub fn index_workspace(&self, workspace_path: &Path) -> IndexResult<FullIndexReport> {
        let projects = self.projects(workspace_path)?;
        let mut report = FullIndexReport::default();
        for project in &projects {
            let lock = self.context.project_lock(&project.uuid);
            let mut guard = lock.lock();
            let project_report = self.index_project_locked(workspace_path, project, &mut guard)?;
            report.merge(project_report);
        }
        Ok(report)
    }

    fn index_project_locked(
        &self,
        workspace_path: &Path,
        project: &Project,
        guard: &mut MutexGuard<'_, ProjectProgress>,
    ) -> IndexResult<FullIndexReport> {
        guard.status = ProjectStatus::Mutating;

        let prior_count = self.store().size(&project.uuid, keys::PATH_PREFIX).unwrap_or(0);
        let files = workspace::collect_files(&project.path, &self.context.visit_pattern)?;
        let total_files = files.len();

        crate::log_event!(
            "indexer",
            "full-index",
            "project {} ({} prior files, {} candidates)",
            project.uuid,
            prior_count,
            total_files
        );

        let _task = self.context.enter_task();
        let concurrency = adaptive::effective_concurrency(
            total_files,
            self.context.indexing.parallelism,
            self.context.active_tasks(),
            num_cpus::get(),
        );
        let batch_size = adaptive::effective_batch_size(total_files, self.context.indexing.batch_size);

        let batches: Vec<Vec<PathBuf>> = files.chunks(batch_size.max(1)).map(|c| c.to_vec()).collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .build()
            .map_err(|e| IndexError::InternalError { reason: e.to_string() })?;

        let parsed: Vec<BatchParseResult> = pool.install(|| {
            batches.par_iter().map(|batch| self.parse_batch(workspace_path, project, batch)).collect()
        });

        let analyzer = DependencyAnalyzer::new(self.store());
        let mut report = FullIndexReport { total_files, total_failed: 0, failed_paths: Vec::new() };

        for batch_result in parsed {
            report.total_failed += batch_result.failed;
            report.failed_paths.extend(batch_result.failed_paths);
            if batch_result.tables.is_empty() {
                continue;
            }
            analyzer.phase_a(&project.uuid, &batch_result.tables)?;
            let entries = crate::store::encode_batch(
                &batch_result
                    .tables
                    .iter()
                    .map(|t| (keys::path_key(t.language, &t.path), t.clone()))
                    .collect::<Vec<_>>(),
            )?;
            self.store().batch_save(&project.uuid, &entries)?;
        }

        self.run_phase_b_project_wide(&analyzer, project)?;

        guard.status = ProjectStatus::Indexed;
        guard.total_files = total_files;
        guard.total_failed = report.total_failed;
        guard.failed_paths = report.failed_paths.clone();
        guard.tables_processed = total_files;

        Ok(report)
    }

    /// Step 7: iterate the project's `@path:` keyspace sequentially,
    /// resolving forward relations per table, logging progress roughly
    /// every tenth of the total, then rebuilding back-references once.
    fn run_phase_b_project_wide(&self, analyzer: &DependencyAnalyzer<'_>, project: &Project) -> IndexResult<()> {
        let mut entries = Vec::new();
        for item in self.store().iter(&project.uuid, keys::PATH_PREFIX, CancellationToken::new())? {
            let (key, bytes) = item?;
            entries.push((key, decode_record::<FileElementTable>(&bytes)?));
        }

        let total = entries.len();
        let progress_every = (total / 10).max(1);
        for (i, (_, mut table)) in entries.into_iter().enumerate() {
            analyzer.resolve_forward(&project.uuid, &mut table)?;
            if (i + 1) % progress_every == 0 || i + 1 == total {
                crate::debug_event!("indexer", "phase-b-progress", "{}/{} tables", i + 1, total);
            }
        }
        analyzer.rebuild_back_references(&project.uuid)?;
        Ok(())
    }

    fn parse_batch(&self, workspace_path: &Path, project: &Project, batch: &[PathBuf]) -> BatchParseResult {
        let mut tables = Vec::new();
        let mut failed = 0;
        let mut failed_paths = Vec::new();

        for path in batch {
            match self.parse_one(workspace_path, path) {
                Ok(Some(mut table)) => {
                    let before = table.elements.len();
                    table.elements.retain(|e| !e.name.is_empty() && e.range.is_well_formed());
                    if table.elements.len() != before {
                        tracing::debug!(
                            path = %path.display(),
                            dropped = before - table.elements.len(),
                            "dropped invalid elements"
                        );
                    }
                    table.sort_elements();
                    tables.push(table);
                }
                Ok(None) => {}
                Err(reason) => {
                    failed += 1;
                    failed_paths.push(workspace::normalize_path(workspace_path, path));
                    tracing::warn!(path = %path.display(), project = %project.uuid, %reason, "failed to index file");
                }
            }
        }

        BatchParseResult { tables, failed, failed_paths }
    }

    /// Parse one file, returning `Ok(None)` for an unreadable or
    /// unsupported-language file (logged and skipped, not an error).
    fn parse_one(&self, workspace_path: &Path, path: &Path) -> Result<Option<FileElementTable>, String> {
        let Some(language) = workspace::infer_language(path) else {
            return Ok(None);
        };
        let bytes = match workspace::read_file(path, workspace::ReadOptions { ignore_error: true }) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(e) => return Err(e.to_string()),
        };
        let mut table = match crate::parsing::parse_file(language, path, &bytes) {
            Ok(table) => table,
            Err(ParseError::UnsupportedLanguage { .. }) => {
                tracing::debug!(path = %path.display(), ?language, "no parser registered for language, skipping");
                return Ok(None);
            }
            Err(e) => return Err(e.to_string()),
        };
        table.path = workspace::normalize_path(workspace_path, path);
        Ok(Some(table))
    }

    /// `index_files`: group by project, redirect an unindexed project to a
    /// full index, otherwise parse just the listed paths and run both
    /// analyzer phases limited to those tables.
    pub fn index_files(&self, workspace_path: &Path, paths: &[PathBuf]) -> IndexResult<FullIndexReport> {
        let projects = self.projects(workspace_path)?;
        let mut report = FullIndexReport::default();
        for (project, group) in group_by_project(&projects, paths) {
            let lock = self.context.project_lock(&project.uuid);
            let mut guard = lock.lock();
            let project_report = self.index_files_locked(workspace_path, project, &group, &mut guard)?;
            report.merge(project_report);
        }
        Ok(report)
    }

    fn index_files_locked(
        &self,
        workspace_path: &Path,
        project: &Project,
        paths: &[PathBuf],
        guard: &mut MutexGuard<'_, ProjectProgress>,
    ) -> IndexResult<FullIndexReport> {
        if self.store().size(&project.uuid, keys::PATH_PREFIX).unwrap_or(0) == 0 {
            return self.index_project_locked(workspace_path, project, guard);
        }

        guard.status = ProjectStatus::Mutating;
        let batch = self.parse_batch(workspace_path, project, paths);

        let analyzer = DependencyAnalyzer::new(self.store());
        if !batch.tables.is_empty() {
            analyzer.phase_a(&project.uuid, &batch.tables)?;
            let mut mutable_tables = batch.tables.clone();
            analyzer.phase_b(&project.uuid, &mut mutable_tables)?;
        }

        guard.status = ProjectStatus::Indexed;
        Ok(FullIndexReport {
            total_files: paths.len(),
            total_failed: batch.failed,
            failed_paths: batch.failed_paths,
        })
    }

    /// `remove_indexes`: drop the given paths' records, grouped by project.
    pub fn remove_indexes(&self, workspace_path: &Path, paths: &[PathBuf]) -> IndexResult<()> {
        let projects = self.projects(workspace_path)?;
        for (project, group) in group_by_project(&projects, paths) {
            let lock = self.context.project_lock(&project.uuid);
            let mut guard = lock.lock();
            self.remove_indexes_locked(workspace_path, project, &group, &mut guard)?;
        }
        Ok(())
    }

    fn remove_indexes_locked(
        &self,
        workspace_path: &Path,
        project: &Project,
        paths: &[PathBuf],
        guard: &mut MutexGuard<'_, ProjectProgress>,
    ) -> IndexResult<()> {
        guard.status = ProjectStatus::Mutating;
        let store = self.store();

        let normalized: Vec<String> = paths.iter().map(|p| workspace::normalize_path(workspace_path, p)).collect();

        let mut matched: Vec<(String, FileElementTable)> = Vec::new();
        for item in store.iter(&project.uuid, keys::PATH_PREFIX, CancellationToken::new())? {
            let (key, bytes) = item?;
            let table: FileElementTable = decode_record(&bytes)?;
            let hit = normalized.iter().any(|n| &table.path == n || table.path.starts_with(&format!("{n}/")));
            if hit {
                matched.push((key, table));
            }
        }

        if matched.is_empty() {
            guard.status = if store.size(&project.uuid, keys::PATH_PREFIX).unwrap_or(0) == 0 {
                ProjectStatus::Empty
            } else {
                ProjectStatus::Indexed
            };
            return Ok(());
        }

        let deleted_paths: Vec<String> = matched.iter().map(|(_, t)| t.path.clone()).collect();

        // Strip relations pointing at any deleted path from every other table.
        for item in store.iter(&project.uuid, keys::PATH_PREFIX, CancellationToken::new())? {
            let (key, bytes) = item?;
            let mut table: FileElementTable = decode_record(&bytes)?;
            if deleted_paths.contains(&table.path) {
                continue;
            }
            let mut changed = false;
            for element in &mut table.elements {
                let before = element.relations.len();
                element.relations.retain(|r| !deleted_paths.contains(&r.target_path));
                if element.relations.len() != before {
                    changed = true;
                }
            }
            if changed {
                put_record(store, &project.uuid, &key, &table)?;
            }
        }

        // Drop entries for deleted definitions from their symbol records.
        let mut touched: HashSet<(Language, String)> = HashSet::new();
        for (_, table) in &matched {
            for element in &table.elements {
                if element.is_definition {
                    touched.insert((table.language, element.name.clone()));
                }
            }
        }
        for (language, name) in touched {
            let key = keys::sym_key(language, &name);
            match get_record::<SymbolDefinitionRecord>(store, &project.uuid, &key) {
                Ok(mut record) => {
                    record.retain_paths_not_in(&deleted_paths);
                    if record.definitions.is_empty() {
                        store.delete(&project.uuid, &key)?;
                    } else {
                        put_record(store, &project.uuid, &key, &record)?;
                    }
                }
                Err(StoreError::KeyNotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        for (key, _) in &matched {
            store.delete(&project.uuid, key)?;
        }

        guard.status = if store.size(&project.uuid, keys::PATH_PREFIX).unwrap_or(0) == 0 {
            ProjectStatus::Empty
        } else {
            ProjectStatus::Indexed
        };
        Ok(())
    }

    /// `rename_indexes`: move every `@path:` entry under `src` to `dst`,
    /// rewriting referrer relations and symbol-definition namespaces.
    pub fn rename_indexes(&self, workspace_path: &Path, src: &Path, dst: &Path) -> IndexResult<()> {
        let projects = self.projects(workspace_path)?;
        let project = workspace::get_project_by_file_path(&projects, src).ok_or_else(|| IndexError::InvalidArgument {
            reason: format!("no project contains '{}'", src.display()),
        })?;

        let lock = self.context.project_lock(&project.uuid);
        let mut guard = lock.lock();
        guard.status = ProjectStatus::Mutating;

        let store = self.store();
        let src_norm = workspace::normalize_path(workspace_path, src);
        let dst_norm = workspace::normalize_path(workspace_path, dst);

        let mut moved: Vec<(String, FileElementTable, String, String)> = Vec::new();
        for item in store.iter(&project.uuid, keys::PATH_PREFIX, CancellationToken::new())? {
            let (key, bytes) = item?;
            let table: FileElementTable = decode_record(&bytes)?;
            let hit = table.path == src_norm || table.path.starts_with(&format!("{src_norm}/"));
            if !hit {
                continue;
            }
            let new_path = table.path.replacen(&src_norm, &dst_norm, 1);
            let old_path = table.path.clone();
            moved.push((key, table, old_path, new_path));
        }

        for (old_key, mut table, old_path, new_path) in moved {
            let old_language = table.language;
            let new_language = Language::from_path(Path::new(&new_path)).unwrap_or(old_language);

            // Update referrers before rewriting the table's own path.
            let mut referrer_paths: HashSet<String> = HashSet::new();
            for element in &table.elements {
                for rel in &element.relations {
                    if rel.target_path != old_path {
                        referrer_paths.insert(rel.target_path.clone());
                    }
                }
            }
            for referrer_path in &referrer_paths {
                if let Some((referrer_key, mut referrer_table)) = find_table_by_path(store, &project.uuid, referrer_path)? {
                    let mut changed = false;
                    for element in &mut referrer_table.elements {
                        for rel in &mut element.relations {
                            if rel.target_path == old_path {
                                rel.target_path = new_path.clone();
                                changed = true;
                            }
                        }
                    }
                    if changed {
                        put_record(store, &project.uuid, &referrer_key, &referrer_table)?;
                    }
                }
            }

            // Rewrite symbol-definition entries for every definition moved.
            for element in table.elements.iter().filter(|e| e.is_definition) {
                let old_sym_key = keys::sym_key(old_language, &element.name);
                if new_language == old_language {
                    if let Ok(mut record) = get_record::<SymbolDefinitionRecord>(store, &project.uuid, &old_sym_key) {
                        for def in record.definitions.iter_mut() {
                            if def.path == old_path && def.range == element.range {
                                def.path = new_path.clone();
                            }
                        }
                        put_record(store, &project.uuid, &old_sym_key, &record)?;
                    }
                } else {
                    if let Ok(mut record) = get_record::<SymbolDefinitionRecord>(store, &project.uuid, &old_sym_key) {
                        record.definitions.retain(|d| !(d.path == old_path && d.range == element.range));
                        if record.definitions.is_empty() {
                            store.delete(&project.uuid, &old_sym_key)?;
                        } else {
                            put_record(store, &project.uuid, &old_sym_key, &record)?;
                        }
                    }
                    let new_sym_key = keys::sym_key(new_language, &element.name);
                    let mut new_record = get_record::<SymbolDefinitionRecord>(store, &project.uuid, &new_sym_key)
                        .unwrap_or_else(|_| SymbolDefinitionRecord::new(new_language, element.name.clone()));
                    new_record.add_definition(crate::types::DefinitionRef {
                        path: new_path.clone(),
                        range: element.range,
                        element_kind: element.kind,
                        param_count: element.param_count,
                    });
                    put_record(store, &project.uuid, &new_sym_key, &new_record)?;
                }
            }

            table.path = new_path.clone();
            table.language = new_language;
            store.delete(&project.uuid, &old_key)?;
            put_record(store, &project.uuid, &keys::path_key(new_language, &new_path), &table)?;
        }

        guard.status = ProjectStatus::Indexed;
        Ok(())
    }

    /// `remove_all_indexes`: purge every project's namespace entirely.
    pub fn remove_all_indexes(&self, workspace_path: &Path) -> IndexResult<()> {
        let projects = self.projects(workspace_path)?;
        for project in &projects {
            let lock = self.context.project_lock(&project.uuid);
            let mut guard = lock.lock();
            self.store().delete_all(&project.uuid)?;
            *guard = ProjectProgress::default();
        }
        Ok(())
    }

    /// Retention janitor sweep: purge every project namespace the store
    /// knows about whose last access has exceeded
    /// `indexing.index_expiry_period_hours`. A project never touched this
    /// process lifetime is treated as freshly touched rather than expired
    /// immediately on startup.
    pub fn purge_expired(&self) -> IndexResult<Vec<String>> {
        let now = retention::now_epoch_secs();
        let last_access = self.context.last_access_snapshot();
        let mut purged = Vec::new();

        for project_uuid in self.store().list_projects()? {
            let touched = last_access.get(&project_uuid).copied().unwrap_or(now);
            if !retention::is_expired(now, touched, self.context.indexing.index_expiry_period_hours) {
                continue;
            }
            let lock = self.context.project_lock(&project_uuid);
            let mut guard = lock.lock();
            self.store().delete_all(&project_uuid)?;
            *guard = ProjectProgress::default();
            crate::log_event!("indexer", "retention", "purged expired project {}", project_uuid);
            purged.push(project_uuid);
        }
        Ok(purged)
    }

    /// `reindex_file`: remove then re-index one file under a single held
    /// project lock, so no query observes the transient gap between the
    /// two steps.
    pub fn reindex_file(&self, workspace_path: &Path, path: &Path) -> IndexResult<()> {
        let projects = self.projects(workspace_path)?;
        let project = workspace::get_project_by_file_path(&projects, path).ok_or_else(|| IndexError::InvalidArgument {
            reason: format!("no project contains '{}'", path.display()),
        })?;
        let project = project.clone();

        let lock = self.context.project_lock(&project.uuid);
        let mut guard = lock.lock();
        self.remove_indexes_locked(workspace_path, &project, std::slice::from_ref(&path.to_path_buf()), &mut guard)?;
        self.index_files_locked(workspace_path, &project, std::slice::from_ref(&path.to_path_buf()), &mut guard)?;
        Ok(())
    }
}

fn find_table_by_path(store: &dyn GraphStore, project: &str, path: &str) -> IndexResult<Option<(String, FileElementTable)>> {
    for item in store.iter(project, keys::PATH_PREFIX, CancellationToken::new())? {
        let (key, bytes) = item?;
        let table: FileElementTable = decode_record(&bytes)?;
        if table.path == path {
            return Ok(Some((key, table)));
        }
    }
    Ok(None)
}

fn group_by_project<'a>(projects: &'a [Project], paths: &[PathBuf]) -> Vec<(&'a Project, Vec<PathBuf>)> {
    let mut groups: HashMap<&str, (&'a Project, Vec<PathBuf>)> = HashMap::new();
    for path in paths {
        if let Some(project) = workspace::get_project_by_file_path(projects, path) {
            groups.entry(project.uuid.as_str()).or_insert_with(|| (project, Vec::new())).1.push(path.clone());
        }
    }
    groups.into_values().collect()
}
