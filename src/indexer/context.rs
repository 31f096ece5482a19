//! `IndexerContext`: the explicit home for the global mutable state the
//! source would otherwise scatter as process statics — the per-project
//! store handle map and visit-pattern defaults (DESIGN NOTES). Every
//! orchestrator entry point takes a context instead of reaching for
//! globals, so tests can instantiate isolated instances.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config::{IndexingConfig, VisitPatternConfig};
use crate::store::GraphStore;

/// Where a project's index currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    Empty,
    Indexed,
    Mutating,
}

/// Process-wide progress counters for one project, read by `/index/status`.
#[derive(Debug, Clone)]
pub struct ProjectProgress {
    pub status: ProjectStatus,
    pub total_files: usize,
    pub total_failed: usize,
    pub failed_paths: Vec<String>,
    pub tables_processed: usize,
}

impl Default for ProjectProgress {
    fn default() -> Self {
        Self {
            status: ProjectStatus::Empty,
            total_files: 0,
            total_failed: 0,
            failed_paths: Vec::new(),
            tables_processed: 0,
        }
    }
}

/// Shared state every indexer entry point operates through: the store
/// handle, configuration, per-project write locks, and progress counters.
/// Transitions are serialized per project: acquiring a project's lock is
/// how two concurrent `index_workspace` calls for the same workspace
/// avoid interleaving.
pub struct IndexerContext {
    pub store: Arc<dyn GraphStore>,
    pub visit_pattern: VisitPatternConfig,
    pub indexing: IndexingConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<ProjectProgress>>>>,
    active_tasks: AtomicUsize,
    last_access: Mutex<HashMap<String, u64>>,
}

impl IndexerContext {
    pub fn new(store: Arc<dyn GraphStore>, visit_pattern: VisitPatternConfig, indexing: IndexingConfig) -> Self {
        Self {
            store,
            visit_pattern,
            indexing,
            locks: Mutex::new(HashMap::new()),
            active_tasks: AtomicUsize::new(0),
            last_access: Mutex::new(HashMap::new()),
        }
    }

    /// The per-project lock guarding progress counters and serializing
    /// write transitions, created on first use. Also marks the project as
    /// touched right now, feeding the retention janitor's expiry check.
    pub fn project_lock(&self, project_uuid: &str) -> Arc<Mutex<ProjectProgress>> {
        self.touch(project_uuid);
        self.locks.lock().entry(project_uuid.to_string()).or_insert_with(|| Arc::new(Mutex::new(ProjectProgress::default()))).clone()
    }

    /// Record `project_uuid` as accessed at the current time.
    pub fn touch(&self, project_uuid: &str) {
        self.last_access.lock().insert(project_uuid.to_string(), crate::indexer::retention::now_epoch_secs());
    }

    /// Epoch-seconds of last access per project UUID, for projects this
    /// process has touched since starting. A project absent from the
    /// snapshot (known to the store but never touched this process
    /// lifetime) is treated as freshly touched by the caller.
    pub fn last_access_snapshot(&self) -> HashMap<String, u64> {
        self.last_access.lock().clone()
    }

    pub fn snapshot_progress(&self, project_uuid: &str) -> ProjectProgress {
        self.project_lock(project_uuid).lock().clone()
    }

    /// Count of tasks currently running across the process, feeding the
    /// `load_factor` term of the adaptive-concurrency formula.
    pub fn active_tasks(&self) -> usize {
        self.active_tasks.load(Ordering::Relaxed)
    }

    pub(super) fn enter_task(&self) -> TaskGuard<'_> {
        self.active_tasks.fetch_add(1, Ordering::Relaxed);
        TaskGuard { context: self }
    }
}

pub(super) struct TaskGuard<'a> {
    context: &'a IndexerContext,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.context.active_tasks.fetch_sub(1, Ordering::Relaxed);
    }
}
