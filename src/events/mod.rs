//! Event Router: translates external file-change events into indexer
//! calls, collapsing duplicate successive events for the same path within
//! a dedup window. The window-collapse logic uses a record/take-ready
//! pattern keyed on caller-supplied event timestamps instead of
//! wall-clock `Instant`s, so it stays deterministic under test.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{IndexError, IndexResult};
use crate::indexer::Indexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    OpenWorkspace,
    AddFile,
    ModifyFile,
    DeleteFile,
    RenameFile,
    DeleteFolder,
    RenameFolder,
}

/// One event in a submitted batch. `event_time` is caller-supplied epoch
/// milliseconds, used only to decide whether two events on the same path
/// fall inside the dedup window.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: EventType,
    pub event_time: u64,
    pub source_path: PathBuf,
    pub target_path: Option<PathBuf>,
}

pub struct EventRouter {
    indexer: Indexer,
    debounce_ms: u64,
}

impl EventRouter {
    pub fn new(indexer: Indexer, debounce_ms: u64) -> Self {
        Self { indexer, debounce_ms }
    }

    /// Apply a batch of events to `workspace_path`, in order, after
    /// collapsing duplicate successive same-path events within the dedup
    /// window to the latest-effect event.
    pub fn route_batch(&self, workspace_path: &std::path::Path, events: Vec<Event>) -> IndexResult<()> {
        for event in dedup_window(events, self.debounce_ms) {
            self.route_one(workspace_path, event)?;
        }
        Ok(())
    }

    fn route_one(&self, workspace_path: &std::path::Path, event: Event) -> IndexResult<()> {
        match event.event_type {
            EventType::OpenWorkspace => {
                self.indexer.index_workspace(workspace_path)?;
            }
            EventType::AddFile => {
                self.indexer.index_files(workspace_path, &[event.source_path])?;
            }
            EventType::ModifyFile => {
                self.indexer.reindex_file(workspace_path, &event.source_path)?;
            }
            EventType::DeleteFile | EventType::DeleteFolder => {
                self.indexer.remove_indexes(workspace_path, &[event.source_path])?;
            }
            EventType::RenameFile | EventType::RenameFolder => {
                let target = event.target_path.ok_or_else(|| IndexError::InvalidArgument {
                    reason: "rename event missing target_path".into(),
                })?;
                self.indexer.rename_indexes(workspace_path, &event.source_path, &target)?;
            }
        }
        Ok(())
    }
}

/// Collapse successive events on the same path whose `event_time` gap is
/// under `debounce_ms` into the latest one, preserving the slot (and
/// therefore the relative order) of the group's first occurrence.
fn dedup_window(events: Vec<Event>, debounce_ms: u64) -> Vec<Event> {
    let mut result: Vec<Event> = Vec::new();
    let mut last_seen: HashMap<PathBuf, usize> = HashMap::new();

    for event in events {
        if let Some(&idx) = last_seen.get(&event.source_path) {
            let prev_time = result[idx].event_time;
            if event.event_time.saturating_sub(prev_time) < debounce_ms {
                result[idx] = event;
                continue;
            }
        }
        last_seen.insert(event.source_path.clone(), result.len());
        result.push(event);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: EventType, time: u64, path: &str) -> Event {
        Event { event_type, event_time: time, source_path: PathBuf::from(path), target_path: None }
    }

    #[test]
    fn dedup_collapses_rapid_successive_events_on_same_path() {
        let events = vec![
            event(EventType::ModifyFile, 0, "a.rs"),
            event(EventType::ModifyFile, 10, "a.rs"),
            event(EventType::ModifyFile, 20, "a.rs"),
        ];
        let deduped = dedup_window(events, 300);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].event_time, 20);
    }

    #[test]
    fn dedup_preserves_distinct_paths_and_order() {
        let events = vec![event(EventType::AddFile, 0, "a.rs"), event(EventType::AddFile, 0, "b.rs")];
        let deduped = dedup_window(events, 300);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].source_path, PathBuf::from("a.rs"));
        assert_eq!(deduped[1].source_path, PathBuf::from("b.rs"));
    }

    #[test]
    fn dedup_keeps_events_outside_the_window_separate() {
        let events = vec![event(EventType::ModifyFile, 0, "a.rs"), event(EventType::ModifyFile, 1000, "a.rs")];
        let deduped = dedup_window(events, 300);
        assert_eq!(deduped.len(), 2);
    }
}
