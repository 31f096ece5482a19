//! Shared state every route handler closes over: the full
//! indexer/query/event-router stack behind an `Arc`, since this is a plain
//! multi-workspace REST API rather than a single-workspace session.

use std::sync::Arc;

use crate::config::VisitPatternConfig;
use crate::events::EventRouter;
use crate::indexer::{Indexer, IndexerContext};
use crate::store::GraphStore;

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<IndexerContext>,
    pub indexer: Indexer,
    pub events: Arc<EventRouter>,
}

impl AppState {
    pub fn new(store: Arc<dyn GraphStore>, visit_pattern: VisitPatternConfig, indexing: crate::config::IndexingConfig, debounce_ms: u64) -> Self {
        let context = Arc::new(IndexerContext::new(store, visit_pattern, indexing));
        let indexer = Indexer::new(context.clone());
        let events = Arc::new(EventRouter::new(indexer.clone(), debounce_ms));
        Self { context, indexer, events }
    }

    pub fn store(&self) -> &dyn GraphStore {
        self.context.store.as_ref()
    }

    pub fn visit_pattern(&self) -> &VisitPatternConfig {
        &self.context.visit_pattern
    }
}
