pub mod analyzer;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod indexer;
pub mod logging;
pub mod parsing;
pub mod query;
pub mod store;
pub mod types;
pub mod workspace;

pub use config::Settings;
pub use error::{IndexError, IndexResult, QueryError, QueryResult, StoreError, StoreResult, WorkspaceError, WorkspaceResult};
pub use indexer::{Indexer, IndexerContext};
pub use query::QueryEngine;
pub use store::{GraphStore, MemStore, RocksStore};
