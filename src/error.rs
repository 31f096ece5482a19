//! Error types for the code-graph indexer
//!
//! Structured error types using thiserror, one enum per concern, mirroring
//! the error-kind table in the external interface contract: errors that are
//! locally recovered never escape a batch-level API as `Err`; errors that
//! abort a project or a request are real `Err` values propagated with `?`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the workspace reader and project detection.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("workspace '{path}' does not exist")]
    WorkspaceNotFound { path: PathBuf },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("symlink at '{path}' escapes workspace root, skipped")]
    SymlinkEscape { path: PathBuf },
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors from the source parser. Never panics on malformed input; these
/// are the two recoverable kinds for a single file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unsupported language for '{path}'")]
    UnsupportedLanguage { path: PathBuf },

    #[error("failed to parse '{path}': {reason}")]
    ParseFailure { path: PathBuf, reason: String },

    #[error("invalid UTF-8 in '{path}'")]
    InvalidUtf8 { path: PathBuf },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Errors from the graph store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    #[error("key '{key}' does not match a known prefix (@path:, @sym:, @callee:)")]
    InvalidKey { key: String },

    #[error("store for project '{project}' is corrupted: {reason}")]
    StoreCorruption { project: String, reason: String },

    #[error("store for project '{project}' is closed")]
    StoreClosed { project: String },

    #[error("underlying store engine error: {0}")]
    Engine(#[from] rocksdb::Error),

    #[error("failed to encode/decode record: {0}")]
    Codec(String),

    #[error("I/O error on store directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the dependency analyzer. Per-element resolution
/// failures are logged and folded into an empty relations list rather than
/// constructed here; this enum is for failures that abort a whole batch.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Errors from the indexer / orchestrator.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("project at '{path}' is not indexed")]
    ProjectNotIndexed { path: PathBuf },

    #[error("internal error in worker thread: {reason}")]
    InternalError { reason: String },
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Errors from the query engine.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("project for '{path}' is not indexed")]
    ProjectNotIndexed { path: PathBuf },

    #[error("symbol not found matching the given query")]
    SymbolNotFound,

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Errors from configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("failed to write configuration to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl IndexError {
    /// Recovery hints surfaced by the CLI and the HTTP error envelope.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Store(StoreError::StoreCorruption { .. }) => vec![
                "the project namespace was purged and will be rebuilt on next index",
                "run `graphkeep index <path>` to reindex now",
            ],
            Self::Store(StoreError::StoreClosed { .. }) => {
                vec!["the store handle was closed; restart the server"]
            }
            Self::Cancelled => vec!["the operation was cancelled before completion"],
            Self::ProjectNotIndexed { .. } => {
                vec!["run `graphkeep index <path>` before querying this workspace"]
            }
            _ => vec![],
        }
    }
}

impl QueryError {
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::ProjectNotIndexed { .. } => {
                vec!["run `graphkeep index <path>` before querying this workspace"]
            }
            Self::SymbolNotFound => vec!["check the file path, line range, or symbol name"],
            _ => vec![],
        }
    }
}

/// Attaches the path that was being read to an I/O error, so callers don't
/// have to thread it through manually.
pub trait ErrorContext<T> {
    fn with_path(self, path: &std::path::Path) -> WorkspaceResult<T>;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_path(self, path: &std::path::Path) -> WorkspaceResult<T> {
        self.map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
