//! Workspace Reader: locates projects inside a workspace, walks files
//! honoring visit patterns, reads file bytes, infers language by extension.

mod manifest;
mod walker;

pub use manifest::{find_projects, Project};
pub use walker::FileWalker;

use std::path::{Path, PathBuf};

use crate::config::VisitPatternConfig;
use crate::error::{ErrorContext, WorkspaceError, WorkspaceResult};
use crate::types::Language;

/// Options controlling `read_file`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// When true, a failure to read one file is reported back to the
    /// caller (batch metrics) rather than raised as an error.
    pub ignore_error: bool,
}

/// True if `workspace` exists and is a directory.
pub fn exists(workspace: &Path) -> bool {
    workspace.is_dir()
}

/// Read a file's bytes, with the `ignore_error` contract this module specifies:
/// when `opts.ignore_error` is true, a read failure returns `Ok(None)`
/// rather than an error, since batch callers fold it into per-file metrics.
pub fn read_file(path: &Path, opts: ReadOptions) -> WorkspaceResult<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) => {
            if opts.ignore_error {
                tracing::warn!(path = %path.display(), error = %e, "failed to read file, skipping");
                Ok(None)
            } else {
                Err(e).with_path(path)
            }
        }
    }
}

/// Detect a file's language from its extension. `None` means
/// `UnsupportedLanguage` to callers that need a hard failure.
pub fn infer_language(path: &Path) -> Option<Language> {
    Language::from_path(path)
}

/// Longest-prefix match of `file_path` against the discovered projects'
/// roots, the grouping rule the indexer's remove/rename path-grouping logic
/// both rely on.
pub fn get_project_by_file_path<'a>(projects: &'a [Project], file_path: &Path) -> Option<&'a Project> {
    projects
        .iter()
        .filter(|p| file_path.starts_with(&p.path))
        .max_by_key(|p| p.path.as_os_str().len())
}

/// Walk `root` honoring `visit_pattern`, invoking `visitor` for every file
/// that passes the filters. Errors from an individual file are reported via
/// the `WorkspaceError` passed to `visitor`'s `Err` arm when
/// `opts.ignore_error` is false; this function itself never aborts on a
/// per-file error, matching this module's "report per file, continue" contract.
pub fn walk(
    root: &Path,
    visit_pattern: &VisitPatternConfig,
    mut visitor: impl FnMut(&Path),
) -> WorkspaceResult<()> {
    if !root.is_dir() {
        return Err(WorkspaceError::WorkspaceNotFound {
            path: root.to_path_buf(),
        });
    }
    let walker = FileWalker::new(visit_pattern.clone());
    for path in walker.walk(root) {
        visitor(&path);
    }
    Ok(())
}

/// Collect every candidate source path under `root` in one pass, used by
/// the orchestrator's single-walk step before parsing begins.
pub fn collect_files(root: &Path, visit_pattern: &VisitPatternConfig) -> WorkspaceResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(root, visit_pattern, |p| files.push(p.to_path_buf()))?;
    Ok(files)
}

/// Normalize a path to a forward-slash, workspace-relative string, the
/// canonical form stored in `FileElementTable::path` and store keys.
pub fn normalize_path(workspace: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(workspace).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

/// One node of a `list_directory` tree, returned to the HTTP layer's
/// `/codebases/directory` route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub children: Vec<DirectoryEntry>,
}

/// List `root`'s immediate tree up to `max_depth` levels, honoring
/// `visit_pattern`'s excluded directories. `include_files` controls whether
/// plain files appear alongside directories; depth 0 lists only `root`'s
/// direct children.
pub fn list_directory(
    root: &Path,
    visit_pattern: &VisitPatternConfig,
    max_depth: usize,
    include_files: bool,
) -> WorkspaceResult<Vec<DirectoryEntry>> {
    if !root.is_dir() {
        return Err(WorkspaceError::WorkspaceNotFound { path: root.to_path_buf() });
    }
    list_directory_inner(root, visit_pattern, max_depth, include_files)
}

fn list_directory_inner(
    dir: &Path,
    visit_pattern: &VisitPatternConfig,
    depth_remaining: usize,
    include_files: bool,
) -> WorkspaceResult<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    let mut read: Vec<_> = std::fs::read_dir(dir).with_path(dir)?.filter_map(Result::ok).collect();
    read.sort_by_key(|e| e.file_name());

    for entry in read {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().with_path(&path)?.is_dir();

        if is_dir {
            if visit_pattern.exclude_dirs.iter().any(|d| d == &name) {
                continue;
            }
            let children = if depth_remaining == 0 {
                Vec::new()
            } else {
                list_directory_inner(&path, visit_pattern, depth_remaining - 1, include_files)?
            };
            entries.push(DirectoryEntry { name, path, is_dir: true, children });
        } else if include_files {
            entries.push(DirectoryEntry { name, path, is_dir: false, children: Vec::new() });
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn normalize_path_uses_forward_slashes() {
        let ws = Path::new("/workspace");
        let p = Path::new("/workspace/src/main.rs");
        assert_eq!(normalize_path(ws, p), "src/main.rs");
    }

    #[test]
    fn get_project_by_file_path_picks_longest_prefix() {
        let projects = vec![
            Project {
                uuid: "outer".into(),
                path: PathBuf::from("/ws"),
                language: Language::Rust,
                source_roots: vec![PathBuf::from("/ws")],
            },
            Project {
                uuid: "inner".into(),
                path: PathBuf::from("/ws/crates/sub"),
                language: Language::Rust,
                source_roots: vec![PathBuf::from("/ws/crates/sub")],
            },
        ];
        let found = get_project_by_file_path(&projects, Path::new("/ws/crates/sub/src/lib.rs"));
        assert_eq!(found.unwrap().uuid, "inner");
    }

    #[test]
    fn walk_reports_workspace_not_found() {
        let result = walk(Path::new("/nonexistent/path/xyz"), &VisitPatternConfig::default(), |_| {});
        assert!(matches!(result, Err(WorkspaceError::WorkspaceNotFound { .. })));
    }

    #[test]
    fn collect_files_respects_extensions_and_excludes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("README.md"), "hi").unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/x.rs"), "fn x(){}").unwrap();

        let files = collect_files(dir.path(), &VisitPatternConfig::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.rs"));
    }

    #[test]
    fn list_directory_respects_depth_and_include_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main(){}").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/inner.rs"), "fn inner(){}").unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();

        let top = list_directory(dir.path(), &VisitPatternConfig::default(), 0, true).unwrap();
        let sub_entry = top.iter().find(|e| e.name == "sub").unwrap();
        assert!(sub_entry.children.is_empty());
        assert!(!top.iter().any(|e| e.name == "node_modules"));

        let no_files = list_directory(dir.path(), &VisitPatternConfig::default(), 2, false).unwrap();
        assert!(no_files.iter().all(|e| e.is_dir));
    }
}
