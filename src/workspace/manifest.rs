//! Project detection: manifest-file recognition per ecosystem, one
//! detector per language, all implementing a shared trait behind the
//! `find_projects` contract.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::VisitPatternConfig;
use crate::error::WorkspaceResult;
use crate::types::Language;

/// A project discovered inside a workspace: a distinct source root with
/// its own ecosystem manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub uuid: String,
    pub path: PathBuf,
    pub language: Language,
    pub source_roots: Vec<PathBuf>,
}

/// `{manifest filename, primary language}` pairs, checked against every
/// directory's entries in a single workspace walk. Order here is the tie
/// break when two manifests exist in the same directory (first match wins).
const MANIFESTS: &[(&str, Language)] = &[
    ("Cargo.toml", Language::Rust),
    ("go.mod", Language::Go),
    ("package.json", Language::JavaScript),
    ("pyproject.toml", Language::Python),
    ("setup.py", Language::Python),
    ("pom.xml", Language::Java),
    ("build.gradle", Language::Java),
];

/// `basename(project_path) ⊕ "_" ⊕ hex(sha256(absolute_project_path))`,
/// the on-disk directory name a project's store lives under.
pub fn project_uuid(project_path: &Path) -> String {
    let absolute = project_path
        .canonicalize()
        .unwrap_or_else(|_| project_path.to_path_buf());
    let basename = absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());

    let mut hasher = Sha256::new();
    hasher.update(absolute.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();

    format!("{basename}_{hex}")
}

/// Given a workspace, return the list of projects it contains. Order is
/// stable across calls on an unchanged tree (directories are visited in
/// `WalkDir`'s deterministic sorted-by-name order, and manifests are
/// checked in the fixed `MANIFESTS` order).
pub fn find_projects(workspace: &Path, visit_pattern: &VisitPatternConfig) -> WorkspaceResult<Vec<Project>> {
    let mut projects = Vec::new();
    let exclude_dirs = &visit_pattern.exclude_dirs;

    let walker = WalkDir::new(workspace)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.file_type().is_dir() {
                let basename = entry.file_name().to_string_lossy();
                return !exclude_dirs.iter().any(|d| d == basename.as_ref());
            }
            true
        });

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_dir() {
            continue;
        }
        for (manifest_name, language) in MANIFESTS {
            if entry.path().join(manifest_name).is_file() {
                projects.push(Project {
                    uuid: project_uuid(entry.path()),
                    path: entry.path().to_path_buf(),
                    language: *language,
                    source_roots: vec![entry.path().to_path_buf()],
                });
                break;
            }
        }
    }

    // A workspace with no manifest anywhere is itself a single implicit
    // project rooted at the workspace, keyed by whatever language has the
    // most matching files — simplest default: treat the root as Rust-like
    // catch-all only when nothing else was found, so callers always get at
    // least one project to index.
    if projects.is_empty() && workspace.is_dir() {
        projects.push(Project {
            uuid: project_uuid(workspace),
            path: workspace.to_path_buf(),
            language: Language::Rust,
            source_roots: vec![workspace.to_path_buf()],
        });
    }

    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn project_uuid_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let a = project_uuid(dir.path());
        let b = project_uuid(dir.path());
        assert_eq!(a, b);
        assert!(a.contains('_'));
    }

    #[test]
    fn finds_cargo_and_go_projects() {
        let dir = TempDir::new().unwrap();
        let rust_proj = dir.path().join("svc-a");
        let go_proj = dir.path().join("svc-b");
        fs::create_dir_all(&rust_proj).unwrap();
        fs::create_dir_all(&go_proj).unwrap();
        fs::write(rust_proj.join("Cargo.toml"), "[package]\nname=\"a\"").unwrap();
        fs::write(go_proj.join("go.mod"), "module example.com/b\n").unwrap();

        let projects = find_projects(dir.path(), &VisitPatternConfig::default()).unwrap();
        assert_eq!(projects.len(), 2);
        assert!(projects.iter().any(|p| p.language == Language::Rust));
        assert!(projects.iter().any(|p| p.language == Language::Go));
    }

    #[test]
    fn falls_back_to_single_implicit_project() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main(){}").unwrap();

        let projects = find_projects(dir.path(), &VisitPatternConfig::default()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].path, dir.path());
    }

    #[test]
    fn order_is_stable_across_calls() {
        let dir = TempDir::new().unwrap();
        for name in ["z-svc", "a-svc", "m-svc"] {
            let p = dir.path().join(name);
            fs::create_dir_all(&p).unwrap();
            fs::write(p.join("Cargo.toml"), "[package]\nname=\"x\"").unwrap();
        }

        let first = find_projects(dir.path(), &VisitPatternConfig::default()).unwrap();
        let second = find_projects(dir.path(), &VisitPatternConfig::default()).unwrap();
        let first_paths: Vec<_> = first.iter().map(|p| p.path.clone()).collect();
        let second_paths: Vec<_> = second.iter().map(|p| p.path.clone()).collect();
        assert_eq!(first_paths, second_paths);
    }
}
