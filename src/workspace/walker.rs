//! Directory traversal honoring a visit pattern: extension filtering,
//! basename-matched directory exclusion, gitignore rules, and a max file
//! size cutoff.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::config::VisitPatternConfig;

const LOCAL_IGNORE_FILE: &str = ".graphkeep-ignore";

pub struct FileWalker {
    visit_pattern: VisitPatternConfig,
}

impl FileWalker {
    pub fn new(visit_pattern: VisitPatternConfig) -> Self {
        Self { visit_pattern }
    }

    /// Walk `root`, returning every file that passes the visit pattern.
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .max_depth(None)
            .require_git(false)
            .add_custom_ignore_filename(LOCAL_IGNORE_FILE);

        let exclude_dirs = self.visit_pattern.exclude_dirs.clone();
        builder.filter_entry(move |entry| {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let basename = entry.file_name().to_string_lossy();
                return !exclude_dirs.iter().any(|d| d == basename.as_ref());
            }
            true
        });

        let max_bytes = self.visit_pattern.max_file_bytes;
        let include_exts = self.visit_pattern.include_exts.clone();

        builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .filter_map(move |entry| {
                let path = entry.path();

                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with('.') {
                        return None;
                    }
                }

                if !include_exts.is_empty() {
                    let ext_ok = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(|e| include_exts.iter().any(|ie| ie.eq_ignore_ascii_case(e)))
                        .unwrap_or(false);
                    if !ext_ok {
                        return None;
                    }
                }

                if let Ok(metadata) = entry.metadata() {
                    if metadata.len() > max_bytes {
                        return None;
                    }
                }

                Some(path.to_path_buf())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pattern() -> VisitPatternConfig {
        VisitPatternConfig {
            include_exts: vec!["rs".into()],
            exclude_dirs: vec!["node_modules".into(), ".git".into()],
            max_file_bytes: 1024 * 1024,
        }
    }

    #[test]
    fn filters_by_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.rs"), "fn a(){}").unwrap();
        fs::write(dir.path().join("b.py"), "def b(): pass").unwrap();

        let walker = FileWalker::new(pattern());
        let files: Vec<_> = walker.walk(dir.path()).collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.rs"));
    }

    #[test]
    fn skips_excluded_dir_by_basename() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/x.rs"), "fn x(){}").unwrap();
        fs::write(dir.path().join("kept.rs"), "fn k(){}").unwrap();

        let walker = FileWalker::new(pattern());
        let files: Vec<_> = walker.walk(dir.path()).collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("kept.rs"));
    }

    #[test]
    fn skips_files_above_max_bytes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("small.rs"), "fn a(){}").unwrap();

        let mut p = pattern();
        p.max_file_bytes = 2;
        let walker = FileWalker::new(p);
        let files: Vec<_> = walker.walk(dir.path()).collect();
        assert!(files.is_empty());
    }

    #[test]
    fn empty_include_exts_accepts_everything() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.rs"), "fn a(){}").unwrap();
        fs::write(dir.path().join("b.py"), "x = 1").unwrap();

        let mut p = pattern();
        p.include_exts.clear();
        let walker = FileWalker::new(p);
        let files: Vec<_> = walker.walk(dir.path()).collect();
        assert_eq!(files.len(), 2);
    }
}
