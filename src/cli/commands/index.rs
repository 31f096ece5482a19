//! `index`, `add`, `remove`, `rename`, `clean` commands: direct CLI
//! entry points into the indexer orchestrator, each building its own
//! short-lived `Indexer` over the configured store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::indexer::{Indexer, IndexerContext};
use crate::store::RocksStore;

fn build_indexer(settings: &Settings) -> Indexer {
    let store = Arc::new(RocksStore::new(settings.store_path.clone()));
    let context = Arc::new(IndexerContext::new(store, settings.visit_pattern.clone(), settings.indexing.clone()));
    Indexer::new(context)
}

pub fn run_index(settings: &Settings, path: &Path) {
    let indexer = build_indexer(settings);
    match indexer.index_workspace(path) {
        Ok(report) => {
            println!("indexed {} files, {} failed", report.total_files, report.total_failed);
            for failed in &report.failed_paths {
                eprintln!("  failed: {failed}");
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

pub fn run_add(settings: &Settings, workspace: &Path, paths: &[PathBuf]) {
    let indexer = build_indexer(settings);
    match indexer.index_files(workspace, paths) {
        Ok(report) => println!("indexed {} files, {} failed", report.total_files, report.total_failed),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

pub fn run_remove(settings: &Settings, workspace: &Path, paths: &[PathBuf]) {
    let indexer = build_indexer(settings);
    if let Err(e) = indexer.remove_indexes(workspace, paths) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    println!("removed {} path(s) from the index", paths.len());
}

pub fn run_rename(settings: &Settings, workspace: &Path, src: &Path, dst: &Path) {
    let indexer = build_indexer(settings);
    if let Err(e) = indexer.rename_indexes(workspace, src, dst) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    println!("renamed '{}' -> '{}' in the index", src.display(), dst.display());
}

pub fn run_clean(settings: &Settings, workspace: &Path) {
    let indexer = build_indexer(settings);
    if let Err(e) = indexer.remove_all_indexes(workspace) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    println!("cleared every index under '{}'", workspace.display());
}
