//! Adaptive concurrency and batch-size tiering for the full workspace index.
//! Pure functions, unit-tested in isolation from the orchestration they feed.

/// Tiered worker-pool size, scaled down by the observed load factor.
///
/// `cpu` is the logical core count, `active_tasks` the number of indexing
/// tasks already running process-wide. The 0.3..0.5 scale-down range is
/// fixed at 0.4 here; see DESIGN.md for why a midpoint was chosen over a
/// configurable knob.
pub fn effective_concurrency(total_files: usize, config_parallelism: usize, active_tasks: usize, cpu: usize) -> usize {
    let cpu = cpu.max(1);
    let base = if total_files < 50 {
        (config_parallelism.min(cpu / 2)).max(1)
    } else if total_files < 200 {
        (config_parallelism.min(cpu)).max(2)
    } else {
        (config_parallelism.min(cpu * 2)).max(2)
    };

    let load_factor = active_tasks as f64 / (cpu as f64 * 10.0);
    let scale = 1.0 - (0.4 * load_factor.min(1.0));
    ((base as f64 * scale).floor() as usize).max(1)
}

/// Tiered batch size for partitioning files submitted to the worker pool.
pub fn effective_batch_size(total_files: usize, config_batch_size: usize) -> usize {
    if total_files < 50 {
        (config_batch_size / 2).max(1)
    } else if total_files < 200 {
        config_batch_size.max(1)
    } else {
        (config_batch_size * 2).min(50).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_tiers_by_total_files() {
        assert_eq!(effective_concurrency(10, 8, 0, 8), 4);
        assert_eq!(effective_concurrency(100, 8, 0, 8), 8);
        assert_eq!(effective_concurrency(500, 16, 0, 8), 16);
    }

    #[test]
    fn concurrency_scales_down_under_load() {
        let idle = effective_concurrency(500, 16, 0, 8);
        let busy = effective_concurrency(500, 16, 80, 8);
        assert!(busy < idle);
        assert!(busy >= 1);
    }

    #[test]
    fn batch_size_tiers_by_total_files() {
        assert_eq!(effective_batch_size(10, 25), 12);
        assert_eq!(effective_batch_size(100, 25), 25);
        assert_eq!(effective_batch_size(500, 25), 50);
        assert_eq!(effective_batch_size(500, 10), 20);
    }

    #[test]
    fn batch_size_never_zero() {
        assert_eq!(effective_batch_size(1, 0), 1);
    }
}
