//! Thread pool construction for the parallel solve paths
use rayon::ThreadPool;

/// Build a pool with `processes` worker threads (at least one)
pub(crate) fn build_pool(processes: usize) -> Result<ThreadPool, String> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(processes.max(1))
        .build()
        .map_err(|e| format!("failed to build thread pool: {}", e))
}
