//! Parallel batch driver
//!
//! Fans document work out across a rayon pool in fixed-size chunks while
//! re-emitting results in input order. Statistics are updated under a
//! single lock at chunk boundaries, not per document, to keep contention
//! bounded.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::{Error, Result};

/// Cooperative cancellation token checked between documents.
/// In-flight documents run to completion.
pub type CancelToken = Arc<AtomicBool>;

/// Batch driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Documents per chunk
    pub chunk_size: usize,
    /// Worker threads; 0 uses the available parallelism
    pub num_threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            num_threads: 0,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be positive".into()));
        }
        Ok(())
    }
}

/// Counters for one batch run, exact once the run completes
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub total: usize,
    pub processed: usize,
    pub chunks_completed: usize,
    pub elapsed: Duration,
}

/// Outcome of a batch run. On cancellation `results` holds the ordered
/// prefix that completed before the stop was observed.
#[derive(Debug)]
pub struct BatchRun<R> {
    pub results: Vec<R>,
    pub cancelled: bool,
    pub stats: BatchStats,
}

/// Progress callback: `(processed, total, stats)`. Invoked on a worker
/// thread at chunk boundaries; must not block.
pub type BatchProgress<'a> = &'a (dyn Fn(usize, usize, &BatchStats) + Sync);

/// Order-preserving parallel batch driver
pub struct BatchDriver {
    config: BatchConfig,
    pool: Option<rayon::ThreadPool>,
}

impl BatchDriver {
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        let pool = if config.num_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.num_threads)
                .build()
                .map_err(|e| Error::InvalidConfig(format!("thread pool: {e}")))?;
            info!("Batch driver using {} dedicated threads", config.num_threads);
            Some(pool)
        } else {
            None
        };
        Ok(Self { config, pool })
    }

    /// Apply `op` to every item, returning results in input order.
    ///
    /// `op` receives the item's input index so callers can key
    /// per-document diagnostics without threading state through.
    pub fn run<T, R, F>(
        &self,
        items: &[T],
        op: F,
        progress: Option<BatchProgress<'_>>,
        cancel: Option<&CancelToken>,
    ) -> BatchRun<R>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> R + Sync,
    {
        let start = Instant::now();
        let stats = Mutex::new(BatchStats {
            total: items.len(),
            ..Default::default()
        });
        let mut results: Vec<R> = Vec::with_capacity(items.len());
        let mut cancelled = false;

        'outer: for (chunk_idx, chunk) in items.chunks(self.config.chunk_size).enumerate() {
            if is_cancelled(cancel) {
                cancelled = true;
                break;
            }

            let base = chunk_idx * self.config.chunk_size;
            let chunk_results: Vec<Option<R>> = self.install(|| {
                chunk
                    .par_iter()
                    .enumerate()
                    .map(|(offset, item)| {
                        if is_cancelled(cancel) {
                            return None;
                        }
                        Some(op(base + offset, item))
                    })
                    .collect()
            });

            // Flush the ordered prefix; a None means cancellation was
            // observed mid-chunk and everything after it is discarded.
            let mut flushed = 0usize;
            for result in chunk_results {
                match result {
                    Some(r) => {
                        results.push(r);
                        flushed += 1;
                    }
                    None => {
                        cancelled = true;
                        update_stats(&stats, flushed, start);
                        break 'outer;
                    }
                }
            }

            let snapshot = update_stats(&stats, flushed, start);
            debug!(
                "Chunk {} complete: {}/{} documents",
                chunk_idx, snapshot.processed, snapshot.total
            );
            if let Some(cb) = progress {
                cb(snapshot.processed, snapshot.total, &snapshot);
            }
        }

        let mut final_stats = stats.into_inner().unwrap();
        final_stats.elapsed = start.elapsed();
        BatchRun {
            results,
            cancelled,
            stats: final_stats,
        }
    }

    fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

fn is_cancelled(cancel: Option<&CancelToken>) -> bool {
    cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false)
}

fn update_stats(stats: &Mutex<BatchStats>, flushed: usize, start: Instant) -> BatchStats {
    let mut guard = stats.lock().unwrap();
    guard.processed += flushed;
    guard.chunks_completed += 1;
    guard.elapsed = start.elapsed();
    guard.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_order_preserved() {
        let driver = BatchDriver::new(BatchConfig {
            chunk_size: 7,
            num_threads: 4,
        })
        .unwrap();

        let items: Vec<usize> = (0..100).collect();
        let run = driver.run(&items, |idx, &item| (idx, item * 2), None, None);

        assert!(!run.cancelled);
        assert_eq!(run.results.len(), 100);
        for (i, &(idx, doubled)) in run.results.iter().enumerate() {
            assert_eq!(idx, i);
            assert_eq!(doubled, i * 2);
        }
    }

    #[test]
    fn test_stats_exact_at_end() {
        let driver = BatchDriver::new(BatchConfig {
            chunk_size: 10,
            num_threads: 0,
        })
        .unwrap();

        let items: Vec<u32> = (0..25).collect();
        let run = driver.run(&items, |_, &x| x, None, None);

        assert_eq!(run.stats.total, 25);
        assert_eq!(run.stats.processed, 25);
        assert_eq!(run.stats.chunks_completed, 3);
    }

    #[test]
    fn test_progress_at_chunk_boundaries() {
        let driver = BatchDriver::new(BatchConfig {
            chunk_size: 10,
            num_threads: 0,
        })
        .unwrap();

        let calls = AtomicUsize::new(0);
        let items: Vec<u32> = (0..30).collect();
        driver.run(
            &items,
            |_, &x| x,
            Some(&|processed, total, _stats| {
                calls.fetch_add(1, Ordering::Relaxed);
                assert!(processed <= total);
            }),
            None,
        );
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_cancellation_returns_prefix() {
        let driver = BatchDriver::new(BatchConfig {
            chunk_size: 5,
            num_threads: 2,
        })
        .unwrap();

        let cancel: CancelToken = Arc::new(AtomicBool::new(false));
        let items: Vec<usize> = (0..1000).collect();
        let seen = AtomicUsize::new(0);

        let run = driver.run(
            &items,
            |idx, &item| {
                if seen.fetch_add(1, Ordering::Relaxed) >= 20 {
                    cancel.store(true, Ordering::Relaxed);
                }
                (idx, item)
            },
            None,
            Some(&cancel),
        );

        assert!(run.cancelled);
        assert!(run.results.len() < 1000);
        // flushed prefix stays in input order
        for (i, &(idx, _)) in run.results.iter().enumerate() {
            assert_eq!(idx, i);
        }
    }

    #[test]
    fn test_pre_cancelled_runs_nothing() {
        let driver = BatchDriver::new(BatchConfig::default()).unwrap();
        let cancel: CancelToken = Arc::new(AtomicBool::new(true));
        let run = driver.run(&[1, 2, 3], |_, &x| x, None, Some(&cancel));
        assert!(run.cancelled);
        assert!(run.results.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let driver = BatchDriver::new(BatchConfig::default()).unwrap();
        let run = driver.run(&[] as &[u32], |_, &x| x, None, None);
        assert!(!run.cancelled);
        assert!(run.results.is_empty());
        assert_eq!(run.stats.total, 0);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(BatchDriver::new(BatchConfig {
            chunk_size: 0,
            num_threads: 0,
        })
        .is_err());
    }
}
