// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Fixed-size worker pool over node batches with first-fault capture.
//!
//! Workers pull the next batch index from a shared atomic counter. The first
//! error any worker returns is kept in a [`FaultSlot`]; once it is set no
//! worker starts another batch, while batches already running finish.

use crate::algo::partition::NodeBatch;
use parking_lot::Mutex;
use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Value a worker panicked with.
///
/// A `&str` or `String` payload becomes the message. A payload that is a
/// `Box<dyn Error + Send + Sync>` is exposed through [`StdError::source`], so
/// `root_cause` style walks reach it. Any other payload is kept as is and can
/// be recovered with [`PanicPayload::take`].
pub struct PanicPayload {
    message: String,
    error: Option<Box<dyn StdError + Send + Sync>>,
    raw: Mutex<Option<Box<dyn Any + Send>>>,
}

impl PanicPayload {
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<Box<dyn StdError + Send + Sync>>() {
            Ok(error) => {
                return Self {
                    message: error.to_string(),
                    error: Some(*error),
                    raw: Mutex::new(None),
                };
            }
            Err(payload) => payload,
        };
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self {
            message,
            error: None,
            raw: Mutex::new(Some(payload)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the retained payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.raw.lock().as_ref().is_some_and(|payload| payload.is::<T>())
    }

    /// Move the payload out if it is a `T`. A payload of another type stays.
    pub fn take<T: Any>(&self) -> Option<Box<T>> {
        let mut raw = self.raw.lock();
        match raw.take()?.downcast::<T>() {
            Ok(value) => Some(value),
            Err(other) => {
                *raw = Some(other);
                None
            }
        }
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicPayload")
            .field("message", &self.message)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for PanicPayload {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error
            .as_deref()
            .map(|error| error as &(dyn StdError + 'static))
    }
}

/// Failure raised by the pool itself rather than by a task.
#[derive(Debug, Error)]
pub enum WorkerFault {
    #[error("Worker panicked while processing nodes {}..{}: {payload}", .batch.start, .batch.end)]
    Panicked {
        batch: NodeBatch,
        #[source]
        payload: PanicPayload,
    },

    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl WorkerFault {
    fn panicked(batch: NodeBatch, payload: Box<dyn Any + Send>) -> Self {
        Self::Panicked {
            batch,
            payload: PanicPayload::new(payload),
        }
    }
}

/// Holds the first fault recorded by any worker.
#[derive(Debug)]
pub struct FaultSlot<E> {
    tripped: AtomicBool,
    fault: Mutex<Option<E>>,
}

impl<E> FaultSlot<E> {
    pub fn new() -> Self {
        Self {
            tripped: AtomicBool::new(false),
            fault: Mutex::new(None),
        }
    }

    /// Keep `fault` if it is the first one. Returns whether it was kept.
    pub fn record(&self, fault: E) -> bool {
        let mut slot = self.fault.lock();
        if slot.is_some() {
            trace!("Discarding fault raised after the first one");
            return false;
        }
        *slot = Some(fault);
        self.tripped.store(true, Ordering::Release);
        true
    }

    /// Whether a fault has been recorded.
    #[inline]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    pub fn into_inner(self) -> Option<E> {
        self.fault.into_inner()
    }
}

impl<E> Default for FaultSlot<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub workers: usize,
    pub batches: usize,
    pub completed: usize,
}

/// Run `task` over every batch on `concurrency` workers.
///
/// Returns the first error any task produced, unchanged. Panics inside a task
/// are caught and reported as [`WorkerFault::Panicked`]. With one worker (or
/// at most one batch) everything runs on the calling thread.
pub fn run_batches<T, E>(concurrency: usize, batches: &[NodeBatch], task: T) -> Result<BatchStats, E>
where
    T: Fn(NodeBatch) -> Result<(), E> + Sync,
    E: From<WorkerFault> + Send,
{
    let workers = concurrency.min(batches.len()).max(1);
    let next = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let faults = FaultSlot::new();

    let worker = || {
        while !faults.is_tripped() {
            let idx = next.fetch_add(1, Ordering::AcqRel);
            let Some(&batch) = batches.get(idx) else {
                break;
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(batch)))
                .unwrap_or_else(|payload| Err(WorkerFault::panicked(batch, payload).into()));
            match outcome {
                Ok(()) => {
                    completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(fault) => {
                    faults.record(fault);
                }
            }
        }
    };

    debug!(workers, batches = batches.len(), "Dispatching batches");
    if workers == 1 {
        worker();
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("strand-worker-{i}"))
            .build()
            .map_err(WorkerFault::from)?;
        pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| worker());
            }
        });
    }

    let stats = BatchStats {
        workers,
        batches: batches.len(),
        completed: completed.into_inner(),
    };
    if let Some(fault) = faults.into_inner() {
        warn!(
            completed = stats.completed,
            batches = stats.batches,
            "Batch run stopped after a worker fault"
        );
        return Err(fault);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::partition::partition;
    use std::collections::HashSet;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Task(u32),
        Worker(String),
    }

    impl From<WorkerFault> for TestError {
        fn from(fault: WorkerFault) -> Self {
            TestError::Worker(fault.to_string())
        }
    }

    #[test]
    fn test_every_batch_runs_once() {
        let batches = partition(1_000, 7);
        let seen = Mutex::new(Vec::new());
        let stats = run_batches::<_, TestError>(8, &batches, |batch| {
            seen.lock().push(batch.start);
            Ok(())
        })
        .unwrap();

        assert_eq!(stats.completed, batches.len());
        let seen = seen.into_inner();
        let unique: HashSet<u32> = seen.iter().copied().collect();
        assert_eq!(seen.len(), batches.len());
        assert_eq!(unique.len(), batches.len());
    }

    #[test]
    fn test_single_worker_runs_in_order() {
        let batches = partition(10, 2);
        let seen = Mutex::new(Vec::new());
        run_batches::<_, TestError>(1, &batches, |batch| {
            seen.lock().push(batch.start);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen.into_inner(), vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_first_fault_stops_dispatch() {
        let batches = partition(100, 1);
        let started = AtomicUsize::new(0);
        let err = run_batches(1, &batches, |batch| {
            started.fetch_add(1, Ordering::Relaxed);
            if batch.start == 3 {
                Err(TestError::Task(batch.start))
            } else {
                Ok(())
            }
        })
        .unwrap_err();

        assert_eq!(err, TestError::Task(3));
        assert_eq!(started.into_inner(), 4);
    }

    #[test]
    fn test_only_one_fault_surfaces() {
        let batches = partition(64, 1);
        let err = run_batches(4, &batches, |batch| Err(TestError::Task(batch.start))).unwrap_err();
        assert!(matches!(err, TestError::Task(_)));
    }

    #[test]
    fn test_panic_becomes_worker_fault() {
        let batches = partition(4, 1);
        let err = run_batches::<_, TestError>(2, &batches, |batch| {
            if batch.start == 2 {
                panic!("boom");
            }
            Ok(())
        })
        .unwrap_err();
        match err {
            TestError::Worker(message) => {
                assert!(message.contains("boom"));
                assert!(message.contains("2..3"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[derive(Debug, PartialEq)]
    struct Marker(u32);

    #[derive(Debug, Error)]
    #[error("typed fault {0}")]
    struct TypedFault(u32);

    #[test]
    fn test_panic_payload_is_kept() {
        let batches = partition(4, 1);
        let err = run_batches::<_, WorkerFault>(2, &batches, |batch| {
            if batch.start == 1 {
                panic::panic_any(Marker(7));
            }
            Ok(())
        })
        .unwrap_err();
        let WorkerFault::Panicked { batch, payload } = err else {
            panic!("expected a panic fault");
        };
        assert_eq!(batch.start, 1);
        assert_eq!(payload.message(), "non-string panic payload");
        assert!(payload.is::<Marker>());
        assert!(payload.take::<String>().is_none());
        assert_eq!(payload.take::<Marker>().map(|m| *m), Some(Marker(7)));
        assert!(!payload.is::<Marker>());
    }

    #[test]
    fn test_boxed_error_payload_is_the_source() {
        let batches = partition(2, 1);
        let err = run_batches::<_, WorkerFault>(1, &batches, |batch| {
            if batch.start == 0 {
                let fault: Box<dyn StdError + Send + Sync> = Box::new(TypedFault(3));
                panic::panic_any(fault);
            }
            Ok(())
        })
        .unwrap_err();
        let payload = err.source().expect("payload");
        assert_eq!(payload.to_string(), "typed fault 3");
        let typed = payload
            .source()
            .and_then(|e| e.downcast_ref::<TypedFault>())
            .expect("typed fault");
        assert_eq!(typed.0, 3);
    }

    #[test]
    fn test_fault_slot_keeps_first() {
        let slot = FaultSlot::new();
        assert!(!slot.is_tripped());
        assert!(slot.record(1));
        assert!(!slot.record(2));
        assert!(slot.is_tripped());
        assert_eq!(slot.into_inner(), Some(1));
    }

    #[test]
    fn test_no_batches() {
        let stats = run_batches::<_, TestError>(4, &[], |_| Ok(())).unwrap();
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.workers, 1);
    }
}
