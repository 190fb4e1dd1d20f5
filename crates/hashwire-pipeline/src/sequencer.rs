//! Generic batch runner with per-item failure isolation.
//!
//! Items run through an async work function with at most `concurrency` in
//! flight. A failing item is recorded and the batch continues. Cancellation
//! is observed only before an item starts; items already running finish.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, StreamExt};

/// Cooperative cancellation flag shared between a run and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives progress lines, in order.
pub trait ProgressSink: Send + Sync {
    fn log(&self, line: String);
}

/// Sink that keeps lines in memory.
#[derive(Debug, Default)]
pub struct VecSink(Mutex<Vec<String>>);

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ProgressSink for VecSink {
    fn log(&self, line: String) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(line);
    }
}

/// Progress handle given to one item's work.
///
/// Running one item at a time, lines reach the sink immediately. With more
/// in flight they are held per item and released in item order.
#[derive(Clone)]
pub struct ItemLog {
    mode: LogMode,
}

#[derive(Clone)]
enum LogMode {
    Direct(Arc<dyn ProgressSink>),
    Buffered(Arc<Mutex<Vec<String>>>),
}

impl ItemLog {
    pub fn push(&self, line: impl Into<String>) {
        match &self.mode {
            LogMode::Direct(sink) => sink.log(line.into()),
            LogMode::Buffered(buf) => buf
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(line.into()),
        }
    }

    fn drain_into(&self, sink: &dyn ProgressSink) {
        if let LogMode::Buffered(buf) = &self.mode {
            let lines = std::mem::take(&mut *buf.lock().unwrap_or_else(PoisonError::into_inner));
            for line in lines {
                sink.log(line);
            }
        }
    }
}

/// Result of running one batch.
#[derive(Debug)]
pub struct BatchOutcome<T, E> {
    /// Successful outputs, in item order, with their item index.
    pub completed: Vec<(usize, T)>,
    /// Failures, in item order, with their item index.
    pub failures: Vec<(usize, E)>,
    /// Items never started because cancellation was requested.
    pub skipped: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    concurrency: usize,
    cancel: CancelFlag,
}

impl Sequencer {
    pub fn new(cancel: CancelFlag) -> Self {
        Self {
            concurrency: 1,
            cancel,
        }
    }

    /// Maximum items in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run_batch<I, T, E, F, Fut>(
        &self,
        items: Vec<I>,
        sink: Arc<dyn ProgressSink>,
        work: F,
    ) -> BatchOutcome<T, E>
    where
        F: Fn(usize, I, ItemLog) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let buffered = self.concurrency > 1;
        let work = &work;

        let mut results = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| {
                let cancel = self.cancel.clone();
                let log = ItemLog {
                    mode: if buffered {
                        LogMode::Buffered(Arc::new(Mutex::new(Vec::new())))
                    } else {
                        LogMode::Direct(Arc::clone(&sink))
                    },
                };
                async move {
                    if cancel.is_cancelled() {
                        return (index, None, log);
                    }
                    let outcome = work(index, item, log.clone()).await;
                    (index, Some(outcome), log)
                }
            })
            .buffered(self.concurrency);

        let mut outcome = BatchOutcome {
            completed: Vec::new(),
            failures: Vec::new(),
            skipped: 0,
            cancelled: false,
        };
        while let Some((index, result, log)) = results.next().await {
            log.drain_into(sink.as_ref());
            match result {
                Some(Ok(value)) => outcome.completed.push((index, value)),
                Some(Err(err)) => outcome.failures.push((index, err)),
                None => outcome.skipped += 1,
            }
        }
        outcome.cancelled = outcome.skipped > 0 || self.cancel.is_cancelled();
        outcome
    }
}
