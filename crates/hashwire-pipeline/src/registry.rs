//! Single-slot registry for the active pipeline run.
//!
//! At most one run is observable at a time. Starting while a run is not
//! done returns the existing run. Once `done` is set the run is frozen:
//! further log lines and completions are ignored. The handle is cheap to
//! clone and is shared between the service and the run task.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use hashwire_core::HashwireError;
use serde::Serialize;
use uuid::Uuid;

use crate::orchestrator::RunResult;
use crate::sequencer::{CancelFlag, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(Uuid),
    AlreadyActive(Uuid),
}

impl StartOutcome {
    pub fn run_id(&self) -> Uuid {
        match self {
            StartOutcome::Started(id) | StartOutcome::AlreadyActive(id) => *id,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }

    /// The new run's id, or [`HashwireError::RunAlreadyActive`] naming the active one.
    pub fn into_result(self) -> hashwire_core::Result<Uuid> {
        match self {
            StartOutcome::Started(id) => Ok(id),
            StartOutcome::AlreadyActive(id) => Err(HashwireError::RunAlreadyActive(id)),
        }
    }
}

/// Observable state of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub run_id: Uuid,
    pub logs: Vec<String>,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Slot {
    state: RunState,
    cancel: CancelFlag,
}

#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    slot: Arc<Mutex<Option<Slot>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slot<R>(&self, f: impl FnOnce(&mut Option<Slot>) -> R) -> R {
        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Begin a new run unless one is active.
    ///
    /// A finished run is replaced; an active one is left untouched.
    pub fn start(&self) -> StartOutcome {
        self.with_slot(|slot| {
            if let Some(active) = slot.as_ref().filter(|s| !s.state.done) {
                return StartOutcome::AlreadyActive(active.state.run_id);
            }
            let run_id = Uuid::new_v4();
            *slot = Some(Slot {
                state: RunState {
                    run_id,
                    logs: Vec::new(),
                    done: false,
                    result: None,
                    started_at: Utc::now(),
                },
                cancel: CancelFlag::new(),
            });
            StartOutcome::Started(run_id)
        })
    }

    /// Append a progress line. Returns false if `run_id` is not the active run.
    pub fn append_log(&self, run_id: Uuid, line: impl Into<String>) -> bool {
        self.with_slot(|slot| match slot {
            Some(s) if s.state.run_id == run_id && !s.state.done => {
                s.state.logs.push(line.into());
                true
            }
            _ => false,
        })
    }

    /// Store the result and mark the run done. Only the first call for a run wins.
    pub fn complete(&self, run_id: Uuid, result: RunResult) -> bool {
        self.with_slot(|slot| match slot {
            Some(s) if s.state.run_id == run_id && !s.state.done => {
                s.state.result = Some(result);
                s.state.done = true;
                true
            }
            _ => false,
        })
    }

    pub fn read(&self, run_id: Uuid) -> Option<RunState> {
        self.with_slot(|slot| {
            slot.as_ref()
                .filter(|s| s.state.run_id == run_id)
                .map(|s| s.state.clone())
        })
    }

    /// State of the run currently in the slot, finished or not.
    pub fn read_current(&self) -> Option<RunState> {
        self.with_slot(|slot| slot.as_ref().map(|s| s.state.clone()))
    }

    pub fn cancel_flag(&self, run_id: Uuid) -> Option<CancelFlag> {
        self.with_slot(|slot| {
            slot.as_ref()
                .filter(|s| s.state.run_id == run_id)
                .map(|s| s.cancel.clone())
        })
    }

    /// Request cooperative cancellation of the active run, returning its id.
    pub fn request_cancel(&self) -> Option<Uuid> {
        self.with_slot(|slot| {
            slot.as_ref().filter(|s| !s.state.done).map(|s| {
                s.cancel.cancel();
                s.state.run_id
            })
        })
    }

    /// Progress sink writing into this registry's log for `run_id`.
    pub fn sink(&self, run_id: Uuid) -> Arc<dyn ProgressSink> {
        Arc::new(RegistrySink {
            registry: self.clone(),
            run_id,
        })
    }
}

struct RegistrySink {
    registry: RunRegistry,
    run_id: Uuid,
}

impl ProgressSink for RegistrySink {
    fn log(&self, line: String) {
        self.registry.append_log(self.run_id, line);
    }
}
