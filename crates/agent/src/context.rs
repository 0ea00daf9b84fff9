//! Run context: the per-run state a code-act agent steps against.
//!
//! A run moves `Idle → Stepping → AwaitingToolResults → (Stepping …) →
//! Finalized`. Calls that do not fit the current phase fail with a
//! [`ProtocolError`]. A step that fails or is dropped part-way puts the
//! phase back where it was.

use std::sync::{Arc, Mutex, MutexGuard};

use codeact_core::error::ProtocolError;
use codeact_core::event::EventBus;
use codeact_core::store::{RunId, ScratchpadStore};

use crate::scratchpad::Scratchpad;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No step has run yet.
    Idle,
    /// A step is in flight.
    Stepping,
    /// A step output was handed out; tool results may arrive.
    AwaitingToolResults,
    /// The scratchpad was flushed; the run is over.
    Finalized,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Stepping => "stepping",
            Self::AwaitingToolResults => "awaiting_tool_results",
            Self::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

pub struct RunContext {
    run_id: RunId,
    scratchpads: Arc<dyn ScratchpadStore>,
    events: Arc<EventBus>,
    phase: Mutex<RunPhase>,
}

impl RunContext {
    /// A context for a fresh run.
    pub fn new(scratchpads: Arc<dyn ScratchpadStore>, events: Arc<EventBus>) -> Self {
        Self::with_run_id(RunId::new(), scratchpads, events)
    }

    pub fn with_run_id(run_id: RunId, scratchpads: Arc<dyn ScratchpadStore>, events: Arc<EventBus>) -> Self {
        Self {
            run_id,
            scratchpads,
            events,
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn phase(&self) -> RunPhase {
        *self.lock()
    }

    /// The scratchpad slot `key` of this run.
    pub fn scratchpad(&self, key: &str) -> Scratchpad {
        Scratchpad::new(self.scratchpads.clone(), self.run_id.clone(), key)
    }

    fn lock(&self) -> MutexGuard<'_, RunPhase> {
        // The phase is a Copy value; a poisoned lock still holds a valid one.
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn busy(&self, phase: RunPhase) -> Option<ProtocolError> {
        match phase {
            RunPhase::Stepping => Some(ProtocolError::StepInProgress {
                run_id: self.run_id.to_string(),
            }),
            RunPhase::Finalized => Some(ProtocolError::RunFinalized {
                run_id: self.run_id.to_string(),
            }),
            _ => None,
        }
    }

    /// Enter `Stepping`. The guard restores the previous phase unless
    /// committed.
    pub(crate) fn begin_step(&self) -> Result<PhaseGuard<'_>, ProtocolError> {
        self.transition(RunPhase::Stepping)
    }

    /// Enter `Stepping` to finalize; commit with `Finalized`.
    pub(crate) fn begin_finalize(&self) -> Result<PhaseGuard<'_>, ProtocolError> {
        self.transition(RunPhase::Stepping)
    }

    fn transition(&self, to: RunPhase) -> Result<PhaseGuard<'_>, ProtocolError> {
        let mut phase = self.lock();
        if let Some(err) = self.busy(*phase) {
            return Err(err);
        }
        let previous = *phase;
        *phase = to;
        Ok(PhaseGuard {
            ctx: self,
            previous,
            committed: false,
        })
    }

    /// Tool results are only accepted after a step has handed out its output.
    pub(crate) fn begin_tool_results(&self) -> Result<PhaseGuard<'_>, ProtocolError> {
        let mut phase = self.lock();
        if *phase != RunPhase::AwaitingToolResults {
            return Err(ProtocolError::UnexpectedToolResults {
                phase: phase.to_string(),
            });
        }
        *phase = RunPhase::Stepping;
        Ok(PhaseGuard {
            ctx: self,
            previous: RunPhase::AwaitingToolResults,
            committed: false,
        })
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("scratchpads", &self.scratchpads.name())
            .field("phase", &self.phase())
            .finish()
    }
}

/// Holds a run in a transitional phase.
#[must_use = "dropping the guard reverts the phase"]
pub(crate) struct PhaseGuard<'a> {
    ctx: &'a RunContext,
    previous: RunPhase,
    committed: bool,
}

impl PhaseGuard<'_> {
    pub(crate) fn commit(mut self, next: RunPhase) {
        *self.ctx.lock() = next;
        self.committed = true;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            *self.ctx.lock() = self.previous;
        }
    }
}
