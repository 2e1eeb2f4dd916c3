//! Shared suspend/abort coordination for load workers.

use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// What a worker should do after passing the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Continue with the load.
    Proceed,
    /// Abort immediately without loading.
    Abort,
}

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    interrupt_early: bool,
}

/// Gate that lets the host suspend all loading, or drain it.
///
/// While paused, workers block in [`PauseGate::await_runnable`]. Unpausing
/// resumes them; setting `interrupt_early` while paused makes them abort.
/// The interrupt flag has no effect while the gate is open.
#[derive(Debug, Default)]
pub struct PauseGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl PauseGate {
    /// Creates an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if loading is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Returns true if waiters abort instead of resuming.
    #[must_use]
    pub fn is_interrupt_early(&self) -> bool {
        self.state.lock().interrupt_early
    }

    /// Pauses or resumes loading. Resuming wakes every waiter.
    pub fn set_paused(&self, paused: bool) {
        let mut state = self.state.lock();
        if state.paused == paused {
            return;
        }
        state.paused = paused;
        debug!(paused, "Pause gate changed");
        if !paused {
            self.changed.notify_all();
        }
    }

    /// Sets whether paused waiters abort. Wakes every waiter.
    pub fn set_interrupt_early(&self, interrupt: bool) {
        let mut state = self.state.lock();
        state.interrupt_early = interrupt;
        debug!(interrupt, "Pause gate interrupt flag changed");
        if interrupt {
            self.changed.notify_all();
        }
    }

    /// Wakes waiters so they re-check their abort predicate.
    pub fn notify(&self) {
        let _state = self.state.lock();
        self.changed.notify_all();
    }

    /// Blocks while paused.
    ///
    /// Returns [`GateOutcome::Abort`] if interrupt-early is set while paused.
    pub fn await_runnable(&self) -> GateOutcome {
        self.await_runnable_unless(&|| false)
    }

    /// Blocks while paused, also aborting once `should_abort` returns true.
    ///
    /// Callers that flip the predicate must call [`PauseGate::notify`].
    pub fn await_runnable_unless(&self, should_abort: &dyn Fn() -> bool) -> GateOutcome {
        let mut state = self.state.lock();
        while state.paused {
            if state.interrupt_early || should_abort() {
                return GateOutcome::Abort;
            }
            self.changed.wait(&mut state);
        }
        GateOutcome::Proceed
    }
}
