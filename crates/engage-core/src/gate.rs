use crate::clock::{Millis, Scheduler, Timer, TimerHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    Holding { since: Millis },
}

/// Why a hold ended before it completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Release {
    PointerUp,
    PointerLeave,
    TouchEnd,
    TouchCancel,
}

/// Long-press detector guarding the hidden feature.
///
/// A press arms a hold timer; any release before it elapses discards the
/// hold. When the timer elapses the gate fires once and returns to idle, so
/// a release arriving afterwards has nothing to cancel.
#[derive(Debug)]
pub struct HiddenFeatureGate {
    hold_ms: Millis,
    phase: GatePhase,
    timer: Option<TimerHandle>,
    fired: u32,
}

impl HiddenFeatureGate {
    pub fn new(hold_ms: Millis) -> Self {
        Self {
            hold_ms,
            phase: GatePhase::Idle,
            timer: None,
            fired: 0,
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    pub fn is_holding(&self) -> bool {
        matches!(self.phase, GatePhase::Holding { .. })
    }

    /// Number of times the gate has fired during this load.
    pub fn times_fired(&self) -> u32 {
        self.fired
    }

    /// Pointer-down or touch-start on the target. A press while a hold is
    /// already in flight is ignored; returns `true` only when a hold starts.
    pub fn press(&mut self, sched: &mut impl Scheduler<Timer>) -> bool {
        if self.is_holding() {
            tracing::debug!("press ignored, hold already in progress");
            return false;
        }
        let since = sched.now();
        self.timer = Some(sched.after(self.hold_ms, Timer::Hold));
        self.phase = GatePhase::Holding { since };
        tracing::debug!(since, "hold started");
        true
    }

    /// End the hold early. Returns `true` if a hold was discarded.
    pub fn release(&mut self, reason: Release, sched: &mut impl Scheduler<Timer>) -> bool {
        let GatePhase::Holding { since } = self.phase else {
            return false;
        };
        if let Some(h) = self.timer.take() {
            sched.cancel(h);
        }
        self.phase = GatePhase::Idle;
        tracing::debug!(?reason, held_ms = sched.now().saturating_sub(since), "hold discarded");
        true
    }

    /// Hold timer elapsed. Returns `true` when the gate fires.
    pub fn on_hold_elapsed(&mut self, handle: TimerHandle) -> bool {
        if self.timer != Some(handle) || !self.is_holding() {
            return false;
        }
        self.timer = None;
        self.phase = GatePhase::Idle;
        self.fired += 1;
        tracing::info!("hidden feature gate fired");
        true
    }

    pub fn teardown(&mut self, sched: &mut impl Scheduler<Timer>) {
        if let Some(h) = self.timer.take() {
            sched.cancel(h);
        }
        self.phase = GatePhase::Idle;
    }
}
