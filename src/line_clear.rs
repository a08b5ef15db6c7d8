//! Timed line-clear pipeline: Cracking → Clearing → Sweeping → Idle.
//!
//! The machine only tracks phase and time. The caller applies each transition's
//! effect (spawning debris, blanking rows, sweeping) to the grid it owns.

/// Delay from lock (Cracking) to the shatter (Clearing), ms.
pub const CRACK_DELAY_MS: u64 = 200;
/// Delay from the shatter to the sweep, ms.
pub const SETTLE_DELAY_MS: u64 = 1300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineClearPhase {
    #[default]
    Idle,
    Cracking,
    Clearing,
    Sweeping,
}

/// Transition the caller must apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Spawn debris for the marked rows, then blank them.
    Shatter,
    /// Remove the marked rows and score them; call [`LineClear::finish`] afterwards.
    Sweep,
}

#[derive(Debug, Clone, Default)]
pub struct LineClear {
    phase: LineClearPhase,
    rows: Vec<usize>,
    elapsed_ms: u64,
}

impl LineClear {
    #[inline]
    pub fn phase(&self) -> LineClearPhase {
        self.phase
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.phase == LineClearPhase::Idle
    }

    /// Rows pending removal, top to bottom.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Enter Cracking for `rows`. Ignored when `rows` is empty.
    pub fn begin(&mut self, mut rows: Vec<usize>) {
        if rows.is_empty() {
            return;
        }
        rows.sort_unstable();
        rows.dedup();
        self.rows = rows;
        self.phase = LineClearPhase::Cracking;
        self.elapsed_ms = 0;
    }

    /// Add `dt_ms` to the phase clock without transitioning.
    pub fn elapse(&mut self, dt_ms: u64) {
        if !self.is_idle() {
            self.elapsed_ms += dt_ms;
        }
    }

    /// Re-check the phase clock; returns at most one due transition.
    /// Time past a deadline carries into the next phase, so call repeatedly
    /// until `None` after a large step.
    pub fn poll(&mut self) -> Option<Transition> {
        match self.phase {
            LineClearPhase::Cracking if self.elapsed_ms >= CRACK_DELAY_MS => {
                self.elapsed_ms -= CRACK_DELAY_MS;
                self.phase = LineClearPhase::Clearing;
                Some(Transition::Shatter)
            }
            LineClearPhase::Clearing if self.elapsed_ms >= SETTLE_DELAY_MS => {
                self.elapsed_ms = 0;
                self.phase = LineClearPhase::Sweeping;
                Some(Transition::Sweep)
            }
            _ => None,
        }
    }

    /// Sweep applied; back to Idle.
    pub fn finish(&mut self) -> Vec<usize> {
        self.phase = LineClearPhase::Idle;
        self.elapsed_ms = 0;
        std::mem::take(&mut self.rows)
    }

    /// Drop any pending phase without applying it.
    pub fn cancel(&mut self) {
        self.phase = LineClearPhase::Idle;
        self.elapsed_ms = 0;
        self.rows.clear();
    }
}
