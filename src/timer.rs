//! Periodic timer driven by elapsed milliseconds.

/// Re-armable, cancelable interval. Re-arming discards accumulated time, so an
/// old period never fires against new state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    period_ms: u64,
    accum_ms: u64,
    armed: bool,
}

impl Interval {
    /// A disarmed interval.
    pub const fn idle() -> Self {
        Self {
            period_ms: 0,
            accum_ms: 0,
            armed: false,
        }
    }

    pub fn rearm(&mut self, period_ms: u64) {
        self.period_ms = period_ms.max(1);
        self.accum_ms = 0;
        self.armed = true;
    }

    pub fn cancel(&mut self) {
        self.accum_ms = 0;
        self.armed = false;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[inline]
    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Advance by `dt_ms`; returns how many times the interval fired.
    pub fn tick(&mut self, dt_ms: u64) -> u32 {
        if !self.armed {
            return 0;
        }
        self.accum_ms += dt_ms;
        let fires = self.accum_ms / self.period_ms;
        self.accum_ms %= self.period_ms;
        fires.min(u64::from(u32::MAX)) as u32
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_period() {
        let mut t = Interval::idle();
        t.rearm(100);
        assert_eq!(t.tick(60), 0);
        assert_eq!(t.tick(60), 1);
        assert_eq!(t.tick(250), 2);
    }

    #[test]
    fn cancelled_never_fires() {
        let mut t = Interval::idle();
        t.rearm(10);
        t.cancel();
        assert_eq!(t.tick(1000), 0);
        assert!(!t.is_armed());
    }

    #[test]
    fn rearm_drops_accumulated_time() {
        let mut t = Interval::idle();
        t.rearm(100);
        t.tick(90);
        t.rearm(100);
        assert_eq!(t.tick(20), 0);
    }
}
