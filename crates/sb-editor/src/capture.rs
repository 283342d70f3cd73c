//! Change capture: mutation batches → debounced snapshot emissions.
//!
//! Timers are modeled as deadlines on a millisecond clock supplied by the
//! caller (`Date.now()` in the browser), so the whole pipeline runs
//! deterministically under test. The host arranges to call `poll` once the
//! reported deadline has passed.

use sb_core::model::CanvasMutation;

/// Leading + trailing debounce.
///
/// With `leading` set, the first call ever fires immediately. Every later
/// call (re)arms a trailing deadline `delay` ms ahead; `poll` fires once
/// when the quiet period has elapsed.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: f64,
    leading: bool,
    deadline: Option<f64>,
}

impl Debounce {
    pub fn new(delay_ms: u32, leading: bool) -> Self {
        Self {
            delay: f64::from(delay_ms),
            leading,
            deadline: None,
        }
    }

    /// Register a call. Returns `true` when it fires immediately.
    pub fn call(&mut self, now: f64) -> bool {
        if self.leading {
            self.leading = false;
            return true;
        }
        self.deadline = Some(now + self.delay);
        false
    }

    /// Fire the trailing edge if its deadline has passed.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Outcome of a throttled call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Run now.
    Fire,
    /// Accepted; runs when the window elapses.
    Scheduled,
    /// A call is already pending in this window.
    Dropped,
}

/// Throttle: the first call fires at once, then at most one call per window
/// is accepted and fires when the window closes.
#[derive(Debug, Clone)]
pub struct Throttle {
    window: f64,
    leading: bool,
    pending: Option<f64>,
}

impl Throttle {
    pub fn new(window_ms: u32, leading: bool) -> Self {
        Self {
            window: f64::from(window_ms),
            leading,
            pending: None,
        }
    }

    pub fn call(&mut self, now: f64) -> ThrottleDecision {
        if self.leading {
            self.leading = false;
            return ThrottleDecision::Fire;
        }
        if self.pending.is_some() {
            return ThrottleDecision::Dropped;
        }
        self.pending = Some(now + self.window);
        ThrottleDecision::Scheduled
    }

    /// Fire the pending call if its window has closed.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.pending {
            Some(at) if now >= at => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<f64> {
        self.pending
    }
}

/// Observer over the board's mutation log.
///
/// Batches are ignored until `attach`; this is what keeps restore-time
/// mutations from being persisted back.
#[derive(Debug, Clone)]
pub struct ChangeCapture {
    debounce: Debounce,
    attached: bool,
    observed: usize,
}

impl ChangeCapture {
    pub fn new(delay_ms: u32, leading: bool) -> Self {
        Self {
            debounce: Debounce::new(delay_ms, leading),
            attached: false,
            observed: 0,
        }
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Stop observing and drop any pending trailing emission.
    pub fn detach(&mut self) {
        self.attached = false;
        self.debounce.cancel();
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Mutation records seen while attached.
    pub fn observed(&self) -> usize {
        self.observed
    }

    /// Feed a batch. Returns `true` when a snapshot should be emitted now.
    pub fn observe(&mut self, batch: &[CanvasMutation], now: f64) -> bool {
        if !self.attached || batch.is_empty() {
            return false;
        }
        self.observed += batch.len();
        self.debounce.call(now)
    }

    /// Returns `true` when the trailing emission is due.
    pub fn poll(&mut self, now: f64) -> bool {
        self.attached && self.debounce.poll(now)
    }

    pub fn deadline(&self) -> Option<f64> {
        if self.attached {
            self.debounce.deadline()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::id::CardId;

    #[test]
    fn debounce_leading_then_one_trailing() {
        let mut d = Debounce::new(200, true);
        let mut fired = 0;
        for i in 0..10 {
            if d.call(f64::from(i) * 10.0) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1, "only the leading call fires immediately");
        assert_eq!(d.deadline(), Some(290.0));
        assert!(!d.poll(289.0));
        assert!(d.poll(290.0));
        assert!(!d.poll(1000.0), "trailing edge fires once");
    }

    #[test]
    fn debounce_without_leading() {
        let mut d = Debounce::new(50, false);
        assert!(!d.call(0.0));
        assert!(!d.call(40.0));
        assert!(!d.poll(60.0));
        assert!(d.poll(90.0));
    }

    #[test]
    fn debounce_leading_is_spent_once() {
        let mut d = Debounce::new(100, true);
        assert!(d.call(0.0));
        assert!(!d.call(500.0));
        assert!(d.poll(600.0));
        assert!(!d.call(1000.0));
    }

    #[test]
    fn throttle_drops_calls_while_pending() {
        let mut t = Throttle::new(100, true);
        assert_eq!(t.call(0.0), ThrottleDecision::Fire);
        assert_eq!(t.call(10.0), ThrottleDecision::Scheduled);
        assert_eq!(t.call(20.0), ThrottleDecision::Dropped);
        assert_eq!(t.call(90.0), ThrottleDecision::Dropped);
        assert!(!t.poll(100.0));
        assert!(t.poll(110.0));
        assert_eq!(t.call(120.0), ThrottleDecision::Scheduled);
    }

    #[test]
    fn capture_ignores_batches_until_attached() {
        let id = CardId::intern("cap_a");
        let batch = [CanvasMutation::Content { id }];
        let mut c = ChangeCapture::new(200, true);
        assert!(!c.observe(&batch, 0.0));
        assert_eq!(c.observed(), 0);
        c.attach();
        assert!(c.observe(&batch, 1.0));
        assert!(!c.observe(&batch, 2.0));
        assert_eq!(c.deadline(), Some(202.0));
        c.detach();
        assert_eq!(c.deadline(), None);
        assert!(!c.poll(500.0));
    }

    #[test]
    fn empty_batches_do_not_arm() {
        let mut c = ChangeCapture::new(200, false);
        c.attach();
        assert!(!c.observe(&[], 0.0));
        assert_eq!(c.deadline(), None);
    }
}
