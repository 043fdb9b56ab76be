/// Coalesces bursts of values into one, released once input goes quiet.
///
/// Each [`queue`](Self::queue) replaces the pending value and restarts the
/// timer; [`take_ready`](Self::take_ready) hands the value out once
/// `delay_ms` has passed since the last queue.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay_ms: u64,
    pending: Option<(T, u64)>,
}

impl<T> Debouncer<T> {
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub const fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn queue(&mut self, value: T, now_ms: u64) {
        self.pending = Some((value, now_ms));
    }

    pub fn take_ready(&mut self, now_ms: u64) -> Option<T> {
        let (_, queued_at) = self.pending.as_ref()?;
        if now_ms.saturating_sub(*queued_at) >= self.delay_ms {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    /// Drop the pending value without releasing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time at which the pending value becomes ready.
    pub fn deadline(&self) -> Option<u64> {
        self.pending
            .as_ref()
            .map(|(_, queued_at)| queued_at.saturating_add(self.delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_waits_for_quiet_period() {
        let mut debouncer = Debouncer::new(50);
        debouncer.queue(1, 100);
        assert_eq!(debouncer.take_ready(149), None);
        assert_eq!(debouncer.take_ready(150), Some(1));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_debouncer_restarts_timer_and_keeps_latest() {
        let mut debouncer = Debouncer::new(50);
        debouncer.queue(1, 0);
        debouncer.queue(2, 40);
        assert_eq!(debouncer.take_ready(60), None);
        assert_eq!(debouncer.deadline(), Some(90));
        assert_eq!(debouncer.take_ready(90), Some(2));
    }

    #[test]
    fn test_debouncer_cancel_discards_value() {
        let mut debouncer = Debouncer::new(10);
        debouncer.queue("x", 0);
        assert_eq!(debouncer.cancel(), Some("x"));
        assert_eq!(debouncer.take_ready(1_000), None);
        assert_eq!(debouncer.deadline(), None);
    }
}
