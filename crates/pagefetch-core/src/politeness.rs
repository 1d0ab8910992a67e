//! Politeness gate: global spacing between the starts of outgoing requests.
//!
//! One gate belongs to one fetcher. The lock covers only the check-and-set of
//! the last issuance instant (including the wait), never the request itself,
//! so several requests may be in flight while their start times stay at least
//! `delay` apart.

use crate::cancel::{CancelToken, Interrupted};
use crate::clock::Clock;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct PolitenessGate {
    delay: Duration,
    clock: Arc<dyn Clock>,
    /// `None` until the first request is issued.
    last_issued: Mutex<Option<Instant>>,
}

impl PolitenessGate {
    pub fn new(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            delay,
            clock,
            last_issued: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Blocks until a request may start, records that start and returns it.
    ///
    /// If `cancel` fires before or during the wait, fails with [`Interrupted`]
    /// and leaves the recorded issuance time untouched.
    pub fn acquire(&self, cancel: &CancelToken) -> Result<Instant, Interrupted> {
        if cancel.is_cancelled() {
            return Err(Interrupted);
        }
        let mut last_issued = self
            .last_issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if cancel.is_cancelled() {
            return Err(Interrupted);
        }
        if let Some(previous) = *last_issued {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.delay {
                self.clock.sleep(self.delay - elapsed, cancel)?;
            }
        }
        let issued = self.clock.now();
        *last_issued = Some(issued);
        Ok(issued)
    }

    pub fn last_issued(&self) -> Option<Instant> {
        *self
            .last_issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use proptest::prelude::*;
    use std::thread;

    fn manual_gate(delay_ms: u64) -> (Arc<ManualClock>, Arc<PolitenessGate>) {
        let clock = Arc::new(ManualClock::new());
        let gate = Arc::new(PolitenessGate::new(
            Duration::from_millis(delay_ms),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        (clock, gate)
    }

    #[test]
    fn first_acquire_does_not_wait() {
        let (clock, gate) = manual_gate(500);
        gate.acquire(&CancelToken::new()).unwrap();
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn second_acquire_waits_out_the_remaining_delay() {
        let (clock, gate) = manual_gate(500);
        let token = CancelToken::new();
        let first = gate.acquire(&token).unwrap();
        clock.advance(Duration::from_millis(200));
        let second = gate.acquire(&token).unwrap();
        assert_eq!(second - first, Duration::from_millis(500));
    }

    #[test]
    fn no_wait_once_delay_has_passed() {
        let (clock, gate) = manual_gate(100);
        let token = CancelToken::new();
        let first = gate.acquire(&token).unwrap();
        clock.advance(Duration::from_millis(750));
        let second = gate.acquire(&token).unwrap();
        assert_eq!(second - first, Duration::from_millis(750));
    }

    #[test]
    fn zero_delay_never_waits() {
        let (clock, gate) = manual_gate(0);
        let token = CancelToken::new();
        for _ in 0..5 {
            gate.acquire(&token).unwrap();
        }
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn cancelled_wait_leaves_last_issue_untouched() {
        let gate = Arc::new(PolitenessGate::new(
            Duration::from_secs(30),
            Arc::new(SystemClock),
        ));
        let first = gate.acquire(&CancelToken::new()).unwrap();

        let token = CancelToken::new();
        let waiter = {
            let gate = Arc::clone(&gate);
            let token = token.clone();
            thread::spawn(move || gate.acquire(&token))
        };
        thread::sleep(Duration::from_millis(50));
        token.cancel();

        assert_eq!(waiter.join().unwrap(), Err(Interrupted));
        assert_eq!(gate.last_issued(), Some(first));
    }

    #[test]
    fn real_clock_spacing_holds() {
        let gate = PolitenessGate::new(Duration::from_millis(40), Arc::new(SystemClock));
        let token = CancelToken::new();
        let a = gate.acquire(&token).unwrap();
        let b = gate.acquire(&token).unwrap();
        let c = gate.acquire(&token).unwrap();
        assert!(b - a >= Duration::from_millis(40));
        assert!(c - b >= Duration::from_millis(40));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn concurrent_issuance_is_spaced_by_delay(
            workers in 1usize..8,
            per_worker in 1usize..6,
            delay_ms in 0u64..1_000,
            work_ms in 0u64..300,
        ) {
            let (clock, gate) = manual_gate(delay_ms);
            let token = CancelToken::new();
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let gate = Arc::clone(&gate);
                    let clock = Arc::clone(&clock);
                    let token = token.clone();
                    thread::spawn(move || {
                        let mut issued = Vec::with_capacity(per_worker);
                        for _ in 0..per_worker {
                            issued.push(gate.acquire(&token).unwrap());
                            // Simulated request work moves time forward too.
                            clock.advance(Duration::from_millis(work_ms));
                        }
                        issued
                    })
                })
                .collect();

            let mut issued: Vec<Instant> = handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect();
            issued.sort();

            prop_assert_eq!(issued.len(), workers * per_worker);
            for pair in issued.windows(2) {
                prop_assert!(pair[1] - pair[0] >= Duration::from_millis(delay_ms));
            }
        }
    }
}
