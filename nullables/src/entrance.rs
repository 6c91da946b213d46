//! Nullable entrance: records pushes and measures how many overlap.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tally_sync::{Entrance, EntranceError};
use tally_types::WalletId;

/// An instrumented [`Entrance`] for concurrency tests.
///
/// Each push sleeps for the configured delay while counted as in flight, so
/// tests can check that the synchronized wrapper never lets two pushes for
/// one wallet overlap.
#[derive(Default)]
pub struct NullEntrance {
    delay: Duration,
    panic_on_push: bool,
    in_flight: AtomicUsize,
    max_overlap: AtomicUsize,
    calls: AtomicUsize,
    starts: AtomicUsize,
    pushed: Mutex<Vec<(WalletId, String)>>,
}

impl NullEntrance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every push takes at least `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Every push panics after registering itself.
    pub fn panicking() -> Self {
        Self {
            panic_on_push: true,
            ..Self::default()
        }
    }

    /// Highest number of pushes ever running at once.
    pub fn max_overlap(&self) -> usize {
        self.max_overlap.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Every `(id, body)` pushed so far, in completion order.
    pub fn pushed(&self) -> Vec<(WalletId, String)> {
        self.pushed.lock().unwrap().clone()
    }
}

/// Decrements the in-flight counter even when the push panics.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Entrance for NullEntrance {
    fn start(&self) -> Result<(), EntranceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn push(&self, id: &WalletId, body: &str) -> Result<Vec<WalletId>, EntranceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_overlap.fetch_max(now, Ordering::SeqCst);

        if self.panic_on_push {
            panic!("null entrance told to panic on {id}");
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.pushed.lock().unwrap().push((*id, body.to_string()));
        Ok(vec![*id])
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "calls": self.calls(),
            "max_overlap": self.max_overlap(),
        })
    }
}
