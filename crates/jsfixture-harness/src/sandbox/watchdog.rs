//! Wall-clock budget for one block run

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

/// Sets the interrupt flag once `budget` elapses, unless dropped first
pub(crate) struct Watchdog {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub(crate) fn arm(budget: Duration, flag: Arc<AtomicBool>) -> Self {
        // Rendezvous channel: a cancel is only delivered while the thread waits
        let (cancel, cancelled) = crossbeam_channel::bounded::<()>(0);
        let spawned = thread::Builder::new()
            .name("jsfixture-watchdog".to_string())
            .spawn(move || match cancelled.recv_timeout(budget) {
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!(?budget, "block exceeded its budget");
                    flag.store(true, Ordering::Relaxed);
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            });
        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "could not start watchdog; block runs without a budget");
                None
            }
        };
        Self {
            cancel: Some(cancel),
            handle,
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // Err means the thread already timed out and hung up
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_fires_after_budget() {
        let flag = Arc::new(AtomicBool::new(false));
        let watchdog = Watchdog::arm(Duration::from_millis(10), Arc::clone(&flag));
        thread::sleep(Duration::from_millis(100));
        assert!(flag.load(Ordering::Relaxed));
        drop(watchdog);
    }

    #[test]
    fn test_drop_disarms() {
        let flag = Arc::new(AtomicBool::new(false));
        let watchdog = Watchdog::arm(Duration::from_secs(30), Arc::clone(&flag));
        drop(watchdog);
        assert!(!flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_drop_wakes_thread_promptly() {
        let flag = Arc::new(AtomicBool::new(false));
        let started = Instant::now();
        for _ in 0..5 {
            drop(Watchdog::arm(Duration::from_secs(30), Arc::clone(&flag)));
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!flag.load(Ordering::Relaxed));
    }
}
