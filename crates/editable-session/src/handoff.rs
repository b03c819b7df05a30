//! Barrier used while moving client ownership to a new executor.
//!
//! Each handoff takes a ticket. The wait task posted to the new executor
//! blocks until its ticket is released; tickets are released in issue order
//! because `SetHandler` replies arrive in send order.

use std::sync::{Condvar, Mutex, PoisonError};

use tracing::debug;

#[derive(Default)]
struct Tickets {
    issued: u64,
    released: u64,
}

#[derive(Default)]
pub(crate) struct HandoffBarrier {
    tickets: Mutex<Tickets>,
    cond: Condvar,
}

impl HandoffBarrier {
    pub fn begin(&self) -> u64 {
        let mut t = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        t.issued += 1;
        t.issued
    }

    /// Block until `ticket` is released.
    pub fn wait(&self, ticket: u64) {
        let mut t = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        while t.released < ticket {
            t = self.cond.wait(t).unwrap_or_else(PoisonError::into_inner);
        }
        debug!(ticket, "handoff wait released");
    }

    pub fn release_next(&self) {
        let mut t = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        if t.released < t.issued {
            t.released += 1;
        }
        self.cond.notify_all();
    }

    pub fn pending(&self) -> u64 {
        let t = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        t.issued - t.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_blocks_until_release() {
        let barrier = Arc::new(HandoffBarrier::default());
        let ticket = barrier.begin();
        let (tx, rx) = mpsc::channel();
        let b = Arc::clone(&barrier);
        thread::spawn(move || {
            b.wait(ticket);
            tx.send(()).unwrap();
        });
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        barrier.release_next();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(barrier.pending(), 0);
    }

    #[test]
    fn test_release_without_pending_is_noop() {
        let barrier = HandoffBarrier::default();
        barrier.release_next();
        let ticket = barrier.begin();
        assert_eq!(ticket, 1);
        assert_eq!(barrier.pending(), 1);
    }
}
