//! Task executors standing in for the input-method and UI threads.

use std::collections::VecDeque;
use std::io;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A serial task queue bound to one logical thread.
pub trait Executor: Send + Sync {
    fn post(&self, task: Task);

    /// True when called from the executor's own thread.
    fn is_current(&self) -> bool;
}

pub(crate) fn same_executor(a: &Arc<dyn Executor>, b: &Arc<dyn Executor>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

// ---------------------------------------------------------------------------
// ThreadExecutor
// ---------------------------------------------------------------------------

/// Runs tasks in order on a dedicated named thread. The thread exits once the
/// executor is dropped and its queue drains.
pub struct ThreadExecutor {
    tx: Mutex<mpsc::Sender<Task>>,
    thread_id: ThreadId,
}

impl ThreadExecutor {
    pub fn new(name: &str) -> io::Result<Arc<Self>> {
        let (tx, rx) = mpsc::channel::<Task>();
        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            while let Ok(task) = rx.recv() {
                task();
            }
        })?;
        Ok(Arc::new(Self {
            tx: Mutex::new(tx),
            thread_id: handle.thread().id(),
        }))
    }
}

impl Executor for ThreadExecutor {
    fn post(&self, task: Task) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if tx.send(task).is_err() {
            tracing::warn!("executor thread gone, task dropped");
        }
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

// ---------------------------------------------------------------------------
// ManualExecutor
// ---------------------------------------------------------------------------

/// Queues tasks until the owner calls [`ManualExecutor::run_pending`] on its
/// own thread. Used by headless drivers and tests.
#[derive(Default)]
pub struct ManualExecutor {
    tasks: Mutex<VecDeque<Task>>,
}

impl ManualExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run queued tasks, including ones posted while running, until the queue
    /// is empty. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(task) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Executor for ManualExecutor {
    fn post(&self, task: Task) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
    }

    fn is_current(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_manual_runs_nested_posts() {
        let exec = ManualExecutor::new();
        let count = Arc::new(AtomicUsize::new(0));
        let inner_exec = Arc::clone(&exec);
        let c = Arc::clone(&count);
        exec.post(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            let c2 = Arc::clone(&c);
            inner_exec.post(Box::new(move || {
                c2.fetch_add(1, Ordering::SeqCst);
            }));
        }));
        assert_eq!(exec.pending(), 1);
        assert_eq!(exec.run_pending(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_thread_executor_runs_in_order_on_its_thread() {
        let exec = ThreadExecutor::new("editable-test-ic").unwrap();
        assert!(!exec.is_current());
        let (tx, rx) = mpsc::channel();
        for i in 0..3 {
            let tx = tx.clone();
            let e = Arc::clone(&exec);
            exec.post(Box::new(move || {
                tx.send((i, e.is_current())).unwrap();
            }));
        }
        let got: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(got, vec![(0, true), (1, true), (2, true)]);
    }

    #[test]
    fn test_same_executor_identity() {
        let a: Arc<dyn Executor> = ManualExecutor::new();
        let b: Arc<dyn Executor> = ManualExecutor::new();
        assert!(same_executor(&a, &Arc::clone(&a)));
        assert!(!same_executor(&a, &b));
    }
}
