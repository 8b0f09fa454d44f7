//=========================================================================
// Deferred Task Queue
//=========================================================================
//
// Runs work submitted from any thread on the render thread.
//
// Architecture:
//   any thread ──TaskSubmitter::submit()──────────┐
//                                                  ▼
//   any thread ──submit_after()──► DelayTimer ──► channel ──► TaskQueue::drain(max)
//                                  (own thread)              (render thread only)
//
// Ordering:
//   - FIFO per submitting thread
//   - drain(max) runs at most `max` actions; the rest wait for the next call
//   - a failing or panicking action is recorded and the drain continues
//
// Delayed actions cannot be cancelled once submitted.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;
use parking_lot::Mutex;
use thiserror::Error;

//=== Module Declarations =================================================

mod timer;

use timer::DelayTimer;

//=== Types ===============================================================

/// Error returned by a fallible deferred action.
pub type ActionError = Box<dyn Error + Send + Sync + 'static>;

/// Unit of work executed once on the render thread.
pub type DeferredAction = Box<dyn FnOnce() -> Result<(), ActionError> + Send + 'static>;

//=== Errors ==============================================================

/// The render thread is gone; the action was not queued.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("task queue is closed")]
    Closed,

    #[error("failed to start the delay timer thread")]
    Timer(#[source] std::io::Error),
}

/// Failure of a single deferred action.
#[derive(Debug, Error)]
pub enum DeferredActionError {
    #[error("deferred action #{index} failed")]
    Failed {
        index: usize,
        #[source]
        source: ActionError,
    },

    #[error("deferred action #{index} panicked: {message}")]
    Panicked { index: usize, message: String },
}

/// Outcome of a drain in which at least one action failed.
///
/// `executed` counts every action taken from the queue, failed ones included.
#[derive(Debug, Error)]
#[error("{} of {executed} deferred action(s) failed", failures.len())]
pub struct DrainError {
    pub executed: usize,
    pub failures: Vec<DeferredActionError>,
}

//=== TaskSubmitter =======================================================

/// Cloneable handle for queueing work onto the render thread.
#[derive(Clone)]
pub struct TaskSubmitter {
    sender: Sender<DeferredAction>,
    timer: Arc<Mutex<Option<DelayTimer>>>,
}

impl TaskSubmitter {
    /// Queues `action` to run on the next drain.
    pub fn submit<F>(&self, action: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Box::new(move || {
            action();
            Ok(())
        }))
    }

    /// Queues an action whose error is reported by the drain.
    pub fn submit_fallible<F, E>(&self, action: F) -> Result<(), SubmitError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<ActionError>,
    {
        self.send(Box::new(move || action().map_err(Into::into)))
    }

    /// Queues `action` once `delay` has elapsed.
    ///
    /// The first delayed submission starts the timer thread.
    pub fn submit_after<F>(&self, action: F, delay: Duration) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        let action: DeferredAction = Box::new(move || {
            action();
            Ok(())
        });

        if delay.is_zero() {
            return self.send(action);
        }

        let mut timer = self.timer.lock();
        if timer.is_none() {
            *timer = Some(DelayTimer::spawn(self.sender.clone()).map_err(SubmitError::Timer)?);
        }

        match timer.as_ref() {
            Some(timer) => timer.schedule(Instant::now() + delay, action),
            None => Err(SubmitError::Closed),
        }
    }

    fn send(&self, action: DeferredAction) -> Result<(), SubmitError> {
        self.sender.send(action).map_err(|_| SubmitError::Closed)?;
        trace!(target: "scheduler", "Deferred action queued");
        Ok(())
    }
}

//=== TaskQueue ===========================================================

/// Receiving end, owned by the render thread.
pub struct TaskQueue {
    receiver: Receiver<DeferredAction>,
    submitter: TaskSubmitter,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            receiver,
            submitter: TaskSubmitter {
                sender,
                timer: Arc::new(Mutex::new(None)),
            },
        }
    }

    pub fn submitter(&self) -> TaskSubmitter {
        self.submitter.clone()
    }

    /// Actions ready to run. Delayed actions still waiting are not counted.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Runs up to `max` queued actions in FIFO order.
    ///
    /// Returns how many ran. Failures do not stop the drain; they are
    /// collected into the returned `DrainError`.
    pub fn drain(&mut self, max: usize) -> Result<usize, DrainError> {
        let mut executed = 0;
        let mut failures = Vec::new();

        while executed < max {
            let Ok(action) = self.receiver.try_recv() else {
                break;
            };
            let index = executed;
            executed += 1;

            match panic::catch_unwind(AssertUnwindSafe(action)) {
                Ok(Ok(())) => {}
                Ok(Err(source)) => failures.push(DeferredActionError::Failed { index, source }),
                Err(payload) => failures.push(DeferredActionError::Panicked {
                    index,
                    message: panic_message(payload.as_ref()),
                }),
            }
        }

        if failures.is_empty() {
            Ok(executed)
        } else {
            Err(DrainError { executed, failures })
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Box<dyn FnOnce() + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |n: u32| {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().push(n)) as Box<dyn FnOnce() + Send>
        };
        (log, make)
    }

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn drain_respects_cap_and_order() {
        let mut queue = TaskQueue::new();
        let submitter = queue.submitter();
        let (log, action) = recorder();

        for n in 0..20 {
            submitter.submit(action(n)).unwrap();
        }

        assert_eq!(queue.drain(16).unwrap(), 16);
        assert_eq!(*log.lock(), (0..16).collect::<Vec<_>>());
        assert_eq!(queue.pending(), 4);

        assert_eq!(queue.drain(16).unwrap(), 4);
        assert_eq!(*log.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn drain_on_empty_queue_is_zero() {
        let mut queue = TaskQueue::new();
        assert_eq!(queue.drain(16).unwrap(), 0);
    }

    #[test]
    fn failure_and_panic_do_not_stop_drain() {
        let mut queue = TaskQueue::new();
        let submitter = queue.submitter();
        let (log, action) = recorder();

        submitter.submit(action(1)).unwrap();
        submitter.submit_fallible(|| Err(Boom)).unwrap();
        submitter.submit(|| panic!("bad action")).unwrap();
        submitter.submit(action(2)).unwrap();

        let err = queue.drain(16).unwrap_err();

        assert_eq!(err.executed, 4);
        assert_eq!(err.failures.len(), 2);
        assert!(matches!(err.failures[0], DeferredActionError::Failed { index: 1, .. }));
        match &err.failures[1] {
            DeferredActionError::Panicked { index, message } => {
                assert_eq!(*index, 2);
                assert_eq!(message, "bad action");
            }
            other => panic!("Expected panic record, got {:?}", other),
        }
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn concurrent_submitters_with_small_cap() {
        let mut queue = TaskQueue::new();
        let (log, action) = recorder();
        let action = Arc::new(action);

        let handles: Vec<_> = (0..3)
            .map(|n| {
                let submitter = queue.submitter();
                let action = Arc::clone(&action);
                thread::spawn(move || submitter.submit((*action)(n)).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.drain(2).unwrap(), 2);
        assert_eq!(log.lock().len(), 2);

        assert_eq!(queue.drain(2).unwrap(), 1);
        let mut seen = log.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn per_thread_fifo_is_preserved() {
        let mut queue = TaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let submitter = queue.submitter();
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..25u32 {
                        let log = Arc::clone(&log);
                        submitter.submit(move || log.lock().push((t, i))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        while queue.drain(16).unwrap() > 0 {}

        let log = log.lock();
        assert_eq!(log.len(), 100);
        for t in 0..4 {
            let order: Vec<_> = log.iter().filter(|(th, _)| *th == t).map(|(_, i)| *i).collect();
            assert_eq!(order, (0..25).collect::<Vec<_>>(), "Thread {t} out of order");
        }
    }

    #[test]
    fn delayed_action_arrives_after_delay() {
        let mut queue = TaskQueue::new();
        let submitter = queue.submitter();
        let (log, action) = recorder();

        let started = Instant::now();
        submitter.submit_after(action(7), Duration::from_millis(30)).unwrap();
        submitter.submit(action(1)).unwrap();

        assert_eq!(queue.drain(16).unwrap(), 1);
        assert_eq!(*log.lock(), vec![1]);

        let deadline = started + Duration::from_secs(5);
        while log.lock().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
            queue.drain(16).unwrap();
        }

        assert_eq!(*log.lock(), vec![1, 7]);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn zero_delay_queues_immediately() {
        let mut queue = TaskQueue::new();
        let submitter = queue.submitter();
        let (log, action) = recorder();

        submitter.submit_after(action(3), Duration::ZERO).unwrap();
        assert_eq!(queue.drain(16).unwrap(), 1);
        assert_eq!(*log.lock(), vec![3]);
    }
}
