//=========================================================================
// Delay Timer
//=========================================================================
//
// Background thread holding delayed actions until their deadline, then
// forwarding them into the task queue channel.
//
// The thread exits when every TaskSubmitter is gone or the task queue has
// been dropped. Actions still waiting at that point are discarded.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::io;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::{DeferredAction, SubmitError};

//=== Pending =============================================================

struct Pending {
    due: Instant,
    seq: u64,
    action: DeferredAction,
}

// Earlier deadline first; equal deadlines keep submission order.
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

//=== DelayTimer ==========================================================

pub(super) struct DelayTimer {
    schedule: Sender<(Instant, DeferredAction)>,
}

impl DelayTimer {
    pub(super) fn spawn(queue: Sender<DeferredAction>) -> io::Result<Self> {
        let (schedule, incoming) = unbounded();

        thread::Builder::new()
            .name("visor-delay-timer".into())
            .spawn(move || run(incoming, queue))?;

        debug!(target: "scheduler", "Delay timer thread started");
        Ok(Self { schedule })
    }

    pub(super) fn schedule(&self, due: Instant, action: DeferredAction) -> Result<(), SubmitError> {
        self.schedule
            .send((due, action))
            .map_err(|_| SubmitError::Closed)
    }
}

//=== Timer Loop ==========================================================

fn run(incoming: Receiver<(Instant, DeferredAction)>, queue: Sender<DeferredAction>) {
    let mut pending: BinaryHeap<Reverse<Pending>> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let now = Instant::now();

        while pending.peek().is_some_and(|Reverse(next)| next.due <= now) {
            let Some(Reverse(due)) = pending.pop() else {
                break;
            };
            if queue.send(due.action).is_err() {
                debug!(target: "scheduler", "Task queue closed, delay timer exiting");
                discard(pending.len());
                return;
            }
        }

        let received = match pending.peek() {
            Some(Reverse(next)) => incoming.recv_timeout(next.due.saturating_duration_since(now)),
            None => incoming.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok((due, action)) => {
                pending.push(Reverse(Pending { due, seq, action }));
                seq += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!(target: "scheduler", "All submitters dropped, delay timer exiting");
                discard(pending.len());
                return;
            }
        }
    }
}

fn discard(count: usize) {
    if count > 0 {
        warn!(target: "scheduler", "Discarding {} delayed action(s) on shutdown", count);
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
