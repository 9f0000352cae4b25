use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use serde_derive::{Deserialize, Serialize};

use crate::errors::SimError;
use crate::events::{Clock, Event, EventSink};

/// In-process counting semaphore: guarded counter plus condvar.
pub struct Semaphore {
    count: Mutex<u32>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: u32) -> Semaphore {
        Semaphore {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    /// Non-blocking acquire. Returns false when no unit is available.
    pub fn try_acquire(&self) -> Result<bool, SimError> {
        let mut count = self.count.lock()?;
        if *count > 0 {
            *count -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn acquire(&self) -> Result<(), SimError> {
        let mut count = self.count.lock()?;
        while *count == 0 {
            count = self.cond.wait(count)?;
        }
        *count -= 1;
        Ok(())
    }

    pub fn release(&self) -> Result<(), SimError> {
        let mut count = self.count.lock()?;
        *count += 1;
        self.cond.notify_one();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemKind {
    Empty,
    Full,
    Mutex,
}

#[inline]
fn clamp0(x: i32) -> i32 {
    if x < 0 {
        0
    } else {
        x
    }
}

fn dec_clamped(counter: &AtomicI32) -> i32 {
    let v = counter.fetch_sub(1, Ordering::SeqCst) - 1;
    if v < 0 {
        counter.store(0, Ordering::SeqCst);
        return 0;
    }
    v
}

fn inc_clamped(counter: &AtomicI32) -> i32 {
    let v = counter.fetch_add(1, Ordering::SeqCst) + 1;
    if v < 0 {
        counter.store(0, Ordering::SeqCst);
        return 0;
    }
    v
}

/// Counting semaphore that emits an event for every state transition.
///
/// The shadow `available`/`blocked` counters are updated outside the
/// primitive's own lock, so they are best-effort telemetry for the trace;
/// the worker protocol never bases a correctness decision on them.
pub struct TracedSemaphore {
    sem: Semaphore,
    kind: SemKind,
    item: String,
    available: AtomicI32,
    blocked: AtomicI32,
    sink: Arc<EventSink>,
    clock: Arc<Clock>,
}

impl TracedSemaphore {
    pub fn new(
        kind: SemKind,
        item: &str,
        initial: u32,
        sink: Arc<EventSink>,
        clock: Arc<Clock>,
    ) -> TracedSemaphore {
        TracedSemaphore {
            sem: Semaphore::new(initial),
            kind,
            item: item.to_string(),
            available: AtomicI32::new(initial as i32),
            blocked: AtomicI32::new(0),
            sink,
            clock,
        }
    }

    pub fn kind(&self) -> SemKind {
        self.kind
    }

    pub fn available(&self) -> i32 {
        clamp0(self.available.load(Ordering::SeqCst))
    }

    pub fn blocked(&self) -> i32 {
        clamp0(self.blocked.load(Ordering::SeqCst))
    }

    pub fn emit_init(&self) {
        self.sink.emit(&Event::Init {
            ts: self.clock.now_ns(),
            sem: self.kind,
            item: self.item.clone(),
            count: self.available(),
        });
    }

    /// Acquire one unit, tracing the attempt → maybe-block → acquire path.
    /// Decrements the real semaphore exactly once.
    pub fn wait(&self, thr: u64) -> Result<(), SimError> {
        self.sink.emit(&Event::WaitTry {
            ts: self.clock.now_ns(),
            thr,
            sem: self.kind,
            item: self.item.clone(),
            count: self.available(),
        });
        let mut blocked_here = false;
        if !self.sem.try_acquire()? {
            blocked_here = true;
            let blocked = inc_clamped(&self.blocked);
            self.sink.emit(&Event::WaitBlock {
                ts: self.clock.now_ns(),
                thr,
                sem: self.kind,
                item: self.item.clone(),
                blocked,
            });
            self.sem.acquire()?;
        }
        // Only the thread that actually parked undoes the blocked count.
        let blocked = if blocked_here {
            dec_clamped(&self.blocked)
        } else {
            self.blocked()
        };
        let count = dec_clamped(&self.available);
        self.sink.emit(&Event::WaitAcquire {
            ts: self.clock.now_ns(),
            thr,
            sem: self.kind,
            item: self.item.clone(),
            count,
            blocked,
        });
        Ok(())
    }

    /// Release one unit. A release that wakes a parked waiter hands the unit
    /// over directly, so the shadow available count only grows on a plain
    /// release.
    pub fn signal(&self, thr: u64) -> Result<(), SimError> {
        let woke = self.blocked.load(Ordering::SeqCst) > 0;
        let count = if woke {
            self.available()
        } else {
            inc_clamped(&self.available)
        };
        self.sink.emit(&Event::Signal {
            ts: self.clock.now_ns(),
            thr,
            sem: self.kind,
            item: self.item.clone(),
            count,
            woke,
        });
        self.sem.release()
    }
}
