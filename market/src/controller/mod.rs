use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::{SimConfig, SimContext};
use crate::errors::SimError;
use crate::events::{Event, EventSink};
use crate::worker;

/// Owns the shared context and drives a bounded run: INIT events, worker
/// spawn, METRIC heartbeat, cooperative shutdown, join, teardown.
pub struct Simulation {
    ctx: Arc<SimContext>,
}

impl Simulation {
    pub fn new(config: SimConfig, sink: EventSink) -> Result<Simulation, SimError> {
        Ok(Simulation {
            ctx: Arc::new(SimContext::new(config, sink)?),
        })
    }

    /// Shared handle, e.g. for wiring an external stop signal.
    pub fn context(&self) -> Arc<SimContext> {
        self.ctx.clone()
    }

    /// Runs for `run_ms` (or until the flag is cleared externally), then
    /// joins every worker before the resources drop.
    ///
    /// A worker blocked on a gating semaphore at shutdown is only woken by a
    /// matching signal from the other side; the bounded duration plus
    /// steady-state traffic is what makes the joins terminate.
    pub fn run(&self) -> Result<(), SimError> {
        let ctx = &self.ctx;
        ctx.emit_inits();

        let producers = ctx.config.producers as u64;
        let consumers = ctx.config.consumers as u64;
        let mut handles = Vec::with_capacity((producers + consumers) as usize);
        for tid in 0..producers {
            let ctx = self.ctx.clone();
            handles.push(thread::spawn(move || worker::producer_loop(ctx, tid)));
        }
        for i in 0..consumers {
            let ctx = self.ctx.clone();
            let tid = producers + i;
            handles.push(thread::spawn(move || worker::consumer_loop(ctx, tid)));
        }

        let end_ns = ctx.clock.now_ns() + ctx.config.run_ms * 1_000_000;
        while ctx.is_running() && ctx.clock.now_ns() < end_ns {
            ctx.sink.emit(&Event::Metric { ts: ctx.clock.now_ns() });
            thread::sleep(Duration::from_millis(ctx.config.metric_ms));
        }

        ctx.stop();
        let mut panicked = false;
        for handle in handles {
            if handle.join().is_err() {
                panicked = true;
            }
        }
        if panicked {
            return Err(SimError::Logic("a worker thread panicked".to_string()));
        }
        Ok(())
    }
}
