use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::SimContext;
use crate::errors::SimError;
use crate::events::Event;

/// Producer control loop: pick a random item and batch size, run one cycle,
/// cool down, until the run flag clears. A cycle never abandons units it has
/// acquired, so the loop only ever exits between cycles.
pub fn producer_loop(ctx: Arc<SimContext>, tid: u64) {
    let mut rng = StdRng::seed_from_u64(ctx.config.seed.wrapping_add(tid));
    while ctx.is_running() {
        let item = rng.gen_range(0..ctx.catalog.len());
        let want = rng
            .gen_range(1..=ctx.config.prod_batch_max)
            .min(ctx.config.capacity as u32);
        if let Err(e) = producer_cycle(&ctx, tid, item, want) {
            eprintln!("producer {}: fatal: {}", tid, e);
            process::exit(1);
        }
        cooldown(&ctx, &mut rng);
    }
}

pub fn consumer_loop(ctx: Arc<SimContext>, tid: u64) {
    let mut rng = StdRng::seed_from_u64(ctx.config.seed.wrapping_add(tid));
    while ctx.is_running() {
        let item = rng.gen_range(0..ctx.catalog.len());
        let want = rng
            .gen_range(1..=ctx.config.cons_batch_max)
            .min(ctx.config.capacity as u32);
        if let Err(e) = consumer_cycle(&ctx, tid, item, want) {
            eprintln!("consumer {}: fatal: {}", tid, e);
            process::exit(1);
        }
        cooldown(&ctx, &mut rng);
    }
}

fn cooldown(ctx: &SimContext, rng: &mut StdRng) {
    let base = ctx.config.speed_ms;
    if base == 0 {
        return;
    }
    thread::sleep(Duration::from_millis(base + rng.gen_range(0..base)));
}

/// One batched stock cycle: acquire `want` empty-slot units one at a time,
/// enter the critical section, place up to `want` units, release the mutex
/// and one full-slot unit per unit actually placed. Returns the placed count.
pub fn producer_cycle(ctx: &SimContext, tid: u64, item: usize, want: u32) -> Result<u32, SimError> {
    let res = &ctx.items[item];
    let name = &ctx.catalog[item];

    // Contention heuristic on the shadow count: marks where the batch wait
    // began so the transfer event can report the elapsed wait.
    let mut wait_from = None;
    if res.empty.available() < want as i32 {
        let t0 = ctx.clock.now_ns();
        wait_from = Some(t0);
        ctx.sink.emit(&Event::ShipmentWait {
            ts: t0,
            thr: tid,
            item: name.clone(),
            shelf: item,
            want_qty: want,
        });
    }
    for _ in 0..want {
        res.empty.wait(tid)?;
    }
    res.slot_lock.wait(tid)?;
    ctx.sink.emit(&Event::CsEnter {
        ts: ctx.clock.now_ns(),
        thr: tid,
        item: name.clone(),
        what: "insert".to_string(),
    });

    let mut slots = Vec::with_capacity(want as usize);
    {
        let mut shelf = res.shelf.lock()?;
        for _ in 0..want {
            let pos = match shelf.find_empty_slot() {
                Some(pos) => pos,
                None => {
                    if ctx.config.strict {
                        return Err(SimError::Logic(format!(
                            "no empty slot for {} after {} of {} placements",
                            name,
                            slots.len(),
                            want
                        )));
                    }
                    eprintln!(
                        "shelf anomaly: no empty slot for {} after {} of {}",
                        name,
                        slots.len(),
                        want
                    );
                    break;
                }
            };
            shelf.place(pos, item);
            slots.push(pos);
        }
    }
    let placed = slots.len() as u32;
    let wait_ms = wait_from
        .map(|t0| ctx.clock.now_ns().saturating_sub(t0) / 1_000_000)
        .unwrap_or(0);
    ctx.sink.emit(&Event::Shipment {
        ts: ctx.clock.now_ns(),
        thr: tid,
        item: name.clone(),
        shelf: item,
        qty: placed,
        slots,
        wait_ms,
    });
    ctx.sink.emit(&Event::CsExit {
        ts: ctx.clock.now_ns(),
        thr: tid,
        item: name.clone(),
        what: "insert".to_string(),
    });
    res.slot_lock.signal(tid)?;
    for _ in 0..placed {
        res.full.signal(tid)?;
    }
    Ok(placed)
}

/// Mirror of `producer_cycle`: gate on full-slot units, clear slots, release
/// empty-slot units per unit actually taken.
pub fn consumer_cycle(ctx: &SimContext, tid: u64, item: usize, want: u32) -> Result<u32, SimError> {
    let res = &ctx.items[item];
    let name = &ctx.catalog[item];

    let mut wait_from = None;
    if res.full.available() < want as i32 {
        let t0 = ctx.clock.now_ns();
        wait_from = Some(t0);
        ctx.sink.emit(&Event::PurchaseWait {
            ts: t0,
            thr: tid,
            item: name.clone(),
            want_qty: want,
        });
    }
    for _ in 0..want {
        res.full.wait(tid)?;
    }
    res.slot_lock.wait(tid)?;
    ctx.sink.emit(&Event::CsEnter {
        ts: ctx.clock.now_ns(),
        thr: tid,
        item: name.clone(),
        what: "remove".to_string(),
    });

    let mut slots = Vec::with_capacity(want as usize);
    {
        let mut shelf = res.shelf.lock()?;
        for _ in 0..want {
            let pos = match shelf.find_filled_slot() {
                Some(pos) => pos,
                None => {
                    if ctx.config.strict {
                        return Err(SimError::Logic(format!(
                            "no filled slot for {} after {} of {} removals",
                            name,
                            slots.len(),
                            want
                        )));
                    }
                    eprintln!(
                        "shelf anomaly: no filled slot for {} after {} of {}",
                        name,
                        slots.len(),
                        want
                    );
                    break;
                }
            };
            shelf.clear(pos);
            slots.push(pos);
        }
    }
    let taken = slots.len() as u32;
    let wait_ms = wait_from
        .map(|t0| ctx.clock.now_ns().saturating_sub(t0) / 1_000_000)
        .unwrap_or(0);
    ctx.sink.emit(&Event::PurchaseOk {
        ts: ctx.clock.now_ns(),
        thr: tid,
        item: name.clone(),
        shelf: item,
        qty: taken,
        slots,
        wait_ms,
    });
    ctx.sink.emit(&Event::CsExit {
        ts: ctx.clock.now_ns(),
        thr: tid,
        item: name.clone(),
        what: "remove".to_string(),
    });
    res.slot_lock.signal(tid)?;
    for _ in 0..taken {
        res.empty.signal(tid)?;
    }
    Ok(taken)
}
