use std::error::Error;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::controller::Simulation;
use crate::core::{SimConfig, SimContext};
use crate::events::Event;
use crate::sem::SemKind;
use crate::tests::{capture_sink, parse_trace, wait_until};
use crate::worker::{consumer_cycle, producer_cycle};
use crate::SimError;

fn test_config(items: &[&str], capacity: usize) -> SimConfig {
    SimConfig {
        items: items.iter().map(|name| name.to_string()).collect(),
        capacity,
        ..SimConfig::default()
    }
}

fn context_for(cfg: SimConfig) -> (Arc<SimContext>, Arc<Mutex<Vec<u8>>>) {
    let (sink, buf) = capture_sink();
    let ctx = SimContext::new(cfg, sink).unwrap();
    (Arc::new(ctx), buf)
}

fn acquires_for(trace: &[Event], kind: SemKind) -> usize {
    trace
        .iter()
        .filter(|e| matches!(e, Event::WaitAcquire { sem, .. } if *sem == kind))
        .count()
}

fn assert_distinct(slots: &[usize]) {
    let mut sorted = slots.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), slots.len(), "slot allocated twice: {:?}", slots);
}

#[test]
fn uncontended_producer_batch_fills_three_slots() -> Result<(), Box<dyn Error>> {
    let (ctx, buf) = context_for(test_config(&["milk"], 20));
    let placed = producer_cycle(&ctx, 0, 0, 3)?;
    assert_eq!(placed, 3);

    let trace = parse_trace(&buf);
    assert!(!trace.iter().any(|e| matches!(e, Event::ShipmentWait { .. })));
    assert!(!trace.iter().any(|e| matches!(e, Event::WaitBlock { .. })));

    let shipments: Vec<&Event> = trace
        .iter()
        .filter(|e| matches!(e, Event::Shipment { .. }))
        .collect();
    assert_eq!(shipments.len(), 1);
    match shipments[0] {
        Event::Shipment { qty, slots, wait_ms, .. } => {
            assert_eq!(*qty, 3);
            assert_eq!(slots.len(), 3);
            assert_distinct(slots);
            assert!(slots.iter().all(|slot| *slot < 20));
            assert_eq!(*wait_ms, 0);
        }
        _ => unreachable!(),
    }
    assert_eq!(ctx.items[0].shelf.lock().unwrap().inventory(), 3);
    Ok(())
}

#[test]
fn consumer_batch_takes_back_the_placed_slots() -> Result<(), Box<dyn Error>> {
    let (ctx, buf) = context_for(test_config(&["milk"], 20));
    assert_eq!(producer_cycle(&ctx, 0, 0, 3)?, 3);
    assert_eq!(consumer_cycle(&ctx, 1, 0, 3)?, 3);

    let trace = parse_trace(&buf);
    let placed = trace.iter().find_map(|e| match e {
        Event::Shipment { slots, .. } => Some(slots.clone()),
        _ => None,
    });
    let taken = trace.iter().find_map(|e| match e {
        Event::PurchaseOk { qty, slots, .. } => Some((*qty, slots.clone())),
        _ => None,
    });
    let (qty, mut taken_slots) = taken.expect("no PURCHASE_OK emitted");
    assert_eq!(qty, 3);
    let mut placed_slots = placed.expect("no SHIPMENT emitted");
    placed_slots.sort_unstable();
    taken_slots.sort_unstable();
    assert_eq!(taken_slots, placed_slots);
    assert_eq!(ctx.items[0].shelf.lock().unwrap().inventory(), 0);
    Ok(())
}

#[test]
fn producer_blocks_on_partial_batch_until_empty_signal() {
    let mut cfg = test_config(&["milk"], 2);
    // The out-of-band wake below over-credits the empty semaphore, so the
    // resulting short transfer must be an anomaly, not a fatal error.
    cfg.strict = false;
    let (ctx, buf) = context_for(cfg);

    let worker_ctx = ctx.clone();
    let producer = thread::spawn(move || producer_cycle(&worker_ctx, 0, 0, 3));

    // Two units granted, then the third attempt parks.
    wait_until(|| {
        let trace = parse_trace(&buf);
        acquires_for(&trace, SemKind::Empty) == 2
            && trace.iter().any(|e| {
                matches!(e, Event::WaitBlock { sem, .. } if *sem == SemKind::Empty)
            })
    });

    // Matching signal on the empty semaphore, as a consumer would issue.
    ctx.items[0].empty.signal(7).unwrap();
    let placed = producer.join().unwrap().unwrap();
    // Capacity 2: the over-credited third grant finds no slot.
    assert_eq!(placed, 2);

    let trace = parse_trace(&buf);
    assert!(trace.iter().any(|e| {
        matches!(e, Event::ShipmentWait { want_qty: 3, .. })
    }));
    assert_eq!(acquires_for(&trace, SemKind::Empty), 3);
    assert!(trace.iter().any(|e| {
        matches!(e, Event::Signal { sem: SemKind::Empty, woke: true, thr: 7, .. })
    }));
    match trace.iter().rev().find(|e| matches!(e, Event::Shipment { .. })) {
        Some(Event::Shipment { qty: 2, slots, .. }) => assert_distinct(slots),
        other => panic!("expected a quantity-2 SHIPMENT, got {:?}", other),
    }
}

#[test]
fn strict_mode_fails_loudly_on_broken_accounting() {
    let (ctx, _buf) = context_for(test_config(&["milk"], 1));
    // Fill the only slot behind the semaphores' back.
    ctx.items[0].shelf.lock().unwrap().place(0, 0);
    let result = producer_cycle(&ctx, 0, 0, 1);
    assert!(matches!(result, Err(SimError::Logic(_))));
}

#[test]
fn controller_run_emits_a_consistent_trace() {
    let (sink, buf) = capture_sink();
    // Producer-only with capacity headroom: no worker can be blocked on a
    // gating semaphore when the run flag clears, so every join terminates.
    let cfg = SimConfig {
        items: vec!["milk".to_string(), "bread".to_string()],
        producers: 3,
        consumers: 0,
        run_ms: 120,
        metric_ms: 25,
        capacity: 4096,
        speed_ms: 2,
        ..SimConfig::default()
    };
    let sim = Simulation::new(cfg, sink).unwrap();
    sim.run().unwrap();
    let ctx = sim.context();
    let trace = parse_trace(&buf);

    // One INIT per semaphore and a heartbeat.
    assert_eq!(
        trace.iter().filter(|e| matches!(e, Event::Init { .. })).count(),
        6
    );
    assert!(trace.iter().any(|e| matches!(e, Event::Metric { .. })));

    // No slot allocated twice within one transfer.
    for event in &trace {
        if let Event::Shipment { slots, .. } = event {
            assert_distinct(slots);
        }
    }

    // Conservation + quiescent shelf/semaphore invariants, per item.
    for (i, res) in ctx.items.iter().enumerate() {
        let shipped: u32 = trace
            .iter()
            .filter_map(|e| match e {
                Event::Shipment { shelf, qty, .. } if *shelf == i => Some(*qty),
                _ => None,
            })
            .sum();
        let shelf = res.shelf.lock().unwrap();
        assert_eq!(shipped, shelf.inventory());
        assert_eq!(shelf.occupied() as u32, shelf.inventory());
        assert_eq!(res.full.available(), shelf.inventory() as i32);
        assert_eq!(
            res.empty.available() as usize + shelf.occupied(),
            shelf.capacity()
        );
        assert_eq!(res.slot_lock.available(), 1);
    }

    // Critical sections per item never overlap in the linearized trace.
    for name in &ctx.catalog {
        let mut open: Option<u64> = None;
        for event in &trace {
            match event {
                Event::CsEnter { thr, item, .. } if item == name => {
                    assert!(open.is_none(), "overlapping critical sections for {}", name);
                    open = Some(*thr);
                }
                Event::CsExit { thr, item, .. } if item == name => {
                    assert_eq!(open, Some(*thr), "CS_EXIT from a thread not inside");
                    open = None;
                }
                _ => {}
            }
        }
        assert!(open.is_none(), "unclosed critical section for {}", name);
    }
}
