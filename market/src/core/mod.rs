use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_derive::{Deserialize, Serialize};

use crate::errors::SimError;
use crate::events::{Clock, EventSink};
use crate::sem::{SemKind, TracedSemaphore};
use crate::shelf::Shelf;

pub const MAX_ITEMS: usize = 16;

pub static DEFAULT_CATALOG: &[&str] = &["milk", "bread", "eggs", "cream"];

/// Resolved simulation parameters. Loaded from a TOML file by the CLI and
/// overridable per field, so missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Item catalog; an empty list falls back to `DEFAULT_CATALOG`.
    pub items: Vec<String>,
    pub producers: u32,
    pub consumers: u32,
    pub run_ms: u64,
    /// Heartbeat cadence of the METRIC event.
    pub metric_ms: u64,
    /// Per-item shelf capacity.
    pub capacity: usize,
    pub prod_batch_max: u32,
    pub cons_batch_max: u32,
    /// Base of the randomized inter-cycle delay: sleep in [speed, 2*speed) ms.
    pub speed_ms: u64,
    pub seed: u64,
    /// When set, a transfer that finds fewer slots than the semaphore
    /// accounting promised is fatal instead of a logged anomaly.
    pub strict: bool,
}

impl Default for SimConfig {
    fn default() -> SimConfig {
        SimConfig {
            items: Vec::new(),
            producers: 3,
            consumers: 3,
            run_ms: 20_000,
            metric_ms: 200,
            capacity: 20,
            prod_batch_max: 3,
            cons_batch_max: 3,
            speed_ms: 600,
            seed: 42,
            strict: true,
        }
    }
}

/// Splits a comma-separated item list, dropping surrounding whitespace and
/// empty entries.
pub fn parse_item_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trims, dedupes and caps the catalog at `MAX_ITEMS`; an empty result falls
/// back to the built-in default list.
pub fn normalize_catalog(items: &[String]) -> Vec<String> {
    let mut catalog: Vec<String> = Vec::new();
    for name in items {
        let name = name.trim();
        if name.is_empty() || catalog.iter().any(|seen| seen == name) {
            continue;
        }
        catalog.push(name.to_string());
        if catalog.len() == MAX_ITEMS {
            break;
        }
    }
    if catalog.is_empty() {
        catalog = DEFAULT_CATALOG.iter().map(|name| name.to_string()).collect();
    }
    catalog
}

/// The shareable unit: one item's semaphore triple plus its shelf. No lock
/// is ever held across two items.
pub struct ItemResources {
    pub empty: TracedSemaphore,
    pub full: TracedSemaphore,
    pub slot_lock: TracedSemaphore,
    /// Locked only while the item's mutex semaphore is held, so the inner
    /// lock never contends; it exists to make the shelf shareable.
    pub shelf: Mutex<Shelf>,
}

impl ItemResources {
    fn new(name: &str, capacity: usize, sink: &Arc<EventSink>, clock: &Arc<Clock>) -> ItemResources {
        ItemResources {
            empty: TracedSemaphore::new(SemKind::Empty, name, capacity as u32, sink.clone(), clock.clone()),
            full: TracedSemaphore::new(SemKind::Full, name, 0, sink.clone(), clock.clone()),
            slot_lock: TracedSemaphore::new(SemKind::Mutex, name, 1, sink.clone(), clock.clone()),
            shelf: Mutex::new(Shelf::new(capacity)),
        }
    }
}

/// Owns every per-item resource set plus the run flag; workers share it
/// behind an `Arc`.
pub struct SimContext {
    pub config: SimConfig,
    pub catalog: Vec<String>,
    pub items: Vec<ItemResources>,
    pub running: AtomicBool,
    pub clock: Arc<Clock>,
    pub sink: Arc<EventSink>,
}

impl SimContext {
    pub fn new(config: SimConfig, sink: EventSink) -> Result<SimContext, SimError> {
        if config.capacity == 0 {
            return Err(SimError::Config("capacity must be at least 1".to_string()));
        }
        if config.prod_batch_max == 0 || config.cons_batch_max == 0 {
            return Err(SimError::Config("batch maxima must be at least 1".to_string()));
        }
        if config.metric_ms == 0 {
            return Err(SimError::Config("metric_ms must be at least 1".to_string()));
        }
        let catalog = normalize_catalog(&config.items);
        let sink = Arc::new(sink);
        let clock = Arc::new(Clock::new());
        let items = catalog
            .iter()
            .map(|name| ItemResources::new(name, config.capacity, &sink, &clock))
            .collect();
        Ok(SimContext {
            config,
            catalog,
            items,
            running: AtomicBool::new(true),
            clock,
            sink,
        })
    }

    /// INIT records for every semaphore, in catalog order.
    pub fn emit_inits(&self) {
        for res in &self.items {
            res.empty.emit_init();
            res.full.emit_init();
            res.slot_lock.emit_init();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
