use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use serde_derive::{Deserialize, Serialize};

use crate::errors::SimError;
use crate::sem::SemKind;

/// Monotonic clock for event timestamps, in nanoseconds from run start.
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Clock {
        Clock { origin: Instant::now() }
    }

    pub fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// One record of the simulation trace. The `t` tag and the field names are
/// the wire format consumed by the visualization frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Event {
    #[serde(rename = "INIT")]
    Init { ts: u64, sem: SemKind, item: String, count: i32 },
    #[serde(rename = "WAIT_TRY")]
    WaitTry { ts: u64, thr: u64, sem: SemKind, item: String, count: i32 },
    #[serde(rename = "WAIT_BLOCK")]
    WaitBlock { ts: u64, thr: u64, sem: SemKind, item: String, blocked: i32 },
    #[serde(rename = "WAIT_ACQUIRE")]
    WaitAcquire { ts: u64, thr: u64, sem: SemKind, item: String, count: i32, blocked: i32 },
    #[serde(rename = "SIGNAL")]
    Signal { ts: u64, thr: u64, sem: SemKind, item: String, count: i32, woke: bool },
    #[serde(rename = "CS_ENTER")]
    CsEnter { ts: u64, thr: u64, item: String, what: String },
    #[serde(rename = "CS_EXIT")]
    CsExit { ts: u64, thr: u64, item: String, what: String },
    #[serde(rename = "SHIPMENT_WAIT")]
    ShipmentWait { ts: u64, thr: u64, item: String, shelf: usize, want_qty: u32 },
    #[serde(rename = "PURCHASE_WAIT")]
    PurchaseWait { ts: u64, thr: u64, item: String, want_qty: u32 },
    #[serde(rename = "SHIPMENT")]
    Shipment { ts: u64, thr: u64, item: String, shelf: usize, qty: u32, slots: Vec<usize>, wait_ms: u64 },
    #[serde(rename = "PURCHASE_OK")]
    PurchaseOk { ts: u64, thr: u64, item: String, shelf: usize, qty: u32, slots: Vec<usize>, wait_ms: u64 },
    #[serde(rename = "METRIC")]
    Metric { ts: u64 },
}

/// Single-writer sink for the event stream: one JSON line per record,
/// flushed immediately so an observer sees records in emission order.
pub struct EventSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl EventSink {
    pub fn new(out: Box<dyn Write + Send>) -> EventSink {
        EventSink { out: Mutex::new(out) }
    }

    pub fn stdout() -> EventSink {
        EventSink::new(Box::new(io::stdout()))
    }

    pub fn to_file<P: AsRef<Path>>(path: P) -> Result<EventSink, SimError> {
        Ok(EventSink::new(Box::new(File::create(path)?)))
    }

    /// The sink is assumed always writable; a failed write drops the record
    /// rather than aborting the simulation.
    pub fn emit(&self, event: &Event) {
        let mut line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(_) => return,
        };
        line.push('\n');
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        // One write per record so a concurrent reader never sees a torn line.
        let _ = out.write_all(line.as_bytes());
        let _ = out.flush();
    }
}
