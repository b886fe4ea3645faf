#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rs_livedrops::clock::ManualClock;
use rs_livedrops::config::{DedupConfig, HistoryConfig, TransportConfig};
use rs_livedrops::connection::RealtimeCore;
use rs_livedrops::history::DropHistoryStore;
use rs_livedrops::storage::{DurableStorage, MemoryStorage};
use rs_livedrops::transport::{Connection, Transport, TransportEvent, TransportSink};
use rs_livedrops::types::{DropEvent, DropItem, DropUser};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    opened: usize,
    closed: usize,
    sinks: Vec<TransportSink>,
    connections: Vec<Arc<AtomicBool>>,
}

/// In-process transport: records opens and closes and lets tests inject events.
#[derive(Clone)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
    connect_on_open: bool,
}

impl FakeTransport {
    /// Reports `connect` synchronously from `open`.
    pub fn connecting() -> Self {
        Self {
            state: Arc::default(),
            connect_on_open: true,
        }
    }

    /// Never reports anything on its own.
    pub fn silent() -> Self {
        Self {
            state: Arc::default(),
            connect_on_open: false,
        }
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    /// Sink handed to the n-th opened connection.
    pub fn sink(&self, index: usize) -> TransportSink {
        self.state.lock().unwrap().sinks[index].clone()
    }

    /// Emits on the most recently opened connection.
    pub fn emit(&self, event: TransportEvent) {
        let sink = {
            let state = self.state.lock().unwrap();
            state.sinks.last().cloned().expect("no connection opened")
        };
        sink.emit(event);
    }

    /// Simulates the latest connection giving up without being closed by the core.
    pub fn give_up(&self) {
        let state = self.state.lock().unwrap();
        if let Some(active) = state.connections.last() {
            active.store(false, Ordering::SeqCst);
        }
    }
}

struct FakeConnection {
    active: Arc<AtomicBool>,
    closed: bool,
    state: Arc<Mutex<FakeState>>,
}

impl Connection for FakeConnection {
    fn is_active(&self) -> bool {
        !self.closed && self.active.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.active.store(false, Ordering::SeqCst);
        self.state.lock().unwrap().closed += 1;
    }
}

impl Transport for FakeTransport {
    fn open(&self, _config: &TransportConfig, sink: TransportSink) -> Box<dyn Connection> {
        let active = Arc::new(AtomicBool::new(true));
        {
            let mut state = self.state.lock().unwrap();
            state.opened += 1;
            state.sinks.push(sink.clone());
            state.connections.push(Arc::clone(&active));
        }
        if self.connect_on_open {
            sink.emit(TransportEvent::Connect);
        }
        Box::new(FakeConnection {
            active,
            closed: false,
            state: Arc::clone(&self.state),
        })
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0()))
}

pub fn core_with(transport: &FakeTransport, clock: &Arc<ManualClock>) -> RealtimeCore {
    RealtimeCore::with_clock(
        Arc::new(transport.clone()),
        TransportConfig::default(),
        DedupConfig::default(),
        clock.clone(),
    )
}

pub fn store_with(storage: Arc<dyn DurableStorage>, clock: &Arc<ManualClock>) -> DropHistoryStore {
    DropHistoryStore::with_clock(storage, HistoryConfig::default(), clock.clone())
}

pub fn memory_store(clock: &Arc<ManualClock>) -> (Arc<MemoryStorage>, Arc<DropHistoryStore>) {
    let storage = Arc::new(MemoryStorage::new());
    let store = Arc::new(store_with(storage.clone(), clock));
    (storage, store)
}

pub fn drop_event(id: &str, at: DateTime<Utc>) -> DropEvent {
    DropEvent {
        id: Some(id.to_string()),
        user: DropUser {
            id: "user-1".to_string(),
            username: "switch".to_string(),
            level: 9,
            avatar: Some("https://cdn.example/avatar.png".to_string()),
        },
        item: DropItem {
            id: format!("item-{id}"),
            name: "AWP Asiimov".to_string(),
            image: "awp.png".to_string(),
            rarity: "covert".to_string(),
            price: 88.4,
        },
        drop_time: Some(at),
        is_highlighted: false,
        is_rare: false,
    }
}

pub fn ids(history: &[DropEvent]) -> Vec<&str> {
    history.iter().filter_map(|d| d.id.as_deref()).collect()
}

