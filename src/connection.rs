// file: src/connection.rs
// description: single shared live connection, reference-counted by subscriber registries

use crate::{
    clock::{Clock, SystemClock},
    config::{DedupConfig, TransportConfig},
    dedup::DedupCache,
    dispatcher::{EventDispatcher, Subscription},
    monitoring,
    transport::{Connection, Transport, TransportEvent, TransportSink},
    types::ConnectionState,
};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, trace, warn};

/// Identifies the connection currently owned by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub generation: u64,
    pub state: ConnectionState,
}

struct LinkState {
    connection: Option<Box<dyn Connection>>,
    // bumped on every open and teardown; events tagged with an older value are ignored
    generation: u64,
    connection_id: Option<String>,
    state: ConnectionState,
    online_count: Option<u64>,
}

impl LinkState {
    fn new() -> Self {
        Self {
            connection: None,
            generation: 0,
            connection_id: None,
            state: ConnectionState::Disconnected,
            online_count: None,
        }
    }

    fn info(&self) -> Option<ConnectionInfo> {
        self.connection_id.as_ref().map(|id| ConnectionInfo {
            connection_id: id.clone(),
            generation: self.generation,
            state: self.state,
        })
    }
}

struct CoreInner {
    transport: Arc<dyn Transport>,
    config: TransportConfig,
    clock: Arc<dyn Clock>,
    dispatcher: EventDispatcher,
    dedup: Mutex<DedupCache>,
    link: Mutex<LinkState>,
}

impl Drop for CoreInner {
    fn drop(&mut self) {
        let link = self.link.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(mut connection) = link.connection.take() {
            connection.close();
        }
    }
}

/// Owns the one transport connection, the dedup cache and the subscriber
/// registries. Cheap to clone; clones share the same core.
///
/// The connection exists exactly while at least one subscriber is
/// registered in any category. Build one at startup and hand clones to
/// consumers.
#[derive(Clone)]
pub struct RealtimeCore {
    inner: Arc<CoreInner>,
}

impl RealtimeCore {
    pub fn new(transport: Arc<dyn Transport>, config: TransportConfig, dedup: DedupConfig) -> Self {
        Self::with_clock(transport, config, dedup, Arc::new(SystemClock))
    }

    pub fn with_clock(
        transport: Arc<dyn Transport>,
        config: TransportConfig,
        dedup: DedupConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(CoreInner {
                transport,
                config,
                clock,
                dispatcher: EventDispatcher::new(),
                dedup: Mutex::new(DedupCache::new(dedup)),
                link: Mutex::new(LinkState::new()),
            }),
        }
    }

    fn link(&self) -> MutexGuard<'_, LinkState> {
        self.inner.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the live connection, opening a fresh one when there is none
    /// or the previous one has given up.
    pub fn ensure_connected(&self) -> ConnectionInfo {
        let (generation, stale, info) = {
            let mut link = self.link();
            if let Some(connection) = link.connection.as_ref()
                && connection.is_active()
                && let Some(info) = link.info()
            {
                return info;
            }

            let stale = link.connection.take();
            link.generation += 1;
            link.state = ConnectionState::Connecting;
            link.connection_id = Some(uuid::Uuid::new_v4().to_string());
            let info = link.info();
            (link.generation, stale, info)
        };

        if let Some(mut stale) = stale {
            debug!("replacing inactive connection");
            stale.close();
        }

        info!(
            url = %self.inner.config.url,
            generation,
            "opening live connection"
        );
        monitoring::CONNECTIONS_OPENED_COUNTER.increment(1);
        self.inner.dispatcher.connection.publish(&ConnectionState::Connecting);

        let connection = self
            .inner
            .transport
            .open(&self.inner.config, self.sink(generation));

        let orphaned = {
            let mut link = self.link();
            if link.generation == generation {
                link.connection = Some(connection);
                None
            } else {
                // torn down or replaced while the transport was opening
                Some(connection)
            }
        };
        if let Some(mut orphaned) = orphaned {
            orphaned.close();
        }

        self.connection_info().or(info).unwrap_or_else(|| ConnectionInfo {
            connection_id: String::new(),
            generation,
            state: ConnectionState::Disconnected,
        })
    }

    fn sink(&self, generation: u64) -> TransportSink {
        let weak: Weak<CoreInner> = Arc::downgrade(&self.inner);
        TransportSink::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                RealtimeCore { inner }.handle_transport_event(generation, event);
            }
        })
    }

    /// Applies one transport event. Runs to completion, including every
    /// subscriber callback, before returning.
    pub fn handle_transport_event(&self, generation: u64, event: TransportEvent) {
        if self.link().generation != generation {
            trace!(
                event = event.name(),
                generation,
                "ignoring event from a retired connection"
            );
            return;
        }

        match event {
            TransportEvent::Connect => {
                info!(generation, "live connection established");
                self.set_state(ConnectionState::Connected);
            }
            TransportEvent::Disconnect { reason } => {
                warn!(reason = %reason, "live connection lost");
                self.set_state(ConnectionState::Disconnected);
            }
            TransportEvent::ConnectError { error } => {
                warn!(error = %error, "live connection failed");
                self.set_state(ConnectionState::Disconnected);
            }
            TransportEvent::Reconnecting { attempt } => {
                debug!(attempt, "live connection retrying");
                self.set_state(ConnectionState::Reconnecting);
            }
            TransportEvent::OnlineUsersUpdate { count } => {
                self.link().online_count = Some(count);
                monitoring::ONLINE_USERS_GAUGE.set(count as f64);
                self.inner.dispatcher.online_count.publish(&count);
            }
            TransportEvent::LiveDrop(drop) => {
                let now = self.inner.clock.now();
                let verdict = self
                    .inner
                    .dedup
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .check(&drop, now);

                if verdict.is_accepted() {
                    monitoring::DROPS_PUBLISHED_COUNTER.increment(1);
                    self.inner.dispatcher.drops.publish(&drop);
                } else {
                    debug!(
                        drop_id = drop.id.as_deref().unwrap_or("-"),
                        reason = verdict.as_str(),
                        "drop filtered"
                    );
                    monitoring::record_rejected_drop(verdict);
                }
            }
            TransportEvent::Notification(notification) => {
                monitoring::NOTIFICATIONS_COUNTER.increment(1);
                self.inner.dispatcher.notifications.publish(&notification);
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.link().state = state;
        monitoring::CONNECTED_GAUGE.set(if state == ConnectionState::Connected {
            1.0
        } else {
            0.0
        });
        self.inner.dispatcher.connection.publish(&state);
    }

    /// Registers a handler. Returns false if it was already registered.
    pub fn subscribe(&self, subscription: Subscription) -> bool {
        self.inner.dispatcher.subscribe(subscription)
    }

    /// Removes a handler and closes the connection once no subscriber is left
    /// in any category. Safe to call from inside a handler.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let removed = self.inner.dispatcher.unsubscribe(subscription);
        if self.inner.dispatcher.total_subscribers() == 0 {
            self.teardown();
        }
        removed
    }

    fn teardown(&self) {
        let connection = {
            let mut link = self.link();
            if link.connection_id.is_none() && link.connection.is_none() {
                return;
            }
            // an open still in flight sees the new generation and closes its own result
            link.generation += 1;
            link.connection_id = None;
            link.state = ConnectionState::Disconnected;
            link.connection.take()
        };

        info!("no subscribers left, closing live connection");
        monitoring::CONNECTED_GAUGE.set(0.0);
        if let Some(mut connection) = connection {
            connection.close();
        }
    }

    /// Drops every subscriber and closes the connection.
    pub fn dispose(&self) {
        self.inner.dispatcher.clear();
        self.teardown();
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    pub fn total_subscribers(&self) -> usize {
        self.inner.dispatcher.total_subscribers()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.link().state
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        let link = self.link();
        link.connection.as_ref()?;
        link.info()
    }

    pub fn has_connection(&self) -> bool {
        self.link().connection.is_some()
    }

    /// Last count reported by the server, if any arrived yet.
    pub fn online_count(&self) -> Option<u64> {
        self.link().online_count
    }
}
