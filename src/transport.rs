/// file: src/transport.rs
/// description: seam between the realtime core and the live transport client
use crate::config::TransportConfig;
use crate::types::{DropEvent, NotificationEvent};
use std::fmt;
use std::sync::Arc;

/// Everything a transport can report back to the core, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connect,
    Disconnect { reason: String },
    ConnectError { error: String },
    Reconnecting { attempt: u32 },
    OnlineUsersUpdate { count: u64 },
    LiveDrop(DropEvent),
    Notification(NotificationEvent),
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Connect => "connect",
            TransportEvent::Disconnect { .. } => "disconnect",
            TransportEvent::ConnectError { .. } => "connect_error",
            TransportEvent::Reconnecting { .. } => "reconnecting",
            TransportEvent::OnlineUsersUpdate { .. } => "onlineUsersUpdate",
            TransportEvent::LiveDrop(_) => "liveDrop",
            TransportEvent::Notification(_) => "notification",
        }
    }
}

/// Callback handed to a transport when a connection is opened.
#[derive(Clone)]
pub struct TransportSink {
    emit: Arc<dyn Fn(TransportEvent) + Send + Sync>,
}

impl TransportSink {
    pub fn new<F>(emit: F) -> Self
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        Self {
            emit: Arc::new(emit),
        }
    }

    pub fn emit(&self, event: TransportEvent) {
        (self.emit)(event)
    }
}

impl fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransportSink")
    }
}

/// A live connection handle. Reconnection after drops is the connection's
/// own business; the core only opens and closes.
pub trait Connection: Send {
    /// True while the connection is usable or still retrying. False once it
    /// has been closed or has given up for good.
    fn is_active(&self) -> bool;

    fn close(&mut self);
}

pub trait Transport: Send + Sync {
    fn open(&self, config: &TransportConfig, sink: TransportSink) -> Box<dyn Connection>;
}
