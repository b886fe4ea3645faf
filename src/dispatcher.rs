/// file: src/dispatcher.rs
/// description: per-category subscriber registries fed by the connection manager
use crate::types::{ConnectionState, DropEvent, NotificationEvent};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

type Callback<T> = dyn Fn(&T) -> anyhow::Result<()> + Send + Sync;

/// Subscriber callback. Clones share identity, so registering a clone of an
/// already registered handler is a no-op.
pub struct Handler<T> {
    id: u64,
    callback: Arc<Callback<T>>,
}

impl<T> Handler<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            id: NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> PartialEq for Handler<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handler<T> {}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Connection,
    OnlineCount,
    Drop,
    Notification,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Connection => "connection",
            Category::OnlineCount => "onlineCount",
            Category::Drop => "drop",
            Category::Notification => "notification",
        }
    }
}

/// A handler paired with the category it listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    Connection(Handler<ConnectionState>),
    OnlineCount(Handler<u64>),
    Drop(Handler<DropEvent>),
    Notification(Handler<NotificationEvent>),
}

impl Subscription {
    pub fn category(&self) -> Category {
        match self {
            Subscription::Connection(_) => Category::Connection,
            Subscription::OnlineCount(_) => Category::OnlineCount,
            Subscription::Drop(_) => Category::Drop,
            Subscription::Notification(_) => Category::Notification,
        }
    }
}

/// Ordered set of handlers for one category.
pub struct Registry<T> {
    category: Category,
    handlers: Mutex<Vec<Handler<T>>>,
}

impl<T> Registry<T> {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            handlers: Mutex::new(Vec::new()),
        }
    }

    fn handlers(&self) -> MutexGuard<'_, Vec<Handler<T>>> {
        // a poisoned registry is still a valid list
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns false when the handler was already registered.
    pub fn subscribe(&self, handler: Handler<T>) -> bool {
        let mut handlers = self.handlers();
        if handlers.contains(&handler) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Returns false when the handler was not registered.
    pub fn unsubscribe(&self, handler: &Handler<T>) -> bool {
        let mut handlers = self.handlers();
        let before = handlers.len();
        handlers.retain(|h| h != handler);
        handlers.len() != before
    }

    /// Invokes every handler in registration order and returns how many
    /// completed without error.
    ///
    /// Iterates a snapshot taken before the first call, so handlers may
    /// subscribe or unsubscribe while the publish is running.
    pub fn publish(&self, payload: &T) -> usize {
        let snapshot: Vec<Handler<T>> = self.handlers().clone();
        let mut delivered = 0;

        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| (handler.callback)(payload))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(
                        category = self.category.as_str(),
                        handler = handler.id,
                        error = %e,
                        "subscriber returned an error"
                    );
                }
                Err(panic) => {
                    warn!(
                        category = self.category.as_str(),
                        handler = handler.id,
                        panic = panic_message(panic.as_ref()),
                        "subscriber panicked"
                    );
                }
            }
        }

        delivered
    }

    pub fn len(&self) -> usize {
        self.handlers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers().is_empty()
    }

    pub fn clear(&self) {
        self.handlers().clear();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

pub struct EventDispatcher {
    pub connection: Registry<ConnectionState>,
    pub online_count: Registry<u64>,
    pub drops: Registry<DropEvent>,
    pub notifications: Registry<NotificationEvent>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            connection: Registry::new(Category::Connection),
            online_count: Registry::new(Category::OnlineCount),
            drops: Registry::new(Category::Drop),
            notifications: Registry::new(Category::Notification),
        }
    }

    pub fn subscribe(&self, subscription: Subscription) -> bool {
        match subscription {
            Subscription::Connection(h) => self.connection.subscribe(h),
            Subscription::OnlineCount(h) => self.online_count.subscribe(h),
            Subscription::Drop(h) => self.drops.subscribe(h),
            Subscription::Notification(h) => self.notifications.subscribe(h),
        }
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        match subscription {
            Subscription::Connection(h) => self.connection.unsubscribe(h),
            Subscription::OnlineCount(h) => self.online_count.unsubscribe(h),
            Subscription::Drop(h) => self.drops.unsubscribe(h),
            Subscription::Notification(h) => self.notifications.unsubscribe(h),
        }
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Connection => self.connection.len(),
            Category::OnlineCount => self.online_count.len(),
            Category::Drop => self.drops.len(),
            Category::Notification => self.notifications.len(),
        }
    }

    /// Sum over all four registries; the shared connection lives while this is non-zero.
    pub fn total_subscribers(&self) -> usize {
        self.connection.len()
            + self.online_count.len()
            + self.drops.len()
            + self.notifications.len()
    }

    pub fn clear(&self) {
        self.connection.clear();
        self.online_count.clear();
        self.drops.clear();
        self.notifications.clear();
    }
}
