/// file: src/consumer.rs
/// description: per-surface adapter projecting realtime events into renderable state
use crate::{
    config::ToastConfig,
    connection::RealtimeCore,
    dispatcher::{Handler, Subscription},
    history::{DropHistory, DropHistoryStore},
    types::{ConnectionState, DropEvent, NotificationEvent, NotificationKind},
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub kind: NotificationKind,
    pub title: String,
    pub link: Option<String>,
    pub duration: Duration,
}

impl Toast {
    pub fn from_notification(notification: &NotificationEvent, config: &ToastConfig) -> Self {
        let duration = if notification.link.is_some() {
            config.link_duration
        } else {
            config.default_duration
        };
        Self {
            kind: notification.kind,
            title: notification.title.clone(),
            link: notification.link.clone(),
            duration,
        }
    }
}

/// Transient on-screen message renderer.
pub trait Toaster: Send + Sync {
    fn show(&self, toast: &Toast) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationQuery {
    List,
    UnreadCount,
}

/// The request/response data layer's cache controls.
pub trait DataInvalidator: Send + Sync {
    /// Marks cached notification data as stale.
    fn invalidate_notifications(&self) -> anyhow::Result<()>;

    fn refetch(&self, query: NotificationQuery) -> anyhow::Result<()>;
}

/// Local projection of the feed for one surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedView {
    pub connection_state: ConnectionState,
    pub online_count: Option<u64>,
    pub history: DropHistory,
}

/// What changed in a [`FeedView`], passed to the view listener.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    Activated,
    Connection(ConnectionState),
    OnlineCount(u64),
    Drop(DropEvent),
    Seeded(usize),
}

type ViewListener = dyn Fn(&FeedUpdate, &FeedView) + Send + Sync;

/// Integration point for one independent UI surface.
///
/// Inactive until [`activate`](Self::activate); deactivation, explicit or on
/// drop, removes every handler it registered.
pub struct FeedConsumer {
    core: RealtimeCore,
    history: Arc<DropHistoryStore>,
    toaster: Arc<dyn Toaster>,
    invalidator: Arc<dyn DataInvalidator>,
    toast_config: ToastConfig,
    view: Arc<Mutex<FeedView>>,
    listener: Option<Arc<ViewListener>>,
    subscriptions: Vec<Subscription>,
}

impl FeedConsumer {
    pub fn new(
        core: RealtimeCore,
        history: Arc<DropHistoryStore>,
        toaster: Arc<dyn Toaster>,
        invalidator: Arc<dyn DataInvalidator>,
        toast_config: ToastConfig,
    ) -> Self {
        Self {
            core,
            history,
            toaster,
            invalidator,
            toast_config,
            view: Arc::new(Mutex::new(FeedView::default())),
            listener: None,
            subscriptions: Vec::new(),
        }
    }

    /// Called after every view change, with the view lock held. The listener
    /// must not call back into this consumer.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FeedUpdate, &FeedView) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn is_active(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    pub fn activate(&mut self) {
        if self.is_active() {
            return;
        }

        self.core.ensure_connected();

        // handlers registered below block on the view lock until hydration is done
        let history = self.history.load();
        let mut view = lock(&self.view);
        view.history = history;

        self.subscriptions = vec![
            Subscription::Connection(self.connection_handler()),
            Subscription::OnlineCount(self.online_count_handler()),
            Subscription::Drop(self.drop_handler()),
            Subscription::Notification(self.notification_handler()),
        ];
        for subscription in &self.subscriptions {
            self.core.subscribe(subscription.clone());
        }

        view.connection_state = self.core.connection_state();
        view.online_count = self.core.online_count();
        debug!(
            history = view.history.len(),
            state = %view.connection_state,
            "feed consumer activated"
        );
        notify(&self.listener, &FeedUpdate::Activated, &view);
    }

    pub fn deactivate(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            self.core.unsubscribe(&subscription);
        }
    }

    /// Fills an empty history from an external newest-first list. Returns
    /// false when the history already has entries.
    pub fn seed(&self, drops: Vec<DropEvent>) -> bool {
        let mut view = lock(&self.view);
        if !view.history.is_empty() {
            return false;
        }
        view.history = self.history.normalize(drops);
        let seeded = view.history.len();
        notify(&self.listener, &FeedUpdate::Seeded(seeded), &view);
        true
    }

    pub fn view(&self) -> FeedView {
        lock(&self.view).clone()
    }

    pub fn history(&self) -> DropHistory {
        lock(&self.view).history.clone()
    }

    fn connection_handler(&self) -> Handler<ConnectionState> {
        let view = Arc::clone(&self.view);
        let listener = self.listener.clone();
        Handler::new(move |state: &ConnectionState| {
            let mut view = lock(&view);
            view.connection_state = *state;
            notify(&listener, &FeedUpdate::Connection(*state), &view);
            Ok(())
        })
    }

    fn online_count_handler(&self) -> Handler<u64> {
        let view = Arc::clone(&self.view);
        let listener = self.listener.clone();
        Handler::new(move |count: &u64| {
            let mut view = lock(&view);
            view.online_count = Some(*count);
            notify(&listener, &FeedUpdate::OnlineCount(*count), &view);
            Ok(())
        })
    }

    fn drop_handler(&self) -> Handler<DropEvent> {
        let view = Arc::clone(&self.view);
        let listener = self.listener.clone();
        let history = Arc::clone(&self.history);
        Handler::new(move |drop: &DropEvent| {
            let mut view = lock(&view);
            view.history = history.append(drop, &view.history);
            notify(&listener, &FeedUpdate::Drop(drop.clone()), &view);
            Ok(())
        })
    }

    fn notification_handler(&self) -> Handler<NotificationEvent> {
        let toaster = Arc::clone(&self.toaster);
        let invalidator = Arc::clone(&self.invalidator);
        let config = self.toast_config;
        Handler::new(move |notification: &NotificationEvent| {
            let toast = Toast::from_notification(notification, &config);
            isolate("toast", || toaster.show(&toast));
            isolate("invalidate", || invalidator.invalidate_notifications());
            schedule_refetch(Arc::clone(&invalidator), config.refetch_delay);
            Ok(())
        })
    }
}

impl Drop for FeedConsumer {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn lock(view: &Mutex<FeedView>) -> MutexGuard<'_, FeedView> {
    view.lock().unwrap_or_else(|e| e.into_inner())
}

fn notify(listener: &Option<Arc<ViewListener>>, update: &FeedUpdate, view: &FeedView) {
    if let Some(listener) = listener {
        listener(update, view);
    }
}

// Runs one side effect so that its failure cannot suppress the others.
fn isolate<F>(effect: &'static str, f: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(effect, error = %e, "notification side effect failed"),
        Err(_) => warn!(effect, "notification side effect panicked"),
    }
}

// Refetches trail the invalidation slightly so they do not race it.
fn schedule_refetch(invalidator: Arc<dyn DataInvalidator>, delay: Duration) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!("no async runtime, skipping delayed notification refetch");
        return;
    };
    handle.spawn(async move {
        tokio::time::sleep(delay).await;
        for query in [NotificationQuery::List, NotificationQuery::UnreadCount] {
            isolate("refetch", || invalidator.refetch(query));
        }
    });
}
