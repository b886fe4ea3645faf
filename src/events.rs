/// file: src/events.rs
/// description: channel between the feed consumer's callbacks and the terminal UI
use crate::consumer::{DataInvalidator, FeedUpdate, FeedView, NotificationQuery, Toast, Toaster};
use crate::types::DropEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum UiEvent {
    Feed {
        update: FeedUpdate,
        online_count: Option<u64>,
        history_len: usize,
        // full history, only filled on activation and seeding
        snapshot: Vec<DropEvent>,
    },
    Toast(Toast),
    NotificationsInvalidated,
    Refetch(NotificationQuery),
    SeedFailed(String),
    Stopping,
}

// Subscriber callbacks are synchronous, so sends use try_send and a full
// channel drops the UI event rather than stalling the feed.
const EVENT_CHANNEL_CAPACITY: usize = 1_024;

pub type EventSender = mpsc::Sender<UiEvent>;
pub type EventReceiver = mpsc::Receiver<UiEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

fn forward(sender: &EventSender, event: UiEvent) -> anyhow::Result<()> {
    sender
        .try_send(event)
        .map_err(|e| anyhow::anyhow!("ui channel rejected event: {e}"))
}

/// Builds the consumer view listener that mirrors updates onto the channel.
pub fn feed_listener(sender: EventSender) -> impl Fn(&FeedUpdate, &FeedView) + Send + Sync {
    move |update: &FeedUpdate, view: &FeedView| {
        let snapshot = match update {
            FeedUpdate::Activated | FeedUpdate::Seeded(_) => view.history.clone(),
            _ => Vec::new(),
        };
        let event = UiEvent::Feed {
            update: update.clone(),
            online_count: view.online_count,
            history_len: view.history.len(),
            snapshot,
        };
        if let Err(e) = forward(&sender, event) {
            warn!("{}", e);
        }
    }
}

/// Toaster rendering through the terminal UI.
#[derive(Debug, Clone)]
pub struct ChannelToaster {
    sender: EventSender,
}

impl ChannelToaster {
    pub fn new(sender: EventSender) -> Self {
        Self { sender }
    }
}

impl Toaster for ChannelToaster {
    fn show(&self, toast: &Toast) -> anyhow::Result<()> {
        forward(&self.sender, UiEvent::Toast(toast.clone()))
    }
}

/// Stand-in for the request/response data layer: the CLI caches nothing,
/// so invalidations and refetches are only reported.
#[derive(Debug, Clone)]
pub struct ReportingInvalidator {
    sender: EventSender,
}

impl ReportingInvalidator {
    pub fn new(sender: EventSender) -> Self {
        Self { sender }
    }
}

impl DataInvalidator for ReportingInvalidator {
    fn invalidate_notifications(&self) -> anyhow::Result<()> {
        debug!("notification cache invalidated");
        forward(&self.sender, UiEvent::NotificationsInvalidated)
    }

    fn refetch(&self, query: NotificationQuery) -> anyhow::Result<()> {
        debug!(?query, "notification refetch requested");
        forward(&self.sender, UiEvent::Refetch(query))
    }
}
