/// file: src/ui.rs
/// description: terminal presentation loop fed by the consumer's ui channel
use crate::{
    consumer::FeedUpdate,
    events::{EventReceiver, UiEvent},
    formatter::{Colors, FeedFormatter},
};
use tracing::{debug, info};

pub struct UIController {
    event_receiver: EventReceiver,
    formatter: FeedFormatter,
    colored: bool,
}

impl UIController {
    pub fn new(event_receiver: EventReceiver, colored: bool) -> Self {
        Self {
            event_receiver,
            formatter: FeedFormatter::new(colored),
            colored,
        }
    }

    pub async fn run(&mut self) {
        self.print_banner();
        while let Some(event) = self.event_receiver.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        info!(
            drops = self.formatter.drops_rendered(),
            "ui loop finished"
        );
    }

    fn handle_event(&mut self, event: UiEvent) -> bool {
        match event {
            UiEvent::Feed {
                update,
                online_count,
                history_len,
                snapshot,
            } => match update {
                FeedUpdate::Activated | FeedUpdate::Seeded(_) => {
                    println!("recent drops ({history_len}):");
                    // stored newest-first; print oldest at the top
                    for drop in snapshot.iter().rev() {
                        println!("  {}", self.formatter.format_drop(drop));
                    }
                    if let Some(count) = online_count {
                        println!("{}", self.formatter.format_online(count));
                    }
                }
                FeedUpdate::Connection(state) => {
                    println!("{}", self.formatter.format_state(state));
                }
                FeedUpdate::OnlineCount(count) => {
                    println!("{}", self.formatter.format_online(count));
                }
                FeedUpdate::Drop(drop) => {
                    println!("  {}", self.formatter.format_drop(&drop));
                }
            },
            UiEvent::Toast(toast) => {
                println!("{}", self.formatter.format_toast(&toast));
            }
            UiEvent::NotificationsInvalidated => {
                debug!("notifications marked stale");
            }
            UiEvent::Refetch(query) => {
                debug!(?query, "notification data refetched");
            }
            UiEvent::SeedFailed(reason) => {
                println!("{}", self.formatter.format_error("SEED FAILED", &reason));
            }
            UiEvent::Stopping => {
                println!("{}", self.formatter.format_error("STOPPING", "shutting down"));
                return false;
            }
        }

        true
    }

    fn print_banner(&self) {
        let title = format!("LIVE DROPS v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "{}{}== {} =={}",
                Colors::BOLD,
                Colors::BRIGHT_CYAN,
                title,
                Colors::RESET
            );
        } else {
            println!("== {title} ==");
        }
    }
}
