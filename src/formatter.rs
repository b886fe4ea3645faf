use crate::consumer::Toast;
use crate::types::{ConnectionState, DropEvent, NotificationKind};
use chrono::{DateTime, Local, Utc};

// ANSI color codes
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";

    pub const RED: &'static str = "\x1b[31m";
    pub const WHITE: &'static str = "\x1b[37m";
    pub const GRAY: &'static str = "\x1b[90m";

    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_BLUE: &'static str = "\x1b[94m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
}

/// Renders feed lines, optionally with ANSI colors.
pub struct FeedFormatter {
    colored: bool,
    drops_rendered: u64,
}

impl FeedFormatter {
    pub fn new(colored: bool) -> Self {
        Self {
            colored,
            drops_rendered: 0,
        }
    }

    pub fn drops_rendered(&self) -> u64 {
        self.drops_rendered
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colored {
            format!("{color}{text}{}", Colors::RESET)
        } else {
            text.to_string()
        }
    }

    fn rarity_color(rarity: &str) -> &'static str {
        match rarity.to_lowercase().as_str() {
            "covert" | "legendary" | "contraband" => Colors::BRIGHT_RED,
            "classified" | "mythical" => Colors::BRIGHT_MAGENTA,
            "restricted" | "rare" => Colors::BRIGHT_BLUE,
            "mil-spec" | "uncommon" => Colors::BRIGHT_CYAN,
            _ => Colors::WHITE,
        }
    }

    pub fn format_drop(&mut self, drop: &DropEvent) -> String {
        self.drops_rendered += 1;

        let time = drop
            .drop_time
            .map(|t: DateTime<Utc>| t.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        let marker = if drop.is_rare || drop.is_highlighted {
            "*"
        } else {
            " "
        };
        let item = self.paint(Self::rarity_color(&drop.item.rarity), &drop.item.name);

        format!(
            "{} {} {:<16} lvl {:>3}  {}  {}",
            self.paint(Colors::GRAY, &time),
            marker,
            drop.user.username,
            drop.user.level,
            item,
            self.paint(Colors::BRIGHT_GREEN, &format!("${:.2}", drop.item.price)),
        )
    }

    pub fn format_state(&self, state: ConnectionState) -> String {
        let (color, symbol) = match state {
            ConnectionState::Connecting => (Colors::BRIGHT_YELLOW, "*"),
            ConnectionState::Connected => (Colors::BRIGHT_GREEN, "+"),
            ConnectionState::Reconnecting => (Colors::BRIGHT_YELLOW, "~"),
            ConnectionState::Disconnected => (Colors::BRIGHT_RED, "X"),
        };
        let label = format!("[{}]", state.to_string().to_uppercase());
        if self.colored {
            format!("{}{}{} {}", Colors::BOLD, self.paint(color, &label), Colors::RESET, symbol)
        } else {
            format!("{label} {symbol}")
        }
    }

    pub fn format_online(&self, count: u64) -> String {
        format!(
            "{} {} players online",
            self.paint(Colors::BRIGHT_CYAN, "[ONLINE]"),
            count
        )
    }

    pub fn format_toast(&self, toast: &Toast) -> String {
        let color = match toast.kind {
            NotificationKind::Success => Colors::BRIGHT_GREEN,
            NotificationKind::Error => Colors::RED,
            NotificationKind::Warning => Colors::BRIGHT_YELLOW,
            NotificationKind::Info => Colors::BRIGHT_BLUE,
            NotificationKind::System => Colors::BRIGHT_MAGENTA,
        };
        let tag = format!("[{}]", toast.kind.to_string().to_uppercase());
        let mut line = format!("{} {}", self.paint(color, &tag), toast.title);
        if let Some(link) = &toast.link {
            line.push_str(&format!(" {}", self.paint(Colors::DIM, &format!("-> {link}"))));
        }
        line
    }

    pub fn format_error(&self, kind: &str, message: &str) -> String {
        format!(
            "{} ! {}",
            self.paint(Colors::BRIGHT_RED, &format!("[{kind}]")),
            self.paint(Colors::RED, message)
        )
    }
}
