/// file: src/types.rs
/// description: payload types for the live drop feed and the inbound wire envelope
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// Server ids arrive as either JSON strings or integers
mod string_or_number {
    use super::*;
    use serde::de::Error;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!(
                "expected string or number id, got {other}"
            ))),
        }
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s)),
            Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(D::Error::custom(format!(
                "expected string or number id, got {other}"
            ))),
        }
    }
}

// Prices are sometimes serialized as decimal strings
mod lenient_float {
    use super::*;
    use serde::de::Error;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            None | Some(serde_json::Value::Null) => Ok(0.0),
            Some(serde_json::Value::Number(n)) => Ok(n.as_f64().unwrap_or_default()),
            Some(serde_json::Value::String(s)) => s.parse::<f64>().map_err(D::Error::custom),
            Some(other) => Err(D::Error::custom(format!("expected price, got {other}"))),
        }
    }
}

/// Lifecycle of the single shared transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(label)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropUser {
    #[serde(deserialize_with = "string_or_number::deserialize")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropItem {
    #[serde(deserialize_with = "string_or_number::deserialize")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub rarity: String,
    #[serde(default, deserialize_with = "lenient_float::deserialize")]
    pub price: f64,
}

/// One "item drop" broadcast by the server.
///
/// `id` and `drop_time` are optional on the wire; the dedup cache and the
/// history store reject events missing either of them.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropEvent {
    #[serde(
        default,
        deserialize_with = "string_or_number::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub user: DropUser,
    pub item: DropItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_highlighted: bool,
    #[serde(default)]
    pub is_rare: bool,
}

impl DropEvent {
    /// Identity key `id_userId_itemId`, or `None` when the server omitted the id.
    pub fn dedup_key(&self) -> Option<String> {
        self.id
            .as_deref()
            .map(|id| format!("{}_{}_{}", id, self.user.id, self.item.id))
    }

    /// True when the drop happened more than `max_age` before `now`.
    /// Events without a drop time count as stale.
    pub fn is_older_than(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.drop_time {
            Some(at) => now.signed_duration_since(at) > max_age,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
    System,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
            NotificationKind::System => "system",
        };
        f.write_str(label)
    }
}

/// Ephemeral user-facing notification; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUsersUpdate {
    pub count: u64,
}

/// Inbound text frame: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "onlineUsersUpdate")]
    OnlineUsersUpdate(OnlineUsersUpdate),
    #[serde(rename = "liveDrop")]
    LiveDrop(DropEvent),
    #[serde(rename = "notification")]
    Notification(NotificationEvent),
}
