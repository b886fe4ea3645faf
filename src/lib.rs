#![doc = include_str!("../docs/rustdoc.md")]

/// Command-line argument definitions.
pub mod cli;
/// Wall-clock abstraction.
pub mod clock;
/// Runtime configuration model.
pub mod config;
/// Shared live connection and the realtime core.
pub mod connection;
/// Per-surface consumer adapter.
pub mod consumer;
/// Duplicate and stale drop suppression.
pub mod dedup;
/// Typed subscriber registries.
pub mod dispatcher;
/// Error types used across the crate.
pub mod error;
/// Channel between consumer callbacks and the terminal UI.
pub mod events;
/// Terminal output formatters.
pub mod formatter;
/// Persisted recent-drops history.
pub mod history;
/// Metrics counters and the Prometheus exporter.
pub mod monitoring;
/// Recent-drops HTTP seed.
pub mod recent;
/// Durable named-record storage.
pub mod storage;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Transport traits and events.
pub mod transport;
/// Live feed payload types.
pub mod types;
/// UI controller and presentation loop.
pub mod ui;
/// WebSocket transport.
pub mod websocket;

/// Primary crate error type.
pub use error::LiveDropsError;
pub use connection::RealtimeCore;
pub use consumer::FeedConsumer;
