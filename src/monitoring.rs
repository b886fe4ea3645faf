use crate::dedup::DedupVerdict;
use crate::error::LiveDropsError;
use anyhow::Result;
use metrics::{Counter, Gauge, counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

// Global metrics
pub static DROPS_PUBLISHED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("livedrops_drops_published_total"));
pub static NOTIFICATIONS_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("livedrops_notifications_total"));
pub static CONNECTIONS_OPENED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("livedrops_connections_opened_total"));
pub static CONNECTED_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("livedrops_connected"));
pub static ONLINE_USERS_GAUGE: LazyLock<Gauge> =
    LazyLock::new(|| gauge!("livedrops_online_users"));

pub fn record_rejected_drop(verdict: DedupVerdict) {
    counter!("livedrops_drops_rejected_total", "reason" => verdict.as_str()).increment(1);
}

pub async fn setup_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "rs-livedrops")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(()) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            DROPS_PUBLISHED_COUNTER.absolute(0);
            NOTIFICATIONS_COUNTER.absolute(0);
            CONNECTIONS_OPENED_COUNTER.absolute(0);
            CONNECTED_GAUGE.set(0.0);
            ONLINE_USERS_GAUGE.set(0.0);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(LiveDropsError::MetricsError(e.to_string()).into())
        }
    }
}
