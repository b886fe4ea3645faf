use anyhow::Result;
use clap::Parser;
use rs_livedrops::{
    cli::Args,
    config::Config,
    connection::RealtimeCore,
    consumer::FeedConsumer,
    events::{ChannelToaster, ReportingInvalidator, UiEvent, create_event_channel, feed_listener},
    history::DropHistoryStore,
    monitoring::setup_metrics,
    recent::RecentDropsClient,
    storage::FileStorage,
    tracing_setup::setup_tracing,
    ui::UIController,
    websocket::WebSocketTransport,
};
use std::sync::Arc;

use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args)?;

    setup_tracing(&config.logging)?;
    info!(
        "Starting live drops client v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.transport.url
    );

    if config.metrics.enabled {
        setup_metrics(config.metrics.port).await?;
        info!("Metrics server started on port {}", config.metrics.port);
    }

    let core = RealtimeCore::new(
        Arc::new(WebSocketTransport::new()),
        config.transport.clone(),
        config.dedup,
    );
    let storage = Arc::new(FileStorage::new(&config.history.dir));
    let history = Arc::new(DropHistoryStore::new(storage, config.history.clone()));

    let (event_sender, event_receiver) = create_event_channel();
    let mut ui = UIController::new(event_receiver, config.logging.colored);
    let ui_task = tokio::spawn(async move { ui.run().await });

    let mut consumer = FeedConsumer::new(
        core.clone(),
        history,
        Arc::new(ChannelToaster::new(event_sender.clone())),
        Arc::new(ReportingInvalidator::new(event_sender.clone())),
        config.toast,
    )
    .with_listener(feed_listener(event_sender.clone()));

    consumer.activate();

    if config.api.seed_enabled && consumer.history().is_empty() {
        let seeded = match RecentDropsClient::new(&config.api) {
            Ok(client) => client.fetch().await,
            Err(e) => Err(e),
        };
        match seeded {
            Ok(drops) => {
                consumer.seed(drops);
            }
            Err(e) => {
                warn!("Recent drops seed failed: {}", e);
                let _ = event_sender.try_send(UiEvent::SeedFailed(e.to_string()));
            }
        }
    }

    info!("Client started. Press Ctrl+C to shutdown...");
    tokio::signal::ctrl_c().await?;

    consumer.deactivate();
    core.dispose();
    let _ = event_sender.send(UiEvent::Stopping).await;
    let _ = ui_task.await;

    info!("Client stopped successfully");
    Ok(())
}
