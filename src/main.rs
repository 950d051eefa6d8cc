use {
    sentiflow::{
        aggregator::Aggregator, config::Config, snapshot::PublishCadence,
        transport::FileTailTransport, ui,
    },
    std::time::Duration,
    tokio::sync::watch,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Logs go to stderr; the UI owns stdout via the alternate screen
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = Config::from_env()?;

    log::info!("Starting Sentiflow");
    log::info!("   Stream: {} ({:?})", config.stream_path.display(), config.stream_format);
    log::info!("   Window mode: {:?}", config.window_mode);
    log::info!("   Publish cadence: {:?}", config.publish_cadence);
    log::info!(
        "   Sentiment range: [{}, {}]",
        config.sentiment_range.min,
        config.sentiment_range.max
    );

    let (aggregator, snapshots) = Aggregator::from_config(&config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let transport = FileTailTransport::from_start(config.stream_path.clone());
    let aggregator_handle = tokio::spawn(aggregator.run(transport, shutdown_rx));

    // Staleness indicator threshold follows the expected publish cadence;
    // on_message streams are treated as roughly once-per-second
    let expected_interval = match config.publish_cadence {
        PublishCadence::OnMessage => Duration::from_secs(1),
        PublishCadence::Interval { secs } => Duration::from_secs_f64(secs),
    };
    let range = config.sentiment_range;
    let ui_handle = tokio::spawn(async move {
        if let Err(e) = ui::run_ui(snapshots, range, expected_interval).await {
            log::error!("UI error: {}", e);
        }
    });

    tokio::select! {
        _ = ui_handle => {
            log::info!("UI exited");
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupt received");
        }
    }

    // Let the aggregator drain and publish its final snapshot
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(Duration::from_secs(5), aggregator_handle).await {
        Ok(Ok(report)) => log::info!(
            "Final report: {} records, {} decode errors, last snapshot #{}",
            report.records_accepted,
            report.decode_errors,
            report.last_sequence
        ),
        Ok(Err(e)) => log::error!("Aggregator task failed: {}", e),
        Err(_) => log::warn!("Aggregator did not drain within 5s"),
    }

    Ok(())
}
