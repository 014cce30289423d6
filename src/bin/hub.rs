use std::sync::Arc;

use clap::Parser;
use enviro_hub::{
    api::{ApiState, spawn_api_server},
    bus::{self, BusSubscriber, MqttAlertPublisher},
    config::read_config_file,
    dispatcher::Dispatcher,
    sinks::{CsvSink, InfluxSink, SinkFanout},
    store::StateStore,
    thresholds::ThresholdSet,
};
use tokio::sync::watch;
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("enviro_hub", LevelFilter::TRACE),
        ("hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let store = Arc::new(StateStore::new(config.history_limit));

    let mut fanout = SinkFanout::default();
    if let Some(csv) = &config.sinks.csv {
        fanout.push(Box::new(CsvSink::create(&csv.path)?));
        info!("CSV log sink enabled at {}", csv.path.display());
    }
    if let Some(influx) = &config.sinks.influx {
        match InfluxSink::from_config(influx) {
            Some(sink) => {
                fanout.push(Box::new(sink));
                info!("InfluxDB sink enabled ({})", influx.url);
            }
            None => info!("InfluxDB sink disabled in config"),
        }
    }
    debug!("{} sink(s) configured", fanout.len());

    let thresholds = ThresholdSet::new(config.thresholds.clone());

    let (client, eventloop) = bus::connect(&config.bus);
    let publisher = MqttAlertPublisher::new(client.clone(), config.bus.alert_topic.clone());

    let dispatcher = Dispatcher::new(store.clone(), fanout, thresholds, Box::new(publisher));
    let subscriber = BusSubscriber::new(
        client,
        eventloop,
        config.bus.ingest_topic.clone(),
        dispatcher,
    );

    // a bind failure here is the only fatal runtime error
    spawn_api_server(config.bind_addr, ApiState { store }).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingestion = tokio::spawn(subscriber.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // the subscriber finishes any in-flight dispatch before stopping
    let _ = shutdown_tx.send(true);
    if let Err(e) = ingestion.await {
        error!("ingestion task failed: {e}");
    }

    Ok(())
}
