use anyhow::{Context, Result};
use clap::Parser;
use mqtt_lib::cli::SubscriberArgs;
use mqtt_lib::logging::init_tracing;
use mqtt_lib::mqtt::subscriber::Subscriber;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = SubscriberArgs::parse();
    let config = args.to_config().context("invalid subscriber options")?;
    let subscriber =
        Subscriber::new(&args.connection.topic, args.connection.qos.into(), args.format);

    subscriber
        .run(&config)
        .await
        .with_context(|| format!("subscription to {} ended", args.connection.topic))?;

    tracing::info!("Subscriber stopped");
    Ok(())
}
