use anyhow::{Context, Result};
use clap::Parser;
use mqtt_lib::cli::PublisherArgs;
use mqtt_lib::logging::init_tracing;
use mqtt_lib::mqtt::publisher::{publish_once, PublishRequest};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = PublisherArgs::parse();
    let config = args.to_config().context("invalid publisher options")?;
    let request = PublishRequest::from(&args);

    let outcome = publish_once(&config, &request)
        .await
        .with_context(|| format!("failed to publish to {}", request.topic))?;

    tracing::debug!("Publisher finished: {:?}", outcome);
    Ok(())
}
