use std::future::Future;
use std::time::Duration;

use rumqttc::QoS;
use tracing::info;

use crate::cli::PublisherArgs;
use crate::config::MqttConfig;
use crate::error::{Error, Result};
use crate::mqtt::interrupted;
use crate::mqtt::session::Session;
use crate::mqtt::status::ConnackStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

impl From<&PublisherArgs> for PublishRequest {
    fn from(args: &PublisherArgs) -> Self {
        Self {
            topic: args.connection.topic.clone(),
            payload: args.data.clone(),
            qos: args.connection.qos.into(),
            retain: args.retain,
        }
    }
}

/// How a publisher run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// Ctrl-C arrived first. `disconnect_sent` is false when no connection existed yet.
    Interrupted { disconnect_sent: bool },
}

/// Connects, publishes `request` exactly once and disconnects.
///
/// Ctrl-C during any wait ends the run early with an orderly disconnect.
pub async fn publish_once(config: &MqttConfig, request: &PublishRequest) -> Result<PublishOutcome> {
    publish_until(config, request, interrupted()).await
}

/// Same as [`publish_once`], with `shutdown` standing in for Ctrl-C.
pub async fn publish_until(
    config: &MqttConfig,
    request: &PublishRequest,
    shutdown: impl Future<Output = ()>,
) -> Result<PublishOutcome> {
    let timeout = config.connect_timeout;
    let mut session = Session::connect(config);
    tokio::pin!(shutdown);

    println!("Wait for connection ...");
    let connected = tokio::select! {
        res = session.wait_connected(timeout) => res,
        _ = &mut shutdown => return stop_early(session, timeout).await,
    };
    match connected {
        Ok(()) => println!("{}", ConnackStatus::Accepted),
        Err(Error::ConnectionRefused(status)) => {
            println!("{}", status);
            return Err(Error::ConnectionRefused(status));
        }
        Err(e) => return Err(e),
    }

    session.publish(&request.topic, request.qos, request.retain, request.payload.clone()).await?;
    tokio::select! {
        res = session.wait_published(request.qos, timeout) => res?,
        _ = &mut shutdown => return stop_early(session, timeout).await,
    }
    println!("Data published");

    if session.disconnect(timeout).await? {
        println!("Disconnection successful");
    }
    Ok(PublishOutcome::Published)
}

async fn stop_early(mut session: Session, timeout: Duration) -> Result<PublishOutcome> {
    info!("Interrupted, disconnecting");
    let disconnect_sent = session.disconnect(timeout).await?;
    if disconnect_sent {
        println!("Disconnection successful");
    }
    Ok(PublishOutcome::Interrupted { disconnect_sent })
}
