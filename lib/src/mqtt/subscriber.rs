use std::future::Future;
use std::time::Duration;

use rumqttc::QoS;
use serde::Serialize;
use serde_json::error::Category;
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::OutputFormat;
use crate::config::MqttConfig;
use crate::error::{Error, Result};
use crate::mqtt::interrupted;
use crate::mqtt::session::{Session, SessionEvent};
use crate::mqtt::status::ConnackStatus;

pub const MALFORMED_NOTICE: &str = "Message is malformed. JSON required.";

#[derive(Serialize)]
struct MessageRecord<'a> {
    topic: &'a str,
    payload: Value,
}

/// Decodes `payload` as JSON. `Err` carries the line to print instead.
pub fn decode_payload(payload: &[u8]) -> std::result::Result<Value, String> {
    serde_json::from_slice(payload).map_err(|e| match e.classify() {
        Category::Syntax | Category::Eof | Category::Data => MALFORMED_NOTICE.to_string(),
        Category::Io => e.to_string(),
    })
}

pub fn render_message(format: OutputFormat, topic: &str, payload: &[u8]) -> String {
    let value = match decode_payload(payload) {
        Ok(value) => value,
        Err(notice) => return notice,
    };

    match format {
        OutputFormat::Text => format!("{} - {}", topic, value),
        OutputFormat::Json => serde_json::to_string(&MessageRecord { topic, payload: value })
            .unwrap_or_else(|e| e.to_string()),
    }
}

pub struct Subscriber {
    topic: String,
    qos: QoS,
    format: OutputFormat,
}

async fn disconnect(session: &mut Session, timeout: Duration) -> Result<()> {
    if session.disconnect(timeout).await? {
        println!("Disconnection successful");
    }
    Ok(())
}

impl Subscriber {
    pub fn new(topic: impl Into<String>, qos: QoS, format: OutputFormat) -> Self {
        Self { topic: topic.into(), qos, format }
    }

    /// Prints every message on the topic until Ctrl-C, then disconnects.
    pub async fn run(&self, config: &MqttConfig) -> Result<()> {
        self.run_until(config, interrupted()).await
    }

    /// Same as [`Subscriber::run`], with `shutdown` standing in for Ctrl-C.
    pub async fn run_until(
        &self,
        config: &MqttConfig,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let timeout = config.connect_timeout;
        let mut session = Session::connect(config);
        tokio::pin!(shutdown);

        tokio::select! {
            connected = session.wait_connected(timeout) => match connected {
                Ok(()) => self.on_connected(&session).await?,
                Err(Error::ConnectionRefused(status)) => {
                    println!("{}", status);
                    return Err(Error::ConnectionRefused(status));
                }
                Err(e) => return Err(e),
            },
            _ = &mut shutdown => {
                info!("Interrupted before the connection was established");
                return disconnect(&mut session, timeout).await;
            }
        }

        loop {
            tokio::select! {
                event = session.next_event() => match event {
                    Some(SessionEvent::Connected) => self.on_connected(&session).await?,
                    Some(SessionEvent::Message { topic, payload }) => {
                        println!("{}", render_message(self.format, &topic, &payload));
                    }
                    Some(SessionEvent::SubscribeFailed) => {
                        warn!("Broker rejected the subscription to {}", self.topic);
                    }
                    Some(SessionEvent::Refused(status)) => {
                        println!("{}", status);
                        return Err(Error::ConnectionRefused(status));
                    }
                    Some(SessionEvent::ConnectionLost(reason)) if config.reconnect.is_enabled() => {
                        warn!("Connection lost: {}", reason);
                    }
                    Some(SessionEvent::ConnectionLost(reason)) => {
                        return Err(Error::ConnectionLost(reason));
                    }
                    Some(_) => {}
                    None => return Err(Error::EventLoopClosed),
                },
                _ = &mut shutdown => break,
            }
        }

        disconnect(&mut session, timeout).await
    }

    /// Subscribes on every CONNACK so the subscription survives reconnects.
    async fn on_connected(&self, session: &Session) -> Result<()> {
        println!("{}", ConnackStatus::Accepted);
        session.subscribe(&self.topic, self.qos).await?;
        println!("Subscribed to {}", self.topic);
        Ok(())
    }
}
