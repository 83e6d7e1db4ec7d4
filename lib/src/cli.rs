use std::time::Duration;

use clap::{Args, Parser, ValueEnum};
use rumqttc::QoS;

use crate::config::{ClientRole, Credentials, MqttConfig, MIN_KEEP_ALIVE};
use crate::error::{Error, Result};
use crate::mqtt::ReconnectPolicy;

pub const DEFAULT_PAYLOAD: &str = r#"{"example": "This is an example"}"#;

/// QoS level for MQTT operations.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QosLevel {
    /// At most once (fire and forget)
    #[default]
    Qos0,
    /// At least once (acknowledged delivery)
    Qos1,
    /// Exactly once (assured delivery)
    Qos2,
}

impl From<QosLevel> for QoS {
    fn from(level: QosLevel) -> Self {
        match level {
            QosLevel::Qos0 => QoS::AtMostOnce,
            QosLevel::Qos1 => QoS::AtLeastOnce,
            QosLevel::Qos2 => QoS::ExactlyOnce,
        }
    }
}

/// Output format for received messages.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `<topic> - <payload>` lines
    #[default]
    Text,
    /// JSON objects, one per line
    Json,
}

/// Broker connection arguments shared by the publisher and the subscriber.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Broker hostname
    #[arg(short = 'H', long)]
    pub host: String,

    /// Broker port
    #[arg(short, long, default_value_t = 1883)]
    pub port: u16,

    /// Username used to authenticate
    #[arg(short, long, default_value = "admin")]
    pub username: String,

    /// Password used to authenticate
    #[arg(short = 'P', long, default_value = "admin")]
    pub password: String,

    /// Connect without sending credentials
    #[arg(long)]
    pub anonymous: bool,

    /// MQTT topic
    #[arg(short, long)]
    pub topic: String,

    /// MQTT client identifier (auto-generated if not specified)
    #[arg(long)]
    pub client_id: Option<String>,

    /// QoS level
    #[arg(long, value_enum, default_value_t = QosLevel::Qos0)]
    pub qos: QosLevel,

    /// Seconds to wait for the broker to acknowledge the connection
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Keep-alive interval in seconds
    #[arg(long, default_value_t = 60)]
    pub keep_alive: u64,

    /// Capacity of the client request and event channels
    #[arg(long, default_value_t = 10)]
    pub channel_capacity: usize,
}

impl ConnectionArgs {
    pub fn credentials(&self) -> Option<Credentials> {
        if self.anonymous {
            return None;
        }
        Some(Credentials { username: self.username.clone(), password: self.password.clone() })
    }

    pub fn to_config(&self, role: ClientRole) -> Result<MqttConfig> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(Error::InvalidConfig("host must not be empty".into()));
        }
        if self.topic.is_empty() {
            return Err(Error::InvalidConfig("topic must not be empty".into()));
        }

        let keep_alive = Duration::from_secs(self.keep_alive);
        if keep_alive < MIN_KEEP_ALIVE {
            return Err(Error::InvalidConfig(format!(
                "keep-alive must be at least {} seconds",
                MIN_KEEP_ALIVE.as_secs()
            )));
        }
        if self.connect_timeout == 0 {
            return Err(Error::InvalidConfig("connect timeout must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig("channel capacity must be positive".into()));
        }

        let mut config = MqttConfig::new(host, self.port, role);
        if let Some(client_id) = &self.client_id {
            config.client_id = client_id.clone();
        }
        config.credentials = self.credentials();
        config.keep_alive = keep_alive;
        config.connect_timeout = Duration::from_secs(self.connect_timeout);
        config.channel_capacity = self.channel_capacity;
        Ok(config)
    }
}

#[derive(Parser, Debug)]
#[command(name = "publisher", version)]
#[command(about = "MQTT Publisher - publish a single message to a topic")]
pub struct PublisherArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Message payload, sent as-is
    #[arg(short, long, default_value = DEFAULT_PAYLOAD)]
    pub data: String,

    /// Ask the broker to retain the message
    #[arg(long)]
    pub retain: bool,
}

impl PublisherArgs {
    pub fn to_config(&self) -> Result<MqttConfig> {
        self.connection.to_config(ClientRole::Publisher)
    }
}

#[derive(Parser, Debug)]
#[command(name = "subscriber", version)]
#[command(about = "MQTT Subscriber - print every message received on a topic")]
pub struct SubscriberArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output format for received messages
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Exit instead of reconnecting when the connection drops
    #[arg(long)]
    pub no_reconnect: bool,

    /// Initial delay before reconnecting (seconds)
    #[arg(long, default_value_t = 1)]
    pub reconnect_delay: u64,

    /// Upper bound for the reconnect delay (seconds)
    #[arg(long, default_value_t = 30)]
    pub max_reconnect_delay: u64,
}

impl SubscriberArgs {
    pub fn reconnect_policy(&self) -> Result<ReconnectPolicy> {
        if self.no_reconnect {
            return Ok(ReconnectPolicy::Disabled);
        }
        if self.reconnect_delay == 0 {
            return Err(Error::InvalidConfig("reconnect delay must be positive".into()));
        }
        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(Error::InvalidConfig(
                "max reconnect delay must not be below the reconnect delay".into(),
            ));
        }
        Ok(ReconnectPolicy::Backoff {
            initial: Duration::from_secs(self.reconnect_delay),
            max: Duration::from_secs(self.max_reconnect_delay),
        })
    }

    pub fn to_config(&self) -> Result<MqttConfig> {
        let mut config = self.connection.to_config(ClientRole::Subscriber)?;
        config.reconnect = self.reconnect_policy()?;
        Ok(config)
    }
}
