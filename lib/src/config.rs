use std::fmt;
use std::time::Duration;

use rumqttc::MqttOptions;

use crate::mqtt::ReconnectPolicy;

/// The library rejects keep-alive intervals shorter than this.
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRole {
    Publisher,
    Subscriber,
}

impl ClientRole {
    fn suffix(&self) -> &'static str {
        match self {
            ClientRole::Publisher => "pub",
            ClientRole::Subscriber => "sub",
        }
    }

    /// `mqtt-pub-1a2b3c4d` style identifier, unique enough for concurrent runs.
    pub fn generate_client_id(&self) -> String {
        format!("mqtt-{}-{:08x}", self.suffix(), rand::random::<u32>())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
    pub clean_session: bool,
    pub connect_timeout: Duration,
    pub channel_capacity: usize,
    pub reconnect: ReconnectPolicy,
}

impl MqttConfig {
    pub fn new(broker_host: impl Into<String>, broker_port: u16, role: ClientRole) -> Self {
        Self {
            broker_host: broker_host.into(),
            broker_port,
            client_id: role.generate_client_id(),
            credentials: None,
            keep_alive: Duration::from_secs(60),
            clean_session: true,
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 10,
            reconnect: ReconnectPolicy::Disabled,
        }
    }

    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(self.client_id.clone(), self.broker_host.clone(), self.broker_port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(self.clean_session);

        if let Some(credentials) = &self.credentials {
            options.set_credentials(credentials.username.clone(), credentials.password.clone());
        }

        options
    }
}
