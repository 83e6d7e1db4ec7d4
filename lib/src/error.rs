use std::time::Duration;

use crate::mqtt::ConnackStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connection timeout: no acknowledgment from broker after {0:?}")]
    ConnectTimeout(Duration),

    #[error("{0} (return code {code})", code = .0.code())]
    ConnectionRefused(ConnackStatus),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("publish not confirmed after {0:?}")]
    PublishTimeout(Duration),

    #[error("disconnect not confirmed after {0:?}")]
    DisconnectTimeout(Duration),

    #[error("MQTT event loop exited")]
    EventLoopClosed,

    #[error("MQTT client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
