pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mqtt;

pub use config::{ClientRole, Credentials, MqttConfig};
pub use error::{Error, Result};
