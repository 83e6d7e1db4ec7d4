use std::fmt;

use rumqttc::ConnectReturnCode;

/// Outcome of a connect attempt, as reported by the broker's CONNACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnackStatus {
    Accepted,
    RefusedProtocolVersion,
    BadClientId,
    ServiceUnavailable,
    BadUserNamePassword,
    NotAuthorized,
    /// Codes 6-255 carry no meaning in MQTT 3.1.1.
    Unused(u8),
}

impl ConnackStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ConnackStatus::Accepted,
            1 => ConnackStatus::RefusedProtocolVersion,
            2 => ConnackStatus::BadClientId,
            3 => ConnackStatus::ServiceUnavailable,
            4 => ConnackStatus::BadUserNamePassword,
            5 => ConnackStatus::NotAuthorized,
            other => ConnackStatus::Unused(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ConnackStatus::Accepted => 0,
            ConnackStatus::RefusedProtocolVersion => 1,
            ConnackStatus::BadClientId => 2,
            ConnackStatus::ServiceUnavailable => 3,
            ConnackStatus::BadUserNamePassword => 4,
            ConnackStatus::NotAuthorized => 5,
            ConnackStatus::Unused(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConnackStatus::Accepted)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConnackStatus::Accepted => "Connection successful",
            ConnackStatus::RefusedProtocolVersion => {
                "Connection refused - incorrect protocol version"
            }
            ConnackStatus::BadClientId => "Connection refused - invalid client identifier",
            ConnackStatus::ServiceUnavailable => "Connection refused - server unavailable",
            ConnackStatus::BadUserNamePassword => "Connection refused - bad username or password",
            ConnackStatus::NotAuthorized => "Connection refused - not authorised",
            ConnackStatus::Unused(_) => "Currently unused.",
        }
    }
}

impl fmt::Display for ConnackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl From<ConnectReturnCode> for ConnackStatus {
    fn from(code: ConnectReturnCode) -> Self {
        match code {
            ConnectReturnCode::Success => ConnackStatus::Accepted,
            ConnectReturnCode::RefusedProtocolVersion => ConnackStatus::RefusedProtocolVersion,
            ConnectReturnCode::BadClientId => ConnackStatus::BadClientId,
            ConnectReturnCode::ServiceUnavailable => ConnackStatus::ServiceUnavailable,
            ConnectReturnCode::BadUserNamePassword => ConnackStatus::BadUserNamePassword,
            ConnectReturnCode::NotAuthorized => ConnackStatus::NotAuthorized,
        }
    }
}
