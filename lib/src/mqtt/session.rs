use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, Outgoing, Packet, QoS, StateError,
    SubscribeReasonCode,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MqttConfig;
use crate::error::{Error, Result};
use crate::mqtt::backoff::ReconnectPolicy;
use crate::mqtt::status::ConnackStatus;

/// Connection lifecycle, forwarded from the event loop task to the main path in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Refused(ConnackStatus),
    Subscribed,
    SubscribeFailed,
    Message { topic: String, payload: Vec<u8> },
    /// An outgoing PUBLISH left the client. Final for QoS 0.
    PublishSent,
    /// PUBACK (QoS 1) or PUBCOMP (QoS 2) received.
    PublishAcked,
    ConnectionLost(String),
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Disconnecting,
}

impl SessionState {
    pub fn on_event(self, event: &SessionEvent, reconnecting: bool) -> SessionState {
        match (self, event) {
            (SessionState::Disconnecting, SessionEvent::Disconnected) => SessionState::Disconnected,
            (SessionState::Disconnecting, _) => SessionState::Disconnecting,
            (_, SessionEvent::Connected) => SessionState::Connected,
            (SessionState::Connected, SessionEvent::Subscribed) => SessionState::Subscribed,
            (_, SessionEvent::Refused(_)) | (_, SessionEvent::Disconnected) => {
                SessionState::Disconnected
            }
            (_, SessionEvent::ConnectionLost(_)) if reconnecting => SessionState::Connecting,
            (_, SessionEvent::ConnectionLost(_)) => SessionState::Disconnected,
            (state, _) => state,
        }
    }
}

pub struct Session {
    client: AsyncClient,
    events: mpsc::Receiver<SessionEvent>,
    event_loop_handle: JoinHandle<()>,
    reconnect: ReconnectPolicy,
    state: SessionState,
}

impl Session {
    /// Starts connecting in the background. Must be called inside a tokio runtime.
    pub fn connect(config: &MqttConfig) -> Self {
        let capacity = config.channel_capacity.max(1);
        let (event_tx, events) = mpsc::channel(capacity);
        let (client, event_loop) = AsyncClient::new(config.mqtt_options(), capacity);

        info!(
            "Connecting to {}:{} as {}",
            config.broker_host, config.broker_port, config.client_id
        );

        let event_loop_handle = Self::start_event_loop(event_loop, event_tx, config.reconnect);

        Self {
            client,
            events,
            event_loop_handle,
            reconnect: config.reconnect,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.events.recv().await;
        match &event {
            Some(event) => {
                self.state = self.state.on_event(event, self.reconnect.is_enabled());
            }
            None => self.state = SessionState::Disconnected,
        }
        event
    }

    pub async fn wait_connected(&mut self, timeout: Duration) -> Result<()> {
        let reconnect = self.reconnect.is_enabled();
        let wait = async {
            loop {
                match self.next_event().await {
                    Some(SessionEvent::Connected) => return Ok(()),
                    Some(SessionEvent::Refused(status)) => {
                        return Err(Error::ConnectionRefused(status))
                    }
                    Some(SessionEvent::ConnectionLost(reason)) if !reconnect => {
                        return Err(Error::ConnectionLost(reason))
                    }
                    Some(SessionEvent::ConnectionLost(reason)) => {
                        warn!("Connection attempt failed: {}", reason);
                    }
                    Some(event) => debug!("Ignoring {:?} while connecting", event),
                    None => return Err(Error::EventLoopClosed),
                }
            }
        };

        tokio::time::timeout(timeout, wait).await.map_err(|_| Error::ConnectTimeout(timeout))?
    }

    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        self.client.subscribe(topic, qos).await?;
        Ok(())
    }

    pub async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: impl Into<Vec<u8>>,
    ) -> Result<()> {
        self.client.publish(topic, qos, retain, payload).await?;
        Ok(())
    }

    pub async fn wait_published(&mut self, qos: QoS, timeout: Duration) -> Result<()> {
        let wait = async {
            loop {
                match self.next_event().await {
                    Some(SessionEvent::PublishSent) if qos == QoS::AtMostOnce => return Ok(()),
                    Some(SessionEvent::PublishAcked) => return Ok(()),
                    Some(SessionEvent::ConnectionLost(reason)) => {
                        return Err(Error::ConnectionLost(reason))
                    }
                    Some(SessionEvent::Disconnected) | None => return Err(Error::EventLoopClosed),
                    Some(event) => debug!("Ignoring {:?} while publishing", event),
                }
            }
        };

        tokio::time::timeout(timeout, wait).await.map_err(|_| Error::PublishTimeout(timeout))?
    }

    /// Sends DISCONNECT and waits until the event loop has flushed it.
    /// A session that is not connected is torn down without one.
    ///
    /// Returns `true` only when a DISCONNECT packet actually went out.
    pub async fn disconnect(&mut self, timeout: Duration) -> Result<bool> {
        let connected = matches!(self.state, SessionState::Connected | SessionState::Subscribed);
        if !connected || self.event_loop_handle.is_finished() {
            self.event_loop_handle.abort();
            self.state = SessionState::Disconnected;
            return Ok(false);
        }

        self.state = SessionState::Disconnecting;
        if let Err(e) = self.client.disconnect().await {
            debug!("Disconnect request not delivered, event loop already gone: {}", e);
            self.state = SessionState::Disconnected;
            return Ok(false);
        }

        let wait = async {
            loop {
                match self.next_event().await {
                    Some(SessionEvent::Disconnected) => return true,
                    None => return false,
                    Some(event) => debug!("Ignoring {:?} while disconnecting", event),
                }
            }
        };

        let sent = tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| Error::DisconnectTimeout(timeout))?;
        self.state = SessionState::Disconnected;
        Ok(sent)
    }

    fn start_event_loop(
        mut event_loop: EventLoop,
        event_tx: mpsc::Sender<SessionEvent>,
        reconnect: ReconnectPolicy,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = reconnect.backoff();
            loop {
                let Some(event) = translate(event_loop.poll().await) else {
                    continue;
                };

                let stop = match &event {
                    SessionEvent::Refused(_) | SessionEvent::Disconnected => true,
                    SessionEvent::ConnectionLost(_) => backoff.is_none(),
                    _ => false,
                };
                let lost = matches!(event, SessionEvent::ConnectionLost(_));
                if event == SessionEvent::Connected {
                    if let Some(backoff) = backoff.as_mut() {
                        backoff.reset();
                    }
                }

                if event_tx.send(event).await.is_err() {
                    debug!("Session dropped, stopping event loop");
                    break;
                }
                if stop {
                    break;
                }
                if lost {
                    if let Some(backoff) = backoff.as_mut() {
                        let delay = backoff.next_delay();
                        info!("Reconnecting in {:?}", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            debug!("MQTT event loop exited");
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.event_loop_handle.abort();
    }
}

/// Maps one poll result of the library event loop onto a session event.
pub fn translate(polled: std::result::Result<Event, ConnectionError>) -> Option<SessionEvent> {
    match polled {
        Ok(Event::Incoming(packet)) => match packet {
            Packet::ConnAck(_) => Some(SessionEvent::Connected),
            Packet::SubAck(ack) => {
                let failed =
                    ack.return_codes.iter().any(|code| matches!(code, SubscribeReasonCode::Failure));
                Some(if failed { SessionEvent::SubscribeFailed } else { SessionEvent::Subscribed })
            }
            Packet::Publish(publish) => Some(SessionEvent::Message {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            }),
            Packet::PubAck(_) | Packet::PubComp(_) => Some(SessionEvent::PublishAcked),
            Packet::Disconnect => {
                Some(SessionEvent::ConnectionLost("broker closed the connection".into()))
            }
            _ => None,
        },
        Ok(Event::Outgoing(Outgoing::Publish(_))) => Some(SessionEvent::PublishSent),
        Ok(Event::Outgoing(Outgoing::Disconnect)) => Some(SessionEvent::Disconnected),
        Ok(Event::Outgoing(_)) => None,
        Err(ConnectionError::ConnectionRefused(code)) => {
            Some(connack_event(ConnackStatus::from(code)))
        }
        Err(ConnectionError::MqttState(StateError::Deserialization(
            rumqttc::mqttbytes::Error::InvalidConnectReturnCode(code),
        ))) => Some(connack_event(ConnackStatus::from_code(code))),
        Err(ConnectionError::Io(e)) => match unused_return_code(&e) {
            Some(code) => Some(connack_event(ConnackStatus::from_code(code))),
            None => Some(SessionEvent::ConnectionLost(ConnectionError::Io(e).to_string())),
        },
        Err(ConnectionError::RequestsDone) => Some(SessionEvent::Disconnected),
        Err(e) => Some(SessionEvent::ConnectionLost(e.to_string())),
    }
}

fn connack_event(status: ConnackStatus) -> SessionEvent {
    if status.is_success() {
        SessionEvent::Connected
    } else {
        SessionEvent::Refused(status)
    }
}

/// The connect handshake reports CONNACK codes above 5 as an `InvalidData` I/O error.
fn unused_return_code(e: &std::io::Error) -> Option<u8> {
    if e.kind() != std::io::ErrorKind::InvalidData {
        return None;
    }
    e.to_string().strip_prefix("Invalid Connect return code: ")?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, PubAck, Publish, SubAck};

    #[test]
    fn connack_becomes_connected() {
        let ack = ConnAck { session_present: false, code: ConnectReturnCode::Success };
        let event = translate(Ok(Event::Incoming(Packet::ConnAck(ack))));
        assert_eq!(event, Some(SessionEvent::Connected));
    }

    #[test]
    fn refused_connection_keeps_status() {
        let refused = ConnectionError::ConnectionRefused(ConnectReturnCode::BadUserNamePassword);
        assert_eq!(
            translate(Err(refused)),
            Some(SessionEvent::Refused(ConnackStatus::BadUserNamePassword))
        );
    }

    #[test]
    fn undecodable_return_code_is_unused() {
        let err = ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Invalid Connect return code: 9",
        ));
        let event = translate(Err(err));
        assert_eq!(event, Some(SessionEvent::Refused(ConnackStatus::Unused(9))));
    }

    #[test]
    fn other_invalid_data_is_connection_lost() {
        let err = ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Malformed packet",
        ));
        match translate(Err(err)) {
            Some(SessionEvent::ConnectionLost(reason)) => assert!(reason.contains("Malformed")),
            other => panic!("expected ConnectionLost, got {:?}", other),
        }
    }

    #[test]
    fn incoming_publish_becomes_message() {
        let publish = Publish::new("t", QoS::AtMostOnce, r#"{"k": 1}"#);
        let event = translate(Ok(Event::Incoming(Packet::Publish(publish))));
        assert_eq!(
            event,
            Some(SessionEvent::Message { topic: "t".into(), payload: br#"{"k": 1}"#.to_vec() })
        );
    }

    #[test]
    fn suback_failure_is_reported() {
        let ok = SubAck { pkid: 1, return_codes: vec![SubscribeReasonCode::Success(QoS::AtMostOnce)] };
        let failed = SubAck { pkid: 2, return_codes: vec![SubscribeReasonCode::Failure] };

        assert_eq!(translate(Ok(Event::Incoming(Packet::SubAck(ok)))), Some(SessionEvent::Subscribed));
        assert_eq!(
            translate(Ok(Event::Incoming(Packet::SubAck(failed)))),
            Some(SessionEvent::SubscribeFailed)
        );
    }

    #[test]
    fn publish_progress_events() {
        assert_eq!(
            translate(Ok(Event::Outgoing(Outgoing::Publish(0)))),
            Some(SessionEvent::PublishSent)
        );
        assert_eq!(
            translate(Ok(Event::Incoming(Packet::PubAck(PubAck { pkid: 1 })))),
            Some(SessionEvent::PublishAcked)
        );
    }

    #[test]
    fn outgoing_disconnect_ends_session() {
        assert_eq!(
            translate(Ok(Event::Outgoing(Outgoing::Disconnect))),
            Some(SessionEvent::Disconnected)
        );
        assert_eq!(translate(Err(ConnectionError::RequestsDone)), Some(SessionEvent::Disconnected));
    }

    #[test]
    fn pings_are_dropped() {
        assert_eq!(translate(Ok(Event::Outgoing(Outgoing::PingReq))), None);
        assert_eq!(translate(Ok(Event::Incoming(Packet::PingResp))), None);
    }

    #[test]
    fn io_errors_are_connection_lost() {
        let err = ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(matches!(translate(Err(err)), Some(SessionEvent::ConnectionLost(_))));
    }

    #[test]
    fn state_follows_lifecycle() {
        let mut state = SessionState::Connecting;
        state = state.on_event(&SessionEvent::Connected, false);
        assert_eq!(state, SessionState::Connected);
        state = state.on_event(&SessionEvent::Subscribed, false);
        assert_eq!(state, SessionState::Subscribed);
        state = state.on_event(
            &SessionEvent::Message { topic: "t".into(), payload: Vec::new() },
            false,
        );
        assert_eq!(state, SessionState::Subscribed);
        state = SessionState::Disconnecting.on_event(&SessionEvent::Disconnected, false);
        assert_eq!(state, SessionState::Disconnected);
    }

    #[test]
    fn refused_and_lost_leave_connected_states() {
        let refused = SessionEvent::Refused(ConnackStatus::NotAuthorized);
        assert_eq!(SessionState::Connecting.on_event(&refused, true), SessionState::Disconnected);

        let lost = SessionEvent::ConnectionLost("reset".into());
        assert_eq!(SessionState::Subscribed.on_event(&lost, true), SessionState::Connecting);
        assert_eq!(SessionState::Subscribed.on_event(&lost, false), SessionState::Disconnected);
    }

    #[test]
    fn disconnecting_ignores_late_events() {
        let state = SessionState::Disconnecting.on_event(&SessionEvent::Connected, false);
        assert_eq!(state, SessionState::Disconnecting);
    }
}
