//! A one-connection MQTT 3.1.1 broker on an ephemeral loopback port.
//!
//! It answers CONNECT with a chosen CONNACK code, acknowledges SUBSCRIBE and
//! records every packet the client sends afterwards.

// Not all test files use all helpers.
#![allow(dead_code)]

use std::future::Future;
use std::io;
use std::time::Duration;

use mqtt_lib::{ClientRole, MqttConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const CONNECT: u8 = 1;
pub const PUBLISH: u8 = 3;
pub const SUBSCRIBE: u8 = 8;
pub const DISCONNECT: u8 = 14;

/// One MQTT control packet: fixed header byte plus the bytes after the remaining length.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: u8,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn kind(&self) -> u8 {
        self.header >> 4
    }
}

pub async fn read_frame(stream: &mut TcpStream) -> io::Result<Frame> {
    let header = stream.read_u8().await?;

    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        len |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; len];
    stream.read_exact(&mut body).await?;
    Ok(Frame { header, body })
}

pub struct FakeBroker {
    pub port: u16,
    connect_seen: Option<oneshot::Receiver<()>>,
    subscribed: Option<oneshot::Receiver<()>>,
    handle: JoinHandle<Vec<Frame>>,
}

impl FakeBroker {
    /// Replies to CONNECT with CONNACK carrying `code`.
    pub async fn start(code: u8) -> Self {
        Self::spawn(Some(code)).await
    }

    /// Reads CONNECT and never replies.
    pub async fn silent() -> Self {
        Self::spawn(None).await
    }

    async fn spawn(connack: Option<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        let (connect_tx, connect_rx) = oneshot::channel();
        let (subscribe_tx, subscribe_rx) = oneshot::channel();

        let handle = tokio::spawn(serve(listener, connack, connect_tx, subscribe_tx));

        Self {
            port,
            connect_seen: Some(connect_rx),
            subscribed: Some(subscribe_rx),
            handle,
        }
    }

    pub fn config(&self, role: ClientRole) -> MqttConfig {
        let mut config = MqttConfig::new("127.0.0.1", self.port, role);
        config.connect_timeout = Duration::from_secs(5);
        config
    }

    /// Resolves once CONNECT has been read, or when the broker gives up.
    pub fn on_connect(&mut self) -> impl Future<Output = ()> {
        let rx = self.connect_seen.take().expect("connect signal already taken");
        async move {
            let _ = rx.await;
        }
    }

    /// Resolves once the first SUBACK has been written, or when the broker gives up.
    pub fn on_subscribe(&mut self) -> impl Future<Output = ()> {
        let rx = self.subscribed.take().expect("subscribe signal already taken");
        async move {
            let _ = rx.await;
        }
    }

    /// Packets received after CONNECT, up to and including DISCONNECT or EOF.
    pub async fn frames(self) -> Vec<Frame> {
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("client never closed the connection")
            .expect("broker task panicked")
    }
}

async fn serve(
    listener: TcpListener,
    connack: Option<u8>,
    connect_tx: oneshot::Sender<()>,
    subscribe_tx: oneshot::Sender<()>,
) -> Vec<Frame> {
    let (mut stream, _) = listener.accept().await.expect("accept");
    let connect = read_frame(&mut stream).await.expect("read CONNECT");
    assert_eq!(connect.kind(), CONNECT);
    let _ = connect_tx.send(());

    if let Some(code) = connack {
        stream.write_all(&[0x20, 0x02, 0x00, code]).await.expect("write CONNACK");
    }

    let mut subscribe_tx = Some(subscribe_tx);
    let mut frames = Vec::new();
    while let Ok(frame) = read_frame(&mut stream).await {
        if frame.kind() == SUBSCRIBE {
            let suback = [0x90, 0x03, frame.body[0], frame.body[1], 0x00];
            stream.write_all(&suback).await.expect("write SUBACK");
            if let Some(tx) = subscribe_tx.take() {
                let _ = tx.send(());
            }
        }

        let done = frame.kind() == DISCONNECT;
        frames.push(frame);
        if done {
            break;
        }
    }
    frames
}

/// Splits a QoS 0 PUBLISH body into topic and payload.
pub fn qos0_publish(frame: &Frame) -> (String, Vec<u8>) {
    let topic_len = u16::from_be_bytes([frame.body[0], frame.body[1]]) as usize;
    let topic = String::from_utf8(frame.body[2..2 + topic_len].to_vec()).expect("utf8 topic");
    (topic, frame.body[2 + topic_len..].to_vec())
}
