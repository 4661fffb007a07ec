//! rumqttc-backed publisher. Owns the broker session and its event-loop
//! task; the replay core only sees the `Publisher` trait.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::{debug, info, warn};
use replay_core::{PublishError, Publisher};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub keep_alive: Duration,
    pub use_tls: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            keep_alive: Duration::from_secs(60),
            use_tls: false,
        }
    }
}

pub struct MqttPublisher {
    config: MqttConfig,
    client: Option<AsyncClient>,
}

impl MqttPublisher {
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn connect(&mut self) -> Result<(), PublishError> {
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut options = MqttOptions::new(
            format!("replay_{unix_secs}"),
            &self.config.host,
            self.config.port,
        );
        options.set_keep_alive(self.config.keep_alive);
        if !self.config.username.is_empty() {
            options.set_credentials(&self.config.username, &self.config.password);
        }
        if self.config.use_tls {
            options.set_transport(Transport::Tls(TlsConfiguration::Native));
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);
        let (acked_tx, acked_rx) = oneshot::channel::<Result<(), String>>();

        tokio::spawn(async move {
            let mut acked = Some(acked_tx);
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("broker acknowledged connection");
                        if let Some(tx) = acked.take() {
                            let _ = tx.send(Ok(()));
                        }
                    }
                    Ok(event) => debug!("mqtt event: {event:?}"),
                    Err(err) => {
                        match acked.take() {
                            Some(tx) => {
                                let _ = tx.send(Err(err.to_string()));
                            }
                            None => debug!("mqtt event loop stopped: {err}"),
                        }
                        break;
                    }
                }
            }
        });

        self.client = Some(client);
        match acked_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(PublishError::Msg(err)),
            Err(_) => Err(PublishError::Msg(
                "event loop ended before broker acknowledgment".into(),
            )),
        }
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PublishError::Msg("publish before connect".into()))?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|err| PublishError::Msg(err.to_string()))
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(err) = client.disconnect().await {
                warn!("mqtt disconnect failed: {err}");
            }
        }
    }
}
