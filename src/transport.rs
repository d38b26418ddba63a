use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};

use crate::config::MqttConfig;

/// Outbound half of the sensor topic.
pub trait SensorPublisher: Send + Sync {
    /// Best effort: queues the message without waiting for the broker.
    fn publish(&self, payload: Vec<u8>) -> anyhow::Result<()>;
}

/// The single long-lived MQTT client. It is shared by the subscriber loop and every
/// publish call, and disconnected once at shutdown.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    topic: String,
}

impl MqttTransport {
    /// The returned event loop must be polled for anything to move; see
    /// [`crate::ingest::subscriber::spawn`].
    pub fn connect(config: &MqttConfig) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(60));
        let (client, eventloop) = AsyncClient::new(options, 64);
        (
            Self {
                client,
                topic: config.topic.clone(),
            },
            eventloop,
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Non-blocking so it can be called from inside the event loop task.
    pub fn request_subscribe(&self) -> anyhow::Result<()> {
        self.client
            .try_subscribe(&self.topic, QoS::AtLeastOnce)
            .context("mqtt subscribe")
    }

    pub fn request_disconnect(&self) -> anyhow::Result<()> {
        self.client.try_disconnect().context("mqtt disconnect")
    }
}

impl SensorPublisher for MqttTransport {
    fn publish(&self, payload: Vec<u8>) -> anyhow::Result<()> {
        self.client
            .try_publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .context("mqtt publish")
    }
}
