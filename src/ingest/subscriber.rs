use std::time::Duration;

use rumqttc::{Event, EventLoop, Packet, Publish};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::pipeline::IngestQueue;
use crate::transport::MqttTransport;

const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const DISCONNECT_FLUSH: Duration = Duration::from_secs(2);

/// Running subscriber loop. Dropping it also stops the loop, but nothing waits
/// for the broker DISCONNECT.
pub struct SubscriberHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SubscriberHandle {
    /// Sends DISCONNECT to the broker and waits for the loop to exit. The loop's
    /// queue handle is dropped when this returns.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "mqtt subscriber task failed");
        }
    }
}

/// Drives the MQTT event loop. Messages on the sensor topic are handed to `queue`;
/// the loop itself never touches the database.
pub fn spawn(
    mut eventloop: EventLoop,
    transport: MqttTransport,
    queue: IngestQueue,
) -> SubscriberHandle {
    let (stop, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stopped.changed() => break,
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // Sessions are clean, so every (re)connect needs a fresh SUBSCRIBE.
                        info!(topic = transport.topic(), "mqtt connected, subscribing");
                        if let Err(e) = transport.request_subscribe() {
                            error!(error = %format!("{e:#}"), "mqtt subscribe failed");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        dispatch(transport.topic(), &queue, &publish);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt connection error, retrying in {:?}", RECONNECT_DELAY);
                        tokio::select! {
                            _ = stopped.changed() => break,
                            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        }
                    }
                },
            }
        }

        if transport.request_disconnect().is_ok() {
            // Give the event loop a moment to put DISCONNECT on the wire.
            let _ = tokio::time::timeout(DISCONNECT_FLUSH, async {
                while let Ok(event) = eventloop.poll().await {
                    if matches!(event, Event::Outgoing(rumqttc::Outgoing::Disconnect)) {
                        break;
                    }
                }
            })
            .await;
        }
        info!("mqtt subscriber stopped");
    });

    SubscriberHandle { stop, task }
}

fn dispatch(topic: &str, queue: &IngestQueue, publish: &Publish) {
    if publish.topic != topic {
        debug!(topic = %publish.topic, "ignoring message on unexpected topic");
        return;
    }
    debug!(topic = %publish.topic, bytes = publish.payload.len(), "sensor message received");
    queue.submit_or_drop(&publish.payload);
}
