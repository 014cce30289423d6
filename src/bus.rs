//! Message bus plumbing: MQTT subscription and alert publishing
//!
//! The subscriber owns the single ingestion path. It blocks on the event
//! loop, parses each inbound payload into a [`Reading`] and hands it to the
//! dispatcher synchronously, so readings are processed one at a time in
//! arrival order. Connection errors are retried forever with a fixed
//! backoff, and the subscription is re-established on every reconnect.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::BusConfig;
use crate::dispatcher::Dispatcher;
use crate::{AlertEvent, Reading};

/// Fixed delay between reconnect attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Errors that can occur while publishing an alert batch
#[derive(Debug)]
pub enum PublishError {
    /// Batch serialization failed
    Serialize(serde_json::Error),

    /// The bus client refused the publish
    Bus(rumqttc::ClientError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Serialize(err) => write!(f, "failed to serialize alert batch: {}", err),
            PublishError::Bus(err) => write!(f, "bus publish failed: {}", err),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::Serialize(err) => Some(err),
            PublishError::Bus(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialize(err)
    }
}

impl From<rumqttc::ClientError> for PublishError {
    fn from(err: rumqttc::ClientError) -> Self {
        PublishError::Bus(err)
    }
}

/// Outbound boundary for alert batches
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    /// Publish one batch. The whole batch goes out as a single message;
    /// individual events are never dropped or altered.
    async fn publish(&self, alerts: &[AlertEvent]) -> Result<(), PublishError>;
}

/// Serialize a batch into the wire format:
/// `{"alerts": [{metric, value, threshold, time}, ...]}`
pub fn encode_alert_batch(alerts: &[AlertEvent]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&json!({ "alerts": alerts }))
}

/// Publishes alert batches on a dedicated MQTT topic
pub struct MqttAlertPublisher {
    client: AsyncClient,
    topic: String,
}

impl MqttAlertPublisher {
    pub fn new(client: AsyncClient, topic: String) -> Self {
        Self { client, topic }
    }
}

#[async_trait]
impl AlertPublisher for MqttAlertPublisher {
    async fn publish(&self, alerts: &[AlertEvent]) -> Result<(), PublishError> {
        let payload = encode_alert_batch(alerts)?;

        self.client
            .publish(self.topic.clone(), QoS::AtLeastOnce, false, payload)
            .await?;

        info!("published {} alert(s) on {}", alerts.len(), self.topic);
        Ok(())
    }
}

/// Create the shared MQTT client and its event loop.
///
/// The client is cloned into the alert publisher; the event loop goes to the
/// subscriber, which is the only component that polls it.
pub fn connect(bus: &BusConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(&bus.client_id, &bus.broker, bus.port);
    options.set_keep_alive(KEEP_ALIVE);

    AsyncClient::new(options, 16)
}

/// Receives readings from the ingestion topic and drives the dispatcher
pub struct BusSubscriber {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    dispatcher: Dispatcher,
}

impl BusSubscriber {
    pub fn new(
        client: AsyncClient,
        eventloop: EventLoop,
        topic: String,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            client,
            eventloop,
            topic,
            dispatcher,
        }
    }

    /// Run the receive loop until shutdown is signalled.
    ///
    /// Shutdown is only observed between readings; an in-flight dispatch
    /// always runs to completion.
    #[instrument(skip_all, fields(topic = %self.topic))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        debug!("starting bus subscriber");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("shutdown requested, stopping receive loop");
                    break;
                }

                event = self.eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            debug!("connected to broker");
                            // subscribing here covers reconnects too
                            if let Err(e) = self.client.subscribe(self.topic.clone(), QoS::AtMostOnce).await {
                                error!("failed to subscribe: {e}");
                            }
                        }

                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            Self::handle_message(&self.dispatcher, &publish.payload).await;
                        }

                        Ok(_) => {}

                        Err(e) => {
                            error!(
                                "bus connection error, retrying in {}s: {e}",
                                RECONNECT_DELAY.as_secs()
                            );
                            tokio::time::sleep(RECONNECT_DELAY).await;
                        }
                    }
                }
            }
        }

        debug!("bus subscriber stopped");
    }

    /// Parse one inbound message and dispatch it. Malformed payloads are
    /// dropped here and never reach the dispatcher.
    ///
    /// Borrows only the dispatcher so the receive loop's future stays `Send`
    /// despite the event loop not being `Sync`.
    async fn handle_message(dispatcher: &Dispatcher, payload: &[u8]) {
        let received_at = Utc::now();

        match Reading::from_payload(payload, received_at) {
            Ok(reading) => {
                trace!("received reading at {}", reading.timestamp);
                dispatcher.dispatch(reading).await;
            }
            Err(e) => {
                warn!("dropping malformed payload: {e:#}");
            }
        }
    }
}
