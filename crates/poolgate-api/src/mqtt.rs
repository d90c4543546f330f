//! MQTT link: telemetry ingestion and command dispatch.
//!
//! One connection serves both directions. The event loop owns ingestion:
//! it (re-)subscribes to the telemetry topic after every successful connect,
//! folds each inbound report into the occupancy state, and tracks the link
//! state (`disconnected → connecting → connected`, back to disconnected on
//! any transport error). The publisher side rides the same connection and
//! reports per-command delivery status.
//!
//! No event-loop failure is fatal: errors log, the link backs off briefly,
//! and rumqttc reconnects. While disconnected, inbound telemetry simply
//! stops arriving (no buffering) and outbound publishes are still attempted
//! and reported undelivered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::{Mutex, broadcast};

use poolgate_core::command::{Command, CommandPublisher, DispatchOutcome, command_topic};
use poolgate_core::decision::Verdict;
use poolgate_core::observability::ingest_span;
use poolgate_core::occupancy::OccupancyState;
use poolgate_core::telemetry::normalize;

use crate::config::MqttConfig;

/// Pause before re-polling after a transport error.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Capacity of the client request queue and the delivery-event channel.
const CHANNEL_CAPACITY: usize = 64;

/// Delivery events observed by the event loop, fanned out to dispatchers.
#[derive(Debug, Clone, Copy)]
enum LinkEvent {
    /// A publish left the client queue with this packet id.
    Queued(u16),
    /// The broker acknowledged this packet id.
    Acked(u16),
}

/// Handle to the shared MQTT connection.
///
/// Cheap to clone; all clones observe the same link state.
#[derive(Clone)]
pub struct MqttLink {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<LinkEvent>,
}

impl std::fmt::Debug for MqttLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttLink")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl MqttLink {
    /// Whether the transport was connected at the time of the call.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Builds the MQTT client for the given transport settings.
///
/// The returned [`EventLoop`] must be driven by [`run`] for the link to make
/// progress; nothing connects until it is polled.
#[must_use]
pub fn connect(config: &MqttConfig) -> (MqttLink, EventLoop) {
    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.host.clone(),
        config.port,
    );
    options.set_keep_alive(Duration::from_secs(config.keepalive_secs));
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username.clone(), password.clone());
    }

    let (client, event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);
    let (events, _) = broadcast::channel(CHANNEL_CAPACITY);

    let link = MqttLink {
        client,
        connected: Arc::new(AtomicBool::new(false)),
        events,
    };
    (link, event_loop)
}

/// Drives the MQTT event loop: connection lifecycle plus telemetry ingestion.
///
/// Runs until the process exits. Every inbound message on the telemetry
/// topic is normalized and folded into the occupancy state; messages from
/// other topics and malformed bodies are discarded without disturbing the
/// loop.
pub async fn run(
    link: MqttLink,
    mut event_loop: EventLoop,
    occupancy: Arc<OccupancyState>,
    telemetry_topic: String,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                link.connected.store(true, Ordering::SeqCst);
                tracing::info!(code = ?ack.code, "mqtt connected");
                // Subscription state does not survive a reconnect; repeat it
                // after every ConnAck. The operation is idempotent.
                match link
                    .client
                    .subscribe(telemetry_topic.as_str(), QoS::AtLeastOnce)
                    .await
                {
                    Ok(()) => tracing::info!(topic = %telemetry_topic, "subscribed to telemetry"),
                    Err(error) => {
                        tracing::warn!(topic = %telemetry_topic, %error, "telemetry subscribe failed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic != telemetry_topic {
                    continue;
                }
                let span = ingest_span(&publish.topic);
                let _guard = span.enter();
                match normalize(&publish.payload) {
                    Some(fact) => occupancy.record(fact),
                    None => {
                        tracing::warn!("discarding malformed telemetry");
                    }
                }
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                let _ = link.events.send(LinkEvent::Acked(ack.pkid));
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                link.connected.store(false, Ordering::SeqCst);
                tracing::warn!("broker requested disconnect");
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                let _ = link.events.send(LinkEvent::Queued(pkid));
            }
            Ok(_) => {}
            Err(error) => {
                link.connected.store(false, Ordering::SeqCst);
                tracing::warn!(%error, "mqtt transport error; reconnecting");
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }
}

/// Publishes decisions to per-pool command topics over the shared link.
///
/// QoS 1: at-least-once intent, duplicates tolerated by the device. The
/// outcome is honest but never an error — a failed dispatch cannot un-grant
/// a decision.
pub struct MqttPublisher {
    link: MqttLink,
    command_topic_base: String,
    publish_timeout: Duration,
    /// Serializes publishes so packet-id correlation is unambiguous.
    serialize: Mutex<()>,
}

impl std::fmt::Debug for MqttPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttPublisher")
            .field("link", &self.link)
            .field("command_topic_base", &self.command_topic_base)
            .field("publish_timeout", &self.publish_timeout)
            .finish()
    }
}

impl MqttPublisher {
    /// Creates a publisher over the given link.
    #[must_use]
    pub fn new(
        link: MqttLink,
        command_topic_base: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            link,
            command_topic_base: command_topic_base.into(),
            publish_timeout,
            serialize: Mutex::new(()),
        }
    }
}

#[async_trait]
impl CommandPublisher for MqttPublisher {
    async fn publish(&self, pool_id: &str, decision: Verdict) -> DispatchOutcome {
        let _serialized = self.serialize.lock().await;

        let connected = self.link.is_connected();
        if !connected {
            tracing::warn!(pool_id, "publishing command while transport disconnected");
        }

        let payload = match Command::new(pool_id, decision).to_payload() {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(pool_id, %error, "command serialization failed");
                return DispatchOutcome::undelivered(connected);
            }
        };

        let topic = command_topic(&self.command_topic_base, pool_id);

        // Start watching before queueing so the Queued event is not missed.
        let mut events = self.link.events.subscribe();

        if let Err(error) = self
            .link
            .client
            .publish(topic.clone(), QoS::AtLeastOnce, false, payload)
            .await
        {
            tracing::warn!(pool_id, topic = %topic, %error, "command publish failed");
            return DispatchOutcome::undelivered(connected);
        }

        let acknowledged = tokio::time::timeout(self.publish_timeout, await_ack(&mut events))
            .await
            .unwrap_or(false);

        let outcome = DispatchOutcome {
            connected,
            acknowledged,
        };
        if outcome.delivered() {
            tracing::info!(pool_id, topic = %topic, %decision, "command delivered");
        } else {
            tracing::warn!(
                pool_id,
                topic = %topic,
                %decision,
                connected,
                "command not acknowledged within timeout"
            );
        }
        outcome
    }
}

/// Waits for the broker to acknowledge the next queued publish.
///
/// Publishes are serialized by the dispatcher, so the first `Queued` event
/// seen after our publish call carries our packet id.
async fn await_ack(events: &mut broadcast::Receiver<LinkEvent>) -> bool {
    let mut pkid = None;
    loop {
        match events.recv().await {
            Ok(LinkEvent::Queued(id)) if pkid.is_none() => pkid = Some(id),
            Ok(LinkEvent::Acked(id)) if pkid == Some(id) => return true,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unpolled_link_reports_undelivered() {
        // Keep the event loop alive but never poll it: the publish queues
        // fine, no ack ever arrives, and the outcome must say so.
        let (link, _event_loop) = connect(&MqttConfig::default());
        let publisher = MqttPublisher::new(link, "uca/iot/piscine/cmd", Duration::from_millis(50));

        let outcome = publisher.publish("P1", Verdict::Granted).await;

        assert!(!outcome.connected);
        assert!(!outcome.acknowledged);
        assert!(!outcome.delivered());
    }

    #[tokio::test]
    async fn test_link_starts_disconnected() {
        let (link, _event_loop) = connect(&MqttConfig::default());
        assert!(!link.is_connected());
    }
}
