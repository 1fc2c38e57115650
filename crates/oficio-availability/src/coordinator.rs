use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use oficio_core::config::{AvailabilityConfig, MqttConfig};
use oficio_core::types::ProviderRecord;
use oficio_kv::{keys, KvClient};

use crate::state::{
    filter_providers_by_response, normalize_candidates, AvailabilityState, ResponseRecord,
};
use crate::wire::{classify_status, Disposition, RequestPayload, ResponsePayload};

/// Backoff between listener reconnect attempts.
const LISTENER_RETRY: Duration = Duration::from_secs(3);

/// Pause before a failed publish is re-enqueued.
const PUBLISH_RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Inputs for one scatter/gather round.
#[derive(Debug, Clone)]
pub struct AvailabilityQuery {
    pub phone: String,
    pub service: String,
    pub city: String,
    pub need_summary: Option<String>,
    pub providers: Vec<ProviderRecord>,
}

/// What the round produced. `accepted` is the original provider set
/// filtered to the accepts observed before the deadline, original order.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityOutcome {
    pub accepted: Vec<ProviderRecord>,
    pub req_id: Option<String>,
    pub state: Option<AvailabilityState>,
}

struct QueuedPublish {
    payload: RequestPayload,
    /// Publishing past this instant is pointless — the gather has closed
    /// and the state record is near expiry. Caps the retry loop.
    deadline: Instant,
}

/// Handle for an in-flight request between the scatter and gather phases.
pub struct PendingAvailability {
    pub req_id: String,
    state_key: String,
    deadline: Instant,
    providers: Vec<ProviderRecord>,
}

/// C9: the availability coordinator. One listener and one publisher task
/// per process, started lazily on the first request and stopped only by the
/// process-wide cancellation token.
pub struct AvailabilityCoordinator {
    mqtt: MqttConfig,
    cfg: AvailabilityConfig,
    log_sampling_rate: u64,
    kv: KvClient,
    cancel: CancellationToken,
    publish_tx: mpsc::UnboundedSender<QueuedPublish>,
    publish_rx: Mutex<Option<mpsc::UnboundedReceiver<QueuedPublish>>>,
    started: AtomicBool,
}

impl AvailabilityCoordinator {
    pub fn new(
        mqtt: MqttConfig,
        cfg: AvailabilityConfig,
        log_sampling_rate: u64,
        kv: KvClient,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            mqtt,
            cfg,
            log_sampling_rate,
            kv,
            cancel,
            publish_tx,
            publish_rx: Mutex::new(Some(publish_rx)),
            started: AtomicBool::new(false),
        })
    }

    pub fn enabled(&self) -> bool {
        self.mqtt.host.is_some()
    }

    /// Spawn the listener and publisher once. Safe to call on every request.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.enabled() {
            warn!("MQTT not configured; live availability disabled");
            return;
        }
        let listener = Arc::clone(self);
        tokio::spawn(async move { listener.listener_loop().await });

        let rx = self
            .publish_rx
            .lock()
            .unwrap()
            .take()
            .expect("publisher receiver taken twice");
        let publisher = Arc::clone(self);
        tokio::spawn(async move { publisher.publisher_loop(rx).await });
    }

    /// Scatter phase: write the state record and enqueue the publish.
    /// Returns `None` when the broker is not configured. The returned
    /// handle carries the correlation id for the flow record.
    pub async fn request(self: &Arc<Self>, query: AvailabilityQuery) -> Option<PendingAvailability> {
        self.start();
        if !self.enabled() {
            return None;
        }

        let req_id = format!("req-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let candidates = normalize_candidates(&query.providers);
        let state_key = keys::availability(&req_id);
        let state_ttl = Duration::from_secs(self.cfg.state_ttl_secs);
        let wait_seconds = self.cfg.effective_timeout_secs();

        let state = AvailabilityState {
            req_id: req_id.clone(),
            phone: query.phone.clone(),
            service: query.service.clone(),
            city: query.city.clone(),
            created_at: Utc::now(),
            providers: candidates.clone(),
            accepted: Vec::new(),
            declined: Vec::new(),
        };
        self.kv.set_json(&state_key, &state, Some(state_ttl)).await;

        let payload = RequestPayload {
            req_id: req_id.clone(),
            service: query.need_summary.clone().unwrap_or_else(|| query.service.clone()),
            city: query.city.clone(),
            candidates,
            wait_seconds,
        };
        let deadline = Instant::now() + Duration::from_secs(wait_seconds);
        if self
            .publish_tx
            .send(QueuedPublish {
                payload,
                deadline,
            })
            .is_err()
        {
            warn!(%req_id, "publisher queue closed; availability request not sent");
        }

        Some(PendingAvailability {
            req_id,
            state_key,
            deadline,
            providers: query.providers,
        })
    }

    /// Gather phase: poll until the deadline (with first-accept grace),
    /// then map accepted replies back onto the original provider set.
    pub async fn wait(self: &Arc<Self>, pending: PendingAvailability) -> AvailabilityOutcome {
        self.gather(&pending.state_key, pending.deadline).await;

        let final_state = self.kv.get_json::<AvailabilityState>(&pending.state_key).await;
        let accepted = final_state
            .as_ref()
            .map(|s| filter_providers_by_response(&pending.providers, &s.accepted))
            .unwrap_or_default();
        if self.sampled(&pending.req_id) {
            info!(
                req_id = %pending.req_id,
                accepted = accepted.len(),
                "availability gather closed"
            );
        }
        AvailabilityOutcome {
            accepted,
            req_id: Some(pending.req_id),
            state: final_state,
        }
    }

    /// Scatter, then gather. The one-call form used when nobody needs the
    /// correlation id mid-flight.
    pub async fn request_and_wait(self: &Arc<Self>, query: AvailabilityQuery) -> AvailabilityOutcome {
        match self.request(query).await {
            Some(pending) => self.wait(pending).await,
            None => AvailabilityOutcome::default(),
        }
    }

    /// Poll the state record until the outer deadline, closing early a
    /// grace-window after the first accepted reply is observed.
    async fn gather(&self, state_key: &str, deadline: Instant) {
        let grace = Duration::from_secs_f64(self.cfg.accept_grace_secs.max(0.0));
        let poll = Duration::from_secs_f64(self.cfg.poll_interval_secs.max(0.1));
        let mut early_deadline = deadline;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            if let Some(state) = self.kv.get_json::<AvailabilityState>(state_key).await {
                if !state.accepted.is_empty() {
                    if early_deadline == deadline {
                        early_deadline = deadline.min(now + grace);
                    }
                    if now >= early_deadline {
                        return;
                    }
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    async fn listener_loop(self: Arc<Self>) {
        let topic = self.mqtt.response_topic.clone();
        let qos = qos_from(self.mqtt.qos);
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let (client, mut eventloop) = self.build_client("listener");
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    event = eventloop.poll() => match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            // Re-subscribe on every (re)connect.
                            if let Err(e) = client.subscribe(&topic, qos).await {
                                warn!(error = %e, "availability subscribe failed");
                            } else {
                                info!(%topic, "subscribed for availability responses");
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            self.handle_response(&publish.payload).await;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "availability listener error, retrying");
                            tokio::time::sleep(LISTENER_RETRY).await;
                        }
                    }
                }
            }
        }
    }

    async fn publisher_loop(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<QueuedPublish>) {
        let topic = self.mqtt.request_topic.clone();
        let qos = qos_from(self.mqtt.qos);
        let publish_timeout = Duration::from_secs_f64(self.mqtt.publish_timeout_secs.max(0.1));
        // Single long-lived publisher connection, rebuilt on failure. The
        // slot lives in this task alone, so ownership serializes reconnects.
        let mut client: Option<AsyncClient> = None;

        loop {
            let item = tokio::select! {
                _ = self.cancel.cancelled() => return,
                item = rx.recv() => match item {
                    Some(item) => item,
                    None => return,
                },
            };
            if Instant::now() >= item.deadline {
                warn!(
                    req_id = %item.payload.req_id,
                    "availability request expired before it could be published"
                );
                continue;
            }
            let conn = match &client {
                Some(conn) => conn.clone(),
                None => {
                    let conn = self.spawn_publisher_connection();
                    client = Some(conn.clone());
                    conn
                }
            };
            let bytes = match serde_json::to_vec(&item.payload) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "availability request failed to encode");
                    continue;
                }
            };
            match tokio::time::timeout(publish_timeout, conn.publish(&topic, qos, false, bytes))
                .await
            {
                Ok(Ok(())) => {
                    if self.sampled(&item.payload.req_id) {
                        info!(req_id = %item.payload.req_id, "availability request published");
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "availability publish failed, re-enqueueing");
                    client = None;
                    tokio::time::sleep(PUBLISH_RETRY_PAUSE).await;
                    let _ = self.publish_tx.send(item);
                }
                Err(_) => {
                    warn!("availability publish timed out, re-enqueueing");
                    client = None;
                    tokio::time::sleep(PUBLISH_RETRY_PAUSE).await;
                    let _ = self.publish_tx.send(item);
                }
            }
        }
    }

    /// New connection whose event loop is driven by a detached task for the
    /// life of the process (rumqttc reconnects inside `poll`).
    fn spawn_publisher_connection(&self) -> AsyncClient {
        let (client, mut eventloop) = self.build_client("publisher");
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = eventloop.poll() => {
                        if let Err(e) = event {
                            debug!(error = %e, "publisher connection error");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        });
        info!("availability publisher connected");
        client
    }

    fn build_client(&self, role: &str) -> (AsyncClient, rumqttc::EventLoop) {
        let host = self.mqtt.host.as_deref().expect("mqtt host checked by caller");
        let client_id = format!("oficio-{}-{}", role, &Uuid::new_v4().simple().to_string()[..8]);
        let mut options = MqttOptions::new(client_id, host, self.mqtt.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&self.mqtt.username, &self.mqtt.password) {
            options.set_credentials(user, pass);
        }
        AsyncClient::new(options, 64)
    }

    /// Apply one inbound response to its request's state record.
    async fn handle_response(&self, payload: &[u8]) {
        let parsed: ResponsePayload = match serde_json::from_slice(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "invalid availability response payload");
                return;
            }
        };
        let Some(req_id) = parsed.req_id.clone() else {
            return;
        };
        let label = parsed.status_label();
        let disposition = classify_status(&label);
        if disposition == Disposition::Unknown {
            return;
        }
        let state_key = keys::availability(&req_id);
        let Some(mut state) = self.kv.get_json::<AvailabilityState>(&state_key).await else {
            // Unknown or expired request; nothing to attach the reply to.
            return;
        };
        let record = ResponseRecord {
            provider_id: parsed.provider_id,
            provider_phone: parsed.provider_phone,
            status: label.clone(),
            received_at: Utc::now(),
        };
        if state.record(record, disposition) {
            self.kv
                .set_json(
                    &state_key,
                    &state,
                    Some(Duration::from_secs(self.cfg.state_ttl_secs)),
                )
                .await;
        }
        if self.sampled(&req_id) {
            info!(%req_id, status = %label, "availability response recorded");
        }
    }

    fn sampled(&self, req_id: &str) -> bool {
        let rate = self.log_sampling_rate.max(1);
        let mut hasher = DefaultHasher::new();
        req_id.hash(&mut hasher);
        hasher.finish() % rate == 0
    }
}

fn qos_from(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(mqtt: MqttConfig) -> Arc<AvailabilityCoordinator> {
        AvailabilityCoordinator::new(
            mqtt,
            AvailabilityConfig::default(),
            10,
            KvClient::detached(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn disabled_broker_returns_empty_outcome() {
        let coord = coordinator(MqttConfig::default());
        let outcome = coord
            .request_and_wait(AvailabilityQuery {
                phone: "593".into(),
                service: "plomero".into(),
                city: "Quito".into(),
                need_summary: None,
                providers: vec![ProviderRecord {
                    id: Some("p1".into()),
                    ..Default::default()
                }],
            })
            .await;
        assert!(outcome.accepted.is_empty());
        assert!(outcome.req_id.is_none());
    }

    #[tokio::test]
    async fn duplicate_responses_are_idempotent_through_the_handler() {
        let coord = coordinator(MqttConfig::default());
        let state = AvailabilityState {
            req_id: "req-abc".into(),
            phone: "593".into(),
            service: "plomero".into(),
            city: "Quito".into(),
            created_at: Utc::now(),
            providers: vec![],
            accepted: vec![],
            declined: vec![],
        };
        coord
            .kv
            .set_json(&keys::availability("req-abc"), &state, None)
            .await;

        let reply = br#"{"req_id":"req-abc","provider_id":"p1","provider_phone":"099","estado":"si"}"#;
        for _ in 0..3 {
            coord.handle_response(reply).await;
        }
        let stored: AvailabilityState = coord
            .kv
            .get_json(&keys::availability("req-abc"))
            .await
            .unwrap();
        assert_eq!(stored.accepted.len(), 1);
        assert_eq!(stored.accepted[0].status, "si");
    }

    #[tokio::test]
    async fn unknown_request_and_unknown_status_are_ignored() {
        let coord = coordinator(MqttConfig::default());
        coord
            .handle_response(br#"{"req_id":"req-nope","provider_id":"p1","status":"accepted"}"#)
            .await;
        assert!(coord
            .kv
            .get_json::<AvailabilityState>(&keys::availability("req-nope"))
            .await
            .is_none());

        let state = AvailabilityState {
            req_id: "req-x".into(),
            phone: "593".into(),
            service: "s".into(),
            city: "c".into(),
            created_at: Utc::now(),
            providers: vec![],
            accepted: vec![],
            declined: vec![],
        };
        coord
            .kv
            .set_json(&keys::availability("req-x"), &state, None)
            .await;
        coord
            .handle_response(br#"{"req_id":"req-x","provider_id":"p1","estado":"tal vez"}"#)
            .await;
        let stored: AvailabilityState =
            coord.kv.get_json(&keys::availability("req-x")).await.unwrap();
        assert!(stored.accepted.is_empty() && stored.declined.is_empty());
    }

    #[test]
    fn qos_mapping() {
        assert_eq!(qos_from(0), QoS::AtMostOnce);
        assert_eq!(qos_from(1), QoS::AtLeastOnce);
        assert_eq!(qos_from(2), QoS::ExactlyOnce);
        assert_eq!(qos_from(9), QoS::AtLeastOnce);
    }
}
