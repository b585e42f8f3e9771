//! Test doubles for the engine's collaborators.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use fedinet_common::{AppError, AppResult};
use fedinet_db::{entities::outbound_activity, memory::MemoryStore};
use serde_json::json;

use crate::envelope::{AckEnvelope, CapabilityDocument, InboxEnvelope, normalize_server_url};
use crate::services::{
    AckTracker, BlocklistService, CapabilityService, DeliveryEngine, DeliverySettings,
    FederationGuards, FederationTask, FederationTransport, HandlerRegistry, HealthAggregator,
    IdentityDirectory, InboxService, ModeController, NoOpSigner, OutboxPublisher, PublishInput,
    PushError, RateLimiter, SignatureVerifier, TaskQueue,
};

pub const LOCAL: &str = "https://a.example";

/// Queue that records tasks instead of running them.
#[derive(Default)]
pub struct RecordingQueue {
    tasks: Mutex<Vec<FederationTask>>,
    closed: bool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    pub fn tasks(&self) -> Vec<FederationTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, task: FederationTask) -> AppResult<()> {
        if self.closed {
            return Err(AppError::Internal("task queue is closed".to_string()));
        }
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}

/// Transport with scripted push results and canned capability documents.
/// Pushes succeed unless a failure was queued.
#[derive(Default)]
pub struct ScriptedTransport {
    push_results: Mutex<VecDeque<Result<(), PushError>>>,
    pushes: Mutex<Vec<(String, InboxEnvelope)>>,
    capabilities: Mutex<HashMap<String, CapabilityDocument>>,
    fetches: AtomicUsize,
    acks: Mutex<Vec<(String, AckEnvelope)>>,
    fail_acks: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` pushes fail with HTTP 503.
    pub fn fail_pushes(&self, count: usize) {
        let mut results = self.push_results.lock().unwrap();
        for _ in 0..count {
            results.push_back(Err(PushError::Status {
                server: "remote".to_string(),
                status: 503,
            }));
        }
    }

    pub fn set_capabilities(&self, doc: CapabilityDocument) {
        self.capabilities
            .lock()
            .unwrap()
            .insert(normalize_server_url(&doc.server_url), doc);
    }

    pub fn fail_acks(&self) {
        self.fail_acks.store(true, Ordering::SeqCst);
    }

    pub fn pushes(&self) -> Vec<(String, InboxEnvelope)> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn acks(&self) -> Vec<(String, AckEnvelope)> {
        self.acks.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FederationTransport for ScriptedTransport {
    async fn push(&self, target_server: &str, envelope: &InboxEnvelope) -> Result<(), PushError> {
        self.pushes
            .lock()
            .unwrap()
            .push((target_server.to_string(), envelope.clone()));
        self.push_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn fetch_capabilities(&self, server_url: &str) -> AppResult<CapabilityDocument> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.capabilities
            .lock()
            .unwrap()
            .get(server_url)
            .cloned()
            .ok_or_else(|| AppError::DiscoveryFailed(format!("{server_url} is unreachable")))
    }

    async fn send_ack(&self, server_url: &str, ack: &AckEnvelope) -> AppResult<()> {
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(AppError::Transport(format!("{server_url} is unreachable")));
        }
        self.acks
            .lock()
            .unwrap()
            .push((server_url.to_string(), ack.clone()));
        Ok(())
    }
}

pub fn capability_doc(server_url: &str, types: &[&str]) -> CapabilityDocument {
    serde_json::from_value(json!({
        "server_url": server_url,
        "protocol_versions": ["1.0.0"],
        "supported_types": types,
        "max_message_size": 1_048_576,
        "supports_retries": true,
        "supports_acks": true,
    }))
    .unwrap()
}

/// Identity directory backed by fixed maps. Counts lookups.
#[derive(Default)]
pub struct StaticIdentity {
    keys: HashMap<String, String>,
    revoked: HashSet<String>,
    user_blocks: HashSet<(String, String)>,
    lookups: AtomicUsize,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, actor: &str, key: &str) -> Self {
        self.keys.insert(actor.to_string(), key.to_string());
        self
    }

    pub fn with_revoked(mut self, key: &str) -> Self {
        self.revoked.insert(key.to_string());
        self
    }

    pub fn with_user_block(mut self, blocker: &str, blocked: &str) -> Self {
        self.user_blocks
            .insert((blocker.to_string(), blocked.to_string()));
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityDirectory for StaticIdentity {
    async fn resolve_public_key(&self, actor_id: &str) -> AppResult<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.get(actor_id).cloned())
    }

    async fn is_key_revoked(&self, public_key: &str) -> AppResult<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.revoked.contains(public_key))
    }

    async fn is_user_blocked(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .user_blocks
            .contains(&(blocker_id.to_string(), blocked_id.to_string())))
    }
}

/// Verifier with a fixed verdict.
pub struct FixedVerifier(pub bool);

impl SignatureVerifier for FixedVerifier {
    fn verify(&self, _bytes: &[u8], _signature: &str, _public_key: &str) -> AppResult<bool> {
        Ok(self.0)
    }
}

/// Every engine service wired over one in-memory store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub queue: Arc<RecordingQueue>,
    pub transport: Arc<ScriptedTransport>,
    pub guards: FederationGuards,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());
        let guards = FederationGuards {
            blocklist: BlocklistService::new(store.clone()),
            rate_limiter: RateLimiter::new(store.clone()),
            capabilities: CapabilityService::new(
                store.clone(),
                transport.clone(),
                capability_doc(LOCAL, &["Follow", "Like"]),
            ),
            mode: ModeController::new(store.clone()),
        };

        Self {
            store,
            queue: Arc::new(RecordingQueue::new()),
            transport,
            guards,
        }
    }

    pub fn publisher(&self) -> OutboxPublisher {
        OutboxPublisher::new(self.store.clone(), self.queue.clone())
    }

    pub async fn publish(&self, activity_type: &str, target: &str) -> outbound_activity::Model {
        self.publisher()
            .publish(PublishInput {
                activity_type: activity_type.to_string(),
                actor_id: "alice".to_string(),
                target_server: target.to_string(),
                target_id: None,
                payload: json!({"type": activity_type}),
            })
            .await
            .unwrap()
    }

    pub fn engine(&self) -> DeliveryEngine {
        DeliveryEngine::new(
            self.store.clone(),
            self.store.clone(),
            self.guards.clone(),
            self.transport.clone(),
            Arc::new(NoOpSigner),
            DeliverySettings {
                local_server: LOCAL.to_string(),
                retry_batch_size: 100,
                stale_after: Duration::hours(24),
            },
        )
    }

    pub fn inbox(
        &self,
        identity: Arc<dyn IdentityDirectory>,
        signatures_valid: bool,
        handlers: HandlerRegistry,
    ) -> InboxService {
        InboxService::new(
            self.store.clone(),
            self.guards.clone(),
            identity,
            Arc::new(FixedVerifier(signatures_valid)),
            handlers,
            self.queue.clone(),
            LOCAL.to_string(),
        )
    }

    pub fn acks(&self) -> AckTracker {
        AckTracker::new(
            self.store.clone(),
            self.store.clone(),
            self.transport.clone(),
            LOCAL.to_string(),
        )
    }

    pub fn health(&self) -> HealthAggregator {
        HealthAggregator::new(
            self.store.clone(),
            self.guards.blocklist.clone(),
            self.guards.rate_limiter.clone(),
        )
    }
}
