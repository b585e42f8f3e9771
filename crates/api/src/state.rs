//! Shared handler state.

use fedinet_core::{
    AckTracker, DeliveryEngine, FederationGuards, HealthAggregator, InboxService, OutboxPublisher,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Inbound activities.
    pub inbox: InboxService,
    /// Publishing.
    pub outbox: OutboxPublisher,
    /// Delivery and attempt history.
    pub delivery: DeliveryEngine,
    /// Acknowledgments.
    pub acks: AckTracker,
    /// Blocklist, rate limits, capabilities and policy.
    pub guards: FederationGuards,
    /// Health snapshot.
    pub health: HealthAggregator,
}
