//! Database entities.

#![allow(missing_docs)]

pub mod acknowledgment;
pub mod blocked_server;
pub mod delivery_attempt;
pub mod federation_policy;
pub mod inbound_activity;
pub mod outbound_activity;
pub mod rate_limit_bucket;
pub mod server_capability;

pub use acknowledgment::Entity as Acknowledgment;
pub use blocked_server::Entity as BlockedServer;
pub use delivery_attempt::Entity as DeliveryAttempt;
pub use federation_policy::Entity as FederationPolicy;
pub use inbound_activity::Entity as InboundActivity;
pub use outbound_activity::Entity as OutboundActivity;
pub use rate_limit_bucket::Entity as RateLimitBucket;
pub use server_capability::Entity as ServerCapability;
