//! Federation engine services.

pub mod ack;
pub mod blocklist;
pub mod capability;
pub mod delivery;
pub mod handlers;
pub mod health;
pub mod identity;
pub mod inbox;
pub mod jobs;
pub mod mode;
pub mod outbox;
pub mod rate_limit;
pub mod transport;

pub use ack::{AckOutcome, AckTracker, RecordAckInput};
pub use blocklist::{BlockInput, BlocklistService};
pub use capability::{CAPABILITY_TTL, CapabilityService};
pub use delivery::{
    DeliveryEngine, DeliveryOutcome, DeliverySettings, MAX_RETRY_ATTEMPTS, SweepReport,
    backoff_seconds,
};
pub use handlers::{ActivityHandler, HandlerRegistry, LoggingHandler};
pub use health::{HealthAggregator, HealthSnapshot, HealthStatus};
pub use identity::{ActivitySigner, IdentityDirectory, NoOpSigner, SignatureVerifier};
pub use inbox::{INBOX_ENDPOINT, InboxReceipt, InboxService};
pub use jobs::{FederationTask, TaskQueue};
pub use mode::{ModeController, PolicyUpdate};
pub use outbox::{OutboxPublisher, PublishInput};
pub use rate_limit::{Admission, BucketInput, RateLimiter};
pub use transport::{FederationTransport, PushError};

/// Checks both the sending and receiving paths consult before trusting a
/// remote server.
#[derive(Clone)]
pub struct FederationGuards {
    /// Blocked servers.
    pub blocklist: BlocklistService,
    /// Per-server request budgets.
    pub rate_limiter: RateLimiter,
    /// Remote capability cache.
    pub capabilities: CapabilityService,
    /// Federation policy.
    pub mode: ModeController,
}
