//! sea-orm implementations of the store traits.

mod acknowledgment;
mod blocklist;
mod capability;
mod delivery_attempt;
mod inbox;
mod outbox;
mod policy;
mod rate_limit;

pub use acknowledgment::AcknowledgmentRepository;
pub use blocklist::BlocklistRepository;
pub use capability::CapabilityRepository;
pub use delivery_attempt::DeliveryAttemptRepository;
pub use inbox::InboxRepository;
pub use outbox::OutboxRepository;
pub use policy::PolicyRepository;
pub use rate_limit::RateLimitRepository;
