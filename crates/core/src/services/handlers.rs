//! Domain handler lookup for inbound activities.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fedinet_common::AppResult;
use fedinet_db::entities::inbound_activity;

/// Processes one inbound activity type. Handler bodies live outside the
/// engine.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    /// Recorded as `processed_by` on success.
    fn name(&self) -> &str;

    /// Apply the activity to local state.
    async fn handle(&self, activity: &inbound_activity::Model) -> AppResult<()>;
}

/// Handlers keyed by activity type.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ActivityHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `activity_type`, replacing any previous one.
    #[must_use]
    pub fn with(
        mut self,
        activity_type: impl Into<String>,
        handler: Arc<dyn ActivityHandler>,
    ) -> Self {
        self.handlers.insert(activity_type.into(), handler);
        self
    }

    /// Handler for `activity_type`.
    #[must_use]
    pub fn get(&self, activity_type: &str) -> Option<&Arc<dyn ActivityHandler>> {
        self.handlers.get(activity_type)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Acknowledges receipt in the log and nothing else. Stands in until a
/// domain service registers a real handler for the type.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

#[async_trait]
impl ActivityHandler for LoggingHandler {
    fn name(&self) -> &str {
        "logging"
    }

    async fn handle(&self, activity: &inbound_activity::Model) -> AppResult<()> {
        tracing::info!(
            inbound_id = %activity.id,
            activity_type = %activity.activity_type,
            actor = %activity.actor_id,
            "Inbound activity processed"
        );
        Ok(())
    }
}
