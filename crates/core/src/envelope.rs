//! Wire format exchanged between federated servers.
//!
//! Every push to a remote inbox is an [`InboxEnvelope`]. Receivers answer
//! with an [`AckEnvelope`], and servers describe themselves with a
//! [`CapabilityDocument`]. Signatures cover [`canonical_bytes`] of the
//! payload, so field order never changes what gets signed.

use chrono::{DateTime, Utc};
use fedinet_common::{AppError, AppResult, Config};
use fedinet_db::entities::{acknowledgment::AckStatus, outbound_activity, server_capability};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Strip whitespace and trailing slashes so server URLs compare equal.
#[must_use]
pub fn normalize_server_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

/// Body POSTed to `{server}/federation/inbox`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxEnvelope {
    /// Protocol version the sender speaks.
    #[serde(default = "default_version")]
    pub version: String,

    /// Sender's outbound activity id. Receivers deduplicate on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Activity type such as `Follow` or `Like`.
    #[serde(default)]
    pub activity_type: String,

    /// Sending actor id.
    #[serde(default)]
    pub actor: String,

    /// Base URL of the sending server.
    #[serde(default)]
    pub actor_server: String,

    /// Target actor or object id, when the activity has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Activity body, opaque to the engine.
    #[serde(default)]
    pub payload: Value,

    /// Base64 signature over the canonical payload bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// When the sender created the activity.
    #[serde(default = "Utc::now")]
    pub published: DateTime<Utc>,
}

impl InboxEnvelope {
    /// Envelope for an outbound activity sent from `local_server`. Unsigned.
    #[must_use]
    pub fn from_outbound(activity: &outbound_activity::Model, local_server: &str) -> Self {
        Self {
            version: default_version(),
            message_id: Some(activity.id.clone()),
            activity_type: activity.activity_type.clone(),
            actor: activity.actor_id.clone(),
            actor_server: local_server.to_string(),
            target: activity.target_id.clone(),
            payload: activity.payload.clone(),
            signature: None,
            published: activity.created_at.with_timezone(&Utc),
        }
    }

    /// Checks required fields and protocol compatibility.
    pub fn validate(&self) -> AppResult<()> {
        let missing: Vec<&str> = [
            ("activity_type", self.activity_type.trim().is_empty()),
            ("actor", self.actor.trim().is_empty()),
            ("actor_server", self.actor_server.trim().is_empty()),
            ("payload", self.payload.is_null()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();

        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        url::Url::parse(self.actor_server.trim()).map_err(|e| {
            AppError::Validation(format!("actor_server is not an absolute URL: {e}"))
        })?;

        if !is_compatible_version(&self.version) {
            return Err(AppError::Protocol(format!(
                "unsupported protocol version {}",
                self.version
            )));
        }

        Ok(())
    }

    /// Bytes covered by `signature`.
    #[must_use]
    pub fn signing_bytes(&self) -> Vec<u8> {
        canonical_bytes(&self.payload)
    }

    /// Serialized size on the wire.
    pub fn encoded_len(&self) -> AppResult<usize> {
        Ok(serde_json::to_vec(self)?.len())
    }
}

fn is_compatible_version(version: &str) -> bool {
    let major = |v: &str| v.split('.').next().map(str::to_string);
    major(version) == major(PROTOCOL_VERSION)
}

/// Receipt or processing confirmation for a pushed activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckEnvelope {
    /// The sender's outbound activity id.
    #[serde(default)]
    pub message_id: String,

    /// How far the receiver got.
    pub status: AckStatus,

    /// Why processing failed, for `failed` acknowledgments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Server sending the acknowledgment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_server: Option<String>,
}

/// Advertised request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Sustained requests per minute.
    pub requests_per_min: i32,
    /// Extra requests allowed in a burst.
    pub burst: i32,
}

/// What a server supports, as served from `/federation/capabilities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDocument {
    /// Base URL of the advertising server.
    pub server_url: String,

    /// Supported protocol versions, newest first.
    #[serde(default)]
    pub protocol_versions: Vec<String>,

    /// Activity types the server accepts.
    #[serde(default)]
    pub supported_types: Vec<String>,

    /// Largest accepted envelope in bytes. `0` means no limit.
    #[serde(default)]
    pub max_message_size: i64,

    /// Whether the server retries failed deliveries.
    #[serde(default)]
    pub supports_retries: bool,

    /// Whether the server sends acknowledgments.
    #[serde(default)]
    pub supports_acks: bool,

    /// Advertised inbound request budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_info: Option<RateLimitInfo>,

    /// When this document was fetched or generated.
    #[serde(default = "Utc::now")]
    pub last_discovered_at: DateTime<Utc>,
}

impl CapabilityDocument {
    /// This instance's own document.
    #[must_use]
    pub fn for_instance(config: &Config, now: DateTime<Utc>) -> Self {
        let federation = &config.federation;
        Self {
            server_url: config.instance_url().to_string(),
            protocol_versions: federation.protocol_versions.clone(),
            supported_types: federation.supported_activity_types.clone(),
            max_message_size: federation.max_message_size_bytes,
            supports_retries: true,
            supports_acks: true,
            rate_limit_info: Some(RateLimitInfo {
                requests_per_min: federation.advertised_rate_limit.requests_per_min,
                burst: federation.advertised_rate_limit.burst,
            }),
            last_discovered_at: now,
        }
    }

    /// Cache row for `server_url`, discovered at `now`.
    ///
    /// The row is keyed by the URL that was queried, not the URL the remote
    /// claims for itself.
    #[must_use]
    pub fn into_model(
        self,
        id: String,
        server_url: &str,
        now: DateTime<Utc>,
    ) -> server_capability::Model {
        server_capability::Model {
            id,
            server_url: normalize_server_url(server_url),
            protocol_versions: json!(self.protocol_versions),
            supported_activity_types: json!(self.supported_types),
            max_message_size_bytes: self.max_message_size,
            supports_retries: self.supports_retries,
            supports_acks: self.supports_acks,
            rate_limit_info: self.rate_limit_info.map(|info| json!(info)),
            last_discovered_at: now.into(),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }
}

impl From<&server_capability::Model> for CapabilityDocument {
    fn from(model: &server_capability::Model) -> Self {
        let strings = |value: &Value| -> Vec<String> {
            value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            server_url: model.server_url.clone(),
            protocol_versions: strings(&model.protocol_versions),
            supported_types: strings(&model.supported_activity_types),
            max_message_size: model.max_message_size_bytes,
            supports_retries: model.supports_retries,
            supports_acks: model.supports_acks,
            rate_limit_info: model
                .rate_limit_info
                .clone()
                .and_then(|info| serde_json::from_value(info).ok()),
            last_discovered_at: model.last_discovered_at.with_timezone(&Utc),
        }
    }
}

/// Serialize `value` with object keys sorted at every depth.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// The canonical serialization as bytes, used for signing and verification.
#[must_use]
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonical_json(value).into_bytes()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
