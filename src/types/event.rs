//! Event records: what the application submits and what the service returns.
//!
//! Wire names are camelCase. Absent optional fields are skipped entirely so the
//! service never sees `null` for them; `null` only appears as an explicit
//! `old`/`new` value inside [`Change`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HyreLogError, Result};

/// Who performed the action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// What the action was performed on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Target {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            kind: Some(kind.into()),
        }
    }
}

/// One field-level change. `old`/`new` may legitimately be `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub field: String,
    #[serde(default)]
    pub old: Value,
    #[serde(default)]
    pub new: Value,
}

impl Change {
    pub fn new(field: impl Into<String>, old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

/// An audit event as submitted by the application.
///
/// `action` follows a dotted namespace (`user.created`, `payment.refunded`).
/// Both `action` and `category` must be non-empty; see [`EventInput::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub action: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<Change>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl EventInput {
    pub fn new(action: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            category: category.into(),
            actor: None,
            target: None,
            payload: None,
            metadata: None,
            changes: None,
            project_id: None,
        }
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Insert a single payload entry, creating the payload map if needed.
    pub fn payload_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metadata_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Append a change record. Order is preserved on the wire.
    pub fn with_change(mut self, change: Change) -> Self {
        self.changes.get_or_insert_with(Vec::new).push(change);
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Check the fields the service requires before anything is sent.
    pub fn validate(&self) -> Result<()> {
        if self.action.trim().is_empty() {
            return Err(HyreLogError::validation("action", "must not be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(HyreLogError::validation("category", "must not be empty"));
        }
        Ok(())
    }
}

/// An audit event as stored and returned by the service.
///
/// Only ever built by deserializing a service response; `id` and `hash` are
/// assigned server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub company_id: String,
    pub workspace_id: String,
    pub action: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<Change>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub created_at: String,
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_region: Option<String>,
}

impl Event {
    /// Parse one event out of a JSON value returned by the service.
    pub fn from_value(value: Value) -> Result<Self> {
        let excerpt_src = value.to_string();
        serde_json::from_value(value)
            .map_err(|e| HyreLogError::malformed(format!("invalid event: {}", e), &excerpt_src))
    }

    /// The submitted part of this event.
    pub fn input(&self) -> EventInput {
        EventInput {
            action: self.action.clone(),
            category: self.category.clone(),
            actor: self.actor.clone(),
            target: self.target.clone(),
            payload: self.payload.clone(),
            metadata: self.metadata.clone(),
            changes: self.changes.clone(),
            project_id: self.project_id.clone(),
        }
    }

    /// `createdAt` parsed as RFC 3339, if it is well-formed.
    pub fn created_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc))
    }
}

/// First broken link found by [`verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    /// Index (in the input slice) of the newer event whose `prevHash` is wrong.
    pub index: usize,
    pub expected: String,
    pub found: Option<String>,
}

/// Check `prevHash` links for events ordered newest first.
///
/// Only consecutive events of the same workspace are compared; a query spanning
/// several workspaces interleaves independent chains.
pub fn verify_chain(events: &[Event]) -> std::result::Result<(), ChainBreak> {
    for (index, pair) in events.windows(2).enumerate() {
        let (newer, older) = (&pair[0], &pair[1]);
        if newer.workspace_id != older.workspace_id {
            continue;
        }
        if newer.prev_hash.as_deref() != Some(older.hash.as_str()) {
            return Err(ChainBreak {
                index,
                expected: older.hash.clone(),
                found: newer.prev_hash.clone(),
            });
        }
    }
    Ok(())
}
