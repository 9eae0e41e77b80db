//! Event factories and comparison helpers for tests.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{json, Map, Value};

use crate::types::{Actor, Change, Event, EventInput, Target};

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_seq() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Field values layered over a factory's defaults. Unset fields fall through.
#[derive(Debug, Clone, Default)]
pub struct EventOverrides {
    pub action: Option<String>,
    pub category: Option<String>,
    pub actor_id: Option<String>,
    pub actor_email: Option<String>,
    pub actor_name: Option<String>,
    pub target_id: Option<String>,
    pub target_type: Option<String>,
    pub payload: Map<String, Value>,
    pub metadata: Map<String, Value>,
    pub project_id: Option<String>,
}

impl EventOverrides {
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn actor_id(mut self, id: impl Into<String>) -> Self {
        self.actor_id = Some(id.into());
        self
    }

    pub fn actor_email(mut self, email: impl Into<String>) -> Self {
        self.actor_email = Some(email.into());
        self
    }

    pub fn target_id(mut self, id: impl Into<String>) -> Self {
        self.target_id = Some(id.into());
        self
    }

    pub fn payload_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn metadata_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }
}

/// Builds [`EventInput`]s from defaults plus per-call overrides.
///
/// - Action and category fall back to `test.action` / `test`.
/// - An actor is attached when either an actor id or email is set; the
///   missing half gets a generated placeholder.
/// - A target is attached when a target id is set (type defaults to `resource`).
/// - Payload and metadata maps merge, overrides winning; metadata always
///   carries `_test: true`.
#[derive(Debug, Clone, Default)]
pub struct EventFactory {
    defaults: EventOverrides,
}

impl EventFactory {
    pub fn new(defaults: EventOverrides) -> Self {
        Self { defaults }
    }

    /// Factory with fixed action and category.
    pub fn preset(action: &str, category: &str) -> Self {
        Self::new(EventOverrides::default().action(action).category(category))
    }

    pub fn build(&self, overrides: EventOverrides) -> EventInput {
        let d = &self.defaults;
        let pick = |o: &Option<String>, d: &Option<String>| o.clone().or_else(|| d.clone());

        let action = pick(&overrides.action, &d.action).unwrap_or_else(|| "test.action".into());
        let category = pick(&overrides.category, &d.category).unwrap_or_else(|| "test".into());
        let mut event = EventInput::new(action, category);

        let actor_id = pick(&overrides.actor_id, &d.actor_id);
        let actor_email = pick(&overrides.actor_email, &d.actor_email);
        if actor_id.is_some() || actor_email.is_some() {
            let n = next_seq();
            event = event.with_actor(Actor {
                id: Some(actor_id.unwrap_or_else(|| format!("user-{}", n))),
                email: Some(actor_email.unwrap_or_else(|| format!("user-{}@example.com", n))),
                name: Some(
                    pick(&overrides.actor_name, &d.actor_name)
                        .unwrap_or_else(|| "Test User".into()),
                ),
            });
        }

        if let Some(target_id) = pick(&overrides.target_id, &d.target_id) {
            let kind = pick(&overrides.target_type, &d.target_type)
                .unwrap_or_else(|| "resource".into());
            event = event.with_target(Target::new(target_id, kind));
        }

        let mut payload = d.payload.clone();
        payload.extend(overrides.payload);
        if !payload.is_empty() {
            event = event.with_payload(payload);
        }

        let mut metadata = d.metadata.clone();
        metadata.extend(overrides.metadata);
        metadata.insert("_test".into(), Value::Bool(true));
        event = event.with_metadata(metadata);

        if let Some(project) = pick(&overrides.project_id, &d.project_id) {
            event = event.with_project_id(project);
        }
        event
    }

    pub fn build_default(&self) -> EventInput {
        self.build(EventOverrides::default())
    }
}

macro_rules! presets {
    ($($name:ident => ($action:literal, $category:literal)),* $(,)?) => {
        /// Factories for common event types.
        pub mod presets {
            use super::{EventFactory, EventOverrides};
            use crate::types::EventInput;

            $(
                #[doc = concat!("`", $action, "` in category `", $category, "`.")]
                pub fn $name(overrides: EventOverrides) -> EventInput {
                    EventFactory::preset($action, $category).build(overrides)
                }
            )*
        }
    };
}

presets! {
    user_created => ("user.created", "auth"),
    user_updated => ("user.updated", "auth"),
    user_deleted => ("user.deleted", "auth"),
    user_login => ("user.login", "auth"),
    user_logout => ("user.logout", "auth"),
    api_request => ("api.request", "api"),
    api_response => ("api.response", "api"),
    api_error => ("api.error", "error"),
    billing_subscription_created => ("billing.subscription.created", "billing"),
    billing_subscription_updated => ("billing.subscription.updated", "billing"),
    billing_payment_succeeded => ("billing.payment.succeeded", "billing"),
    billing_payment_failed => ("billing.payment.failed", "billing"),
    system_pipeline_error => ("system.pipeline.error", "system"),
    system_job_completed => ("system.job.completed", "system"),
    system_job_failed => ("system.job.failed", "system"),
}

/// `count` events with actions `test.action.0`, `test.action.1`, ...
pub fn generate_batch(count: usize) -> Vec<EventInput> {
    let factory = EventFactory::default();
    (0..count)
        .map(|i| factory.build(EventOverrides::default().action(format!("test.action.{}", i))))
        .collect()
}

/// One event carrying a single field change.
pub fn event_with_changes(
    field: &str,
    old: impl Into<Value>,
    new: impl Into<Value>,
    overrides: EventOverrides,
) -> EventInput {
    EventFactory::default()
        .build(overrides)
        .with_change(Change::new(field, old, new))
}

/// Same action, category, payload and metadata. Ids and timestamps are ignored.
pub fn events_match(a: &EventInput, b: &EventInput) -> bool {
    a.action == b.action
        && a.category == b.category
        && a.payload == b.payload
        && a.metadata == b.metadata
}

/// Stable pretty-printed view of the submitted fields, for snapshot assertions.
pub fn event_snapshot(events: &[Event]) -> String {
    let view: Vec<Value> = events
        .iter()
        .map(|e| {
            json!({
                "action": e.action,
                "category": e.category,
                "actor": e.actor,
                "payload": e.payload,
                "metadata": e.metadata,
            })
        })
        .collect();
    serde_json::to_string_pretty(&view).unwrap_or_default()
}

/// Panics unless `event` would pass client-side validation.
#[track_caller]
pub fn assert_event_structure(event: &EventInput) {
    assert!(
        event.validate().is_ok(),
        "event must have a non-empty action and category, got {:?} / {:?}",
        event.action,
        event.category
    );
}
