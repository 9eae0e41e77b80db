//! In-memory event store backing [`MockHttp`](super::MockHttp).

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::json;
use xxhash_rust::xxh3::xxh3_64;

use crate::types::{Event, EventInput, Pagination, QueryOptions, QueryResponse};

pub const MOCK_COMPANY_ID: &str = "mock-company";
pub const MOCK_WORKSPACE_ID: &str = "mock-workspace";
pub const MOCK_REGION: &str = "AU";

#[derive(Debug)]
struct Stored {
    seq: u64,
    at: DateTime<Utc>,
    event: Event,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<Stored>,
    next_id: u64,
    last_at: Option<DateTime<Utc>>,
}

/// Events kept in insertion order, hash-chained per workspace.
///
/// Events with a `projectId` land in workspace `mock-workspace-<projectId>`,
/// everything else in `mock-workspace`.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    state: Mutex<StoreState>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an event stamped with the current time.
    ///
    /// Timestamps are millisecond precision and strictly increasing across calls.
    pub fn add(&self, input: EventInput) -> Event {
        let mut state = self.state.lock();
        let now = truncate_millis(Utc::now());
        let at = match state.last_at {
            Some(last) if now <= last => last + ChronoDuration::milliseconds(1),
            _ => now,
        };
        state.last_at = Some(at);
        Self::insert(&mut state, input, at)
    }

    /// Store an event with an explicit `createdAt`, for date-range fixtures.
    pub fn add_at(&self, input: EventInput, created_at: DateTime<Utc>) -> Event {
        let mut state = self.state.lock();
        let at = truncate_millis(created_at);
        if state.last_at.map_or(true, |last| at > last) {
            state.last_at = Some(at);
        }
        Self::insert(&mut state, input, at)
    }

    fn insert(state: &mut StoreState, input: EventInput, at: DateTime<Utc>) -> Event {
        state.next_id += 1;
        let id = format!("mock-{}", state.next_id);
        let workspace_id = match &input.project_id {
            Some(project) => format!("{}-{}", MOCK_WORKSPACE_ID, project),
            None => MOCK_WORKSPACE_ID.to_string(),
        };
        let prev_hash = state
            .records
            .iter()
            .rev()
            .find(|r| r.event.workspace_id == workspace_id)
            .map(|r| r.event.hash.clone());
        let created_at = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let hash = chain_hash(&id, &input, prev_hash.as_deref(), &created_at);

        let event = Event {
            id,
            company_id: MOCK_COMPANY_ID.to_string(),
            workspace_id,
            action: input.action,
            category: input.category,
            actor: input.actor,
            target: input.target,
            payload: input.payload,
            metadata: input.metadata,
            changes: input.changes,
            project_id: input.project_id,
            hash,
            prev_hash,
            trace_id: None,
            created_at,
            archived: false,
            data_region: Some(MOCK_REGION.to_string()),
        };
        state.records.push(Stored {
            seq: state.next_id,
            at,
            event: event.clone(),
        });
        event
    }

    /// Filter, sort newest first, then paginate.
    pub fn query(&self, options: &QueryOptions) -> QueryResponse {
        let state = self.state.lock();
        let mut matched: Vec<&Stored> = state
            .records
            .iter()
            .filter(|r| matches(r, options))
            .collect();
        matched.sort_by(|a, b| b.at.cmp(&a.at).then(b.seq.cmp(&a.seq)));

        let total = matched.len() as u64;
        let page = options.page.max(1);
        let limit = options.limit.max(1);
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let data = matched
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .map(|r| r.event.clone())
            .collect();

        QueryResponse {
            data,
            pagination: Pagination::compute(page, limit, total),
            retention_applied: None,
            retention_window_start: None,
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<Event> {
        self.state
            .lock()
            .records
            .iter()
            .find(|r| r.event.id == id)
            .map(|r| r.event.clone())
    }

    pub fn count(&self) -> usize {
        self.state.lock().records.len()
    }

    /// All events in insertion order.
    pub fn events(&self) -> Vec<Event> {
        self.state
            .lock()
            .records
            .iter()
            .map(|r| r.event.clone())
            .collect()
    }

    /// Drop all events and restart ids at `mock-1`.
    pub fn clear(&self) {
        *self.state.lock() = StoreState::default();
    }
}

fn matches(record: &Stored, options: &QueryOptions) -> bool {
    let event = &record.event;
    if options.from.is_some_and(|from| record.at < from) {
        return false;
    }
    if options.to.is_some_and(|to| record.at > to) {
        return false;
    }
    let actor_id = event.actor.as_ref().and_then(|a| a.id.as_deref());
    let actor_email = event.actor.as_ref().and_then(|a| a.email.as_deref());

    eq_filter(&options.action, Some(event.action.as_str()))
        && eq_filter(&options.category, Some(event.category.as_str()))
        && eq_filter(&options.actor_id, actor_id)
        && eq_filter(&options.actor_email, actor_email)
        && eq_filter(&options.workspace_id, Some(event.workspace_id.as_str()))
        && eq_filter(&options.project_id, event.project_id.as_deref())
}

fn eq_filter(wanted: &Option<String>, actual: Option<&str>) -> bool {
    match wanted {
        Some(wanted) => actual == Some(wanted.as_str()),
        None => true,
    }
}

fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

fn chain_hash(id: &str, input: &EventInput, prev_hash: Option<&str>, created_at: &str) -> String {
    let material = json!({
        "id": id,
        "event": input,
        "prevHash": prev_hash,
        "createdAt": created_at,
    });
    format!("{:016x}", xxh3_64(material.to_string().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{verify_chain, Actor};
    use pretty_assertions::assert_eq;

    fn seeded(n: usize) -> MemoryEventStore {
        let store = MemoryEventStore::new();
        for i in 1..=n {
            store.add(EventInput::new(format!("test.action.{}", i), "test"));
        }
        store
    }

    #[test]
    fn ids_and_timestamps_increase() {
        let store = seeded(3);
        let events = store.events();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["mock-1", "mock-2", "mock-3"]);
        assert!(events[0].created_at < events[1].created_at);
        assert!(events[1].created_at < events[2].created_at);
    }

    #[test]
    fn chain_links_previous_hash() {
        let store = seeded(4);
        let events = store.events();
        assert_eq!(events[0].prev_hash, None);
        assert_eq!(events[2].prev_hash.as_deref(), Some(events[1].hash.as_str()));

        let newest_first = store.query(&QueryOptions::new().limit(10)).data;
        assert_eq!(verify_chain(&newest_first), Ok(()));
    }

    #[test]
    fn chains_are_per_workspace() {
        let store = MemoryEventStore::new();
        let a = store.add(EventInput::new("a", "test"));
        let b = store.add(EventInput::new("b", "test").with_project_id("p1"));
        let c = store.add(EventInput::new("c", "test"));
        assert_eq!(b.workspace_id, "mock-workspace-p1");
        assert_eq!(b.prev_hash, None);
        assert_eq!(c.prev_hash, Some(a.hash));
    }

    #[test]
    fn second_page_of_twenty_five() {
        let store = seeded(25);
        let response = store.query(&QueryOptions::new().page(2).limit(10));

        assert_eq!(response.pagination, Pagination::compute(2, 10, 25));
        assert_eq!(response.pagination.total_pages, 3);
        assert_eq!(response.data.len(), 10);
        // Newest first: ranks 11..=20 are actions 15 down to 6.
        assert_eq!(response.data[0].action, "test.action.15");
        assert_eq!(response.data[9].action, "test.action.6");
    }

    #[test]
    fn filters_combine() {
        let store = MemoryEventStore::new();
        store.add(EventInput::new("user.login", "auth").with_actor(Actor::new("u1")));
        store.add(EventInput::new("user.login", "auth").with_actor(Actor::new("u2")));
        store.add(EventInput::new("user.logout", "auth").with_actor(Actor::new("u1")));

        let response = store.query(&QueryOptions::new().action("user.login").actor_id("u1"));
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.pagination.total, 1);
    }

    #[test]
    fn date_range_is_inclusive() {
        let store = MemoryEventStore::new();
        let base = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        for day in 0..5 {
            store.add_at(
                EventInput::new(format!("day.{}", day), "test"),
                base + ChronoDuration::days(day),
            );
        }
        let response = store.query(
            &QueryOptions::new()
                .from_date(base + ChronoDuration::days(1))
                .to_date(base + ChronoDuration::days(3)),
        );
        let actions: Vec<_> = response.data.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["day.3", "day.2", "day.1"]);
    }

    #[test]
    fn clear_resets_ids() {
        let store = seeded(2);
        store.clear();
        assert_eq!(store.count(), 0);
        assert_eq!(store.add(EventInput::new("a", "b")).id, "mock-1");
        assert!(store.get_by_id("mock-1").is_some());
        assert!(store.get_by_id("mock-2").is_none());
    }
}
