//! Test support (feature `test-fixtures`)
//!
//! - [`store`]: [`MemoryEventStore`], an in-memory, hash-chained event store
//! - [`mock`]: [`MockHttp`] serving the API routes from that store, plus
//!   [`mock_clients`] wiring real clients to it
//! - [`factories`]: [`EventFactory`], presets, and comparison helpers
//!
//! ```rust,ignore
//! use hyrelog::testing::{mock_clients, presets, EventOverrides};
//!
//! let mocks = mock_clients();
//! mocks.workspace.log_event(presets::user_created(EventOverrides::default())).await?;
//! assert_eq!(mocks.store.count(), 1);
//! ```

pub mod factories;
pub mod mock;
pub mod store;

pub use factories::{
    assert_event_structure, event_snapshot, event_with_changes, events_match, generate_batch,
    presets, EventFactory, EventOverrides,
};
pub use mock::{
    fast_retry, mock_clients, mock_clients_with, MockClients, MockHttp, RecordedRequest,
    MOCK_BASE_URL, MOCK_COMPANY_KEY, MOCK_WORKSPACE_KEY,
};
pub use store::{MemoryEventStore, MOCK_COMPANY_ID, MOCK_REGION, MOCK_WORKSPACE_ID};
