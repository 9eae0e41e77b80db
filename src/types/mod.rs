//! Data model - value types exchanged with the HyreLog API
//!
//! - [`event`]: `EventInput` (submitted) and `Event` (returned), hash-chain check
//! - [`query`]: `QueryOptions`, `QueryResponse`, `Pagination`

pub mod event;
pub mod query;

pub use event::{verify_chain, Actor, ChainBreak, Change, Event, EventInput, Target};
pub use query::{Pagination, QueryOptions, QueryResponse, DEFAULT_LIMIT, DEFAULT_PAGE};
