//! HyreLog - client SDK for the HyreLog audit-event service
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DATA MODEL                            │
//! │  types/     EventInput, Event, QueryOptions, QueryResponse   │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          FACADES                             │
//! │  client/    WorkspaceClient (write + read), CompanyClient    │
//! │  batch      BatchQueue (size / timer / explicit flush)       │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       TRANSPORT CORE                         │
//! │  transport/ request pipeline, retry + backoff, span sink     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`types`] | Wire types (camelCase JSON), validation, hash-chain check |
//! | [`transport`] | Authenticated JSON requests with retry and rate-limit handling |
//! | [`batch`] | Buffered ingestion with chunked submission |
//! | [`client`] | Workspace and company facades over one transport |
//! | [`config`] | Client configuration (file, env, builder) |
//! | [`error`] | Error types with fix suggestions |
//! | `testing` | In-memory mock service and event factories (`test-fixtures`) |

// ═══════════════════════════════════════════════════════════════
// DATA MODEL
// ═══════════════════════════════════════════════════════════════
pub mod types;

// ═══════════════════════════════════════════════════════════════
// FACADES - Clients and batching
// ═══════════════════════════════════════════════════════════════
pub mod batch;
pub mod client;

// ═══════════════════════════════════════════════════════════════
// TRANSPORT CORE
// ═══════════════════════════════════════════════════════════════
pub mod transport;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// TEST SUPPORT
// ═══════════════════════════════════════════════════════════════
#[cfg(any(test, feature = "test-fixtures"))]
pub mod testing;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Error types
pub use error::{FixSuggestion, HyreLogError, Result};

// Config types
pub use config::{mask_api_key, ClientConfig};

// Clients
pub use batch::{BatchOptions, BatchQueue};
pub use client::{CompanyClient, WorkspaceClient};

// Transport
pub use transport::{
    HttpTransport, NoopSink, RetryConfig, SpanSink, TracingSink, Transport, TransportRequest,
    TransportResponse,
};

// Data model
pub use types::{
    verify_chain, Actor, ChainBreak, Change, Event, EventInput, Pagination, QueryOptions,
    QueryResponse, Target,
};
