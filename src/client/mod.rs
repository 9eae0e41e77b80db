//! Client facades
//!
//! | Client | Key | Operations |
//! |--------|-----|------------|
//! | [`WorkspaceClient`] | workspace key | log, batch, queue, flush, query |
//! | [`CompanyClient`] | company key | query (workspace, global), regions |
//!
//! Both own an `Arc<Transport>`; the workspace client also owns a
//! [`BatchQueue`](crate::batch::BatchQueue) over the same transport.

pub mod company;
pub mod workspace;

pub use company::CompanyClient;
pub use workspace::WorkspaceClient;

use reqwest::Method;

use crate::error::Result;
use crate::transport::Transport;
use crate::types::{QueryOptions, QueryResponse};

/// API paths, appended to the configured base URL.
pub mod routes {
    pub const WORKSPACE_EVENTS: &str = "/v1/key/workspace/events";
    pub const WORKSPACE_EVENTS_BATCH: &str = "/v1/key/workspace/events/batch";
    pub const COMPANY_EVENTS: &str = "/v1/key/company/events";
    pub const COMPANY_EVENTS_GLOBAL: &str = "/v1/key/company/events/global";
    pub const COMPANY_REGIONS: &str = "/v1/key/company/regions";
}

/// GET `path` with `options` as query parameters and parse a [`QueryResponse`].
pub(crate) async fn query(
    transport: &Transport,
    path: &str,
    options: &QueryOptions,
) -> Result<QueryResponse> {
    options.validate()?;
    let value = transport
        .request(Method::GET, path, None, &options.to_query_pairs())
        .await?;
    QueryResponse::from_value(value)
}
