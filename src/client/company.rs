//! Company-scoped, read-only client: cross-workspace and cross-region queries.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value};
use tracing::instrument;

use super::routes;
use crate::config::ClientConfig;
use crate::error::{HyreLogError, Result};
use crate::transport::{HttpTransport, Transport};
use crate::types::{QueryOptions, QueryResponse};

/// Client for a company key. Never writes.
#[derive(Debug)]
pub struct CompanyClient {
    transport: Arc<Transport>,
}

impl CompanyClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::from_transport(Transport::new(&config)?))
    }

    pub fn with_http(config: ClientConfig, http: Arc<dyn HttpTransport>) -> Result<Self> {
        Ok(Self::from_transport(Transport::with_http(&config, http)?))
    }

    pub fn from_transport(transport: Transport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Events across all workspaces of the company (home region).
    /// Use `QueryOptions::workspace_id` to narrow to one workspace.
    #[instrument(skip(self, options), fields(page = options.page, limit = options.limit))]
    pub async fn query_events(&self, options: QueryOptions) -> Result<QueryResponse> {
        super::query(&self.transport, routes::COMPANY_EVENTS, &options).await
    }

    /// Events across every data region the company replicates to.
    #[instrument(skip(self, options), fields(page = options.page, limit = options.limit))]
    pub async fn query_global_events(&self, options: QueryOptions) -> Result<QueryResponse> {
        super::query(&self.transport, routes::COMPANY_EVENTS_GLOBAL, &options).await
    }

    /// Region information for the company, as returned by the service.
    #[instrument(skip(self))]
    pub async fn get_regions(&self) -> Result<Map<String, Value>> {
        let value = self
            .transport
            .request(Method::GET, routes::COMPANY_REGIONS, None, &[])
            .await?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(HyreLogError::malformed(
                "regions response is not an object",
                &other.to_string(),
            )),
        }
    }

    pub async fn close(&self) {
        self.transport.close().await;
    }
}
