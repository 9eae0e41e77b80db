//! Workspace-scoped client: ingestion plus workspace-filtered queries.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, instrument};

use super::routes;
use crate::batch::{submit_in_chunks, BatchOptions, BatchQueue};
use crate::config::ClientConfig;
use crate::error::{HyreLogError, Result};
use crate::transport::{HttpTransport, Transport};
use crate::types::{Event, EventInput, QueryOptions, QueryResponse};

/// Client for a single workspace.
///
/// # Example
///
/// ```rust,no_run
/// use hyrelog::{ClientConfig, EventInput, WorkspaceClient};
///
/// # async fn run() -> hyrelog::Result<()> {
/// let client = WorkspaceClient::new(ClientConfig::from_env()?)?;
/// let event = client
///     .log_event(EventInput::new("user.created", "auth").payload_field("plan", "pro"))
///     .await?;
/// println!("stored {} ({})", event.id, event.hash);
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WorkspaceClient {
    transport: Arc<Transport>,
    queue: BatchQueue,
}

impl WorkspaceClient {
    /// Client over the default reqwest transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Transport::new(&config)?;
        Self::from_transport(transport, config.batch)
    }

    /// Client over a custom HTTP layer.
    pub fn with_http(config: ClientConfig, http: Arc<dyn HttpTransport>) -> Result<Self> {
        let transport = Transport::with_http(&config, http)?;
        Self::from_transport(transport, config.batch)
    }

    /// Client over a pre-built transport (custom span sink, shared HTTP layer).
    pub fn from_transport(transport: Transport, batch: BatchOptions) -> Result<Self> {
        let transport = Arc::new(transport);
        let queue = BatchQueue::new(Arc::clone(&transport), batch)?;
        Ok(Self { transport, queue })
    }

    pub fn batch_options(&self) -> &BatchOptions {
        self.queue.options()
    }

    /// Events waiting in the batch buffer.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Size- or timer-triggered submissions not yet collected.
    pub fn in_flight_batches(&self) -> usize {
        self.queue.in_flight()
    }

    /// Submit one event and return the stored record.
    #[instrument(skip(self, event), fields(action = %event.action, category = %event.category))]
    pub async fn log_event(&self, event: EventInput) -> Result<Event> {
        event.validate()?;
        let body = serde_json::to_value(&event)
            .map_err(|e| HyreLogError::validation("event", e.to_string()))?;
        let value = self
            .transport
            .request(Method::POST, routes::WORKSPACE_EVENTS, Some(&body), &[])
            .await?;
        Event::from_value(unwrap_event(value))
    }

    /// Submit many events in chunks of at most `max_size`, sequentially.
    ///
    /// Fails with [`HyreLogError::BatchFailed`] at the first rejected chunk.
    #[instrument(skip(self, events), fields(batch_size = events.len()))]
    pub async fn log_batch(&self, events: Vec<EventInput>) -> Result<Vec<Event>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        if self.transport.is_closed() {
            return Err(HyreLogError::ClientClosed);
        }
        for event in &events {
            event.validate()?;
        }
        let max_size = self.queue.options().max_size;
        debug!(chunks = events.len().div_ceil(max_size), "Logging batch");
        submit_in_chunks(&self.transport, events, max_size).await
    }

    /// Buffer an event for batched submission; returns immediately.
    pub fn queue_event(&self, event: EventInput) -> Result<()> {
        self.queue.enqueue(event)
    }

    /// Submit buffered events and collect results of earlier background flushes.
    pub async fn flush_batch(&self) -> Result<Vec<Event>> {
        self.queue.flush().await
    }

    /// Query this workspace's events.
    #[instrument(skip(self, options), fields(page = options.page, limit = options.limit))]
    pub async fn query_events(&self, options: QueryOptions) -> Result<QueryResponse> {
        super::query(&self.transport, routes::WORKSPACE_EVENTS, &options).await
    }

    /// Drain the batch queue, then release the transport.
    ///
    /// Returns the events accepted during the final drain.
    pub async fn close(&self) -> Result<Vec<Event>> {
        let drained = self.queue.close().await;
        // The queue closes the transport; this covers a failed drain too.
        self.transport.close().await;
        drained
    }
}

/// Single-event responses are the event itself or `{ "event": { ... } }`.
fn unwrap_event(value: Value) -> Value {
    match value {
        Value::Object(mut obj) if obj.len() == 1 && obj.contains_key("event") => {
            obj.remove("event").unwrap_or(Value::Null)
        }
        other => other,
    }
}
