//! Batching queue - buffers events and drains them as bulk submissions
//!
//! ## Flush triggers
//!
//! | Trigger | When | Where it runs |
//! |---------|------|---------------|
//! | size | buffer reaches `max_size` on enqueue | background task |
//! | timer | `max_wait` after the buffer became non-empty (`auto_flush`) | background task |
//! | manual | [`BatchQueue::flush`] / [`BatchQueue::close`] | caller |
//!
//! Every trigger starts with the same take-and-clear of the buffer under one
//! lock, so an event is handed to exactly one submission. Background
//! submissions are kept as join handles until they finish; finished ones are
//! folded into a single outcome slot on the next enqueue, in submission order.
//! The next `flush`/`close` returns that outcome. At most
//! [`MAX_RETAINED_EVENTS`] accepted events are kept between flushes.
//!
//! Chunked submission stops at the first failing chunk and reports
//! [`HyreLogError::BatchFailed`] with the accepted events and every event that
//! was not accepted. Nothing is put back into the buffer.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::routes;
use crate::config::seconds;
use crate::error::{HyreLogError, Result};
use crate::transport::Transport;
use crate::types::{Event, EventInput};

/// Accepted events from background submissions kept for the next flush.
/// Older ones are discarded first, with a warning.
pub const MAX_RETAINED_EVENTS: usize = 10_000;

type Submission = JoinHandle<Result<Vec<Event>>>;

/// Batch ingestion options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Maximum events per batch request
    pub max_size: usize,
    /// Maximum time an event waits in the buffer when `auto_flush` is on
    #[serde(with = "seconds")]
    pub max_wait: Duration,
    /// Arm a flush timer whenever the buffer becomes non-empty
    pub auto_flush: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_size: 100,
            max_wait: Duration::from_secs(5),
            auto_flush: false,
        }
    }
}

impl BatchOptions {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(HyreLogError::config("batch.max_size must be at least 1"));
        }
        Ok(())
    }
}

/// Submit `events` in chunks of at most `max_size`, one chunk at a time.
///
/// Results are concatenated in chunk order. On the first failing chunk the
/// remaining chunks are not sent.
pub async fn submit_in_chunks(
    transport: &Transport,
    events: Vec<EventInput>,
    max_size: usize,
) -> Result<Vec<Event>> {
    let max_size = max_size.max(1);
    let mut submitted = Vec::with_capacity(events.len());
    let mut remaining = events;

    while !remaining.is_empty() {
        let rest = remaining.split_off(remaining.len().min(max_size));
        let chunk = std::mem::replace(&mut remaining, rest);

        let response = match send_chunk(transport, &chunk).await {
            Ok(response) => response,
            Err(source) => {
                let mut unsent = chunk;
                unsent.append(&mut remaining);
                return Err(HyreLogError::BatchFailed {
                    submitted,
                    unconfirmed: Vec::new(),
                    unsent,
                    source: Box::new(source),
                });
            }
        };

        match parse_batch_response(response, chunk.len()) {
            Ok(events) => submitted.extend(events),
            // Stored by the service; only the reply is unreadable.
            Err(source) => {
                return Err(HyreLogError::BatchFailed {
                    submitted,
                    unconfirmed: chunk,
                    unsent: remaining,
                    source: Box::new(source),
                })
            }
        }
    }

    Ok(submitted)
}

async fn send_chunk(transport: &Transport, chunk: &[EventInput]) -> Result<Value> {
    debug!(size = chunk.len(), "Submitting batch chunk");
    let body = json!({ "events": chunk });
    transport
        .request(Method::POST, routes::WORKSPACE_EVENTS_BATCH, Some(&body), &[])
        .await
}

fn parse_batch_response(response: Value, expected: usize) -> Result<Vec<Event>> {
    let excerpt_src = response.to_string();
    let events = match response {
        Value::Object(mut obj) => match obj.remove("events") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(HyreLogError::malformed(
                    "batch response has no `events` array",
                    &excerpt_src,
                ))
            }
        },
        _ => {
            return Err(HyreLogError::malformed(
                "batch response is not an object",
                &excerpt_src,
            ))
        }
    };
    if events.len() != expected {
        warn!(
            expected,
            returned = events.len(),
            "Batch response event count differs from submitted chunk"
        );
    }
    events.into_iter().map(Event::from_value).collect()
}

struct PendingTimer {
    generation: u64,
    cancel: CancellationToken,
}

/// Merged results of several submissions, in submission order.
#[derive(Default)]
struct Outcomes {
    submitted: VecDeque<Event>,
    unconfirmed: Vec<EventInput>,
    unsent: Vec<EventInput>,
    error: Option<HyreLogError>,
}

impl Outcomes {
    fn is_empty(&self) -> bool {
        self.submitted.is_empty()
            && self.unconfirmed.is_empty()
            && self.unsent.is_empty()
            && self.error.is_none()
    }

    /// Fold one submission in. Only the first error is kept as the source.
    fn merge(&mut self, outcome: Result<Vec<Event>>) {
        match outcome {
            Ok(events) => self.submitted.extend(events),
            Err(HyreLogError::BatchFailed {
                submitted,
                unconfirmed,
                unsent,
                source,
            }) => {
                self.submitted.extend(submitted);
                self.unconfirmed.extend(unconfirmed);
                self.unsent.extend(unsent);
                self.keep_first(*source);
            }
            Err(other) => self.keep_first(other),
        }
    }

    fn keep_first(&mut self, error: HyreLogError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn merge_joined(&mut self, joined: std::result::Result<Result<Vec<Event>>, JoinError>) {
        self.merge(joined.unwrap_or_else(|e| {
            Err(HyreLogError::BackgroundTask {
                reason: e.to_string(),
            })
        }));
    }

    fn into_result(self) -> Result<Vec<Event>> {
        match self.error {
            None => Ok(self.submitted.into()),
            Some(source) => Err(HyreLogError::BatchFailed {
                submitted: self.submitted.into(),
                unconfirmed: self.unconfirmed,
                unsent: self.unsent,
                source: Box::new(source),
            }),
        }
    }
}

#[derive(Default)]
struct QueueState {
    buffer: Vec<EventInput>,
    timer: Option<PendingTimer>,
    generation: u64,
    in_flight: VecDeque<Submission>,
    completed: Outcomes,
    closed: bool,
}

impl QueueState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel.cancel();
        }
    }

    /// Move finished submissions at the front of `in_flight` into `completed`.
    fn reap_finished(&mut self) {
        loop {
            let joined = match self.in_flight.front_mut() {
                Some(handle) if handle.is_finished() => match handle.now_or_never() {
                    Some(joined) => joined,
                    None => break,
                },
                _ => break,
            };
            self.in_flight.pop_front();
            self.completed.merge_joined(joined);
        }

        let excess = self
            .completed
            .submitted
            .len()
            .saturating_sub(MAX_RETAINED_EVENTS);
        if excess > 0 {
            self.completed.submitted.drain(..excess);
            warn!(
                discarded = excess,
                retained = MAX_RETAINED_EVENTS,
                "Discarding accepted background batch results; call flush_batch() to collect them"
            );
        }
    }
}

struct QueueInner {
    transport: Arc<Transport>,
    options: BatchOptions,
    state: Mutex<QueueState>,
}

impl QueueInner {
    /// Take the buffer and hand it to a background submission. Caller holds the lock.
    fn spawn_submission(self: &Arc<Self>, state: &mut QueueState) {
        state.reap_finished();
        let batch = std::mem::take(&mut state.buffer);
        if batch.is_empty() {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let max_size = self.options.max_size;
        debug!(size = batch.len(), "Spawning background batch submission");
        state.in_flight.push_back(tokio::spawn(async move {
            submit_in_chunks(&transport, batch, max_size).await
        }));
    }

    fn arm_timer(self: &Arc<Self>, state: &mut QueueState) {
        state.generation += 1;
        let generation = state.generation;
        let cancel = CancellationToken::new();
        let weak: Weak<QueueInner> = Arc::downgrade(self);
        let max_wait = self.options.max_wait;
        let token = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(max_wait) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_timer(generation);
                    }
                }
            }
        });

        state.timer = Some(PendingTimer { generation, cancel });
    }

    fn on_timer(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        // A flush or close already replaced or cleared this timer.
        match &state.timer {
            Some(timer) if timer.generation == generation => {}
            _ => return,
        }
        state.timer = None;
        debug!(buffered = state.buffer.len(), "Batch timer fired");
        self.spawn_submission(&mut state);
    }
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.cancel_timer();
        if !state.buffer.is_empty() {
            warn!(
                dropped = state.buffer.len(),
                "Batch queue dropped with unflushed events; call close() to drain"
            );
        }
    }
}

/// Client-side buffer that accumulates events for bulk submission.
///
/// Cheap to clone; clones share the same buffer.
#[derive(Clone)]
pub struct BatchQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for BatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("BatchQueue")
            .field("options", &self.inner.options)
            .field("buffered", &state.buffer.len())
            .field("in_flight", &state.in_flight.len())
            .field("timer_pending", &state.timer.is_some())
            .field("closed", &state.closed)
            .finish()
    }
}

impl BatchQueue {
    pub fn new(transport: Arc<Transport>, options: BatchOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            inner: Arc::new(QueueInner {
                transport,
                options,
                state: Mutex::new(QueueState::default()),
            }),
        })
    }

    pub fn options(&self) -> &BatchOptions {
        &self.inner.options
    }

    /// Events buffered and not yet handed to a submission.
    pub fn len(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    /// Background submissions still running, or finished but not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    /// Buffer one event. Never waits on the network.
    ///
    /// Must be called from within a Tokio runtime: reaching `max_size` or
    /// arming the timer spawns a task.
    pub fn enqueue(&self, event: EventInput) -> Result<()> {
        event.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(HyreLogError::config(
                "queue_event must be called from within a Tokio runtime",
            ));
        }

        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(HyreLogError::ClientClosed);
        }
        state.reap_finished();
        state.buffer.push(event);

        if state.buffer.len() >= self.inner.options.max_size {
            state.cancel_timer();
            self.inner.spawn_submission(&mut state);
        } else if self.inner.options.auto_flush && state.timer.is_none() {
            self.inner.arm_timer(&mut state);
        }
        Ok(())
    }

    /// Submit everything buffered and collect all background outcomes.
    ///
    /// Returns an empty vector when nothing was buffered or in flight.
    pub async fn flush(&self) -> Result<Vec<Event>> {
        let (batch, in_flight, completed) = {
            let mut state = self.inner.state.lock();
            state.cancel_timer();
            (
                std::mem::take(&mut state.buffer),
                std::mem::take(&mut state.in_flight),
                std::mem::take(&mut state.completed),
            )
        };
        self.drain(batch, in_flight, completed).await
    }

    /// Cancel the timer, drain everything and close the transport.
    ///
    /// A second call returns an empty result.
    pub async fn close(&self) -> Result<Vec<Event>> {
        let (batch, in_flight, completed, was_closed) = {
            let mut state = self.inner.state.lock();
            let was_closed = std::mem::replace(&mut state.closed, true);
            state.cancel_timer();
            (
                std::mem::take(&mut state.buffer),
                std::mem::take(&mut state.in_flight),
                std::mem::take(&mut state.completed),
                was_closed,
            )
        };
        if was_closed {
            return Ok(Vec::new());
        }
        let result = self.drain(batch, in_flight, completed).await;
        self.inner.transport.close().await;
        result
    }

    async fn drain(
        &self,
        batch: Vec<EventInput>,
        in_flight: VecDeque<Submission>,
        mut outcomes: Outcomes,
    ) -> Result<Vec<Event>> {
        if batch.is_empty() && in_flight.is_empty() && outcomes.is_empty() {
            return Ok(Vec::new());
        }

        // Already dispatched: always awaited so their results are not lost.
        for handle in in_flight {
            outcomes.merge_joined(handle.await);
        }

        if outcomes.error.is_some() {
            outcomes.unsent.extend(batch);
        } else if !batch.is_empty() {
            outcomes.merge(
                submit_in_chunks(&self.inner.transport, batch, self.inner.options.max_size).await,
            );
        }

        outcomes.into_result()
    }
}
