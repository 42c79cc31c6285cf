//! Stream processing utilities
//!
//! [`StreamBufferManager`] smooths a bursty producer of text fragments into a
//! steady consumer cadence:
//!
//! 1. **Pre-buffer**: the first `pre_buffer_size` fragments are held, then
//!    flushed together.
//! 2. **Throttle**: afterwards, queued fragments are forwarded at most once per
//!    `throttle_interval`; early arrivals schedule one deferred flush.
//! 3. **Backpressure merge**: when the pending queue grows past
//!    `merge_threshold` (and again at `max_queue_size`), the oldest half is
//!    coalesced into a single fragment.
//!
//! One manager serves one message. Handlers run after the internal lock is
//! released, so they may call back into the manager. Delivery is serialized
//! per stream: events reach the handlers in the order they were produced, even
//! when a deferred flush fires on another thread while a producer is pushing.

use crate::scheduler::{Scheduler, TimerHandle};
use crate::types::{Metadata, StreamFragment, StreamState};
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Tuning knobs for one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Fragments held back before the first emission
    #[serde(default = "default_pre_buffer_size")]
    pub pre_buffer_size: usize,

    /// Minimum spacing between emissions, in milliseconds
    #[serde(default = "default_throttle_interval_ms")]
    pub throttle_interval_ms: u64,

    /// Pending queue length above which the oldest half is merged
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: usize,

    /// Hard ceiling on the pending queue length
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl StreamConfig {
    /// Throttle interval as a `Duration`
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    /// Check the backpressure limits
    ///
    /// The pending queue only stays below `max_queue_size` when merging can
    /// shrink it, so the ceiling must sit above a threshold of at least two.
    pub fn validate(&self) -> Result<()> {
        if self.merge_threshold < 2 {
            return Err(Error::config("merge_threshold must be at least 2"));
        }
        if self.max_queue_size <= self.merge_threshold {
            return Err(Error::config(format!(
                "max_queue_size ({}) must exceed merge_threshold ({})",
                self.max_queue_size, self.merge_threshold
            )));
        }
        Ok(())
    }

    /// Forward every fragment immediately (no pre-buffer, no throttle)
    pub fn passthrough() -> Self {
        Self {
            pre_buffer_size: 0,
            throttle_interval_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pre_buffer_size: default_pre_buffer_size(),
            throttle_interval_ms: default_throttle_interval_ms(),
            merge_threshold: default_merge_threshold(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

fn default_pre_buffer_size() -> usize {
    3
}

fn default_throttle_interval_ms() -> u64 {
    100
}

fn default_merge_threshold() -> usize {
    10
}

fn default_max_queue_size() -> usize {
    20
}

pub type FragmentHandler = Arc<dyn Fn(&StreamFragment) + Send + Sync>;
pub type CompleteHandler = Arc<dyn Fn(&str) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;
pub type StateChangeHandler = Arc<dyn Fn(StreamState, StreamState) + Send + Sync>;

/// Callbacks fired by a stream
#[derive(Clone, Default)]
pub struct StreamHandlers {
    on_fragment: Option<FragmentHandler>,
    on_complete: Option<CompleteHandler>,
    on_error: Option<ErrorHandler>,
    on_state_change: Option<StateChangeHandler>,
}

impl StreamHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for every forwarded fragment, in sequence order
    pub fn on_fragment(mut self, f: impl Fn(&StreamFragment) + Send + Sync + 'static) -> Self {
        self.on_fragment = Some(Arc::new(f));
        self
    }

    /// Called once with the full accumulated content
    pub fn on_complete(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    /// Called once when the producer reports an error
    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called with `(from, to)` on every state transition
    pub fn on_state_change(
        mut self,
        f: impl Fn(StreamState, StreamState) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for StreamHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandlers")
            .field("on_fragment", &self.on_fragment.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}

/// Side effects collected under the lock and dispatched after it is released
enum StreamEvent {
    Fragment(StreamFragment),
    StateChange(StreamState, StreamState),
    Complete(String),
    Error(Error),
}

#[derive(Debug)]
struct StreamInner {
    state: StreamState,
    /// Pushed but not yet forwarded
    queue: VecDeque<StreamFragment>,
    full_content: String,
    next_sequence: u64,
    pre_buffer_filled: bool,
    last_emit: Option<Instant>,
    timer: Option<TimerHandle>,
    /// Bumped whenever a timer is armed; stale timers compare against it
    timer_epoch: u64,
}

impl StreamInner {
    fn new() -> Self {
        Self {
            state: StreamState::Idle,
            queue: VecDeque::new(),
            full_content: String::new(),
            next_sequence: 0,
            pre_buffer_filled: false,
            last_emit: None,
            timer: None,
            timer_epoch: 0,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn transition(&mut self, to: StreamState, events: &mut Vec<StreamEvent>) {
        let from = self.state;
        self.state = to;
        events.push(StreamEvent::StateChange(from, to));
    }
}

/// Events waiting for a handler, plus the thread currently delivering them
#[derive(Default)]
struct Delivery {
    pending: VecDeque<StreamEvent>,
    owner: Option<ThreadId>,
}

struct Shared {
    id: Uuid,
    config: StreamConfig,
    handlers: StreamHandlers,
    scheduler: Arc<dyn Scheduler>,
    inner: Mutex<StreamInner>,
    delivery: Mutex<Delivery>,
    delivered: Condvar,
}

/// Releases delivery ownership, also when a handler unwinds
struct DeliveryTurn<'a> {
    shared: &'a Shared,
}

impl Drop for DeliveryTurn<'_> {
    fn drop(&mut self) {
        self.shared.delivery.lock().owner = None;
        self.shared.delivered.notify_all();
    }
}

/// Per-message streaming buffer state machine
///
/// Cloning yields another handle to the same stream.
#[derive(Clone)]
pub struct StreamBufferManager {
    shared: Arc<Shared>,
}

impl StreamBufferManager {
    /// Create an idle stream
    ///
    /// Fails with [`Error::Config`] when `config` does not pass
    /// [`StreamConfig::validate`].
    pub fn new(
        config: StreamConfig,
        handlers: StreamHandlers,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                config,
                handlers,
                scheduler,
                inner: Mutex::new(StreamInner::new()),
                delivery: Mutex::new(Delivery::default()),
                delivered: Condvar::new(),
            }),
        })
    }

    /// Unique identifier used in log fields
    pub fn stream_id(&self) -> Uuid {
        self.shared.id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.shared.config
    }

    /// `idle -> active`
    pub fn start(&self) -> bool {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != StreamState::Idle {
                warn!(stream_id = %self.shared.id, state = %inner.state, "Start ignored: stream already started");
                return false;
            }
            inner.transition(StreamState::Active, &mut events);
            self.enqueue(events);
        }
        debug!(stream_id = %self.shared.id, "Stream started");
        self.deliver();
        true
    }

    /// Append a fragment
    ///
    /// Returns `false`, without touching any state, if the stream is not
    /// active. Callers must treat that as "no longer accepting input".
    pub fn push(&self, content: impl Into<String>, metadata: Option<Metadata>) -> bool {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != StreamState::Active {
                warn!(stream_id = %self.shared.id, state = %inner.state, "Push ignored: stream is not active");
                return false;
            }

            let fragment = StreamFragment {
                content: content.into(),
                sequence: inner.next_sequence,
                arrived_at: self.shared.scheduler.now(),
                metadata,
            };
            inner.next_sequence += 1;
            inner.full_content.push_str(&fragment.content);
            inner.queue.push_back(fragment);

            self.apply_backpressure(&mut inner);

            if inner.pre_buffer_filled {
                self.throttle(&mut inner, &mut events);
            } else if inner.next_sequence as usize >= self.shared.config.pre_buffer_size {
                inner.pre_buffer_filled = true;
                debug!(stream_id = %self.shared.id, buffered = inner.queue.len(), "Pre-buffer filled");
                self.drain(&mut inner, &mut events);
            }
            self.enqueue(events);
        }
        self.deliver();
        true
    }

    /// `active -> paused`; pending fragments are kept
    pub fn pause(&self) -> bool {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != StreamState::Active {
                warn!(stream_id = %self.shared.id, state = %inner.state, "Pause ignored: stream is not active");
                return false;
            }
            inner.cancel_timer();
            inner.transition(StreamState::Paused, &mut events);
            self.enqueue(events);
        }
        self.deliver();
        true
    }

    /// `paused -> active`; re-runs the throttle check for pending fragments
    pub fn resume(&self) -> bool {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != StreamState::Paused {
                warn!(stream_id = %self.shared.id, state = %inner.state, "Resume ignored: stream is not paused");
                return false;
            }
            inner.transition(StreamState::Active, &mut events);
            if inner.pre_buffer_filled {
                self.throttle(&mut inner, &mut events);
            }
            self.enqueue(events);
        }
        self.deliver();
        true
    }

    /// Flush everything, then `-> complete`
    ///
    /// Accepted from `active` or `paused`. Fires the fragment handler for
    /// every pending fragment, then the completion handler with the full
    /// content.
    pub fn complete(&self) -> bool {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if !inner.state.can_transition_to(StreamState::Complete) {
                warn!(stream_id = %self.shared.id, state = %inner.state, "Complete ignored: invalid state");
                return false;
            }
            inner.pre_buffer_filled = true;
            self.drain(&mut inner, &mut events);
            inner.transition(StreamState::Complete, &mut events);
            events.push(StreamEvent::Complete(inner.full_content.clone()));
            self.enqueue(events);
        }
        debug!(stream_id = %self.shared.id, "Stream complete");
        self.deliver();
        true
    }

    /// Terminate with an error
    ///
    /// Idempotent once the stream is terminal. Pending fragments are dropped,
    /// the accumulated content is kept. There is no retry.
    pub fn error(&self, err: Error) -> bool {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_terminal() {
                debug!(stream_id = %self.shared.id, state = %inner.state, "Error ignored: stream already terminated");
                return false;
            }
            inner.cancel_timer();
            inner.queue.clear();
            inner.transition(StreamState::Error, &mut events);
            events.push(StreamEvent::Error(err));
            self.enqueue(events);
        }
        self.deliver();
        true
    }

    /// Drop all content and return to `idle` so the instance can be reused
    pub fn reset(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            inner.cancel_timer();
            let from = inner.state;
            let epoch = inner.timer_epoch;
            *inner = StreamInner::new();
            inner.timer_epoch = epoch + 1;
            if from != StreamState::Idle {
                events.push(StreamEvent::StateChange(from, StreamState::Idle));
            }
            self.enqueue(events);
        }
        self.deliver();
    }

    pub fn state(&self) -> StreamState {
        self.shared.inner.lock().state
    }

    /// Concatenation of every accepted push, regardless of merging
    pub fn full_content(&self) -> String {
        self.shared.inner.lock().full_content.clone()
    }

    /// Fragments pushed but not yet forwarded
    pub fn queue_size(&self) -> usize {
        self.shared.inner.lock().queue.len()
    }

    /// Sequence number the next push will receive
    pub fn next_sequence(&self) -> u64 {
        self.shared.inner.lock().next_sequence
    }

    /// Forward now if the interval has elapsed, otherwise arm one deferred flush
    fn throttle(&self, inner: &mut StreamInner, events: &mut Vec<StreamEvent>) {
        if inner.queue.is_empty() {
            return;
        }

        let interval = self.shared.config.throttle_interval();
        let now = self.shared.scheduler.now();
        let elapsed = inner
            .last_emit
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(interval);

        if elapsed >= interval {
            self.drain(inner, events);
        } else if inner.timer.is_none() {
            inner.timer_epoch += 1;
            inner.timer = Some(self.schedule_flush(interval - elapsed, inner.timer_epoch));
        }
    }

    fn schedule_flush(&self, delay: Duration, epoch: u64) -> TimerHandle {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        self.shared.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    StreamBufferManager { shared }.deferred_flush(epoch);
                }
            }),
        )
    }

    fn deferred_flush(&self, epoch: u64) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.timer_epoch != epoch {
                return;
            }
            inner.timer = None;
            if inner.state != StreamState::Active {
                return;
            }
            self.drain(&mut inner, &mut events);
            self.enqueue(events);
        }
        self.deliver();
    }

    /// Move every pending fragment into `events`
    fn drain(&self, inner: &mut StreamInner, events: &mut Vec<StreamEvent>) {
        inner.cancel_timer();
        if inner.queue.is_empty() {
            return;
        }
        events.extend(inner.queue.drain(..).map(StreamEvent::Fragment));
        inner.last_emit = Some(self.shared.scheduler.now());
    }

    fn apply_backpressure(&self, inner: &mut StreamInner) {
        let config = &self.shared.config;

        if inner.queue.len() > config.merge_threshold {
            self.merge_oldest_half(inner);
        }
        while inner.queue.len() >= config.max_queue_size && inner.queue.len() >= 2 {
            self.merge_oldest_half(inner);
        }
    }

    /// Coalesce the oldest half of the pending queue into one fragment
    fn merge_oldest_half(&self, inner: &mut StreamInner) {
        let len = inner.queue.len();
        let take = (len / 2).max(2).min(len);
        if take < 2 {
            return;
        }

        let constituents: Vec<StreamFragment> = inner.queue.drain(..take).collect();
        let count: usize = constituents.iter().map(|f| f.merged_count()).sum();
        let first = &constituents[0];

        let mut metadata = Metadata::new();
        metadata.insert("merged".to_string(), true.into());
        metadata.insert("count".to_string(), count.into());

        let merged = StreamFragment {
            content: constituents.iter().map(|f| f.content.as_str()).collect(),
            sequence: first.sequence,
            arrived_at: first.arrived_at,
            metadata: Some(metadata),
        };

        debug!(
            stream_id = %self.shared.id,
            merged = take,
            remaining = inner.queue.len() + 1,
            "Backpressure merge"
        );
        metrics::counter!("rendermux_stream_merges_total").increment(1);

        inner.queue.push_front(merged);
    }

    /// Queue events for delivery; called with the state lock held so the
    /// queue order matches the order the events were produced in
    fn enqueue(&self, events: Vec<StreamEvent>) {
        if events.is_empty() {
            return;
        }
        self.shared.delivery.lock().pending.extend(events);
    }

    /// Run handlers for every queued event, one thread at a time
    ///
    /// A call from inside a handler returns immediately; the delivering frame
    /// picks up whatever it queued. Other threads wait until the current owner
    /// has drained the queue, so a call returns only after its own events have
    /// been handled.
    fn deliver(&self) {
        let me = thread::current().id();
        {
            let mut delivery = self.shared.delivery.lock();
            loop {
                let owner = delivery.owner;
                match owner {
                    None => break,
                    Some(owner) if owner == me => return,
                    Some(_) => self.shared.delivered.wait(&mut delivery),
                }
            }
            delivery.owner = Some(me);
        }

        let _turn = DeliveryTurn {
            shared: &self.shared,
        };
        loop {
            let next = self.shared.delivery.lock().pending.pop_front();
            match next {
                Some(event) => self.handle(event),
                None => break,
            }
        }
    }

    fn handle(&self, event: StreamEvent) {
        let handlers = &self.shared.handlers;
        match event {
            StreamEvent::Fragment(fragment) => {
                if let Some(f) = &handlers.on_fragment {
                    f(&fragment);
                }
            }
            StreamEvent::StateChange(from, to) => {
                if let Some(f) = &handlers.on_state_change {
                    f(from, to);
                }
            }
            StreamEvent::Complete(content) => {
                if let Some(f) = &handlers.on_complete {
                    f(&content);
                }
            }
            StreamEvent::Error(err) => {
                warn!(stream_id = %self.shared.id, error = %err, "Stream terminated with error");
                if let Some(f) = &handlers.on_error {
                    f(&err);
                }
            }
        }
    }
}

impl std::fmt::Debug for StreamBufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBufferManager")
            .field("id", &self.shared.id)
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish()
    }
}
