//! The request-lifecycle state machine.
//!
//! A [`Fetcher`] owns one logical fetch. Every time it receives a descriptor
//! whose [`RequestKey`] differs from the current one it supersedes the running
//! operation (cancelling its token) and starts a new one. Each operation gets a
//! generation number, and only the operation whose generation is active may
//! write the shared [`RequestState`]. That check happens under the same lock as
//! the write, so a superseded operation can never overwrite a later one.

mod operation;
mod worker;

pub use worker::{FetchCommand, FetchHandle, FetchWorker};

use crate::config::FetchConfig;
use crate::net::HttpTransport;
use crate::request::{RequestDescriptor, RequestKey, RequestOptions};
use crate::state::RequestState;
use operation::Operation;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Generation value that no operation ever holds.
const NO_GENERATION: u64 = 0;

/// A unique identifier for a [`Fetcher`], used to tell fetchers apart in logs.
///
/// Treat it as an opaque handle; the [`Uuid`] inside is an implementation detail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetcherId(Uuid);

impl FetcherId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FetcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FetcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared state cell plus the generation allowed to write it.
///
/// The generation is only changed and checked from inside the watch channel's
/// modify closures, which run under the channel lock.
#[derive(Clone)]
pub(crate) struct StateSlot {
    tx: Arc<watch::Sender<RequestState>>,
    active: Arc<AtomicU64>,
}

impl StateSlot {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(RequestState::idle());
        Self {
            tx: Arc::new(tx),
            active: Arc::new(AtomicU64::new(NO_GENERATION)),
        }
    }

    /// Hands the state to `generation` and publishes `state` in one step.
    fn activate(&self, generation: u64, state: RequestState) {
        self.tx.send_modify(|current| {
            self.active.store(generation, Ordering::SeqCst);
            *current = state;
        });
    }

    /// Revokes write access from every operation without touching the state.
    fn fence(&self) {
        self.tx.send_if_modified(|_| {
            self.active.store(NO_GENERATION, Ordering::SeqCst);
            false
        });
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) == generation
    }

    /// Writes `state` if `generation` is still active. Returns whether it was written.
    pub(crate) fn commit(&self, generation: u64, state: RequestState) -> bool {
        self.tx.send_if_modified(|current| {
            if self.active.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = state;
            true
        })
    }

    fn snapshot(&self) -> RequestState {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.tx.subscribe()
    }
}

/// The operation currently allowed to write the state.
struct InflightFetch {
    generation: u64,
    cancel: CancellationToken,
    join_handle: JoinHandle<()>,
}

/// Stateful, cancellable fetch of one resource at a time.
///
/// Call [`Fetcher::fetch`] whenever the inputs may have changed: unchanged
/// inputs are a no-op, changed inputs restart the request. Read the result
/// through [`Fetcher::state`] or [`Fetcher::subscribe`]. Dropping the fetcher
/// detaches it.
pub struct Fetcher<T: HttpTransport> {
    id: FetcherId,
    config: FetchConfig,
    transport: Arc<T>,
    slot: StateSlot,
    /// Last generation handed out
    generation: u64,
    /// Key of the descriptor the current state belongs to
    key: Option<RequestKey>,
    current: Option<InflightFetch>,
    detached: bool,
}

impl<T: HttpTransport> Fetcher<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_config(transport, FetchConfig::default())
    }

    pub fn with_config(transport: Arc<T>, config: FetchConfig) -> Self {
        Self {
            id: FetcherId::new(),
            config,
            transport,
            slot: StateSlot::new(),
            generation: NO_GENERATION,
            key: None,
            current: None,
            detached: false,
        }
    }

    pub fn id(&self) -> FetcherId {
        self.id
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch `url` with `options`, restarting only if they differ from the last call.
    ///
    /// Returns the state right after the call: a fresh `Loading` state when a new
    /// operation started, the current state otherwise.
    ///
    /// # Panics
    /// Panics when a new operation must start outside a tokio runtime.
    pub fn fetch(&mut self, url: impl Into<String>, options: RequestOptions) -> RequestState {
        self.fetch_descriptor(RequestDescriptor::new(url, options))
    }

    /// Same as [`Fetcher::fetch`] with a prebuilt descriptor.
    pub fn fetch_descriptor(&mut self, descriptor: RequestDescriptor) -> RequestState {
        if self.detached {
            log::warn!(
                "Fetcher {} is detached, ignoring request for {}",
                self.id,
                descriptor.url
            );
            return self.state();
        }

        let key = descriptor.key();
        if self.key.as_ref() == Some(&key) {
            log::trace!("Fetcher {}: inputs unchanged for {}", self.id, descriptor.url);
            return self.state();
        }

        // The old operation loses its token before the new one exists
        self.cancel_current("superseded");

        self.generation += 1;
        let generation = self.generation;
        self.slot.activate(generation, RequestState::loading());

        log::debug!(
            "Fetcher {} starting operation {}: {}",
            self.id,
            generation,
            descriptor.route()
        );

        let cancel = CancellationToken::new();
        let operation = Operation::new(
            self.id,
            generation,
            descriptor,
            self.transport.clone(),
            cancel.clone(),
            self.slot.clone(),
        );
        let join_handle = tokio::spawn(operation.run());

        self.current = Some(InflightFetch {
            generation,
            cancel,
            join_handle,
        });
        self.key = Some(key);

        RequestState::loading()
    }

    /// Current state snapshot.
    pub fn state(&self) -> RequestState {
        self.slot.snapshot()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.slot.subscribe()
    }

    /// Waits until the state is `Succeeded` or `Failed` and returns it.
    ///
    /// An idle fetcher never settles, and after [`Fetcher::detach`] a `Loading`
    /// state stays `Loading`; only await this after starting a fetch.
    pub async fn settled(&self) -> RequestState {
        wait_settled(self.subscribe()).await
    }

    /// Detach the consumer: abort the running operation and refuse all further
    /// state writes. Calling it again is a no-op.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        self.cancel_current("detached");
        self.slot.fence();
        self.key = None;

        log::debug!("Fetcher {} detached", self.id);
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    fn cancel_current(&mut self, reason: &str) {
        // Taking the record out means a token is cancelled at most once
        let Some(inflight) = self.current.take() else {
            return;
        };

        if inflight.join_handle.is_finished() {
            log::trace!(
                "Fetcher {}: operation {} already finished",
                self.id,
                inflight.generation
            );
        } else {
            log::debug!(
                "Fetcher {}: aborting operation {} ({})",
                self.id,
                inflight.generation,
                reason
            );
        }
        inflight.cancel.cancel();
    }
}

impl<T: HttpTransport> Drop for Fetcher<T> {
    fn drop(&mut self) {
        self.detach();
    }
}

pub(crate) async fn wait_settled(mut rx: watch::Receiver<RequestState>) -> RequestState {
    let settled = rx
        .wait_for(RequestState::is_settled)
        .await
        .map(|state| state.clone());

    match settled {
        Ok(state) => state,
        // The sender lives as long as the fetcher, so this only happens on teardown
        Err(_) => rx.borrow().clone(),
    }
}
