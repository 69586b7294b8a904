use crate::errors::{FetchError, TransportError};
use crate::fetcher::{FetcherId, StateSlot};
use crate::net::HttpTransport;
use crate::request::RequestDescriptor;
use crate::state::RequestState;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Why an operation stopped before producing data.
#[derive(Debug)]
enum Interrupt {
    /// Aborted or superseded; nothing may be reported
    Canceled,
    /// A real failure that belongs in the state
    Failed(FetchError),
}

impl From<TransportError> for Interrupt {
    fn from(e: TransportError) -> Self {
        if e.is_abort() {
            Interrupt::Canceled
        } else {
            Interrupt::Failed(e.into())
        }
    }
}

impl From<FetchError> for Interrupt {
    fn from(e: FetchError) -> Self {
        Interrupt::Failed(e)
    }
}

/// One run of the request for a single descriptor.
pub(crate) struct Operation<T: HttpTransport> {
    fetcher_id: FetcherId,
    generation: u64,
    descriptor: RequestDescriptor,
    transport: Arc<T>,
    cancel: CancellationToken,
    slot: StateSlot,
}

impl<T: HttpTransport> Operation<T> {
    pub(crate) fn new(
        fetcher_id: FetcherId,
        generation: u64,
        descriptor: RequestDescriptor,
        transport: Arc<T>,
        cancel: CancellationToken,
        slot: StateSlot,
    ) -> Self {
        Self {
            fetcher_id,
            generation,
            descriptor,
            transport,
            cancel,
            slot,
        }
    }

    /// Runs the request and commits the outcome, unless the operation was
    /// cancelled or superseded along the way.
    pub(crate) async fn run(self) {
        let state = match self.execute().await {
            Ok(data) => RequestState::succeeded(data),
            Err(Interrupt::Failed(e)) => RequestState::failed(e),
            Err(Interrupt::Canceled) => {
                log::debug!(
                    "Fetcher {}: fetch aborted (operation {}, {})",
                    self.fetcher_id,
                    self.generation,
                    self.descriptor.url
                );
                return;
            }
        };

        let failed = state.error().map(ToString::to_string);
        if !self.slot.commit(self.generation, state) {
            log::debug!(
                "Fetcher {}: discarding stale result of operation {}",
                self.fetcher_id,
                self.generation
            );
            return;
        }

        match failed {
            Some(e) => log::warn!(
                "Fetcher {}: {} failed: {}",
                self.fetcher_id,
                self.descriptor.route(),
                e
            ),
            None => log::info!(
                "Fetcher {}: {} succeeded",
                self.fetcher_id,
                self.descriptor.route()
            ),
        }
    }

    async fn execute(&self) -> Result<Value, Interrupt> {
        // Superseded before the task was first polled: never touch the network
        self.ensure_current()?;

        let response = self
            .transport
            .perform(&self.descriptor, self.cancel.child_token())
            .await?;
        self.ensure_current()?;

        log::debug!(
            "Fetcher {}: {} answered {} {}",
            self.fetcher_id,
            response.url,
            response.status,
            response.status_text
        );

        if !response.is_success() {
            return Err(FetchError::HttpStatus {
                status: response.status,
                status_text: response.status_text,
            }
            .into());
        }

        let bytes = response.body.read().await?;
        self.ensure_current()?;

        let data: Value = serde_json::from_slice(&bytes).map_err(FetchError::from)?;
        Ok(data)
    }

    /// Checks that this operation may still write the state.
    fn ensure_current(&self) -> Result<(), Interrupt> {
        if self.cancel.is_cancelled() || !self.slot.is_current(self.generation) {
            return Err(Interrupt::Canceled);
        }
        Ok(())
    }
}
