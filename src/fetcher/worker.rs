use crate::fetcher::{wait_settled, Fetcher, FetcherId};
use crate::net::HttpTransport;
use crate::request::RequestDescriptor;
use crate::state::RequestState;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Commands that can be sent to a fetch worker
#[derive(Debug)]
pub enum FetchCommand {
    /// Fetch this descriptor (a no-op when it equals the current one). The
    /// state right after applying it is sent back on `reply`.
    Request {
        descriptor: RequestDescriptor,
        reply: oneshot::Sender<RequestState>,
    },
    /// Detach the fetcher and stop the worker
    Detach,
}

/// Cloneable handle to a running [`FetchWorker`].
///
/// The worker lives as long as at least one handle exists (or until
/// [`FetchHandle::detach`]). Dropping the last handle detaches the fetcher.
#[derive(Clone)]
pub struct FetchHandle {
    id: FetcherId,
    cmd_tx: mpsc::Sender<FetchCommand>,
    state_rx: watch::Receiver<RequestState>,
}

impl FetchHandle {
    pub fn id(&self) -> FetcherId {
        self.id
    }

    /// Hand a descriptor to the worker and wait until it has been applied.
    pub async fn request(&self, descriptor: RequestDescriptor) -> anyhow::Result<RequestState> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(FetchCommand::Request { descriptor, reply })
            .await
            .map_err(|_| anyhow::anyhow!("fetch worker {} has stopped", self.id))?;

        Ok(rx.await?)
    }

    /// Ask the worker to detach its fetcher and exit.
    pub async fn detach(&self) -> anyhow::Result<()> {
        self.cmd_tx
            .send(FetchCommand::Detach)
            .await
            .map_err(|_| anyhow::anyhow!("fetch worker {} has stopped", self.id))?;
        Ok(())
    }

    pub fn state(&self) -> RequestState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.state_rx.clone()
    }

    /// Waits until the state is `Succeeded` or `Failed`.
    pub async fn settled(&self) -> RequestState {
        wait_settled(self.subscribe()).await
    }
}

/// Task that owns a [`Fetcher`] and applies commands to it.
pub struct FetchWorker<T: HttpTransport> {
    fetcher: Fetcher<T>,
    cmd_rx: mpsc::Receiver<FetchCommand>,
}

impl<T: HttpTransport> FetchWorker<T> {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(fetcher: Fetcher<T>) -> (FetchHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(fetcher.config().channel_capacity);

        let handle = FetchHandle {
            id: fetcher.id(),
            cmd_tx,
            state_rx: fetcher.subscribe(),
        };

        let worker = Self { fetcher, cmd_rx };
        let join_handle = tokio::spawn(worker.run());

        (handle, join_handle)
    }

    /// Drives `fetcher` from a stream of descriptors: every new value is fetched,
    /// values with an unchanged key are no-ops. The fetcher is detached once the
    /// sending side of `inputs` is gone.
    pub fn watch_inputs(
        fetcher: Fetcher<T>,
        mut inputs: watch::Receiver<RequestDescriptor>,
    ) -> (watch::Receiver<RequestState>, JoinHandle<()>) {
        let state_rx = fetcher.subscribe();

        let join_handle = tokio::spawn(async move {
            let mut fetcher = fetcher;
            loop {
                let descriptor = inputs.borrow_and_update().clone();
                fetcher.fetch_descriptor(descriptor);

                if inputs.changed().await.is_err() {
                    break;
                }
            }

            log::debug!("Inputs of fetcher {} closed", fetcher.id());
            fetcher.detach();
        });

        (state_rx, join_handle)
    }

    /// Main worker loop
    async fn run(mut self) {
        let id = self.fetcher.id();
        log::debug!("Worker started for fetcher {}", id);

        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                FetchCommand::Request { descriptor, reply } => {
                    let state = self.fetcher.fetch_descriptor(descriptor);
                    // The caller may have given up waiting
                    let _ = reply.send(state);
                }
                FetchCommand::Detach => {
                    self.fetcher.detach();
                    break;
                }
            }
        }

        // Dropping the fetcher detaches it when the channel closed
        log::debug!("Worker for fetcher {} exiting", id);
    }
}
