//! Cancellable, state-tracking HTTP fetches.
//!
//! A [`Fetcher`] takes a URL plus [`RequestOptions`], performs the request
//! through an [`HttpTransport`], and exposes the result as a [`RequestState`]
//! (loading flag, error, parsed JSON data). Giving it different inputs
//! supersedes and aborts the running request. Only the newest request can ever
//! change the state, regardless of the order in which responses arrive.
//!
//! ```no_run
//! use fetch_lite::{Fetcher, ReqwestTransport, RequestOptions};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut fetcher = Fetcher::new(Arc::new(ReqwestTransport::new()?));
//! fetcher.fetch("https://jsonplaceholder.typicode.com/posts/1", RequestOptions::new());
//!
//! let state = fetcher.settled().await;
//! if let Some(post) = state.data() {
//!     println!("{}", post["title"]);
//! }
//! # Ok(()) }
//! ```

pub mod config;
pub mod errors;
pub mod fetcher;
pub mod net;
pub mod request;
pub mod state;

pub use config::{FetchConfig, TransportConfig};
pub use errors::{ConfigError, FetchError, TransportError};
pub use fetcher::{FetchCommand, FetchHandle, FetchWorker, Fetcher, FetcherId};
pub use net::{HttpTransport, MockResponse, MockTransport, ReqwestTransport, Response, ResponseBody};
pub use request::{RequestDescriptor, RequestKey, RequestOptions};
pub use state::{RequestState, RequestStatus};
