//! HTTP transport seam.
//!
//! The fetcher never speaks HTTP itself. It hands a [`RequestDescriptor`] and a
//! cancellation token to an [`HttpTransport`] and gets back either a [`Response`]
//! whose body still has to be read, or a [`TransportError`]. A cancelled token
//! must make the transport stop its work and reject with [`TransportError::Aborted`].

mod fetch;
mod mock;
mod response;

pub use fetch::ReqwestTransport;
pub use mock::{MockCall, MockResponse, MockTransport};
pub use response::{Response, ResponseBody};

use crate::errors::TransportError;
use crate::request::RequestDescriptor;
use async_trait::async_trait;
use http::Method;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Performs HTTP requests on behalf of a [`Fetcher`](crate::fetcher::Fetcher).
///
/// Implementations must honor `cancel` both while waiting for the response head
/// and while the returned [`ResponseBody`] is being read.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn perform(
        &self,
        request: &RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError>;
}

/// Validates the parts of a descriptor every transport needs: the URL, the
/// method, and that bodyless methods carry no body.
pub(crate) fn prepare(request: &RequestDescriptor) -> Result<(Url, Method), TransportError> {
    let url = Url::parse(&request.url).map_err(|e| {
        TransportError::InvalidRequest(format!("cannot parse url '{}': {}", request.url, e))
    })?;

    let method_name = request.options.effective_method();
    let method = Method::from_bytes(method_name.as_bytes()).map_err(|e| {
        TransportError::InvalidRequest(format!("invalid method '{}': {}", method_name, e))
    })?;

    if request.options.body_str().is_some() && (method == Method::GET || method == Method::HEAD) {
        return Err(TransportError::InvalidRequest(format!(
            "{} request cannot have a body",
            method
        )));
    }

    Ok((url, method))
}
