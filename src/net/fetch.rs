use crate::config::TransportConfig;
use crate::errors::TransportError;
use crate::net::{prepare, HttpTransport, Response, ResponseBody};
use crate::request::RequestDescriptor;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Production transport on top of `reqwest`.
///
/// Both the request and the body read are raced against the cancellation
/// token. Dropping the losing reqwest future closes the connection, so an
/// aborted call stops using the network right away.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the default [`TransportConfig`].
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(&TransportConfig::default())
    }

    pub fn with_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder.build()?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn perform(
        &self,
        request: &RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        let (url, method) = prepare(request)?;

        log::debug!("Executing {} {}", method, url);

        let mut req = self.client.request(method, url);
        for (name, value) in request.options.headers() {
            req = req.header(name, value);
        }
        if let Some(body) = request.options.body_str() {
            req = req.body(body.to_string());
        }
        if let Some(timeout) = request.options.timeout_value() {
            req = req.timeout(timeout);
        }

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::trace!("Request to {} aborted before the response arrived", request.url);
                return Err(TransportError::Aborted);
            }
            res = req.send() => res.map_err(|e| {
                log::warn!("HTTP request to {} failed: {}", request.url, e);
                TransportError::from(e)
            })?,
        };

        let final_url = res.url().clone();
        let status = res.status().as_u16();
        let status_text = res
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();
        let headers = res.headers().clone();

        // Fetch body lazily. We don't do streaming yet
        let body = ResponseBody::new(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransportError::Aborted),
                bytes = res.bytes() => bytes.map(|b| b.to_vec()).map_err(TransportError::from),
            }
        });

        Ok(Response {
            url: final_url,
            status,
            status_text,
            headers,
            body,
        })
    }
}
