use crate::errors::FetchError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Lifecycle status of the request owned by a [`Fetcher`](crate::fetcher::Fetcher).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    /// Nothing has been requested yet.
    #[default]
    Idle,

    /// The transport call (or body read) of the active operation is in flight.
    Loading,

    /// The response was received with a success status and its body parsed.
    Succeeded,

    /// The transport rejected, the status was not successful, or the body did not parse.
    Failed,
}

/// Observable state of a fetch: a loading flag, an optional error and optional data.
///
/// Exactly one of `data` and `error` is present when the status is `Succeeded`
/// or `Failed`; neither is present otherwise. The constructors are the only
/// way to build a state, so this always holds.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct RequestState {
    status: RequestStatus,
    data: Option<Value>,
    error: Option<FetchError>,
}

impl RequestState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn loading() -> Self {
        Self {
            status: RequestStatus::Loading,
            data: None,
            error: None,
        }
    }

    pub fn succeeded(data: Value) -> Self {
        Self {
            status: RequestStatus::Succeeded,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: FetchError) -> Self {
        Self {
            status: RequestStatus::Failed,
            data: None,
            error: Some(error),
        }
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == RequestStatus::Loading
    }

    /// True once the operation reached `Succeeded` or `Failed`.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, RequestStatus::Succeeded | RequestStatus::Failed)
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    /// Deserializes the data into `T`. Returns `None` when there is no data.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<Result<T, FetchError>> {
        self.data
            .as_ref()
            .map(|v| T::deserialize(v).map_err(FetchError::from))
    }
}
