//! Request descriptors.
//!
//! A [`RequestDescriptor`] pairs a resource URL with its [`RequestOptions`]. The
//! fetcher decides whether its input changed by comparing [`RequestKey`]s: the
//! URL plus the serialized JSON form of the options. Two descriptors that
//! serialize the same are the same request, even if they were built separately.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Method used when the options do not name one
pub const DEFAULT_METHOD: &str = "GET";

/// Options for a single request: method, headers, body and transport-level settings.
///
/// Header names are case-insensitive. They are stored lowercased so that two
/// option sets differing only in header-name case produce the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP method. Names are uppercased (`"post"` becomes `"POST"`).
    pub fn method(mut self, method: impl AsRef<str>) -> Self {
        self.method = Some(method.as_ref().to_ascii_uppercase());
        self
    }

    /// Adds a header, replacing any previous value for the same (case-insensitive) name.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Adds an `authorization: Bearer <token>` header.
    pub fn bearer_auth(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header("authorization", value)
    }

    /// Sets a raw, already serialized body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets `content-type: application/json`.
    pub fn json_body<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(value)?;
        Ok(self.header("content-type", "application/json").body(body))
    }

    /// Per-request timeout, overriding the transport default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The effective method, `GET` when none was set.
    pub fn effective_method(&self) -> &str {
        self.method.as_deref().unwrap_or(DEFAULT_METHOD)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Looks up a header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn timeout_value(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Structural identity of a request: URL plus serialized options.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    url: String,
    options: String,
}

/// Immutable description of one logical fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub url: String,
    #[serde(default)]
    pub options: RequestOptions,
}

impl RequestDescriptor {
    pub fn new(url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }

    /// A descriptor for a plain `GET` of `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, RequestOptions::default())
    }

    pub fn key(&self) -> RequestKey {
        // Plain strings and maps always serialize; the debug form is only a fallback
        let options = serde_json::to_string(&self.options)
            .unwrap_or_else(|_| format!("{:?}", self.options));

        RequestKey {
            url: self.url.clone(),
            options,
        }
    }

    /// Key used to match scripted responses: `"{METHOD} {url}"`.
    pub fn route(&self) -> String {
        format!("{} {}", self.options.effective_method(), self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_defaults_to_get_and_is_uppercased() {
        assert_eq!(RequestOptions::new().effective_method(), "GET");
        assert_eq!(RequestOptions::new().method("post").effective_method(), "POST");
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let a = RequestOptions::new().header("Content-Type", "application/json");
        let b = RequestOptions::new().header("content-type", "application/json");
        assert_eq!(a, b);
        assert_eq!(a.header_value("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn structurally_equal_descriptors_share_a_key() {
        let build = || {
            RequestDescriptor::new(
                "https://api.example.test/posts",
                RequestOptions::new()
                    .method("POST")
                    .bearer_auth("123-ABC-XYZ-789")
                    .json_body(&json!({"title": "hello", "userId": 1}))
                    .unwrap(),
            )
        };
        assert_eq!(build().key(), build().key());
    }

    #[test]
    fn any_difference_changes_the_key() {
        let base = RequestDescriptor::get("https://api.example.test/posts/1");
        let other_url = RequestDescriptor::get("https://api.example.test/posts/2");
        let other_header = RequestDescriptor::new(
            "https://api.example.test/posts/1",
            RequestOptions::new().header("accept", "application/json"),
        );

        assert_ne!(base.key(), other_url.key());
        assert_ne!(base.key(), other_header.key());
    }

    #[test]
    fn json_body_sets_content_type() {
        let opts = RequestOptions::new().json_body(&json!({"id": 1})).unwrap();
        assert_eq!(opts.header_value("content-type"), Some("application/json"));
        assert_eq!(opts.body_str(), Some(r#"{"id":1}"#));
    }

    #[test]
    fn route_combines_method_and_url() {
        let d = RequestDescriptor::new("https://x.test/a", RequestOptions::new().method("delete"));
        assert_eq!(d.route(), "DELETE https://x.test/a");
    }
}
