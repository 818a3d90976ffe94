//! Declarative description of one endpoint.

use reqwest::Method;
use std::collections::BTreeMap;

use crate::codec::KeyDecoding;
use crate::task::Task;

/// An immutable, declarative description of one request: where it goes, what
/// it carries, and how its response is decoded.
///
/// Targets are plain values, freely clonable and without shared mutable
/// state, so one description can be dispatched, retried, logged, or replayed against
/// a [`MockTransport`](crate::MockTransport) without change.
///
/// ```
/// use courier::{Target, Task};
/// use reqwest::Method;
///
/// let target = Target::builder("https://api.example.com", "/users/42")
///     .method(Method::DELETE)
///     .header("Accept", "application/json")
///     .build();
/// assert_eq!(target.path(), "/users/42");
/// assert_eq!(target.method(), &Method::DELETE);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    base_url: String,
    path: String,
    method: Method,
    headers: BTreeMap<String, String>,
    task: Task,
    key_decoding: KeyDecoding,
}

impl Target {
    /// Starts building a target for `path` under `base_url`.
    ///
    /// Defaults: `GET`, no headers, [`Task::Plain`], exact key decoding.
    #[must_use]
    pub fn builder(base_url: impl Into<String>, path: impl Into<String>) -> TargetBuilder {
        TargetBuilder {
            base_url: base_url.into(),
            path: path.into(),
            method: Method::GET,
            headers: BTreeMap::new(),
            task: Task::Plain,
            key_decoding: KeyDecoding::Exact,
        }
    }

    /// The base URL the path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The endpoint path, appended to the base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The request headers. Insertion order is irrelevant; names are
    /// normalized to lowercase when the request is built.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// The body/parameter encoding strategy.
    #[must_use]
    pub const fn task(&self) -> &Task {
        &self.task
    }

    /// How response keys are treated during typed decoding.
    #[must_use]
    pub const fn key_decoding(&self) -> KeyDecoding {
        self.key_decoding
    }
}

/// Builder for [`Target`] values.
#[derive(Clone, Debug)]
pub struct TargetBuilder {
    base_url: String,
    path: String,
    method: Method,
    headers: BTreeMap<String, String>,
    task: Task,
    key_decoding: KeyDecoding,
}

impl TargetBuilder {
    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a request header. A repeated name replaces the earlier value.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the body/parameter encoding strategy.
    #[must_use]
    pub fn task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    /// Sets the response key-decoding strategy.
    #[must_use]
    pub fn key_decoding(mut self, key_decoding: KeyDecoding) -> Self {
        self.key_decoding = key_decoding;
        self
    }

    /// Finalizes the target.
    #[must_use]
    pub fn build(self) -> Target {
        Target {
            base_url: self.base_url,
            path: self.path,
            method: self.method,
            headers: self.headers,
            task: self.task,
            key_decoding: self.key_decoding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_defaults() {
        let target = Target::builder("https://api.example.com", "/users").build();
        assert_eq!(target.method(), &Method::GET);
        assert!(target.headers().is_empty());
        assert_eq!(target.task(), &Task::Plain);
        assert_eq!(target.key_decoding(), KeyDecoding::Exact);
    }

    #[test]
    fn builder_sets_all_fields() {
        let target = Target::builder("https://api.example.com", "/users")
            .method(Method::POST)
            .header("Accept", "application/json")
            .task(Task::Json(json!({"name": "ada"})))
            .key_decoding(KeyDecoding::ConvertCamelCase)
            .build();
        assert_eq!(target.method(), &Method::POST);
        assert_eq!(
            target.headers().get("Accept").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(target.key_decoding(), KeyDecoding::ConvertCamelCase);
    }

    #[test]
    fn repeated_header_replaces_value() {
        let target = Target::builder("https://api.example.com", "/users")
            .header("Accept", "text/plain")
            .header("Accept", "application/json")
            .build();
        assert_eq!(target.headers().len(), 1);
        assert_eq!(
            target.headers().get("Accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn targets_are_value_types() {
        let target = Target::builder("https://api.example.com", "/users").build();
        let copy = target.clone();
        assert_eq!(target, copy);
    }
}
