//! Dynamic values and failure objects passed through intercepted calls
//!
//! Arguments, return values and property values are JSON-shaped
//! [`Value`]s. Failures raised by managed methods or advice bodies are
//! [`Failure`] handles: cloning one shares the same underlying object, so
//! a failure handed to `Throw` advice can be compared by identity with the
//! one that reaches the caller.

use std::fmt;
use std::sync::Arc;

/// Dynamic value exchanged with managed objects and advice
pub type Value = serde_json::Value;

#[derive(Debug)]
struct FailureInner {
    kind: String,
    message: String,
    detail: Option<Value>,
}

/// Failure raised by a managed method or an advice body
#[derive(Clone)]
pub struct Failure {
    inner: Arc<FailureInner>,
}

impl Failure {
    /// Create a failure with a kind tag and a message
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(FailureInner {
                kind: kind.into(),
                message: message.into(),
                detail: None,
            }),
        }
    }

    /// Create a failure carrying an extra value
    pub fn with_detail(kind: impl Into<String>, message: impl Into<String>, detail: Value) -> Self {
        Self {
            inner: Arc::new(FailureInner {
                kind: kind.into(),
                message: message.into(),
                detail: Some(detail),
            }),
        }
    }

    /// Kind tag (e.g. `"checkout"`, `"io"`)
    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    /// Human readable message
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Optional attached value
    pub fn detail(&self) -> Option<&Value> {
        self.inner.detail.as_ref()
    }

    /// Whether both handles point at the same failure object
    pub fn same(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Failure {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
            || (self.inner.kind == other.inner.kind
                && self.inner.message == other.inner.message
                && self.inner.detail == other.inner.detail)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.inner.kind)
            .field("message", &self.inner.message)
            .field("detail", &self.inner.detail)
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.inner.kind, self.inner.message)
    }
}

impl std::error::Error for Failure {}
