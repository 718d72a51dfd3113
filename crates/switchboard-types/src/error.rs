//! Error kinds surfaced to callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The stable, wire-visible error kind. Duplicate extensions inside one call
/// are *not* an error here - they are observed, logged at WARN on the
/// containing rank, and the duplicate is deactivated (see `tree` module).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteErrorKind {
    /// Called number not found, or all branches pruned.
    NoRoute,
    /// Forward-chain depth limit hit, or a forward cycle was detected.
    ForwardLoop,
    /// Dial-out disallowed for an external target.
    Forbidden,
    /// Transient failure reaching the store.
    StoreUnavailable,
    /// Cache put/get failed in a way that could not be treated as best-effort.
    CacheUnavailable,
    /// Cache miss on a late-route lookup.
    Gone,
    /// The whole stage-1 computation exceeded its per-request timeout.
    Timeout,
}

impl RouteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRoute => "NO_ROUTE",
            Self::ForwardLoop => "FORWARD_LOOP",
            Self::Forbidden => "FORBIDDEN",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::CacheUnavailable => "CACHE_UNAVAILABLE",
            Self::Gone => "GONE",
            Self::Timeout => "TIMEOUT",
        }
    }
}

/// A failed routing request: the kind plus a one-line human detail. A failed
/// phase A aborts the whole request; a failed phase B aborts without writing
/// any cache entries (all-or-nothing).
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("{kind:?}: {detail}")]
pub struct RouteError {
    pub kind: RouteErrorKind,
    pub detail: String,
}

impl RouteError {
    pub fn new(kind: RouteErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn no_route(detail: impl Into<String>) -> Self {
        Self::new(RouteErrorKind::NoRoute, detail)
    }

    pub fn forward_loop(detail: impl Into<String>) -> Self {
        Self::new(RouteErrorKind::ForwardLoop, detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(RouteErrorKind::Forbidden, detail)
    }

    pub fn store_unavailable(detail: impl Into<String>) -> Self {
        Self::new(RouteErrorKind::StoreUnavailable, detail)
    }

    pub fn cache_unavailable(detail: impl Into<String>) -> Self {
        Self::new(RouteErrorKind::CacheUnavailable, detail)
    }

    pub fn gone(detail: impl Into<String>) -> Self {
        Self::new(RouteErrorKind::Gone, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(RouteErrorKind::Timeout, detail)
    }
}
