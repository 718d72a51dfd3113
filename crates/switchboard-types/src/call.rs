//! Per-request call context: identity plus the monotonically-built
//! duplicate-detection set (see `RoutingTreeNode` invariant: within one call,
//! no extension appears as an active routable node more than once).

use std::collections::HashSet;

/// A unique call identifier: an opaque hex string with >=128 bits of
/// entropy, generated if the caller doesn't pre-assign one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId(pub String);

impl CallId {
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owns the one thing phase A must single-thread across BFS layers: the
/// call-wide set of extension ids already present on an active path.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub call_id: CallId,
    pub caller_extension_id: i64,
    pub called_extension_id: i64,
    seen: HashSet<i64>,
}

impl CallContext {
    /// The caller's own extension is pre-inserted so that a group containing
    /// the caller does not ring the caller back.
    pub fn new(call_id: CallId, caller_extension_id: i64, called_extension_id: i64) -> Self {
        let mut seen = HashSet::new();
        seen.insert(caller_extension_id);
        Self {
            call_id,
            caller_extension_id,
            called_extension_id,
            seen,
        }
    }

    /// True if `extension_id` is already present on an active path in this call.
    pub fn has_seen(&self, extension_id: i64) -> bool {
        self.seen.contains(&extension_id)
    }

    /// Adds `extension_id` to the duplicate set. Call only when the node is
    /// being enqueued as active - duplicates must not be (re-)inserted.
    pub fn mark_seen(&mut self, extension_id: i64) {
        self.seen.insert(extension_id);
    }
}
