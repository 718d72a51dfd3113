//! Route generator output (phase B) and the per-call cache payload.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameters carried alongside a routing target. Always includes the
/// call-id under both the internal and outgoing-SIP header keys so
/// downstream hops preserve correlation.
pub type ParamMap = HashMap<String, String>;

pub const PARAM_CALL_ID_INTERNAL: &str = "call_id";
pub const PARAM_CALL_ID_HEADER: &str = "x_eventphone_id";
pub const PARAM_STAGE2: &str = "stage2";
pub const PARAM_CALLER_DISPLAY: &str = "caller_display";
pub const PARAM_CALLER_LANG: &str = "caller_lang";
pub const PARAM_CALLED_DISPLAY: &str = "called_display";
pub const PARAM_RINGBACK: &str = "ringback";
pub const PARAM_FORK_STOP: &str = "fork.stop";
pub const PARAM_FORK_CALLTYPE: &str = "fork.calltype";
pub const PARAM_FORK_REDIRECT: &str = "fork.redirect";

pub fn call_id_params(call_id: &str) -> ParamMap {
    let mut params = ParamMap::new();
    params.insert(PARAM_CALL_ID_INTERNAL.to_string(), call_id.to_string());
    params.insert(PARAM_CALL_ID_HEADER.to_string(), call_id.to_string());
    params
}

/// Per-rank-separator metadata emitted before a rank's children in a fork
/// target list, carrying the rank's timing semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankSeparator {
    pub rank_index: i32,
    pub mode: crate::extension::RankMode,
    pub delay: Option<i32>,
}

/// One child entry in a fork's `fork_targets` list: either a rank-separator
/// marker or an actual routable child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForkTarget {
    RankSeparator(RankSeparator),
    Child {
        target: String,
        params: ParamMap,
    },
}

/// The generator's output for one node: either a single immediate routing
/// instruction, or a fork naming itself plus an ordered list of children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoutingResult {
    Terminal {
        target: String,
        params: ParamMap,
    },
    Fork {
        target: String,
        fork_targets: Vec<ForkTarget>,
    },
}

impl RoutingResult {
    pub fn target(&self) -> &str {
        match self {
            Self::Terminal { target, .. } => target,
            Self::Fork { target, .. } => target,
        }
    }
}

/// A cached, serialized `RoutingResult` keyed by (call-id, tree-path).
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub call_id: String,
    pub tree_path: String,
    pub payload: Vec<u8>,
    pub ttl: Duration,
}

impl CachedEntry {
    /// Key format fixed by the wire contract: `stage1:<call-id>:<tree-path>`.
    pub fn cache_key(call_id: &str, tree_path: &str) -> String {
        format!("stage1:{call_id}:{tree_path}")
    }

    /// The symbolic late-route name an inner node's fork target names itself
    /// with: `lateroute/stage1-<call-id>-<tree-path>`.
    pub fn symbolic_target(call_id: &str, tree_path: &str) -> String {
        format!("lateroute/stage1-{call_id}-{tree_path}")
    }
}
