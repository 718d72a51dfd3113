//! The in-memory, per-request routing tree built by phase A (discovery).

use serde::{Deserialize, Serialize};

use crate::extension::{Extension, MemberKind, RankMode};

/// Severity of a discovery-time log entry attached to a node or rank.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
}

/// A discovery-time observation, kept on the tree for operator inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryLogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Tree-path of the node this observation relates to, when there is one
    /// beyond the node the entry is attached to (e.g. the earlier occurrence
    /// of a duplicate).
    pub related_path: Option<String>,
}

impl DiscoveryLogEntry {
    pub fn warn(message: impl Into<String>, related_path: Option<String>) -> Self {
        Self {
            level: LogLevel::Warn,
            message: message.into(),
            related_path,
        }
    }

    pub fn info(message: impl Into<String>, related_path: Option<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
            related_path,
        }
    }
}

/// Whether a discovered node ended up routable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    /// Included in the tree and eligible for route generation.
    Active,
    /// Discovered (logged) but excluded from route generation: a duplicate,
    /// a paused rank member, or a rank pruned because it ended up empty.
    Inactive,
}

/// One fork rank as realized in the tree, with its (already-resolved) member
/// nodes. Inactive members are still present here for observability; phase B
/// skips them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeForkRank {
    pub index: i32,
    pub delay: Option<i32>,
    pub mode: RankMode,
    pub members: Vec<TreeForkMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeForkMember {
    pub kind: MemberKind,
    pub node: RoutingTreeNode,
}

/// How a node's children are realized: a single forward link, an ordered
/// list of fork ranks, or neither (a leaf).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeChildren {
    Forward(Box<RoutingTreeNode>),
    Forks(Vec<TreeForkRank>),
    Leaf,
}

/// A node in the per-call routing tree. Mirrors an `Extension` plus its
/// position (`tree_path`), its discovery status, any log entries, and its
/// children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingTreeNode {
    pub extension: Extension,
    /// Path from the root, e.g. `1`, `1-fr0-3`, `1-fr0-3-fwd`.
    pub tree_path: String,
    pub status: DiscoveryStatus,
    pub logs: Vec<DiscoveryLogEntry>,
    pub children: NodeChildren,
    /// Set when the extension's forward is ON_BUSY/ON_UNAVAILABLE: the
    /// telephone engine resolves the condition at call time, but route
    /// generation needs to know the redirect target to emit as a parameter.
    pub conditional_forward: Option<ConditionalForward>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalKind {
    OnBusy,
    OnUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalForward {
    pub kind: ConditionalKind,
    pub target_extension_id: i64,
}

impl RoutingTreeNode {
    /// A leaf iff the extension is routable without further expansion:
    /// SIMPLE with forwarding disabled or conditional, or EXTERNAL.
    /// Otherwise it is an inner node.
    pub fn is_leaf(&self) -> bool {
        matches!(self.children, NodeChildren::Leaf)
    }

    pub fn is_active(&self) -> bool {
        self.status == DiscoveryStatus::Active
    }
}
