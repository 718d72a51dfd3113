//! Extension and fork-rank types
//!
//! Mirrors the `extensions` / `fork_ranks` / `fork_rank_members` tables:
//! see the store gateway for the schema these are loaded from.

use serde::{Deserialize, Serialize};

/// What an extension *is*. GROUP has no device of its own; MULTIRING has a
/// device and also expands through fork ranks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionKind {
    Simple,
    MultiRing,
    Group,
    External,
}

impl ExtensionKind {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "SIMPLE" => Some(Self::Simple),
            "MULTIRING" => Some(Self::MultiRing),
            "GROUP" => Some(Self::Group),
            "EXTERNAL" => Some(Self::External),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::MultiRing => "MULTIRING",
            Self::Group => "GROUP",
            Self::External => "EXTERNAL",
        }
    }

    /// GROUP and MULTIRING expand through fork ranks; SIMPLE and EXTERNAL do not.
    pub fn expands(&self) -> bool {
        matches!(self, Self::Group | Self::MultiRing)
    }

    /// MULTIRING is the only kind that both has its own device *and* expands.
    pub fn has_own_device(&self) -> bool {
        matches!(self, Self::Simple | Self::MultiRing)
    }
}

/// Forwarding policy on an extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForwardingMode {
    Disabled,
    Enabled,
    OnBusy,
    OnUnavailable,
}

impl ForwardingMode {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "DISABLED" => Some(Self::Disabled),
            "ENABLED" => Some(Self::Enabled),
            "ON_BUSY" => Some(Self::OnBusy),
            "ON_UNAVAILABLE" => Some(Self::OnUnavailable),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Self::Disabled => "DISABLED",
            Self::Enabled => "ENABLED",
            Self::OnBusy => "ON_BUSY",
            Self::OnUnavailable => "ON_UNAVAILABLE",
        }
    }

    /// ON_BUSY / ON_UNAVAILABLE are resolved by the telephone engine at call
    /// time, not by discovery - they never themselves spawn a discovery child.
    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::OnBusy | Self::OnUnavailable)
    }
}

/// The relation between consecutive fork ranks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RankMode {
    /// Applies to rank 0 only; starts immediately.
    Default,
    /// Adds this rank's members to the still-ringing set after `delay`.
    Next,
    /// Cancels the previous rank and rings this rank's members after `delay`.
    Drop,
}

impl RankMode {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "DEFAULT" => Some(Self::Default),
            "NEXT" => Some(Self::Next),
            "DROP" => Some(Self::Drop),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Next => "NEXT",
            Self::Drop => "DROP",
        }
    }
}

/// Whether a rank member is a regular participant or an auxiliary one
/// (carried through for presentation; routing treats both identically once
/// `active` is true).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberKind {
    Default,
    Auxiliary,
}

impl MemberKind {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "DEFAULT" => Some(Self::Default),
            "AUXILIARY" => Some(Self::Auxiliary),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Auxiliary => "AUXILIARY",
        }
    }
}

/// A single member of a fork rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankMember {
    pub target_extension_id: i64,
    /// False when the user paused participation: discovered for observability
    /// but excluded from route generation.
    pub active: bool,
    pub kind: MemberKind,
}

/// One ordered expansion step of a GROUP/MULTIRING extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkRank {
    pub id: i64,
    pub extension_id: i64,
    pub index: i32,
    pub delay: Option<i32>,
    pub mode: RankMode,
    pub members: Vec<RankMember>,
}

/// Presentation attributes carried through routing but opaque to it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PresentationAttributes {
    pub display_name: Option<String>,
    pub short_name: Option<String>,
    pub outgoing_number: Option<String>,
    pub outgoing_name: Option<String>,
    pub dialout_allowed: bool,
    pub ringback: bool,
    pub lang: Option<String>,
}

/// The node entity: an addressable thing in the PBX identified by a dialed number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extension {
    pub id: i64,
    pub number: String,
    /// Which telephone server hosts this extension's registrations.
    /// `None` means external/placeholder.
    pub home_server_id: Option<i64>,
    pub kind: ExtensionKind,
    pub forwarding_mode: ForwardingMode,
    pub forward_target_id: Option<i64>,
    /// Seconds; zero or `None` means immediate.
    pub forwarding_delay: Option<i32>,
    pub presentation: PresentationAttributes,
}

impl Extension {
    /// ENABLED forward with zero/null delay is immediate: the extension's own
    /// device (if any) and its fork ranks are suppressed at discovery time.
    pub fn is_immediate_forward(&self) -> bool {
        self.forwarding_mode == ForwardingMode::Enabled
            && self.forwarding_delay.unwrap_or(0) <= 0
    }

    /// ENABLED forward with a positive delay: the device/fork ranks still
    /// ring, with the forward target appended as a synthetic trailing rank.
    pub fn is_delayed_forward(&self) -> bool {
        self.forwarding_mode == ForwardingMode::Enabled
            && self.forwarding_delay.unwrap_or(0) > 0
    }
}
