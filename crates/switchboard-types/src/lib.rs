//! Shared data model for the stage-1 call routing engine.
//!
//! Every type that crosses a gateway boundary (store, cache, HTTP, the
//! control channel) lives here so those boundaries share one definition.

pub mod call;
pub mod error;
pub mod extension;
pub mod result;
pub mod tree;

pub use call::{CallContext, CallId};
pub use error::{RouteError, RouteErrorKind};
pub use extension::{
    Extension, ExtensionKind, ForkRank, ForwardingMode, MemberKind, PresentationAttributes,
    RankMember, RankMode,
};
pub use result::{
    call_id_params, CachedEntry, ForkTarget, ParamMap, RankSeparator, RoutingResult,
    PARAM_CALLED_DISPLAY, PARAM_CALLER_DISPLAY, PARAM_CALLER_LANG, PARAM_CALL_ID_HEADER,
    PARAM_CALL_ID_INTERNAL, PARAM_FORK_CALLTYPE, PARAM_FORK_REDIRECT, PARAM_FORK_STOP,
    PARAM_RINGBACK, PARAM_STAGE2,
};
pub use tree::{
    ConditionalForward, ConditionalKind, DiscoveryLogEntry, DiscoveryStatus, LogLevel,
    NodeChildren, RoutingTreeNode, TreeForkMember, TreeForkRank,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_kind_db_str_round_trips() {
        for kind in [
            ExtensionKind::Simple,
            ExtensionKind::MultiRing,
            ExtensionKind::Group,
            ExtensionKind::External,
        ] {
            assert_eq!(ExtensionKind::from_db_str(kind.to_db_str()), Some(kind));
        }
    }

    #[test]
    fn call_id_generates_32_hex_chars() {
        let id = CallId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn caller_extension_preseeded_in_duplicate_set() {
        let ctx = CallContext::new(CallId::generate(), 42, 99);
        assert!(ctx.has_seen(42));
        assert!(!ctx.has_seen(99));
    }

    #[test]
    fn cache_key_and_symbolic_target_format() {
        assert_eq!(CachedEntry::cache_key("abc", "1-fr0-0"), "stage1:abc:1-fr0-0");
        assert_eq!(
            CachedEntry::symbolic_target("abc", "1-fr0-0"),
            "lateroute/stage1-abc-1-fr0-0"
        );
    }
}
