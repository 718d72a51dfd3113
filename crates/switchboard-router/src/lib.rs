//! Stage-1 routing core: phase A discovery and phase B emission. Free of
//! I/O framework concerns - callers provide a `&dyn StoreGateway` and a
//! `RouteGenConfig`, never axum, the control-channel parser, or redis.

pub mod route_gen;
pub mod tree_builder;

pub use route_gen::{generate_routes, GeneratedRoutes, RouteGenConfig};
pub use tree_builder::{build_tree, TreeBuilderConfig};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use switchboard_store::FakeStoreGateway;
    use switchboard_types::{
        CallContext, CallId, Extension, ExtensionKind, ForkRank, ForwardingMode, MemberKind,
        PresentationAttributes, RankMember, RankMode, RoutingResult,
    };

    use super::*;

    fn ext(id: i64, number: &str, kind: ExtensionKind) -> Extension {
        Extension {
            id,
            number: number.to_string(),
            home_server_id: Some(2),
            kind,
            forwarding_mode: ForwardingMode::Disabled,
            forward_target_id: None,
            forwarding_delay: None,
            presentation: PresentationAttributes::default(),
        }
    }

    struct TestCfg {
        local_server: i64,
        dialout_allowed: bool,
        contacts: HashMap<i64, String>,
    }

    impl Default for TestCfg {
        fn default() -> Self {
            Self {
                local_server: 2,
                dialout_allowed: true,
                contacts: HashMap::new(),
            }
        }
    }

    impl RouteGenConfig for TestCfg {
        fn is_local_server(&self, home_server_id: Option<i64>) -> bool {
            home_server_id == Some(self.local_server)
        }
        fn remote_contact(&self, home_server_id: i64) -> Option<String> {
            self.contacts.get(&home_server_id).cloned()
        }
        fn outbound_gateway_target(&self) -> &str {
            "sip/outbound-gw"
        }
        fn caller_dialout_allowed(&self) -> bool {
            self.dialout_allowed
        }
    }

    #[tokio::test]
    async fn simple_leaf() {
        let store = FakeStoreGateway::new()
            .with_extension(ext(1010, "1010", ExtensionKind::Simple))
            .with_extension(ext(1002, "1002", ExtensionKind::Simple));
        let mut ctx = CallContext::new(CallId::generate(), 1010, 1002);
        let cfg = TreeBuilderConfig::default();
        let tree = build_tree(&mut ctx, &store, &cfg).await.unwrap();
        assert!(tree.is_leaf());

        let routes = generate_routes(&tree, &ctx, &TestCfg::default()).unwrap();
        match routes.root {
            RoutingResult::Terminal { target, params } => {
                assert_eq!(target, "lateroute/1002");
                assert_eq!(params.get("stage2").map(String::as_str), Some("1"));
                assert!(params.contains_key("x_eventphone_id"));
            }
            RoutingResult::Fork { .. } => panic!("expected terminal result"),
        }
        assert!(routes.cached.is_empty());
    }

    #[tokio::test]
    async fn single_rank_group() {
        let store = FakeStoreGateway::new()
            .with_extension(ext(1011, "1011", ExtensionKind::Group))
            .with_extension(ext(1002, "1002", ExtensionKind::Simple))
            .with_extension(ext(1004, "1004", ExtensionKind::Simple))
            .with_extension(ext(1005, "1005", ExtensionKind::Simple))
            .with_extension(ext(1001, "1001", ExtensionKind::Simple))
            .with_fork_ranks(
                1011,
                vec![ForkRank {
                    id: 1,
                    extension_id: 1011,
                    index: 0,
                    delay: None,
                    mode: RankMode::Default,
                    members: vec![
                        RankMember {
                            target_extension_id: 1002,
                            active: true,
                            kind: MemberKind::Default,
                        },
                        RankMember {
                            target_extension_id: 1004,
                            active: true,
                            kind: MemberKind::Default,
                        },
                        RankMember {
                            target_extension_id: 1005,
                            active: true,
                            kind: MemberKind::Default,
                        },
                        RankMember {
                            target_extension_id: 1001,
                            active: false,
                            kind: MemberKind::Default,
                        },
                    ],
                }],
            );
        let mut ctx = CallContext::new(CallId::generate(), 1010, 1011);
        let cfg = TreeBuilderConfig::default();
        let tree = build_tree(&mut ctx, &store, &cfg).await.unwrap();
        assert!(!tree.is_leaf());

        let routes = generate_routes(&tree, &ctx, &TestCfg::default()).unwrap();
        match &routes.root {
            RoutingResult::Fork { fork_targets, .. } => {
                let children: Vec<_> = fork_targets
                    .iter()
                    .filter_map(|t| match t {
                        switchboard_types::ForkTarget::Child { target, .. } => Some(target.clone()),
                        _ => None,
                    })
                    .collect();
                assert_eq!(
                    children,
                    vec!["lateroute/1002", "lateroute/1004", "lateroute/1005"]
                );
            }
            _ => panic!("expected fork result"),
        }
        assert_eq!(routes.cached.len(), 1);
        assert_eq!(routes.cached[0].0, "1");
    }

    #[tokio::test]
    async fn self_inclusion_via_multiring_deactivates_duplicate() {
        let store = FakeStoreGateway::new()
            .with_extension(ext(2000, "2000", ExtensionKind::Group))
            .with_extension(ext(2001, "2001", ExtensionKind::MultiRing))
            .with_extension(ext(2002, "2002", ExtensionKind::Simple))
            .with_fork_ranks(
                2000,
                vec![ForkRank {
                    id: 1,
                    extension_id: 2000,
                    index: 0,
                    delay: None,
                    mode: RankMode::Default,
                    members: vec![
                        RankMember {
                            target_extension_id: 2001,
                            active: true,
                            kind: MemberKind::Default,
                        },
                        RankMember {
                            target_extension_id: 2002,
                            active: true,
                            kind: MemberKind::Default,
                        },
                    ],
                }],
            );
        // caller is 2001, which also appears as a member of 2000's rank 0.
        let mut ctx = CallContext::new(CallId::generate(), 2001, 2000);
        let cfg = TreeBuilderConfig::default();
        let tree = build_tree(&mut ctx, &store, &cfg).await.unwrap();

        let routes = generate_routes(&tree, &ctx, &TestCfg::default()).unwrap();
        match &routes.root {
            RoutingResult::Fork { fork_targets, .. } => {
                let children: Vec<_> = fork_targets
                    .iter()
                    .filter_map(|t| match t {
                        switchboard_types::ForkTarget::Child { target, .. } => Some(target.clone()),
                        _ => None,
                    })
                    .collect();
                assert_eq!(children, vec!["lateroute/2002"]);
            }
            _ => panic!("expected fork result"),
        }
    }

    #[tokio::test]
    async fn immediate_forward_follows_target() {
        let mut forwarding = ext(1001, "1001", ExtensionKind::Simple);
        forwarding.forwarding_mode = ForwardingMode::Enabled;
        forwarding.forwarding_delay = Some(0);
        forwarding.forward_target_id = Some(1006);
        let store = FakeStoreGateway::new()
            .with_extension(forwarding)
            .with_extension(ext(1006, "1006", ExtensionKind::Simple));
        let mut ctx = CallContext::new(CallId::generate(), 1010, 1001);
        let cfg = TreeBuilderConfig::default();
        let tree = build_tree(&mut ctx, &store, &cfg).await.unwrap();

        let routes = generate_routes(&tree, &ctx, &TestCfg::default()).unwrap();
        // The forward node is an inner node: its own result wraps the
        // forwarded leaf's target under its own symbolic name, and it gets a
        // cache entry like any other inner node.
        match &routes.root {
            RoutingResult::Fork { target, fork_targets } => {
                assert!(target.starts_with("lateroute/stage1-"));
                assert!(target.ends_with("-1"));
                assert_eq!(fork_targets.len(), 1);
                match &fork_targets[0] {
                    switchboard_types::ForkTarget::Child { target, .. } => {
                        assert_eq!(target, "lateroute/1006");
                    }
                    other => panic!("expected child fork target, got {other:?}"),
                }
            }
            RoutingResult::Terminal { .. } => panic!("expected fork result"),
        }
        assert_eq!(routes.cached.len(), 1);
        assert_eq!(routes.cached[0].0, "1");
    }

    #[tokio::test]
    async fn depth_17_forward_chain_fails() {
        let mut store = FakeStoreGateway::new();
        for i in 0..18 {
            let mut e = ext(2000 + i, &(2000 + i).to_string(), ExtensionKind::Simple);
            if i < 17 {
                e.forwarding_mode = ForwardingMode::Enabled;
                e.forwarding_delay = Some(0);
                e.forward_target_id = Some(2000 + i + 1);
            }
            store = store.with_extension(e);
        }
        let mut ctx = CallContext::new(CallId::generate(), 1, 2000);
        let cfg = TreeBuilderConfig::default();
        let err = build_tree(&mut ctx, &store, &cfg).await.unwrap_err();
        assert_eq!(err.kind.as_str(), "FORWARD_LOOP");
    }

    #[tokio::test]
    async fn depth_16_forward_chain_succeeds() {
        let mut store = FakeStoreGateway::new();
        for i in 0..17 {
            let mut e = ext(3000 + i, &(3000 + i).to_string(), ExtensionKind::Simple);
            if i < 16 {
                e.forwarding_mode = ForwardingMode::Enabled;
                e.forwarding_delay = Some(0);
                e.forward_target_id = Some(3000 + i + 1);
            }
            store = store.with_extension(e);
        }
        let mut ctx = CallContext::new(CallId::generate(), 1, 3000);
        let cfg = TreeBuilderConfig::default();
        let tree = build_tree(&mut ctx, &store, &cfg).await.unwrap();

        let routes = generate_routes(&tree, &ctx, &TestCfg::default()).unwrap();
        // Every one of the 16 forwarding nodes is an inner node and gets its
        // own cache entry; only the final leaf (3016) is uncached.
        assert_eq!(routes.cached.len(), 16);
        let cached: HashMap<String, RoutingResult> = routes.cached.into_iter().collect();

        // Walk the chain of wrapped forward results down to the leaf target.
        let mut current = routes.root;
        let mut hops = 0;
        loop {
            let RoutingResult::Fork { fork_targets, .. } = &current else {
                panic!("expected fork result at hop {hops}");
            };
            assert_eq!(fork_targets.len(), 1);
            let switchboard_types::ForkTarget::Child { target: next, .. } = &fork_targets[0] else {
                panic!("expected child fork target at hop {hops}");
            };
            hops += 1;
            match next
                .strip_prefix("lateroute/stage1-")
                .and_then(|rest| rest.split_once('-'))
            {
                Some((_call_id, tree_path)) => {
                    current = cached.get(tree_path).cloned().unwrap();
                }
                None => {
                    assert_eq!(next, "lateroute/3016");
                    break;
                }
            }
        }
        assert_eq!(hops, 16);
    }

    #[tokio::test]
    async fn delayed_forward_with_multiring_device() {
        let mut forwarding = ext(4000, "4000", ExtensionKind::MultiRing);
        forwarding.forwarding_mode = ForwardingMode::Enabled;
        forwarding.forwarding_delay = Some(15);
        forwarding.forward_target_id = Some(1006);
        let store = FakeStoreGateway::new()
            .with_extension(forwarding)
            .with_extension(ext(1006, "1006", ExtensionKind::Simple));
        let mut ctx = CallContext::new(CallId::generate(), 1010, 4000);
        let cfg = TreeBuilderConfig::default();
        let tree = build_tree(&mut ctx, &store, &cfg).await.unwrap();
        assert!(!tree.is_leaf());

        let ranks = match &tree.children {
            switchboard_types::NodeChildren::Forks(ranks) => ranks,
            other => panic!("expected fork ranks, got {other:?}"),
        };
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks[0].index, 0);
        assert_eq!(ranks[0].mode, RankMode::Default);
        assert_eq!(ranks[1].index, 1);
        assert_eq!(ranks[1].mode, RankMode::Next);
        assert_eq!(ranks[1].delay, Some(15));

        let routes = generate_routes(&tree, &ctx, &TestCfg::default()).unwrap();
        match &routes.root {
            RoutingResult::Fork { fork_targets, .. } => {
                let separators: Vec<_> = fork_targets
                    .iter()
                    .filter_map(|t| match t {
                        switchboard_types::ForkTarget::RankSeparator(sep) => Some((sep.mode, sep.delay)),
                        _ => None,
                    })
                    .collect();
                assert_eq!(separators, vec![(RankMode::Default, None), (RankMode::Next, Some(15))]);
                let children: Vec<_> = fork_targets
                    .iter()
                    .filter_map(|t| match t {
                        switchboard_types::ForkTarget::Child { target, .. } => Some(target.clone()),
                        _ => None,
                    })
                    .collect();
                assert_eq!(children, vec!["lateroute/4000", "lateroute/1006"]);
            }
            _ => panic!("expected fork result"),
        }
    }
}
