//! Dispatcher-level integration tests: the full routing state machine against a
//! `FakeStoreGateway` + `InProcessCacheGateway` pair, with no external
//! services required to run them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use switchboard_cache::{CacheGateway, InProcessCacheGateway};
use switchboard_server::{Dispatcher, Metrics, SwitchboardConfig};
use switchboard_store::{FakeStoreGateway, StoreGateway};
use switchboard_types::{
    Extension, ExtensionKind, ForkRank, ForwardingMode, MemberKind, PresentationAttributes,
    RankMember, RankMode, RoutingResult,
};

fn ext(id: i64, number: &str, kind: ExtensionKind) -> Extension {
    Extension {
        id,
        number: number.to_string(),
        home_server_id: Some(1),
        kind,
        forwarding_mode: ForwardingMode::Disabled,
        forward_target_id: None,
        forwarding_delay: None,
        presentation: PresentationAttributes::default(),
    }
}

fn test_config() -> Arc<SwitchboardConfig> {
    Arc::new(SwitchboardConfig {
        database_url: String::new(),
        redis_url: None,
        cache_ttl: Duration::from_secs(120),
        request_timeout: Duration::from_secs(2),
        forward_depth_limit: 16,
        outbound_gateway_target: "sip/outbound-gw".to_string(),
        local_server_id: 1,
        home_server_contacts: HashMap::new(),
        control_channel_addr: "127.0.0.1:0".to_string(),
        http_addr: "127.0.0.1:0".to_string(),
    })
}

fn dispatcher(store: FakeStoreGateway) -> Dispatcher {
    let store: Arc<dyn StoreGateway> = Arc::new(store);
    let cache: Arc<dyn switchboard_cache::CacheGateway> = Arc::new(InProcessCacheGateway::new());
    Dispatcher::new(store, cache, test_config(), Arc::new(Metrics::new()))
}

#[tokio::test]
async fn simple_leaf_routes_locally() {
    let store = FakeStoreGateway::new()
        .with_extension(ext(1010, "1010", ExtensionKind::Simple))
        .with_extension(ext(1002, "1002", ExtensionKind::Simple));
    let dispatcher = dispatcher(store);

    let response = dispatcher.route("1010", "1002", None).await.unwrap();
    match response.result {
        RoutingResult::Terminal { target, params } => {
            assert_eq!(target, "lateroute/1002");
            assert_eq!(params.get("stage2").map(String::as_str), Some("1"));
            assert_eq!(
                params.get("x_eventphone_id").map(String::as_str),
                Some(response.call_id.as_str())
            );
        }
        other => panic!("expected terminal result, got {other:?}"),
    }
}

#[tokio::test]
async fn caller_not_found_is_no_route() {
    let store = FakeStoreGateway::new().with_extension(ext(1002, "1002", ExtensionKind::Simple));
    let dispatcher = dispatcher(store);

    let err = dispatcher.route("9999", "1002", None).await.unwrap_err();
    assert_eq!(err.kind.as_str(), "NO_ROUTE");
}

#[tokio::test]
async fn group_fork_result_is_cached_and_late_route_resolves_it() {
    let store = FakeStoreGateway::new()
        .with_extension(ext(1010, "1010", ExtensionKind::Simple))
        .with_extension(ext(1011, "1011", ExtensionKind::Group))
        .with_extension(ext(1002, "1002", ExtensionKind::Simple))
        .with_extension(ext(1004, "1004", ExtensionKind::Simple))
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
                ],
            }],
        );
    let dispatcher = dispatcher(store);

    let response = dispatcher.route("1010", "1011", None).await.unwrap();
    let (symbolic_name, fork_targets) = match &response.result {
        RoutingResult::Fork { target, fork_targets } => (target.clone(), fork_targets.clone()),
        other => panic!("expected fork result, got {other:?}"),
    };
    assert!(symbolic_name.starts_with("lateroute/stage1-"));
    assert!(symbolic_name.ends_with("-1"));
    assert!(!fork_targets.is_empty());

    // The root's own symbolic name is itself a valid late-route lookup, and
    // must resolve to the exact same fork the initial call returned.
    let looked_up = dispatcher.lookup_late_route(&symbolic_name).await.unwrap();
    match looked_up {
        RoutingResult::Fork { target, .. } => assert_eq!(target, symbolic_name),
        other => panic!("expected fork result, got {other:?}"),
    }
}

#[tokio::test]
async fn late_route_cache_miss_is_gone() {
    let store = FakeStoreGateway::new();
    let dispatcher = dispatcher(store);

    let err = dispatcher
        .lookup_late_route("lateroute/stage1-deadbeef-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind.as_str(), "GONE");
}

#[tokio::test]
async fn late_route_expires_after_ttl() {
    let store: Arc<dyn StoreGateway> = Arc::new(
        FakeStoreGateway::new()
            .with_extension(ext(1010, "1010", ExtensionKind::Simple))
            .with_extension(ext(1011, "1011", ExtensionKind::Group))
            .with_extension(ext(1002, "1002", ExtensionKind::Simple))
            .with_fork_ranks(
                1011,
                vec![ForkRank {
                    id: 1,
                    extension_id: 1011,
                    index: 0,
                    delay: None,
                    mode: RankMode::Default,
                    members: vec![RankMember {
                        target_extension_id: 1002,
                        active: true,
                        kind: MemberKind::Default,
                    }],
                }],
            ),
    );
    let cache: Arc<dyn CacheGateway> = Arc::new(InProcessCacheGateway::new());
    let mut config = (*test_config()).clone();
    config.cache_ttl = Duration::from_millis(10);
    let dispatcher = Dispatcher::new(store, cache, Arc::new(config), Arc::new(Metrics::new()));

    let response = dispatcher.route("1010", "1011", None).await.unwrap();
    let symbolic_name = response.result.target().to_string();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = dispatcher
        .lookup_late_route(&symbolic_name)
        .await
        .unwrap_err();
    assert_eq!(err.kind.as_str(), "GONE");
}

#[tokio::test]
async fn external_leaf_forbidden_when_dialout_disallowed() {
    let mut external = ext(1099, "005511234", ExtensionKind::External);
    external.home_server_id = None;
    let store = FakeStoreGateway::new()
        .with_extension(ext(1010, "1010", ExtensionKind::Simple))
        .with_extension(external);
    let dispatcher = dispatcher(store);

    let response = dispatcher.route("1010", "1099", None).await.unwrap();
    match response.result {
        RoutingResult::Terminal { target, .. } => assert_eq!(target, "FORBIDDEN"),
        other => panic!("expected terminal result, got {other:?}"),
    }
}
