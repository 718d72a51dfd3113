//! The control dispatcher: orchestrates phase A then phase B,
//! writes inner-node results to the cache, and resolves late-route lookups.
//! State machine: `Received -> Discovering -> Generating -> Caching ->
//! Responded` or `Received -> Failed(kind)`.

use std::sync::Arc;

use switchboard_cache::CacheGateway;
use switchboard_store::StoreGateway;
use switchboard_types::{
    CallContext, CallId, Extension, RouteError, RoutingResult, RoutingTreeNode,
};

use crate::config::SwitchboardConfig;
use crate::metrics::Metrics;

pub struct Dispatcher {
    store: Arc<dyn StoreGateway>,
    cache: Arc<dyn CacheGateway>,
    config: Arc<SwitchboardConfig>,
    metrics: Arc<Metrics>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RoutingResponse {
    pub call_id: String,
    pub result: RoutingResult,
}

/// Everything the diagnostic HTTP endpoint needs: the built tree,
/// the root result, and every inner-node result keyed by tree-path. Produced
/// by the same computation `route` uses, so the two surfaces can never
/// disagree: both return the same data, one as a structured document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiagnosticResult {
    pub call_id: String,
    pub routing_tree: Option<RoutingTreeNode>,
    pub main_routing_result: Option<RoutingResult>,
    pub all_routing_results: std::collections::HashMap<String, RoutingResult>,
    pub routing_status: RoutingStatus,
    pub routing_status_details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingStatus {
    Ok,
    Error,
}

struct DispatcherRouteGenConfig<'a> {
    config: &'a SwitchboardConfig,
    caller: &'a Extension,
}

impl switchboard_router::RouteGenConfig for DispatcherRouteGenConfig<'_> {
    fn is_local_server(&self, home_server_id: Option<i64>) -> bool {
        home_server_id == Some(self.config.local_server_id)
    }

    fn remote_contact(&self, home_server_id: i64) -> Option<String> {
        self.config.home_server_contacts.get(&home_server_id).cloned()
    }

    fn outbound_gateway_target(&self) -> &str {
        &self.config.outbound_gateway_target
    }

    fn caller_dialout_allowed(&self) -> bool {
        self.caller.presentation.dialout_allowed
    }
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        cache: Arc<dyn CacheGateway>,
        config: Arc<SwitchboardConfig>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            metrics,
        }
    }

    /// Stage-1 initial request (control-channel path).
    #[tracing::instrument(skip(self))]
    pub async fn route(
        &self,
        caller_number: &str,
        called_number: &str,
        call_id: Option<String>,
    ) -> Result<RoutingResponse, RouteError> {
        self.metrics.record_route_attempt();
        let result = tokio::time::timeout(self.config.request_timeout, self.route_inner(caller_number, called_number, call_id)).await;
        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => {
                self.metrics.record_route_failure();
                Err(err)
            }
            Err(_elapsed) => {
                self.metrics.record_route_failure();
                Err(RouteError::timeout(format!(
                    "stage-1 computation exceeded {:?}",
                    self.config.request_timeout
                )))
            }
        }
    }

    async fn route_inner(
        &self,
        caller_number: &str,
        called_number: &str,
        call_id: Option<String>,
    ) -> Result<RoutingResponse, RouteError> {
        let (ctx, _tree, generated) = self.compute(caller_number, called_number, call_id).await?;
        self.write_cache(ctx.call_id.as_str(), &generated).await?;

        Ok(RoutingResponse {
            call_id: ctx.call_id.as_str().to_string(),
            result: generated.root,
        })
    }

    /// Runs phase A then phase B, shared by the control-channel `route` path
    /// and the HTTP diagnostic endpoint so both surfaces see one computation.
    async fn compute(
        &self,
        caller_number: &str,
        called_number: &str,
        call_id: Option<String>,
    ) -> Result<
        (
            CallContext,
            RoutingTreeNode,
            switchboard_router::GeneratedRoutes,
        ),
        RouteError,
    > {
        let caller = self
            .store
            .load_extension_by_number(caller_number)
            .await
            .map_err(|e| RouteError::store_unavailable(e.to_string()))?
            .ok_or_else(|| RouteError::no_route(format!("caller {caller_number} not found")))?;
        let called = self
            .store
            .load_extension_by_number(called_number)
            .await
            .map_err(|e| RouteError::store_unavailable(e.to_string()))?
            .ok_or_else(|| RouteError::no_route(format!("called {called_number} not found")))?;

        let call_id = call_id.map(CallId).unwrap_or_else(CallId::generate);
        let mut ctx = CallContext::new(call_id, caller.id, called.id);

        tracing::debug!(caller = %caller_number, called = %called_number, "discovering routing tree");
        let tree_cfg = switchboard_router::TreeBuilderConfig {
            forward_depth_limit: self.config.forward_depth_limit,
        };
        let tree = switchboard_router::build_tree(&mut ctx, self.store.as_ref(), &tree_cfg).await?;

        tracing::debug!("generating routes");
        let gen_cfg = DispatcherRouteGenConfig {
            config: &self.config,
            caller: &caller,
        };
        let generated = switchboard_router::generate_routes(&tree, &ctx, &gen_cfg)?;

        Ok((ctx, tree, generated))
    }

    /// The HTTP diagnostic path: same computation as `route`, but
    /// returns the whole tree and every inner-node result instead of just
    /// the root, and never fails the request - a phase A/B error is reported
    /// in `routing_status`/`routing_status_details` with whatever partial
    /// tree was available.
    #[tracing::instrument(skip(self))]
    pub async fn diagnose(
        &self,
        caller_number: &str,
        called_number: &str,
        call_id: Option<String>,
    ) -> DiagnosticResult {
        match self.compute(caller_number, called_number, call_id).await {
            Ok((ctx, tree, generated)) => {
                if let Err(e) = self.write_cache(ctx.call_id.as_str(), &generated).await {
                    return DiagnosticResult {
                        call_id: ctx.call_id.as_str().to_string(),
                        routing_tree: Some(tree),
                        main_routing_result: Some(generated.root),
                        all_routing_results: generated.cached.into_iter().collect(),
                        routing_status: RoutingStatus::Error,
                        routing_status_details: Some(e.detail),
                    };
                }
                DiagnosticResult {
                    call_id: ctx.call_id.as_str().to_string(),
                    routing_tree: Some(tree),
                    main_routing_result: Some(generated.root),
                    all_routing_results: generated.cached.into_iter().collect(),
                    routing_status: RoutingStatus::Ok,
                    routing_status_details: None,
                }
            }
            Err(e) => DiagnosticResult {
                call_id: String::new(),
                routing_tree: None,
                main_routing_result: None,
                all_routing_results: std::collections::HashMap::new(),
                routing_status: RoutingStatus::Error,
                routing_status_details: Some(e.detail),
            },
        }
    }

    /// Writes every inner-node result once phase B completes in full, so no
    /// partial tree is ever observable. A put failure on an
    /// inner node with children is fatal; an empty-fork inner node's put
    /// failure degrades to best-effort.
    async fn write_cache(
        &self,
        call_id: &str,
        generated: &switchboard_router::GeneratedRoutes,
    ) -> Result<(), RouteError> {
        for (tree_path, result) in &generated.cached {
            let payload = bincode::serialize(result)
                .map_err(|e| RouteError::cache_unavailable(e.to_string()))?;
            let has_children = matches!(result, RoutingResult::Fork { fork_targets, .. } if !fork_targets.is_empty());
            match self
                .cache
                .put(call_id, tree_path, payload, self.config.cache_ttl)
                .await
            {
                Ok(()) => {}
                Err(e) if has_children => {
                    return Err(RouteError::cache_unavailable(e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(tree_path = %tree_path, error = %e, "best-effort cache put failed for empty inner node");
                }
            }
        }
        Ok(())
    }

    /// Inner-node lookup for a symbolic `stage1-<call-id>-<tree-path>`
    /// target (the late-route lookup path). Cache miss is `GONE`, not a transient
    /// failure - the call has progressed past its TTL.
    #[tracing::instrument(skip(self))]
    pub async fn lookup_late_route(&self, symbolic_name: &str) -> Result<RoutingResult, RouteError> {
        let (call_id, tree_path) = parse_symbolic_name(symbolic_name)
            .ok_or_else(|| RouteError::gone(format!("malformed late-route name: {symbolic_name}")))?;

        let bytes = self
            .cache
            .get(call_id, tree_path)
            .await
            .map_err(|e| RouteError::cache_unavailable(e.to_string()))?;

        match bytes {
            Some(bytes) => {
                self.metrics.record_cache_hit();
                bincode::deserialize(&bytes).map_err(|e| RouteError::cache_unavailable(e.to_string()))
            }
            None => {
                self.metrics.record_cache_miss();
                Err(RouteError::gone(format!(
                    "no cache entry for call {call_id} tree-path {tree_path}"
                )))
            }
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

fn parse_symbolic_name(name: &str) -> Option<(&str, &str)> {
    let name = name.strip_prefix("lateroute/").unwrap_or(name);
    let rest = name.strip_prefix("stage1-")?;
    rest.split_once('-')
}
