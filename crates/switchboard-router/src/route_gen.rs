//! Stage-1 phase B: bottom-up emission of `RoutingResult`s.
//!
//! A private post-order fold: each node's
//! result is built from its already-built children, never the other way
//! round, so there is no back-reference between nodes to manage.

use switchboard_types::{
    call_id_params, CachedEntry, ConditionalKind, ForkTarget, NodeChildren, ParamMap, RankSeparator,
    RouteError, RoutingResult, RoutingTreeNode, PARAM_CALLED_DISPLAY, PARAM_CALLER_DISPLAY,
    PARAM_CALLER_LANG, PARAM_FORK_CALLTYPE, PARAM_FORK_REDIRECT, PARAM_FORK_STOP, PARAM_RINGBACK,
    PARAM_STAGE2,
};

use switchboard_types::CallContext;

/// Resolves a home-server id to a contact address for remote-leaf targets,
/// and names the outbound gateway target for EXTERNAL leaves.
pub trait RouteGenConfig {
    /// `None` means the server id isn't a known remote (treated as local).
    fn is_local_server(&self, home_server_id: Option<i64>) -> bool;
    fn remote_contact(&self, home_server_id: i64) -> Option<String>;
    fn outbound_gateway_target(&self) -> &str;
    fn caller_dialout_allowed(&self) -> bool;
}

/// Phase B's output: the root's result plus one entry per inner node, ready
/// to be written to the cache gateway under `(call_id, tree_path)`.
pub struct GeneratedRoutes {
    pub root: RoutingResult,
    pub cached: Vec<(String, RoutingResult)>,
}

/// Runs the post-order fold and collects inner-node results for caching.
/// Leaves are not cached - their symbolic names are never looked up, only
/// inner-node `lateroute/stage1-*` targets are (see DESIGN.md).
#[tracing::instrument(skip_all, fields(call_id = %ctx.call_id))]
pub fn generate_routes(
    root: &RoutingTreeNode,
    ctx: &CallContext,
    cfg: &dyn RouteGenConfig,
) -> Result<GeneratedRoutes, RouteError> {
    let mut cached = Vec::new();
    let result = emit(root, ctx, cfg, &mut cached)?;
    Ok(GeneratedRoutes { root: result, cached })
}

fn base_params(ctx: &CallContext) -> ParamMap {
    call_id_params(ctx.call_id.as_str())
}

fn emit(
    node: &RoutingTreeNode,
    ctx: &CallContext,
    cfg: &dyn RouteGenConfig,
    cached: &mut Vec<(String, RoutingResult)>,
) -> Result<RoutingResult, RouteError> {
    match &node.children {
        NodeChildren::Leaf => emit_leaf(node, ctx, cfg),
        NodeChildren::Forward(child) => {
            // A forward node is an inner node like any other (spec.md §3: not
            // a leaf), so it gets its own symbolic name and cache entry; the
            // single child it wraps is carried as that fork's one target.
            let child_result = emit(child, ctx, cfg, cached)?;
            let target = CachedEntry::symbolic_target(ctx.call_id.as_str(), &node.tree_path);
            let params = match &child_result {
                RoutingResult::Terminal { params, .. } => params.clone(),
                RoutingResult::Fork { .. } => base_params(ctx),
            };
            let result = RoutingResult::Fork {
                target: target.clone(),
                fork_targets: vec![ForkTarget::Child {
                    target: child_result.target().to_string(),
                    params,
                }],
            };
            cached.push((node.tree_path.clone(), result.clone()));
            Ok(result)
        }
        NodeChildren::Forks(ranks) => {
            let target = CachedEntry::symbolic_target(ctx.call_id.as_str(), &node.tree_path);
            let mut fork_targets = Vec::new();
            for rank in ranks {
                let mut rank_targets = Vec::new();
                for member in &rank.members {
                    if !member.node.is_active() {
                        continue;
                    }
                    let child_result = emit(&member.node, ctx, cfg, cached)?;
                    let mut params = match &child_result {
                        RoutingResult::Terminal { params, .. } => params.clone(),
                        RoutingResult::Fork { .. } => base_params(ctx),
                    };
                    if let Some(cf) = &member.node.conditional_forward {
                        params.insert(PARAM_FORK_STOP.to_string(), "true".to_string());
                        params.insert(
                            PARAM_FORK_CALLTYPE.to_string(),
                            match cf.kind {
                                ConditionalKind::OnBusy => "busy".to_string(),
                                ConditionalKind::OnUnavailable => "unavailable".to_string(),
                            },
                        );
                        params.insert(
                            PARAM_FORK_REDIRECT.to_string(),
                            cf.target_extension_id.to_string(),
                        );
                    }
                    rank_targets.push(ForkTarget::Child {
                        target: child_result.target().to_string(),
                        params,
                    });
                }
                if rank_targets.is_empty() {
                    continue;
                }
                fork_targets.push(ForkTarget::RankSeparator(RankSeparator {
                    rank_index: rank.index,
                    mode: rank.mode,
                    delay: rank.delay,
                }));
                fork_targets.extend(rank_targets);
            }
            let result = RoutingResult::Fork {
                target: target.clone(),
                fork_targets,
            };
            cached.push((node.tree_path.clone(), result.clone()));
            Ok(result)
        }
    }
}

fn emit_leaf(
    node: &RoutingTreeNode,
    ctx: &CallContext,
    cfg: &dyn RouteGenConfig,
) -> Result<RoutingResult, RouteError> {
    use switchboard_types::ExtensionKind;

    let mut params = base_params(ctx);
    if let Some(display) = &node.extension.presentation.display_name {
        params.insert(PARAM_CALLER_DISPLAY.to_string(), display.clone());
    }
    if let Some(lang) = &node.extension.presentation.lang {
        params.insert(PARAM_CALLER_LANG.to_string(), lang.clone());
    }
    if let Some(display) = &node.extension.presentation.outgoing_name {
        params.insert(PARAM_CALLED_DISPLAY.to_string(), display.clone());
    }
    if node.extension.presentation.ringback {
        params.insert(PARAM_RINGBACK.to_string(), "1".to_string());
    }

    match node.extension.kind {
        ExtensionKind::External => {
            if !cfg.caller_dialout_allowed() {
                return Ok(RoutingResult::Terminal {
                    target: "FORBIDDEN".to_string(),
                    params,
                });
            }
            let number = node
                .extension
                .presentation
                .outgoing_number
                .clone()
                .unwrap_or_else(|| node.extension.number.clone());
            Ok(RoutingResult::Terminal {
                target: format!("{}/{number}", cfg.outbound_gateway_target()),
                params,
            })
        }
        _ if cfg.is_local_server(node.extension.home_server_id) => {
            params.insert(PARAM_STAGE2.to_string(), "1".to_string());
            Ok(RoutingResult::Terminal {
                target: format!("lateroute/{}", node.extension.number),
                params,
            })
        }
        _ => {
            let home_server_id = node.extension.home_server_id.ok_or_else(|| {
                RouteError::no_route(format!(
                    "leaf {} has no home server and is not external",
                    node.tree_path
                ))
            })?;
            let contact = cfg.remote_contact(home_server_id).ok_or_else(|| {
                RouteError::no_route(format!(
                    "no contact address configured for home server {home_server_id}"
                ))
            })?;
            Ok(RoutingResult::Terminal {
                target: format!("{contact}/{}", node.extension.number),
                params,
            })
        }
    }
}
