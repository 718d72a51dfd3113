//! Stage-1 phase A: breadth-first discovery of the routing tree.
//!
//! The BFS itself works over a flat arena of not-yet-linked nodes (children
//! referenced by index) rather than a nested owned structure, because a
//! parent's children aren't known until the layer after it resolves. Once
//! discovery finishes, `finalize` walks the arena once to produce the real
//! owned `RoutingTreeNode` tree that route generation consumes.

use std::collections::{HashMap, VecDeque};

use futures::future::try_join_all;
use switchboard_store::StoreGateway;
use switchboard_types::{
    CallContext, ConditionalForward, ConditionalKind, DiscoveryLogEntry, DiscoveryStatus,
    Extension, ExtensionKind, ForkRank, ForwardingMode, MemberKind, NodeChildren,
    PresentationAttributes, RankMode, RouteError, RoutingTreeNode, TreeForkMember, TreeForkRank,
};

/// Tunables for phase A. `forward_depth_limit` is the only one
/// names explicitly (default 16).
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilderConfig {
    pub forward_depth_limit: u32,
}

impl Default for TreeBuilderConfig {
    fn default() -> Self {
        Self {
            forward_depth_limit: 16,
        }
    }
}

enum RawChildren {
    Forward(usize),
    Forks(Vec<RawForkRank>),
    Leaf,
}

struct RawForkRank {
    index: i32,
    delay: Option<i32>,
    mode: RankMode,
    members: Vec<RawForkMember>,
}

struct RawForkMember {
    kind: MemberKind,
    node: usize,
}

struct RawNode {
    extension: Extension,
    tree_path: String,
    status: DiscoveryStatus,
    logs: Vec<DiscoveryLogEntry>,
    children: RawChildren,
    conditional_forward: Option<ConditionalForward>,
}

/// One slot still waiting on a store round trip. `terminal_only` jobs are
/// finalized as an inactive leaf as soon as their extension loads - a
/// duplicate occurrence or a paused rank member, kept in the tree for
/// observability but never expanded further (the active-set
/// invariant).
struct PendingJob {
    arena_index: usize,
    extension_id: i64,
    tree_path: String,
    forward_depth: u32,
    terminal_only: bool,
    note: Option<DiscoveryLogEntry>,
}

enum ExpansionIntent {
    ImmediateForward,
    DelayedForward,
    Conditional(ConditionalKind),
    Normal,
}

fn expansion_intent(ext: &Extension) -> ExpansionIntent {
    if ext.is_immediate_forward() {
        ExpansionIntent::ImmediateForward
    } else if ext.is_delayed_forward() {
        ExpansionIntent::DelayedForward
    } else {
        match ext.forwarding_mode {
            ForwardingMode::OnBusy => ExpansionIntent::Conditional(ConditionalKind::OnBusy),
            ForwardingMode::OnUnavailable => {
                ExpansionIntent::Conditional(ConditionalKind::OnUnavailable)
            }
            ForwardingMode::Disabled | ForwardingMode::Enabled => ExpansionIntent::Normal,
        }
    }
}

fn not_found_placeholder(extension_id: i64, tree_path: String, detail: String) -> RawNode {
    RawNode {
        extension: Extension {
            id: extension_id,
            number: format!("unknown-{extension_id}"),
            home_server_id: None,
            kind: ExtensionKind::External,
            forwarding_mode: ForwardingMode::Disabled,
            forward_target_id: None,
            forwarding_delay: None,
            presentation: PresentationAttributes::default(),
        },
        tree_path,
        status: DiscoveryStatus::Inactive,
        logs: vec![DiscoveryLogEntry::warn(detail, None)],
        children: RawChildren::Leaf,
        conditional_forward: None,
    }
}

fn self_leaf(ext: &Extension, tree_path: String) -> RawNode {
    RawNode {
        extension: ext.clone(),
        tree_path,
        status: DiscoveryStatus::Active,
        logs: Vec::new(),
        children: RawChildren::Leaf,
        conditional_forward: None,
    }
}

/// Builds the own-device rank (MULTIRING/SIMPLE, if the kind has one) plus
/// whatever ranks were loaded from the store, re-indexed so the device
/// occupies rank 0 and store ranks follow (the MULTIRING rule).
/// Active members that are new get queued as regular `PendingJob`s; members
/// already on an active path become `terminal_only` duplicates with a WARN
/// attached both here (for the owning node) and on the duplicate's own node.
#[allow(clippy::too_many_arguments)]
fn build_own_ranks(
    ext: &Extension,
    tree_path: &str,
    store_ranks: Option<Vec<ForkRank>>,
    ctx: &mut CallContext,
    first_seen_path: &mut HashMap<i64, String>,
    arena: &mut Vec<Option<RawNode>>,
) -> (Vec<RawForkRank>, Vec<PendingJob>, Vec<DiscoveryLogEntry>, Vec<bool>) {
    let mut ranks = Vec::new();
    let mut jobs = Vec::new();
    let mut logs = Vec::new();
    let mut rank_has_active = Vec::new();
    let mut next_index: i32 = 0;

    if ext.kind.has_own_device() {
        let member_path = format!("{tree_path}-fr0-0");
        let leaf_idx = arena.len();
        arena.push(Some(self_leaf(ext, member_path)));
        ranks.push(RawForkRank {
            index: 0,
            delay: None,
            mode: RankMode::Default,
            members: vec![RawForkMember {
                kind: MemberKind::Default,
                node: leaf_idx,
            }],
        });
        rank_has_active.push(true);
        next_index = 1;
    }

    if let Some(store_ranks) = store_ranks {
        for sr in store_ranks {
            let rank_index = next_index;
            next_index += 1;
            let mut members = Vec::new();
            let mut has_active = false;
            for (pos, rm) in sr.members.iter().enumerate() {
                let member_path = format!("{tree_path}-fr{rank_index}-{pos}");
                let child_idx = arena.len();
                arena.push(None);

                if !rm.active {
                    jobs.push(PendingJob {
                        arena_index: child_idx,
                        extension_id: rm.target_extension_id,
                        tree_path: member_path,
                        forward_depth: 0,
                        terminal_only: true,
                        note: Some(DiscoveryLogEntry::info(
                            "membership paused, excluded from route generation",
                            None,
                        )),
                    });
                } else if ctx.has_seen(rm.target_extension_id) {
                    let earlier = first_seen_path.get(&rm.target_extension_id).cloned();
                    logs.push(DiscoveryLogEntry::warn(
                        format!(
                            "duplicate extension {} in rank {rank_index}, already active at {}",
                            rm.target_extension_id,
                            earlier.clone().unwrap_or_else(|| "?".to_string())
                        ),
                        earlier.clone(),
                    ));
                    jobs.push(PendingJob {
                        arena_index: child_idx,
                        extension_id: rm.target_extension_id,
                        tree_path: member_path,
                        forward_depth: 0,
                        terminal_only: true,
                        note: Some(DiscoveryLogEntry::warn(
                            "already present on an active path in this call",
                            earlier,
                        )),
                    });
                } else {
                    ctx.mark_seen(rm.target_extension_id);
                    first_seen_path.insert(rm.target_extension_id, member_path.clone());
                    jobs.push(PendingJob {
                        arena_index: child_idx,
                        extension_id: rm.target_extension_id,
                        tree_path: member_path,
                        forward_depth: 0,
                        terminal_only: false,
                        note: None,
                    });
                    has_active = true;
                }

                members.push(RawForkMember {
                    kind: rm.kind,
                    node: child_idx,
                });
            }
            rank_has_active.push(has_active);
            ranks.push(RawForkRank {
                index: rank_index,
                delay: sr.delay,
                mode: sr.mode,
                members,
            });
        }
    }

    (ranks, jobs, logs, rank_has_active)
}

/// Breadth-first discovery from the called extension. Duplicate detection
/// and tree-path assignment happen synchronously, in store order, so the
/// result is deterministic regardless of how store-fetch futures actually
/// complete.
#[tracing::instrument(skip(ctx, store, cfg), fields(call_id = %ctx.call_id))]
pub async fn build_tree(
    ctx: &mut CallContext,
    store: &dyn StoreGateway,
    cfg: &TreeBuilderConfig,
) -> Result<RoutingTreeNode, RouteError> {
    let mut arena: Vec<Option<RawNode>> = Vec::new();
    let mut first_seen_path: HashMap<i64, String> = HashMap::new();

    let root_index = arena.len();
    arena.push(None);
    first_seen_path.insert(ctx.called_extension_id, "1".to_string());
    ctx.mark_seen(ctx.called_extension_id);

    let mut current_layer: VecDeque<PendingJob> = VecDeque::new();
    current_layer.push_back(PendingJob {
        arena_index: root_index,
        extension_id: ctx.called_extension_id,
        tree_path: "1".to_string(),
        forward_depth: 0,
        terminal_only: false,
        note: None,
    });

    while !current_layer.is_empty() {
        let jobs: Vec<PendingJob> = current_layer.into_iter().collect();
        current_layer = VecDeque::new();

        let loaded = try_join_all(jobs.iter().map(|j| store.load_extension_by_id(j.extension_id)))
            .await
            .map_err(|e| RouteError::store_unavailable(e.to_string()))?;

        let needs_ranks: Vec<usize> = jobs
            .iter()
            .zip(loaded.iter())
            .enumerate()
            .filter_map(|(pos, (job, ext))| match ext {
                Some(ext) if !job.terminal_only && ext.kind.expands() && !ext.is_immediate_forward() => {
                    Some(pos)
                }
                _ => None,
            })
            .collect();

        let rank_loads = try_join_all(
            needs_ranks
                .iter()
                .map(|&pos| store.load_fork_ranks_for(jobs[pos].extension_id)),
        )
        .await
        .map_err(|e| RouteError::store_unavailable(e.to_string()))?;

        let mut ranks_by_pos: HashMap<usize, Vec<ForkRank>> = HashMap::new();
        for (&pos, ranks) in needs_ranks.iter().zip(rank_loads.into_iter()) {
            ranks_by_pos.insert(pos, ranks);
        }

        for (pos, (job, ext_opt)) in jobs.into_iter().zip(loaded.into_iter()).enumerate() {
            let is_root = job.arena_index == root_index;

            let Some(ext) = ext_opt else {
                if is_root {
                    return Err(RouteError::no_route(format!(
                        "extension {} not found",
                        job.extension_id
                    )));
                }
                arena[job.arena_index] = Some(not_found_placeholder(
                    job.extension_id,
                    job.tree_path,
                    format!("referenced extension {} not found in store", job.extension_id),
                ));
                continue;
            };

            if job.terminal_only {
                let mut logs = Vec::new();
                if let Some(entry) = job.note {
                    logs.push(entry);
                }
                arena[job.arena_index] = Some(RawNode {
                    extension: ext,
                    tree_path: job.tree_path,
                    status: DiscoveryStatus::Inactive,
                    logs,
                    children: RawChildren::Leaf,
                    conditional_forward: None,
                });
                continue;
            }

            let intent = expansion_intent(&ext);
            let store_ranks = ranks_by_pos.remove(&pos);

            match intent {
                ExpansionIntent::ImmediateForward => {
                    let Some(target_id) = ext.forward_target_id else {
                        arena[job.arena_index] = Some(RawNode {
                            extension: ext,
                            tree_path: job.tree_path,
                            status: DiscoveryStatus::Active,
                            logs: vec![DiscoveryLogEntry::warn(
                                "forward enabled with no target, treated as leaf",
                                None,
                            )],
                            children: RawChildren::Leaf,
                            conditional_forward: None,
                        });
                        continue;
                    };
                    if job.forward_depth + 1 > cfg.forward_depth_limit {
                        return Err(RouteError::forward_loop(format!(
                            "forward chain exceeds depth limit of {} at {}",
                            cfg.forward_depth_limit, job.tree_path
                        )));
                    }
                    let child_path = format!("{}-fwd", job.tree_path);
                    let mut node_logs = Vec::new();
                    let children = if ctx.has_seen(target_id) {
                        let earlier = first_seen_path.get(&target_id).cloned();
                        node_logs.push(DiscoveryLogEntry::warn(
                            format!("forward target {target_id} already active on this call"),
                            earlier,
                        ));
                        RawChildren::Leaf
                    } else {
                        ctx.mark_seen(target_id);
                        first_seen_path.insert(target_id, child_path.clone());
                        let child_idx = arena.len();
                        arena.push(None);
                        current_layer.push_back(PendingJob {
                            arena_index: child_idx,
                            extension_id: target_id,
                            tree_path: child_path,
                            forward_depth: job.forward_depth + 1,
                            terminal_only: false,
                            note: None,
                        });
                        RawChildren::Forward(child_idx)
                    };
                    arena[job.arena_index] = Some(RawNode {
                        extension: ext,
                        tree_path: job.tree_path,
                        status: DiscoveryStatus::Active,
                        logs: node_logs,
                        children,
                        conditional_forward: None,
                    });
                }
                ExpansionIntent::DelayedForward => {
                    let (mut ranks, jobs_out, mut logs, mut rank_has_active) = build_own_ranks(
                        &ext,
                        &job.tree_path,
                        store_ranks,
                        ctx,
                        &mut first_seen_path,
                        &mut arena,
                    );
                    current_layer.extend(jobs_out);

                    if let Some(target_id) = ext.forward_target_id {
                        let rank_index = ranks.len() as i32;
                        let member_path = format!("{}-fr{rank_index}-0", job.tree_path);
                        let child_idx = arena.len();
                        arena.push(None);
                        if job.forward_depth + 1 > cfg.forward_depth_limit {
                            return Err(RouteError::forward_loop(format!(
                                "forward chain exceeds depth limit of {} at {}",
                                cfg.forward_depth_limit, job.tree_path
                            )));
                        }
                        let synthetic_active = if ctx.has_seen(target_id) {
                            let earlier = first_seen_path.get(&target_id).cloned();
                            logs.push(DiscoveryLogEntry::warn(
                                format!("delayed forward target {target_id} already active"),
                                earlier.clone(),
                            ));
                            arena[child_idx] = Some(RawNode {
                                extension: ext.clone(),
                                tree_path: member_path.clone(),
                                status: DiscoveryStatus::Inactive,
                                logs: vec![DiscoveryLogEntry::warn(
                                    "already present on an active path in this call",
                                    earlier,
                                )],
                                children: RawChildren::Leaf,
                                conditional_forward: None,
                            });
                            false
                        } else {
                            ctx.mark_seen(target_id);
                            first_seen_path.insert(target_id, member_path.clone());
                            current_layer.push_back(PendingJob {
                                arena_index: child_idx,
                                extension_id: target_id,
                                tree_path: member_path,
                                forward_depth: job.forward_depth + 1,
                                terminal_only: false,
                                note: None,
                            });
                            true
                        };
                        ranks.push(RawForkRank {
                            index: rank_index,
                            delay: ext.forwarding_delay,
                            mode: RankMode::Next,
                            members: vec![RawForkMember {
                                kind: MemberKind::Default,
                                node: child_idx,
                            }],
                        });
                        rank_has_active.push(synthetic_active);
                    }

                    let status = if rank_has_active.iter().all(|&a| !a) {
                        if is_root {
                            return Err(RouteError::no_route(
                                "all ranks empty after discovery".to_string(),
                            ));
                        }
                        logs.push(DiscoveryLogEntry::warn("dead inner: all ranks empty", None));
                        DiscoveryStatus::Inactive
                    } else {
                        DiscoveryStatus::Active
                    };

                    arena[job.arena_index] = Some(RawNode {
                        extension: ext,
                        tree_path: job.tree_path,
                        status,
                        logs,
                        children: RawChildren::Forks(ranks),
                        conditional_forward: None,
                    });
                }
                ExpansionIntent::Conditional(kind) => {
                    if !ext.kind.expands() {
                        arena[job.arena_index] = Some(RawNode {
                            extension: ext.clone(),
                            tree_path: job.tree_path,
                            status: DiscoveryStatus::Active,
                            logs: Vec::new(),
                            children: RawChildren::Leaf,
                            conditional_forward: ext
                                .forward_target_id
                                .map(|target_extension_id| ConditionalForward {
                                    kind,
                                    target_extension_id,
                                }),
                        });
                        continue;
                    }
                    let (ranks, jobs_out, logs, _rank_has_active) = build_own_ranks(
                        &ext,
                        &job.tree_path,
                        store_ranks,
                        ctx,
                        &mut first_seen_path,
                        &mut arena,
                    );
                    current_layer.extend(jobs_out);
                    let conditional_forward =
                        ext.forward_target_id.map(|target_extension_id| ConditionalForward {
                            kind,
                            target_extension_id,
                        });
                    arena[job.arena_index] = Some(RawNode {
                        extension: ext,
                        tree_path: job.tree_path,
                        status: DiscoveryStatus::Active,
                        logs,
                        children: RawChildren::Forks(ranks),
                        conditional_forward,
                    });
                }
                ExpansionIntent::Normal => {
                    if !ext.kind.expands() {
                        arena[job.arena_index] = Some(RawNode {
                            extension: ext,
                            tree_path: job.tree_path,
                            status: DiscoveryStatus::Active,
                            logs: Vec::new(),
                            children: RawChildren::Leaf,
                            conditional_forward: None,
                        });
                        continue;
                    }
                    let (ranks, jobs_out, mut logs, rank_has_active) = build_own_ranks(
                        &ext,
                        &job.tree_path,
                        store_ranks,
                        ctx,
                        &mut first_seen_path,
                        &mut arena,
                    );
                    current_layer.extend(jobs_out);

                    let dead = rank_has_active.iter().all(|&a| !a);
                    let status = if dead {
                        if is_root {
                            return Err(RouteError::no_route(
                                "all ranks empty after discovery".to_string(),
                            ));
                        }
                        logs.push(DiscoveryLogEntry::warn("dead inner: all ranks empty", None));
                        DiscoveryStatus::Inactive
                    } else {
                        DiscoveryStatus::Active
                    };

                    arena[job.arena_index] = Some(RawNode {
                        extension: ext,
                        tree_path: job.tree_path,
                        status,
                        logs,
                        children: RawChildren::Forks(ranks),
                        conditional_forward: None,
                    });
                }
            }
        }
    }

    Ok(finalize(arena, root_index))
}

fn finalize(mut arena: Vec<Option<RawNode>>, root: usize) -> RoutingTreeNode {
    fn build(arena: &mut [Option<RawNode>], idx: usize) -> RoutingTreeNode {
        let raw = arena[idx]
            .take()
            .expect("each arena slot is finalized exactly once and visited exactly once");
        let children = match raw.children {
            RawChildren::Leaf => NodeChildren::Leaf,
            RawChildren::Forward(child_idx) => {
                NodeChildren::Forward(Box::new(build(arena, child_idx)))
            }
            RawChildren::Forks(ranks) => NodeChildren::Forks(
                ranks
                    .into_iter()
                    .map(|r| TreeForkRank {
                        index: r.index,
                        delay: r.delay,
                        mode: r.mode,
                        members: r
                            .members
                            .into_iter()
                            .map(|m| TreeForkMember {
                                kind: m.kind,
                                node: build(arena, m.node),
                            })
                            .collect(),
                    })
                    .collect(),
            ),
        };
        RoutingTreeNode {
            extension: raw.extension,
            tree_path: raw.tree_path,
            status: raw.status,
            logs: raw.logs,
            children,
            conditional_forward: raw.conditional_forward,
        }
    }
    build(&mut arena, root)
}
