//! Flattens a `RoutingResult` into the key=value line format the control
//! channel speaks. The literal key names are engine-specific and
//! not fixed by any external protocol; this is one consistent choice,
//! used symmetrically by the encoder and the test round-trip below.

use switchboard_types::{ForkTarget, ParamMap, RoutingResult};

/// Appends `key=value` lines describing `result` to `out`, in the format the
/// control-channel reply uses after `retValue=<target>`.
pub fn encode_result(result: &RoutingResult, out: &mut Vec<String>) {
    match result {
        RoutingResult::Terminal { target, params } => {
            out.push(format!("retValue={target}"));
            encode_params(params, "param", out);
        }
        RoutingResult::Fork { target, fork_targets } => {
            out.push(format!("retValue={target}"));
            out.push(format!("fork.count={}", fork_targets.len()));
            for (i, entry) in fork_targets.iter().enumerate() {
                match entry {
                    ForkTarget::RankSeparator(sep) => {
                        out.push(format!("fork.{i}.kind=rank"));
                        out.push(format!("fork.{i}.rank_index={}", sep.rank_index));
                        out.push(format!("fork.{i}.mode={}", sep.mode.to_db_str()));
                        if let Some(delay) = sep.delay {
                            out.push(format!("fork.{i}.delay={delay}"));
                        }
                    }
                    ForkTarget::Child { target, params } => {
                        out.push(format!("fork.{i}.kind=child"));
                        out.push(format!("fork.{i}.target={target}"));
                        encode_params(params, &format!("fork.{i}.param"), out);
                    }
                }
            }
        }
    }
}

fn encode_params(params: &ParamMap, prefix: &str, out: &mut Vec<String>) {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    for key in keys {
        out.push(format!("{prefix}.{key}={}", params[key]));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use switchboard_types::{RankSeparator, RankMode};

    use super::*;

    #[test]
    fn encodes_terminal_result() {
        let mut params = HashMap::new();
        params.insert("stage2".to_string(), "1".to_string());
        let result = RoutingResult::Terminal {
            target: "lateroute/1002".to_string(),
            params,
        };
        let mut lines = Vec::new();
        encode_result(&result, &mut lines);
        assert_eq!(lines, vec!["retValue=lateroute/1002", "param.stage2=1"]);
    }

    #[test]
    fn encodes_fork_result_with_rank_separator() {
        let result = RoutingResult::Fork {
            target: "lateroute/stage1-abc-1".to_string(),
            fork_targets: vec![
                ForkTarget::RankSeparator(RankSeparator {
                    rank_index: 0,
                    mode: RankMode::Default,
                    delay: None,
                }),
                ForkTarget::Child {
                    target: "lateroute/1002".to_string(),
                    params: HashMap::new(),
                },
            ],
        };
        let mut lines = Vec::new();
        encode_result(&result, &mut lines);
        assert_eq!(
            lines,
            vec![
                "retValue=lateroute/stage1-abc-1",
                "fork.count=2",
                "fork.0.kind=rank",
                "fork.0.rank_index=0",
                "fork.0.mode=DEFAULT",
                "fork.1.kind=child",
                "fork.1.target=lateroute/1002",
            ]
        );
    }
}
