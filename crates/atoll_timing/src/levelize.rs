//! Forward/backward levelization of the timing graph.
//!
//! Levels count hops, not delay: a node's forward level is the longest
//! combinational hop distance from any register output (or primary
//! source), its backward level the symmetric distance to a register
//! input. Registers sit at level 0 on both sides and terminate
//! propagation. A combinational loop makes levelization impossible and is
//! reported as a design error with every cell on the loop named.

use crate::graph::TimingGraph;
use crate::ids::TimingNodeId;
use atoll_common::{AbortError, AtollResult};
use atoll_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Stage};
use atoll_netlist::Netlist;
use std::collections::VecDeque;

/// Propagates forward levels from register outputs.
///
/// Fails when a combinational loop prevents levelization; the offending
/// cells are reported through `sink` before the error returns.
pub fn forward_levelization(
    graph: &mut TimingGraph,
    netlist: &Netlist,
    sink: &DiagnosticSink,
) -> AtollResult<()> {
    let n = graph.nodes.len();
    for node in &mut graph.nodes {
        node.forward_level = if node.is_register { 0 } else { -1 };
    }

    // In-degree over combinational-to-combinational edges only: register
    // predecessors are level sources and contribute the baseline 0.
    let mut degree = vec![0usize; n];
    for edge in &graph.edges {
        if !graph.nodes[edge.from.as_raw() as usize].is_register
            && !graph.nodes[edge.to.as_raw() as usize].is_register
        {
            degree[edge.to.as_raw() as usize] += 1;
        }
    }

    let mut queue: VecDeque<TimingNodeId> = VecDeque::new();
    for node in &mut graph.nodes {
        if !node.is_register && degree[node.id.as_raw() as usize] == 0 {
            node.forward_level = 0;
            queue.push_back(node.id);
        }
    }

    let mut processed = 0usize;
    while let Some(id) = queue.pop_front() {
        processed += 1;
        let level = graph.nodes[id.as_raw() as usize].forward_level;
        let out_edges = graph.nodes[id.as_raw() as usize].out_edges.clone();
        for e in out_edges {
            let to = graph.edges[e.as_raw() as usize].to;
            let to_idx = to.as_raw() as usize;
            if graph.nodes[to_idx].is_register {
                continue;
            }
            if level + 1 > graph.nodes[to_idx].forward_level {
                graph.nodes[to_idx].forward_level = level + 1;
            }
            degree[to_idx] -= 1;
            if degree[to_idx] == 0 {
                queue.push_back(to);
            }
        }
    }

    let combinational = graph.nodes.iter().filter(|n| !n.is_register).count();
    if processed < combinational {
        report_loop(graph, netlist, &degree, sink);
        return Err(AbortError::in_stage(
            "forward levelization",
            "combinational loop in the design",
        ));
    }

    graph.forward_levels = bucket_by(graph, |node| node.forward_level);
    graph.sort_in_edges_by_forward_level();
    Ok(())
}

/// Propagates backward levels from register inputs; symmetric to
/// [`forward_levelization`].
pub fn backward_levelization(
    graph: &mut TimingGraph,
    netlist: &Netlist,
    sink: &DiagnosticSink,
) -> AtollResult<()> {
    let n = graph.nodes.len();
    for node in &mut graph.nodes {
        node.backward_level = if node.is_register { 0 } else { -1 };
    }

    let mut degree = vec![0usize; n];
    for edge in &graph.edges {
        if !graph.nodes[edge.from.as_raw() as usize].is_register
            && !graph.nodes[edge.to.as_raw() as usize].is_register
        {
            degree[edge.from.as_raw() as usize] += 1;
        }
    }

    let mut queue: VecDeque<TimingNodeId> = VecDeque::new();
    for node in &mut graph.nodes {
        if !node.is_register && degree[node.id.as_raw() as usize] == 0 {
            node.backward_level = 0;
            queue.push_back(node.id);
        }
    }

    let mut processed = 0usize;
    while let Some(id) = queue.pop_front() {
        processed += 1;
        let level = graph.nodes[id.as_raw() as usize].backward_level;
        let in_edges = graph.nodes[id.as_raw() as usize].in_edges.clone();
        for e in in_edges {
            let from = graph.edges[e.as_raw() as usize].from;
            let from_idx = from.as_raw() as usize;
            if graph.nodes[from_idx].is_register {
                continue;
            }
            if level + 1 > graph.nodes[from_idx].backward_level {
                graph.nodes[from_idx].backward_level = level + 1;
            }
            degree[from_idx] -= 1;
            if degree[from_idx] == 0 {
                queue.push_back(from);
            }
        }
    }

    let combinational = graph.nodes.iter().filter(|n| !n.is_register).count();
    if processed < combinational {
        report_loop(graph, netlist, &degree, sink);
        return Err(AbortError::in_stage(
            "backward levelization",
            "combinational loop in the design",
        ));
    }

    graph.backward_levels = bucket_by(graph, |node| node.backward_level);
    graph.sort_out_edges_by_backward_level();
    Ok(())
}

/// Computes each node's longest path length, the globally sorted node
/// list, and the long/medium path thresholds.
///
/// Requires both levelizations to have run: for every node,
/// `longest_path_length = forward_level + backward_level + 1`.
pub fn set_longest_path_length(graph: &mut TimingGraph) {
    for node in &mut graph.nodes {
        node.longest_path_length = if node.forward_level >= 0 && node.backward_level >= 0 {
            node.forward_level + node.backward_level + 1
        } else {
            -1
        };
    }

    let mut sorted: Vec<TimingNodeId> = graph.nodes.iter().map(|n| n.id).collect();
    sorted.sort_by(|&a, &b| {
        let na = &graph.nodes[a.as_raw() as usize];
        let nb = &graph.nodes[b.as_raw() as usize];
        nb.longest_path_length
            .cmp(&na.longest_path_length)
            .then(na.forward_level.cmp(&nb.forward_level))
    });

    graph.long_path_threshold = quantile_threshold(graph, &sorted, graph.long_path_thr_ratio);
    graph.medium_path_threshold = quantile_threshold(graph, &sorted, graph.medium_path_thr_ratio);
    graph.path_len_sorted = sorted;
}

fn quantile_threshold(graph: &TimingGraph, sorted_desc: &[TimingNodeId], ratio: f64) -> i32 {
    if sorted_desc.is_empty() {
        return 1;
    }
    let idx = (((1.0 - ratio) * sorted_desc.len() as f64) as usize).min(sorted_desc.len() - 1);
    graph.nodes[sorted_desc[idx].as_raw() as usize]
        .longest_path_length
        .max(1)
}

fn bucket_by(graph: &TimingGraph, level: impl Fn(&crate::graph::TimingNode) -> i32) -> Vec<Vec<TimingNodeId>> {
    let max_level = graph.nodes.iter().map(&level).max().unwrap_or(-1);
    let mut buckets = vec![Vec::new(); (max_level + 1).max(0) as usize];
    for node in &graph.nodes {
        let l = level(node);
        if l >= 0 {
            buckets[l as usize].push(node.id);
        }
    }
    buckets
}

fn report_loop(
    graph: &TimingGraph,
    netlist: &Netlist,
    remaining_degree: &[usize],
    sink: &DiagnosticSink,
) {
    for (idx, &deg) in remaining_degree.iter().enumerate() {
        if deg == 0 || graph.nodes[idx].is_register {
            continue;
        }
        if let Some(cycle) = graph.find_loop_from_node(TimingNodeId::from_raw(idx as u32)) {
            let mut diag = Diagnostic::error(
                DiagnosticCode::new(Stage::Timing, 1),
                format!("combinational loop through {} cells", cycle.len()),
            );
            for id in cycle {
                let cell = graph.nodes[id.as_raw() as usize].cell;
                diag = diag.with_note(netlist.cell(cell).name.clone());
            }
            sink.emit(diag);
            return;
        }
    }
    // Could not isolate a single cycle; name the stuck cells instead.
    let mut diag = Diagnostic::error(
        DiagnosticCode::new(Stage::Timing, 1),
        "combinational loop detected",
    );
    for (idx, &deg) in remaining_degree.iter().enumerate() {
        if deg > 0 && !graph.nodes[idx].is_register {
            diag = diag.with_note(netlist.cell(graph.nodes[idx].cell).name.clone());
        }
    }
    sink.emit(diag);
}
