//! Static delay propagation over the levelized timing graph.
//!
//! Arrival times move forward in level-synchronous waves: every node at
//! forward level `k` is evaluated in parallel, then a barrier, then level
//! `k+1`. Required times propagate backward the same way. Registers reset
//! arrival to zero at their output and anchor required times at the clock
//! period.

use crate::graph::TimingGraph;
use crate::ids::TimingNodeId;
use rayon::prelude::*;

/// Propagates the latest arrival time to every node's output.
///
/// `arrival(n) = max over in-edges (arrival(src) + delay) + inner_delay(n)`
/// for combinational nodes; register nodes stay at 0. The slowest
/// predecessor of each node is recorded for longest-path backtraces.
pub fn propagate_arrival_time(graph: &mut TimingGraph) {
    for node in &mut graph.nodes {
        node.latest_arrival = 0.0;
        node.slowest_predecessor = None;
    }

    let level_count = graph.forward_levels.len();
    for level in 0..level_count {
        let bucket = std::mem::take(&mut graph.forward_levels[level]);
        let updates: Vec<(TimingNodeId, f64, Option<TimingNodeId>)> = bucket
            .par_iter()
            .filter_map(|&id| {
                let node = &graph.nodes[id.as_raw() as usize];
                if node.is_register {
                    return None;
                }
                let mut worst = 0.0_f64;
                let mut slowest = None;
                for &e in &node.in_edges {
                    let edge = &graph.edges[e.as_raw() as usize];
                    let src = &graph.nodes[edge.from.as_raw() as usize];
                    let candidate = src.latest_arrival + edge.delay;
                    if candidate > worst {
                        worst = candidate;
                        slowest = Some(edge.from);
                    }
                }
                Some((id, worst + node.inner_delay, slowest))
            })
            .collect();
        graph.forward_levels[level] = bucket;

        for (id, arrival, slowest) in updates {
            let node = &mut graph.nodes[id.as_raw() as usize];
            node.latest_arrival = arrival;
            node.slowest_predecessor = slowest;
        }
    }
}

/// Propagates the required arrival time backward from the clock period.
///
/// `required(n) = min over out-edges (required(sink) - delay) - inner_delay(n)`
/// for combinational nodes with fanout; endpoints and registers anchor at
/// the clock period. The earliest successor of each node is recorded.
pub fn back_propagate_required_arrival_time(graph: &mut TimingGraph) {
    let period = graph.clock_period;
    for node in &mut graph.nodes {
        node.required_arrival = period;
        node.earliest_successor = None;
    }

    let level_count = graph.forward_levels.len();
    for level in (0..level_count).rev() {
        let bucket = std::mem::take(&mut graph.forward_levels[level]);
        let updates: Vec<(TimingNodeId, f64, Option<TimingNodeId>)> = bucket
            .par_iter()
            .filter_map(|&id| {
                let node = &graph.nodes[id.as_raw() as usize];
                if node.is_register || node.out_edges.is_empty() {
                    return None;
                }
                let mut tightest = f64::INFINITY;
                let mut earliest = None;
                for &e in &node.out_edges {
                    let edge = &graph.edges[e.as_raw() as usize];
                    let sink = &graph.nodes[edge.to.as_raw() as usize];
                    let candidate = sink.required_arrival - edge.delay;
                    if candidate < tightest {
                        tightest = candidate;
                        earliest = Some(edge.to);
                    }
                }
                Some((id, tightest - node.inner_delay, earliest))
            })
            .collect();
        graph.forward_levels[level] = bucket;

        for (id, required, earliest) in updates {
            let node = &mut graph.nodes[id.as_raw() as usize];
            node.required_arrival = required;
            node.earliest_successor = earliest;
        }
    }
}

/// Backtraces the longest-delay path ending at `node` by following
/// recorded slowest predecessors. The result starts at the path origin.
pub fn back_trace_delay_longest_path_from_node(
    graph: &TimingGraph,
    node: TimingNodeId,
) -> Vec<TimingNodeId> {
    let mut path = vec![node];
    let mut current = node;
    while let Some(pred) = graph.nodes[current.as_raw() as usize].slowest_predecessor {
        path.push(pred);
        current = pred;
    }
    path.reverse();
    path
}

/// Walks backward from `node` along the deepest predecessors until a
/// register or source is reached. The result starts at the path origin.
pub fn trace_back_from_node(graph: &TimingGraph, node: TimingNodeId) -> Vec<TimingNodeId> {
    let mut path = vec![node];
    let mut current = node;
    loop {
        let n = &graph.nodes[current.as_raw() as usize];
        if n.is_register || n.forward_level <= 0 {
            break;
        }
        let mut best: Option<TimingNodeId> = None;
        let mut best_level = -1;
        for &e in &n.in_edges {
            let from = graph.edges[e.as_raw() as usize].from;
            let src = &graph.nodes[from.as_raw() as usize];
            if !src.is_register && src.forward_level > best_level {
                best_level = src.forward_level;
                best = Some(from);
            }
        }
        match best {
            Some(pred) => {
                path.push(pred);
                current = pred;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Walks forward from `node` along the deepest successors until a
/// register or endpoint is reached.
pub fn trace_forward_from_node(graph: &TimingGraph, node: TimingNodeId) -> Vec<TimingNodeId> {
    let mut path = vec![node];
    let mut current = node;
    loop {
        let n = &graph.nodes[current.as_raw() as usize];
        if n.is_register || n.backward_level <= 0 {
            break;
        }
        let mut best: Option<TimingNodeId> = None;
        let mut best_level = -1;
        for &e in &n.out_edges {
            let to = graph.edges[e.as_raw() as usize].to;
            let sink = &graph.nodes[to.as_raw() as usize];
            if !sink.is_register && sink.backward_level > best_level {
                best_level = sink.backward_level;
                best = Some(to);
            }
        }
        match best {
            Some(succ) => {
                path.push(succ);
                current = succ;
            }
            None => break,
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levelize::{backward_levelization, forward_levelization, set_longest_path_length};
    use atoll_diagnostics::DiagnosticSink;
    use atoll_netlist::{CellKind, Netlist, PinDirection};

    fn chain_graph(n: usize, edge_delay: f64) -> (Netlist, TimingGraph) {
        let mut nl = Netlist::new();
        let r0 = nl.add_cell("r0", CellKind::Ff);
        let mut prev = r0;
        for i in 0..n {
            let c = nl.add_cell(format!("c{i}"), CellKind::Lut { inputs: 4 });
            let net = nl.add_net(format!("n{i}"));
            nl.add_pin(prev, "O", PinDirection::Output, Some(net));
            nl.add_pin(c, "I", PinDirection::Input, Some(net));
            prev = c;
        }
        let r1 = nl.add_cell("r1", CellKind::Ff);
        let net = nl.add_net("n_last");
        nl.add_pin(prev, "O", PinDirection::Output, Some(net));
        nl.add_pin(r1, "D", PinDirection::Input, Some(net));

        let mut g = TimingGraph::build_simple_timing_graph(&nl);
        let sink = DiagnosticSink::new();
        forward_levelization(&mut g, &nl, &sink).unwrap();
        backward_levelization(&mut g, &nl, &sink).unwrap();
        set_longest_path_length(&mut g);
        for edge in &mut g.edges {
            edge.delay = edge_delay;
        }
        (nl, g)
    }

    #[test]
    fn arrival_accumulates_along_chain() {
        let (nl, mut g) = chain_graph(3, 1.0);
        propagate_arrival_time(&mut g);
        // c0: register arrival 0 + edge 1.0 + inner 0.1
        let c0 = g.node(g.node_of_cell(nl.cell_by_name["c0"]).unwrap());
        assert!((c0.latest_arrival - 1.1).abs() < 1e-12);
        let c2 = g.node(g.node_of_cell(nl.cell_by_name["c2"]).unwrap());
        assert!((c2.latest_arrival - 3.3).abs() < 1e-12);
    }

    #[test]
    fn arrival_edge_consistency() {
        let (_nl, mut g) = chain_graph(4, 0.7);
        propagate_arrival_time(&mut g);
        for edge in &g.edges {
            let src = &g.nodes[edge.from.as_raw() as usize];
            let sink = &g.nodes[edge.to.as_raw() as usize];
            if sink.is_register {
                continue;
            }
            assert!(sink.latest_arrival >= src.latest_arrival + edge.delay - 1e-12);
        }
    }

    #[test]
    fn required_edge_consistency() {
        let (_nl, mut g) = chain_graph(4, 0.7);
        propagate_arrival_time(&mut g);
        back_propagate_required_arrival_time(&mut g);
        for edge in &g.edges {
            let src = &g.nodes[edge.from.as_raw() as usize];
            let sink = &g.nodes[edge.to.as_raw() as usize];
            if src.is_register {
                continue;
            }
            assert!(
                src.required_arrival <= sink.required_arrival - edge.delay - src.inner_delay
                    + 1e-12
            );
        }
    }

    #[test]
    fn registers_reset_arrival() {
        let (nl, mut g) = chain_graph(3, 1.0);
        propagate_arrival_time(&mut g);
        let r1 = g.node(g.node_of_cell(nl.cell_by_name["r1"]).unwrap());
        assert_eq!(r1.latest_arrival, 0.0);
    }

    #[test]
    fn backtrace_recovers_chain() {
        let (nl, mut g) = chain_graph(3, 1.0);
        propagate_arrival_time(&mut g);
        let end = g.node_of_cell(nl.cell_by_name["c2"]).unwrap();
        let path = back_trace_delay_longest_path_from_node(&g, end);
        let names: Vec<&str> = path
            .iter()
            .map(|&id| nl.cell(g.node(id).cell).name.as_str())
            .collect();
        assert_eq!(names, vec!["r0", "c0", "c1", "c2"]);
    }

    #[test]
    fn earliest_successor_recorded() {
        let (nl, mut g) = chain_graph(2, 1.0);
        propagate_arrival_time(&mut g);
        back_propagate_required_arrival_time(&mut g);
        let c0 = g.node(g.node_of_cell(nl.cell_by_name["c0"]).unwrap());
        let c1_id = g.node_of_cell(nl.cell_by_name["c1"]).unwrap();
        assert_eq!(c0.earliest_successor, Some(c1_id));
    }

    #[test]
    fn level_traces_walk_between_registers() {
        let (nl, g) = chain_graph(4, 0.0);
        let mid = g.node_of_cell(nl.cell_by_name["c2"]).unwrap();
        let back = trace_back_from_node(&g, mid);
        assert_eq!(g.node(back[0]).forward_level, 0);
        let fwd = trace_forward_from_node(&g, mid);
        assert_eq!(g.node(*fwd.last().unwrap()).backward_level, 0);
    }

    #[test]
    fn empty_graph_propagates() {
        let nl = Netlist::new();
        let mut g = TimingGraph::build_simple_timing_graph(&nl);
        propagate_arrival_time(&mut g);
        back_propagate_required_arrival_time(&mut g);
        assert_eq!(g.node_count(), 0);
    }
}
