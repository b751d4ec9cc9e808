//! Timing graph data structures.
//!
//! The [`TimingGraph`] is a directed per-cell graph: one node per
//! non-virtual design cell, one edge per driver-to-sink pin pair of every
//! net. Sequential cells are register nodes and terminate level and delay
//! propagation. Nodes and edges are owned exclusively by the graph; all
//! external references are `(graph, id)` pairs.

use crate::ids::{TimingEdgeId, TimingNodeId};
use atoll_netlist::{CellId, NetId, Netlist, PinId};
use serde::{Deserialize, Serialize};

/// A node in the timing graph, standing for one design cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingNode {
    /// The unique ID of this node.
    pub id: TimingNodeId,
    /// The design cell this node stands for.
    pub cell: CellId,
    /// Register nodes terminate level and arrival propagation.
    pub is_register: bool,
    /// Hop distance to the farthest predecessor register (`-1` = unset).
    pub forward_level: i32,
    /// Hop distance to the farthest successor register (`-1` = unset).
    pub backward_level: i32,
    /// Length of the longest register-to-register path through this node
    /// (`-1` until both levels are set).
    pub longest_path_length: i32,
    /// Latest arrival time at this node's output, in ns.
    pub latest_arrival: f64,
    /// Required arrival time at this node's output, in ns.
    pub required_arrival: f64,
    /// Internal cell delay charged when a signal passes this node, in ns.
    pub inner_delay: f64,
    /// The predecessor on the longest-delay path into this node.
    pub slowest_predecessor: Option<TimingNodeId>,
    /// The successor with the tightest required time from this node.
    pub earliest_successor: Option<TimingNodeId>,
    /// Incoming edges.
    pub in_edges: Vec<TimingEdgeId>,
    /// Outgoing edges.
    pub out_edges: Vec<TimingEdgeId>,
}

/// A directed point-to-point edge of the timing graph.
///
/// Every edge is bound to a source and a sink pin so the delay model can
/// evaluate placed pin locations directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingEdge {
    /// The unique ID of this edge.
    pub id: TimingEdgeId,
    /// The source node.
    pub from: TimingNodeId,
    /// The sink node.
    pub to: TimingNodeId,
    /// The driving pin on the source cell.
    pub src_pin: PinId,
    /// The receiving pin on the sink cell.
    pub sink_pin: PinId,
    /// The net this edge was derived from.
    pub net: Option<NetId>,
    /// Propagation delay along this edge, in ns.
    pub delay: f64,
}

/// The per-cell timing graph with its derived level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingGraph {
    /// All nodes.
    pub nodes: Vec<TimingNode>,
    /// All edges.
    pub edges: Vec<TimingEdge>,
    /// Dense map from cell ID to node (virtual cells have no node).
    pub cell_to_node: Vec<Option<TimingNodeId>>,
    /// Nodes sorted by `(longest_path_length desc, forward_level asc)`.
    pub path_len_sorted: Vec<TimingNodeId>,
    /// Node buckets per forward level.
    pub forward_levels: Vec<Vec<TimingNodeId>>,
    /// Node buckets per backward level.
    pub backward_levels: Vec<Vec<TimingNodeId>>,
    /// Path length at the long-path quantile.
    pub long_path_threshold: i32,
    /// Path length at the medium-path quantile.
    pub medium_path_threshold: i32,
    /// Quantile for the long-path threshold.
    pub long_path_thr_ratio: f64,
    /// Quantile for the medium-path threshold.
    pub medium_path_thr_ratio: f64,
    /// Single-clock period in ns, the default required arrival time.
    pub clock_period: f64,
}

/// Default internal cell delay in ns.
pub const DEFAULT_INNER_DELAY: f64 = 0.1;

/// Default single-clock period in ns.
pub const DEFAULT_CLOCK_PERIOD: f64 = 10.0;

impl TimingGraph {
    /// Builds the simple timing graph of a design: one node per
    /// non-virtual cell, one edge from each net's driver cell to each of
    /// its sink cells. Self-arcs are not timing arcs and are skipped.
    pub fn build_simple_timing_graph(netlist: &Netlist) -> Self {
        let mut graph = Self {
            long_path_thr_ratio: 0.95,
            medium_path_thr_ratio: 0.8,
            clock_period: DEFAULT_CLOCK_PERIOD,
            cell_to_node: vec![None; netlist.cell_count()],
            ..Self::default()
        };

        for cell in &netlist.cells {
            if cell.is_virtual {
                continue;
            }
            let id = TimingNodeId::from_raw(graph.nodes.len() as u32);
            graph.cell_to_node[cell.id.as_raw() as usize] = Some(id);
            graph.nodes.push(TimingNode {
                id,
                cell: cell.id,
                is_register: cell.kind.is_sequential(),
                forward_level: -1,
                backward_level: -1,
                longest_path_length: -1,
                latest_arrival: 0.0,
                required_arrival: DEFAULT_CLOCK_PERIOD,
                inner_delay: DEFAULT_INNER_DELAY,
                slowest_predecessor: None,
                earliest_successor: None,
                in_edges: Vec::new(),
                out_edges: Vec::new(),
            });
        }

        for net in &netlist.nets {
            let Some(driver) = net.driver else { continue };
            let src_cell = netlist.pin(driver).cell;
            let Some(src) = graph.cell_to_node[src_cell.as_raw() as usize] else {
                continue;
            };
            for &sink_pin in &net.sinks {
                let sink_cell = netlist.pin(sink_pin).cell;
                let Some(dst) = graph.cell_to_node[sink_cell.as_raw() as usize] else {
                    continue;
                };
                if src == dst {
                    continue;
                }
                graph.add_edge_between(src, dst, driver, sink_pin, Some(net.id), 0.0);
            }
        }
        graph
    }

    /// Adds a directed edge and wires it into both endpoint nodes.
    pub fn add_edge_between(
        &mut self,
        from: TimingNodeId,
        to: TimingNodeId,
        src_pin: PinId,
        sink_pin: PinId,
        net: Option<NetId>,
        delay: f64,
    ) -> TimingEdgeId {
        let id = TimingEdgeId::from_raw(self.edges.len() as u32);
        self.edges.push(TimingEdge {
            id,
            from,
            to,
            src_pin,
            sink_pin,
            net,
            delay,
        });
        self.nodes[from.as_raw() as usize].out_edges.push(id);
        self.nodes[to.as_raw() as usize].in_edges.push(id);
        id
    }

    /// Returns the node with the given ID.
    pub fn node(&self, id: TimingNodeId) -> &TimingNode {
        &self.nodes[id.as_raw() as usize]
    }

    /// Returns a mutable reference to the node with the given ID.
    pub fn node_mut(&mut self, id: TimingNodeId) -> &mut TimingNode {
        &mut self.nodes[id.as_raw() as usize]
    }

    /// Returns the edge with the given ID.
    pub fn edge(&self, id: TimingEdgeId) -> &TimingEdge {
        &self.edges[id.as_raw() as usize]
    }

    /// Returns the node of a cell, if the cell has one.
    pub fn node_of_cell(&self, cell: CellId) -> Option<TimingNodeId> {
        self.cell_to_node[cell.as_raw() as usize]
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Sorts every node's incoming edges by source forward level.
    pub fn sort_in_edges_by_forward_level(&mut self) {
        let levels: Vec<i32> = self.nodes.iter().map(|n| n.forward_level).collect();
        let edges_from: Vec<TimingNodeId> = self.edges.iter().map(|e| e.from).collect();
        for node in &mut self.nodes {
            node.in_edges
                .sort_by_key(|e| levels[edges_from[e.as_raw() as usize].as_raw() as usize]);
        }
    }

    /// Sorts every node's outgoing edges by sink backward level.
    pub fn sort_out_edges_by_backward_level(&mut self) {
        let levels: Vec<i32> = self.nodes.iter().map(|n| n.backward_level).collect();
        let edges_to: Vec<TimingNodeId> = self.edges.iter().map(|e| e.to).collect();
        for node in &mut self.nodes {
            node.out_edges
                .sort_by_key(|e| levels[edges_to[e.as_raw() as usize].as_raw() as usize]);
        }
    }

    /// Searches for a combinational cycle reachable from `start` without
    /// crossing a register. Returns the nodes on the cycle if one exists.
    pub fn find_loop_from_node(&self, start: TimingNodeId) -> Option<Vec<TimingNodeId>> {
        // Iterative DFS with an explicit on-path marking so deep
        // combinational cones cannot overflow the stack.
        let n = self.nodes.len();
        let mut on_path = vec![false; n];
        let mut visited = vec![false; n];
        let mut path: Vec<TimingNodeId> = Vec::new();
        // (node, next out-edge index to try)
        let mut stack: Vec<(TimingNodeId, usize)> = vec![(start, 0)];
        on_path[start.as_raw() as usize] = true;
        path.push(start);

        loop {
            let Some(top) = stack.last_mut() else { break };
            let node = top.0;
            let edge_idx = top.1;
            top.1 += 1;

            let node_ref = self.node(node);
            if edge_idx >= node_ref.out_edges.len() {
                stack.pop();
                visited[node.as_raw() as usize] = true;
                on_path[node.as_raw() as usize] = false;
                path.pop();
                continue;
            }

            let next = self.edge(node_ref.out_edges[edge_idx]).to;
            let next_idx = next.as_raw() as usize;
            if self.node(next).is_register {
                continue;
            }
            if next == start {
                return Some(path);
            }
            if on_path[next_idx] || visited[next_idx] {
                continue;
            }
            on_path[next_idx] = true;
            path.push(next);
            stack.push((next, 0));
        }
        None
    }

    /// Collects up to `size_thr` downstream nodes whose longest path
    /// exceeds `path_len_thr`, starting from `start`, without crossing
    /// registers and skipping `exceptions`.
    pub fn dfs_from_node(
        &self,
        start: TimingNodeId,
        path_len_thr: i32,
        size_thr: usize,
        exceptions: &std::collections::HashSet<CellId>,
    ) -> Vec<TimingNodeId> {
        let mut collected = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if collected.len() >= size_thr {
                break;
            }
            let idx = id.as_raw() as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            let node = self.node(id);
            if exceptions.contains(&node.cell) {
                continue;
            }
            if node.longest_path_length <= path_len_thr {
                continue;
            }
            collected.push(id);
            if node.is_register && id != start {
                continue;
            }
            for &e in &node.out_edges {
                stack.push(self.edge(e).to);
            }
        }
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atoll_netlist::{CellKind, PinDirection};

    fn chain_netlist(n: usize) -> Netlist {
        // reg -> c0 -> c1 -> ... -> c{n-1} -> reg
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
        nl
    }

    #[test]
    fn empty_design_builds_empty_graph() {
        let nl = Netlist::new();
        let g = TimingGraph::build_simple_timing_graph(&nl);
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn chain_topology() {
        let nl = chain_netlist(3);
        let g = TimingGraph::build_simple_timing_graph(&nl);
        // r0, c0..c2, r1
        assert_eq!(g.node_count(), 5);
        assert_eq!(g.edge_count(), 4);
        assert!(g.node(TimingNodeId::from_raw(0)).is_register);
        assert!(!g.node(TimingNodeId::from_raw(1)).is_register);
    }

    #[test]
    fn virtual_cells_have_no_node() {
        let mut nl = Netlist::new();
        let v = nl.add_cell("virt", CellKind::Lut { inputs: 4 });
        nl.cell_mut(v).is_virtual = true;
        let c = nl.add_cell("real", CellKind::Ff);
        let g = TimingGraph::build_simple_timing_graph(&nl);
        assert_eq!(g.node_count(), 1);
        assert!(g.node_of_cell(v).is_none());
        assert_eq!(g.node_of_cell(c), Some(TimingNodeId::from_raw(0)));
    }

    #[test]
    fn edges_bind_pins_and_net() {
        let nl = chain_netlist(1);
        let g = TimingGraph::build_simple_timing_graph(&nl);
        let e = g.edge(TimingEdgeId::from_raw(0));
        assert!(e.net.is_some());
        assert_ne!(e.src_pin, e.sink_pin);
        let src = g.node(e.from);
        assert!(src.out_edges.contains(&e.id));
        let dst = g.node(e.to);
        assert!(dst.in_edges.contains(&e.id));
    }

    #[test]
    fn self_arc_skipped() {
        let mut nl = Netlist::new();
        let c = nl.add_cell("loopy", CellKind::Lut { inputs: 4 });
        let net = nl.add_net("self");
        nl.add_pin(c, "O", PinDirection::Output, Some(net));
        nl.add_pin(c, "I", PinDirection::Input, Some(net));
        let g = TimingGraph::build_simple_timing_graph(&nl);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn find_loop_in_cyclic_pair() {
        // A -> B -> A with no register
        let mut nl = Netlist::new();
        let a = nl.add_cell("a", CellKind::Lut { inputs: 4 });
        let b = nl.add_cell("b", CellKind::Lut { inputs: 4 });
        let n0 = nl.add_net("n0");
        nl.add_pin(a, "O", PinDirection::Output, Some(n0));
        nl.add_pin(b, "I", PinDirection::Input, Some(n0));
        let n1 = nl.add_net("n1");
        nl.add_pin(b, "O", PinDirection::Output, Some(n1));
        nl.add_pin(a, "I", PinDirection::Input, Some(n1));

        let g = TimingGraph::build_simple_timing_graph(&nl);
        let cycle = g.find_loop_from_node(TimingNodeId::from_raw(0)).unwrap();
        assert_eq!(cycle.len(), 2);
    }

    #[test]
    fn no_loop_through_register() {
        // A -> R -> A is not a combinational loop
        let mut nl = Netlist::new();
        let a = nl.add_cell("a", CellKind::Lut { inputs: 4 });
        let r = nl.add_cell("r", CellKind::Ff);
        let n0 = nl.add_net("n0");
        nl.add_pin(a, "O", PinDirection::Output, Some(n0));
        nl.add_pin(r, "D", PinDirection::Input, Some(n0));
        let n1 = nl.add_net("n1");
        nl.add_pin(r, "Q", PinDirection::Output, Some(n1));
        nl.add_pin(a, "I", PinDirection::Input, Some(n1));

        let g = TimingGraph::build_simple_timing_graph(&nl);
        assert!(g.find_loop_from_node(TimingNodeId::from_raw(0)).is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let nl = chain_netlist(2);
        let g = TimingGraph::build_simple_timing_graph(&nl);
        let json = serde_json::to_string(&g).unwrap();
        let restored: TimingGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.node_count(), g.node_count());
        assert_eq!(restored.edge_count(), g.edge_count());
        assert_eq!(restored.clock_period, DEFAULT_CLOCK_PERIOD);
    }
}
