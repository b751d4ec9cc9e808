//! Placement-driven timing optimization.
//!
//! The [`PlacementTimingOptimizer`] evaluates edge delays from placed pin
//! locations, runs the arrival/required propagation, enhances net weights
//! along long paths, and pulls the units of long paths toward a single
//! clock-region column. Its outputs feed the global placer: net weight
//! scalars on the netlist and per-unit anchor targets on the model.

use crate::delay::{DelayModel, CLOCK_REGION_CROSSING_PENALTY};
use crate::graph::TimingGraph;
use crate::sta;
use atoll_config::PlacerConfig;
use atoll_device::Device;
use atoll_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Stage};
use atoll_model::{PlacementModel, PuId};
use atoll_netlist::{CellId, Netlist, PinDirection};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Calls after which net-weight enhancement reaches full effect.
const ENHANCE_FULL_EFFECT_CALLS: f64 = 30.0;

/// Share of the path-sorted node list inspected by the clustering passes.
const CLUSTER_SCAN_RATIO: f64 = 0.1;

/// Maximum nodes collected per long-path cluster.
const CLUSTER_DFS_SIZE_LIMIT: usize = 2000;

/// Minimum units a cluster must span to be considered.
const CLUSTER_MIN_UNITS: usize = 8;

/// Minimum weight of the dominant clock-region column.
const CLUSTER_MIN_COLUMN_WEIGHT: f64 = 4.0;

/// Cluster weight above which the member cells are set aside without
/// anchoring, so the same oversized fanout is not re-scanned in one pass.
const OVERSIZED_CLUSTER_WEIGHT: f64 = 20000.0;

/// Timing optimizer bound to one placement run.
///
/// The enhancement call counter is instance state: constructing a fresh
/// optimizer resets it.
pub struct PlacementTimingOptimizer {
    delay_model: DelayModel,
    y2x_ratio: f64,
    verbose: bool,
    enhance_call_count: u32,
    net_weight_log: Option<PathBuf>,
    edge_delay_log: Option<PathBuf>,
    cluster_dump_prefix: Option<PathBuf>,
    /// Long-path clusters from the latest clustering pass, for debugging.
    pub clock_region_clusters: Vec<Vec<PuId>>,
}

impl PlacementTimingOptimizer {
    /// Creates an optimizer for the given run configuration and device.
    pub fn new(config: &PlacerConfig, device: &Device) -> Self {
        Self {
            delay_model: DelayModel::for_device(device, config.y2x_ratio),
            y2x_ratio: config.y2x_ratio,
            verbose: config.timing_verbose,
            enhance_call_count: 0,
            net_weight_log: config.net_weight_log.clone(),
            edge_delay_log: config.edge_delay_log.clone(),
            cluster_dump_prefix: config.cluster_dump_prefix.clone(),
            clock_region_clusters: Vec::new(),
        }
    }

    /// Returns how often net-weight enhancement has run.
    pub fn enhance_call_count(&self) -> u32 {
        self.enhance_call_count
    }

    /// Overrides the enhancement call counter (used when replaying a
    /// checkpointed run).
    pub fn set_enhance_call_count(&mut self, count: u32) {
        self.enhance_call_count = count;
    }

    /// Runs one static timing analysis pass.
    ///
    /// Refreshes pin locations, evaluates every edge delay from the delay
    /// model plus the clock-region crossing penalty, propagates arrival
    /// and required times, and reports the longest delay path as a note.
    pub fn conduct_static_timing_analysis(
        &self,
        graph: &mut TimingGraph,
        model: &mut PlacementModel,
        netlist: &Netlist,
        device: &Device,
        sink: &DiagnosticSink,
    ) {
        model.update_cell_locations(netlist);
        model.set_pin_locations(netlist);

        let delay_model = &self.delay_model;
        let delays: Vec<f64> = graph
            .edges
            .par_iter()
            .map(|edge| {
                let (x1, y1) = model.pin_location(edge.src_pin);
                let (x2, y2) = model.pin_location(edge.sink_pin);
                let (cr1, _) = device.clock_region_at(x1, y1);
                let (cr2, _) = device.clock_region_at(x2, y2);
                let crossings = (cr2 as i64 - cr1 as i64).abs() as f64;
                delay_model.delay(x2 - x1, y2 - y1)
                    + CLOCK_REGION_CROSSING_PENALTY * crossings
            })
            .collect();
        for (edge, delay) in graph.edges.iter_mut().zip(delays) {
            edge.delay = delay;
        }

        sta::propagate_arrival_time(graph);
        sta::back_propagate_required_arrival_time(graph);

        if let Some((worst, _)) = graph
            .nodes
            .iter()
            .map(|n| (n.id, n.latest_arrival))
            .max_by(|a, b| a.1.partial_cmp(&b.1).expect("arrival times are finite"))
        {
            let path = sta::back_trace_delay_longest_path_from_node(graph, worst);
            let mut diag = Diagnostic::note(
                DiagnosticCode::new(Stage::Timing, 10),
                format!(
                    "longest delay path: {:.3} ns over {} cells",
                    graph.node(worst).latest_arrival,
                    path.len()
                ),
            );
            if self.verbose {
                for id in &path {
                    let node = graph.node(*id);
                    diag = diag.with_note(format!(
                        "{}  arrival {:.3} ns  required {:.3} ns",
                        netlist.cell(node.cell).name,
                        node.latest_arrival,
                        node.required_arrival
                    ));
                }
            }
            sink.emit(diag);
        }

        if let Some(path) = self.edge_delay_log.clone() {
            if let Err(e) = self.dump_edge_delays(graph, netlist, &path) {
                sink.emit(Diagnostic::warning(
                    DiagnosticCode::new(Stage::Dump, 11),
                    format!("failed to dump edge delays to {}: {e}", path.display()),
                ));
            }
        }
    }

    /// Multiplies net weights along long paths.
    ///
    /// For every non-virtual cell whose longest path length reaches
    /// `level_thr` (at least 4), each driven net with an eligible pin
    /// count gets its enhancement multiplied by
    /// `(1.5 * (0.8 * path_len / level_thr + fanout_term)) ^ effect`,
    /// where the fanout term is `0.005 * pins` below 200 pins and
    /// saturates at 1 above, and `effect` ramps linearly over the first
    /// 30 calls.
    pub fn enhance_net_weight_level_based(
        &mut self,
        graph: &TimingGraph,
        netlist: &mut Netlist,
        level_thr: i32,
        sink: &DiagnosticSink,
    ) {
        if level_thr < 4 {
            return;
        }

        self.enhance_call_count += 1;
        let effect = (self.enhance_call_count as f64 / ENHANCE_FULL_EFFECT_CALLS).min(1.0);

        let mut log_lines: Vec<String> = Vec::new();
        let mut max_ratio = 0.0_f64;

        for cell in &netlist.cells {
            if cell.is_virtual {
                continue;
            }
            let Some(node) = graph.node_of_cell(cell.id) else {
                continue;
            };
            let path_len = graph.node(node).longest_path_length;
            if path_len < level_thr {
                continue;
            }

            for &pin in &cell.pins {
                let pin = &netlist.pins[pin.as_raw() as usize];
                if pin.direction != PinDirection::Output {
                    continue;
                }
                let Some(net_id) = pin.net else { continue };
                let net = &netlist.nets[net_id.as_raw() as usize];
                if !net.timing_enhancement_eligible() {
                    continue;
                }

                let pin_count = net.pin_count();
                let overflow = 0.8 * path_len as f64 / level_thr as f64;
                let fanout_term = if pin_count < 200 {
                    0.005 * pin_count as f64
                } else {
                    1.0
                };
                let ratio = (1.5 * (overflow + fanout_term)).powf(effect);
                max_ratio = max_ratio.max(ratio);
                if self.net_weight_log.is_some() {
                    log_lines.push(format!(
                        "enhanced net [{}/{}] fanout {} by {ratio:.4}",
                        cell.name, pin.name, pin_count
                    ));
                }
                netlist.nets[net_id.as_raw() as usize].enhance_timing(ratio);
            }
        }

        sink.emit(Diagnostic::note(
            DiagnosticCode::new(Stage::Timing, 12),
            format!(
                "net weight enhancement pass {} done (max ratio {max_ratio:.4})",
                self.enhance_call_count
            ),
        ));

        if let Some(path) = self.net_weight_log.clone() {
            if let Err(e) = write_lines(&path, &log_lines) {
                sink.emit(Diagnostic::warning(
                    DiagnosticCode::new(Stage::Dump, 13),
                    format!("failed to dump net enhancements to {}: {e}", path.display()),
                ));
            }
        }
    }

    /// Pulls the units of each long path toward the clock-region column
    /// that already holds most of them.
    ///
    /// Walks the top of the path-sorted node list, collects each path's
    /// downstream cone, and when one column dominates, assigns every
    /// movable unit of the cluster an anchor at that column's horizontal
    /// center (Y preserved, then legalized). The anchors land in
    /// `model.pu_clock_region_targets` for the global placer.
    pub fn cluster_long_path_in_one_clock_region(
        &mut self,
        graph: &TimingGraph,
        model: &mut PlacementModel,
        netlist: &Netlist,
        device: &Device,
        path_len_thr: i32,
        cluster_thr_ratio: f64,
        sink: &DiagnosticSink,
    ) {
        model.update_cell_locations(netlist);
        model.pu_clock_region_targets.clear();
        self.clock_region_clusters.clear();

        let mut extracted_cells: HashSet<CellId> = HashSet::new();
        let mut extracted_units: HashSet<PuId> = HashSet::new();

        let scan = (graph.path_len_sorted.len() as f64 * CLUSTER_SCAN_RATIO) as usize;
        for &node_id in graph.path_len_sorted.iter().take(scan) {
            let node = graph.node(node_id);
            if node.longest_path_length <= path_len_thr {
                break;
            }
            if extracted_cells.contains(&node.cell) {
                continue;
            }

            let candidates = graph.dfs_from_node(
                node_id,
                path_len_thr,
                CLUSTER_DFS_SIZE_LIMIT,
                &extracted_cells,
            );
            if (candidates.len() as f64) < path_len_thr as f64 * 0.8 {
                continue;
            }

            let mut units_in_path: Vec<PuId> = Vec::new();
            let mut seen_units: HashSet<PuId> = HashSet::new();
            for &cand in &candidates {
                let pu = model.unit_of_cell(graph.node(cand).cell);
                if !extracted_units.contains(&pu) && seen_units.insert(pu) {
                    units_in_path.push(pu);
                }
            }
            if units_in_path.len() < CLUSTER_MIN_UNITS {
                continue;
            }

            let (opt_col, max_weight, total_weight) =
                self.dominant_column(model, netlist, device, &units_in_path);

            if max_weight > total_weight * cluster_thr_ratio
                && max_weight >= CLUSTER_MIN_COLUMN_WEIGHT
            {
                let center_x = device.clock_region_column_center(opt_col);
                let mut cluster: Vec<PuId> = Vec::new();
                for &pu in &units_in_path {
                    if model.unit(pu).is_fixed {
                        continue;
                    }
                    let y = model.unit(pu).y;
                    let (fx, fy) = model.legalize_xy_in_area(netlist, device, pu, center_x, y);
                    model.pu_clock_region_targets.insert(pu, (fx, fy));
                    extracted_units.insert(pu);
                    for cell in model.member_cells(netlist, pu) {
                        extracted_cells.insert(cell);
                    }
                    cluster.push(pu);
                }
                if self.verbose {
                    sink.emit(Diagnostic::note(
                        DiagnosticCode::new(Stage::Timing, 14),
                        format!(
                            "clock-region cluster: column {opt_col}, weight {max_weight}/{total_weight}, {} units, path length {}",
                            cluster.len(),
                            node.longest_path_length
                        ),
                    ));
                }
                self.clock_region_clusters.push(cluster);
            } else if total_weight >= OVERSIZED_CLUSTER_WEIGHT {
                for &cand in &candidates {
                    extracted_cells.insert(graph.node(cand).cell);
                }
            }
        }

        self.dump_clock_region_clusters(netlist, model, sink);
        sink.emit(Diagnostic::note(
            DiagnosticCode::new(Stage::Timing, 15),
            format!(
                "long-path clustering: {} clusters, {} anchored units",
                self.clock_region_clusters.len(),
                model.pu_clock_region_targets.len()
            ),
        ));
    }

    /// Moves the driver of a wide long-path fanout toward the clock-region
    /// column holding most of its direct successors.
    ///
    /// Only direct successors are inspected, trading capture of the full
    /// downstream cone for latency.
    pub fn move_driver_into_better_clock_region(
        &mut self,
        graph: &TimingGraph,
        model: &mut PlacementModel,
        netlist: &Netlist,
        device: &Device,
        path_len_thr: i32,
        cluster_thr_ratio: f64,
        sink: &DiagnosticSink,
    ) {
        model.update_cell_locations(netlist);
        model.pu_clock_region_targets.clear();

        let mut extracted_cells: HashSet<CellId> = HashSet::new();
        let mut moved = 0usize;

        let scan = (graph.path_len_sorted.len() as f64 * CLUSTER_SCAN_RATIO) as usize;
        for &node_id in graph.path_len_sorted.iter().take(scan) {
            let node = graph.node(node_id);
            if node.longest_path_length <= path_len_thr {
                break;
            }
            if extracted_cells.contains(&node.cell) {
                continue;
            }

            let mut successor_units: Vec<PuId> = Vec::new();
            let mut seen: HashSet<PuId> = HashSet::new();
            for &e in &node.out_edges {
                let sink_cell = graph.node(graph.edge(e).to).cell;
                let pu = model.unit_of_cell(sink_cell);
                if seen.insert(pu) {
                    successor_units.push(pu);
                }
            }
            if (node.out_edges.len() as f64) < path_len_thr as f64 * 0.5
                || successor_units.len() < CLUSTER_MIN_UNITS
            {
                continue;
            }

            let (opt_col, max_weight, total_weight) =
                self.dominant_column(model, netlist, device, &successor_units);

            let driver_pu = model.unit_of_cell(node.cell);
            let (driver_col, _) = {
                let (x, y) = model.cell_location(node.cell);
                device.clock_region_at(x, y)
            };

            if driver_col != opt_col
                && max_weight > total_weight * cluster_thr_ratio
                && max_weight >= CLUSTER_MIN_COLUMN_WEIGHT
            {
                if model.unit(driver_pu).is_fixed {
                    continue;
                }
                let center_x = device.clock_region_column_center(opt_col);
                let y = model.unit(driver_pu).y;
                let (fx, fy) =
                    model.legalize_xy_in_area(netlist, device, driver_pu, center_x, y);
                model.pu_clock_region_targets.insert(driver_pu, (fx, fy));
                for cell in model.member_cells(netlist, driver_pu) {
                    extracted_cells.insert(cell);
                }
                moved += 1;
            } else if total_weight >= OVERSIZED_CLUSTER_WEIGHT {
                for &e in &node.out_edges {
                    extracted_cells.insert(graph.node(graph.edge(e).to).cell);
                }
            }
        }

        sink.emit(Diagnostic::note(
            DiagnosticCode::new(Stage::Timing, 16),
            format!("driver migration: {moved} drivers anchored"),
        ));
    }

    /// Tallies clock-region-column occupancy over the member cells of the
    /// given units. Returns `(dominant column, its weight, total weight)`.
    fn dominant_column(
        &self,
        model: &PlacementModel,
        netlist: &Netlist,
        device: &Device,
        units: &[PuId],
    ) -> (u32, f64, f64) {
        let mut column_weight: HashMap<u32, f64> = HashMap::new();
        let mut total = 0.0;
        for &pu in units {
            for cell in model.member_cells(netlist, pu) {
                let (x, y) = model.cell_location(cell);
                let (col, _) = device.clock_region_at(x, y);
                *column_weight.entry(col).or_insert(0.0) += 1.0;
                total += 1.0;
            }
        }
        let (opt_col, max_weight) = column_weight
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).expect("weights are finite"))
            .unwrap_or((0, 0.0));
        (opt_col, max_weight, total)
    }

    /// Writes the latest clusters as a vendor-tool highlight script.
    fn dump_clock_region_clusters(
        &self,
        netlist: &Netlist,
        model: &PlacementModel,
        sink: &DiagnosticSink,
    ) {
        let Some(prefix) = &self.cluster_dump_prefix else {
            return;
        };
        let path = PathBuf::from(format!("{}-clockRegion.tcl", prefix.display()));
        let result = (|| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&path)?;
            for (cluster_id, cluster) in self.clock_region_clusters.iter().enumerate() {
                write!(file, "highlight -color_index {} [get_cells {{", cluster_id % 20 + 1)?;
                for &pu in cluster {
                    for cell in model.member_cells(netlist, pu) {
                        write!(file, "{} ", netlist.cell(cell).name)?;
                    }
                }
                writeln!(file, "}}]")?;
            }
            Ok(())
        })();
        if let Err(e) = result {
            sink.emit(Diagnostic::warning(
                DiagnosticCode::new(Stage::Dump, 17),
                format!("failed to dump clusters to {}: {e}", path.display()),
            ));
        }
    }

    fn dump_edge_delays(
        &self,
        graph: &TimingGraph,
        netlist: &Netlist,
        path: &Path,
    ) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        for node in &graph.nodes {
            if node.out_edges.len() > 32 {
                continue;
            }
            for &e in &node.out_edges {
                let edge = graph.edge(e);
                writeln!(
                    file,
                    "src:{} sink:{} delay:{:.4}",
                    netlist.pin(edge.src_pin).name,
                    netlist.pin(edge.sink_pin).name,
                    edge.delay
                )?;
            }
        }
        Ok(())
    }
}

fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}
