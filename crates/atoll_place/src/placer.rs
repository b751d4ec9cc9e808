//! The global placer: iterative quadratic solve plus spreading.
//!
//! Each outer iteration linearizes HPWL through the B2B model, solves one
//! sparse system per axis with conjugate gradients, commits the solution
//! to the movable units, and spreads cells against the density field. The
//! spread positions, the timing optimizer's clock-region targets, and the
//! macro legalizer all feed back as pseudo-net anchors into the next
//! solve. Phase parameters (pseudo-net weight, macro legalization budget,
//! spreading displacement bound) follow the outer schedule.

use crate::b2b::{build_axis_system, Anchor, Axis, MovableIndex};
use crate::cluster;
use crate::legalizer::MacroLegalizer;
use crate::solver::CgSolver;
use crate::spreading::spread_cells;
use atoll_config::PlacerConfig;
use atoll_device::{Device, SiteKind};
use atoll_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Stage};
use atoll_model::{update_b2b_and_get_total_hpwl, PlacementModel, PuId, PuKind};
use atoll_netlist::Netlist;
use atoll_timing::{PlacementTimingOptimizer, TimingGraph};

/// Options for one run of the main placement loop.
#[derive(Debug, Clone)]
pub struct ClbPlacementOptions {
    /// Outer iterations to run.
    pub iterations: usize,
    /// Whether macro legalization pseudo-nets are generated.
    pub macro_legalize: bool,
    /// Spreading passes per outer iteration.
    pub spread_passes: usize,
    /// Whether the timing optimizer participates.
    pub enable_timing: bool,
    /// Whether timing participation refreshes net weights.
    pub timing_net_weight: bool,
    /// Per-axis step bound applied when the solver fails to converge.
    pub displacement_limit: f64,
}

/// The analytical global placer.
pub struct GlobalPlacer {
    pseudo_net_weight: f64,
    macro_pseudo_net_enhance_cnt: f64,
    macro_legalization_weight: f64,
    neighbor_displacement_upperbound: f64,
    y2x_ratio: f64,
    cg: CgSolver,
    legalizer: MacroLegalizer,
    spread_anchors: Vec<(PuId, f64, f64)>,
}

impl GlobalPlacer {
    /// Creates a placer with the schedule's initial parameters.
    pub fn new(config: &PlacerConfig) -> Self {
        Self {
            pseudo_net_weight: 0.0002,
            macro_pseudo_net_enhance_cnt: 10.0,
            macro_legalization_weight: 0.01,
            neighbor_displacement_upperbound: 3.0,
            y2x_ratio: config.y2x_ratio,
            cg: CgSolver::default(),
            legalizer: MacroLegalizer::new(),
            spread_anchors: Vec::new(),
        }
    }

    /// Current anchor pseudo-net weight.
    pub fn pseudo_net_weight(&self) -> f64 {
        self.pseudo_net_weight
    }

    /// Sets the anchor pseudo-net weight.
    pub fn set_pseudo_net_weight(&mut self, weight: f64) {
        self.pseudo_net_weight = weight;
    }

    /// Current macro legalization attempt budget.
    pub fn macro_pseudo_net_enhance_cnt(&self) -> f64 {
        self.macro_pseudo_net_enhance_cnt
    }

    /// Current macro legalization pseudo-net weight.
    pub fn macro_legalization_weight(&self) -> f64 {
        self.macro_legalization_weight
    }

    /// Sets the macro legalization budget and weight (phase decay), and
    /// restarts the per-macro attempt history.
    pub fn set_macro_legalization_parameters(&mut self, enhance_cnt: f64, weight: f64) {
        self.macro_pseudo_net_enhance_cnt = enhance_cnt;
        self.macro_legalization_weight = weight;
        self.legalizer.reset();
    }

    /// Current spreading displacement bound.
    pub fn neighbor_displacement_upperbound(&self) -> f64 {
        self.neighbor_displacement_upperbound
    }

    /// Sets the spreading displacement bound.
    pub fn set_neighbor_displacement_upperbound(&mut self, bound: f64) {
        self.neighbor_displacement_upperbound = bound;
    }

    /// Produces an initial coarse location for every unit.
    pub fn cluster_placement(
        &self,
        model: &mut PlacementModel,
        netlist: &Netlist,
        device: &Device,
        sink: &DiagnosticSink,
    ) {
        cluster::cluster_placement(model, netlist, device, sink);
    }

    /// Runs solver iterations with every CLB-resident single cell held
    /// fixed, letting macros and non-logic units settle first.
    pub fn global_placement_fixed_clb(
        &mut self,
        model: &mut PlacementModel,
        netlist: &Netlist,
        device: &Device,
        iterations: usize,
        pseudo_net_weight_init: f64,
        sink: &DiagnosticSink,
    ) {
        self.pseudo_net_weight = pseudo_net_weight_init;

        let mut temporarily_fixed: Vec<PuId> = Vec::new();
        for unit in &mut model.units {
            if unit.is_fixed {
                continue;
            }
            if let PuKind::UnpackedCell(cell) = unit.kind {
                if netlist.cell(cell).kind.site_kind() == SiteKind::Logic {
                    unit.set_fixed();
                    temporarily_fixed.push(unit.id);
                }
            }
        }

        for _ in 0..iterations {
            let hpwl = self.solve_iteration(model, netlist, device, f64::INFINITY, false, sink);
            sink.emit(Diagnostic::note(
                DiagnosticCode::new(Stage::GlobalPlacement, 4),
                format!("fixed-CLB iteration done, HPWL = {hpwl:.2}"),
            ));
            self.spread_anchors =
                spread_cells(model, netlist, device, self.neighbor_displacement_upperbound, 1);
        }

        for pu in temporarily_fixed {
            model.unit_mut(pu).set_unfixed();
        }
    }

    /// The main quadratic-plus-spreading loop.
    ///
    /// `timing` supplies the levelized timing graph and the optimizer;
    /// it is only consulted when `opts.enable_timing` is set.
    pub fn global_placement_clb_elements(
        &mut self,
        model: &mut PlacementModel,
        netlist: &mut Netlist,
        device: &Device,
        mut timing: Option<(&TimingGraph, &mut PlacementTimingOptimizer)>,
        opts: &ClbPlacementOptions,
        sink: &DiagnosticSink,
    ) {
        for iteration in 0..opts.iterations {
            if opts.enable_timing && opts.timing_net_weight {
                if let Some((graph, optimizer)) = timing.as_mut() {
                    netlist.reset_net_enhancements();
                    optimizer.enhance_net_weight_level_based(
                        *graph,
                        netlist,
                        graph.long_path_threshold,
                        sink,
                    );
                }
            }

            let hpwl = self.solve_iteration(
                model,
                netlist,
                device,
                opts.displacement_limit,
                opts.macro_legalize,
                sink,
            );
            sink.emit(Diagnostic::note(
                DiagnosticCode::new(Stage::GlobalPlacement, 5),
                format!(
                    "global placement iteration {}/{} done, HPWL = {hpwl:.2}",
                    iteration + 1,
                    opts.iterations
                ),
            ));

            self.spread_anchors = spread_cells(
                model,
                netlist,
                device,
                self.neighbor_displacement_upperbound,
                opts.spread_passes,
            );
        }
    }

    /// One linearize-assemble-solve-commit round. Returns the HPWL
    /// measured before the solve.
    fn solve_iteration(
        &mut self,
        model: &mut PlacementModel,
        netlist: &Netlist,
        device: &Device,
        displacement_limit: f64,
        macro_legalize: bool,
        sink: &DiagnosticSink,
    ) -> f64 {
        let hpwl = update_b2b_and_get_total_hpwl(model, netlist, self.y2x_ratio);
        let index = MovableIndex::build(model);
        if index.is_empty() {
            return hpwl;
        }

        let mut x_anchors: Vec<Anchor> = Vec::new();
        let mut y_anchors: Vec<Anchor> = Vec::new();

        for &(pu, x, y) in &self.spread_anchors {
            x_anchors.push(Anchor {
                pu,
                target: x,
                weight: self.pseudo_net_weight,
            });
            y_anchors.push(Anchor {
                pu,
                target: y,
                weight: self.pseudo_net_weight,
            });
        }
        for (&pu, &(x, y)) in &model.pu_clock_region_targets {
            x_anchors.push(Anchor {
                pu,
                target: x,
                weight: self.pseudo_net_weight,
            });
            y_anchors.push(Anchor {
                pu,
                target: y,
                weight: self.pseudo_net_weight,
            });
        }
        if macro_legalize {
            let (mx, my) = self.legalizer.collect_anchors(
                model,
                netlist,
                device,
                self.macro_legalization_weight,
                self.macro_pseudo_net_enhance_cnt.round() as u32,
                sink,
            );
            x_anchors.extend(mx);
            y_anchors.extend(my);
        }

        let sys_x = build_axis_system(netlist, model, &index, Axis::X, &x_anchors);
        let sys_y = build_axis_system(netlist, model, &index, Axis::Y, &y_anchors);
        let out_x = self.cg.solve(&sys_x.matrix, &sys_x.rhs, &sys_x.start);
        let out_y = self.cg.solve(&sys_y.matrix, &sys_y.rhs, &sys_y.start);

        let cap = |converged: bool, new: f64, old: f64| -> f64 {
            if converged || displacement_limit.is_infinite() {
                new
            } else {
                old + (new - old).clamp(-displacement_limit, displacement_limit)
            }
        };

        for i in 0..index.len() {
            let pu = index.pu_at(i);
            let (old_x, old_y) = model.unit(pu).location();
            let nx = cap(out_x.converged, out_x.x[i], old_x);
            let ny = cap(out_y.converged, out_y.x[i], old_y);
            let (lx, ly) = model.legalize_xy_in_area(netlist, device, pu, nx, ny);
            model.unit_mut(pu).set_location(lx, ly);
        }
        model.update_cell_locations(netlist);
        hpwl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atoll_device::DeviceBuilder;
    use atoll_netlist::{CellKind, PinDirection};
    use std::collections::BTreeMap;

    fn config() -> PlacerConfig {
        let mut map = BTreeMap::new();
        map.insert(
            "vivado extracted device information file".to_string(),
            "device.zip".to_string(),
        );
        map.insert("special pin offset info file".to_string(), "p.txt".to_string());
        map.insert(
            "vivado extracted design information file".to_string(),
            "design.zip".to_string(),
        );
        map.insert("cellType2fixedAmo file".to_string(), "f.txt".to_string());
        map.insert("cellType2sharedCellType file".to_string(), "s.txt".to_string());
        map.insert("sharedCellType2BELtype file".to_string(), "b.txt".to_string());
        map.insert("GlobalPlacementIteration".to_string(), "9".to_string());
        map.insert("jobs".to_string(), "1".to_string());
        PlacerConfig::from_map(&map).unwrap()
    }

    fn device() -> Device {
        DeviceBuilder::new("gp16", 16.0, 16.0).fill(SiteKind::Logic).build()
    }

    fn opts(iterations: usize) -> ClbPlacementOptions {
        ClbPlacementOptions {
            iterations,
            macro_legalize: false,
            spread_passes: 1,
            enable_timing: false,
            timing_net_weight: false,
            displacement_limit: 200.0,
        }
    }

    /// Movable cell at one corner, fixed partner at the other.
    fn pulled_pair() -> (Netlist, PlacementModel) {
        let mut nl = Netlist::new();
        let a = nl.add_cell("movable", CellKind::Dsp);
        let b = nl.add_cell("anchor_cell", CellKind::Ff);
        let n = nl.add_net("n");
        nl.add_pin(a, "O", PinDirection::Output, Some(n));
        nl.add_pin(b, "D", PinDirection::Input, Some(n));
        let mut model = PlacementModel::from_netlist(&nl);
        model.units[0].set_location(0.0, 0.0);
        model.units[1].set_location(12.0, 12.0);
        model.units[1].set_locked();
        (nl, model)
    }

    #[test]
    fn parameter_accessors() {
        let mut gp = GlobalPlacer::new(&config());
        gp.set_pseudo_net_weight(gp.pseudo_net_weight() * 0.85);
        assert!((gp.pseudo_net_weight() - 0.0002 * 0.85).abs() < 1e-12);

        gp.set_macro_legalization_parameters(
            gp.macro_pseudo_net_enhance_cnt() * 0.8,
            gp.macro_legalization_weight() * 0.8,
        );
        assert!((gp.macro_pseudo_net_enhance_cnt() - 8.0).abs() < 1e-12);
        assert!((gp.macro_legalization_weight() - 0.008).abs() < 1e-12);

        gp.set_neighbor_displacement_upperbound(2.0);
        assert_eq!(gp.neighbor_displacement_upperbound(), 2.0);
    }

    #[test]
    fn solver_reduces_hpwl() {
        let (mut nl, mut model) = pulled_pair();
        let dev = device();
        let mut gp = GlobalPlacer::new(&config());
        let sink = DiagnosticSink::new();
        model.create_grid_bins(&dev, 5.0, 5.0);

        let before = update_b2b_and_get_total_hpwl(&mut model, &nl, 1.0);
        gp.global_placement_clb_elements(&mut model, &mut nl, &dev, None, &opts(3), &sink);
        let after = update_b2b_and_get_total_hpwl(&mut model, &nl, 1.0);
        assert!(after < before, "HPWL {before} -> {after}");
    }

    #[test]
    fn fixed_units_are_bit_identical_across_iterations() {
        let (mut nl, mut model) = pulled_pair();
        let dev = device();
        let mut gp = GlobalPlacer::new(&config());
        let sink = DiagnosticSink::new();
        model.create_grid_bins(&dev, 5.0, 5.0);

        let before = model.units[1].location();
        gp.global_placement_clb_elements(&mut model, &mut nl, &dev, None, &opts(4), &sink);
        let after = model.units[1].location();
        assert_eq!(before.0.to_bits(), after.0.to_bits());
        assert_eq!(before.1.to_bits(), after.1.to_bits());
    }

    #[test]
    fn macro_shape_survives_iterations() {
        let mut nl = Netlist::new();
        let m0 = nl.add_cell("c0", CellKind::Carry);
        let m1 = nl.add_cell("c1", CellKind::Carry);
        let m2 = nl.add_cell("c2", CellKind::Carry);
        nl.add_macro(
            "chain",
            vec![m0, m1, m2],
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)],
        );
        let f = nl.add_cell("f", CellKind::Ff);
        let n = nl.add_net("n");
        nl.add_pin(m2, "O", PinDirection::Output, Some(n));
        nl.add_pin(f, "D", PinDirection::Input, Some(n));

        let dev = device();
        let mut model = PlacementModel::from_netlist(&nl);
        let macro_pu = model.unit_of_cell(m0);
        model.unit_mut(macro_pu).set_location(5.0, 7.0);
        let f_pu = model.unit_of_cell(f);
        model.unit_mut(f_pu).set_location(10.0, 7.0);
        model.unit_mut(f_pu).set_fixed();
        model.create_grid_bins(&dev, 5.0, 5.0);

        let mut gp = GlobalPlacer::new(&config());
        let sink = DiagnosticSink::new();
        gp.global_placement_clb_elements(&mut model, &mut nl, &dev, None, &opts(3), &sink);

        model.update_cell_locations(&nl);
        let (ax, ay) = model.cell_location(m0);
        assert_eq!(model.cell_location(m1), (ax + 1.0, ay));
        assert_eq!(model.cell_location(m2), (ax + 2.0, ay));
    }

    #[test]
    fn fixed_clb_round_restores_movability() {
        let mut nl = Netlist::new();
        let lut = nl.add_cell("lut", CellKind::Lut { inputs: 4 });
        let dsp = nl.add_cell("dsp", CellKind::Dsp);
        let n = nl.add_net("n");
        nl.add_pin(lut, "O", PinDirection::Output, Some(n));
        nl.add_pin(dsp, "I", PinDirection::Input, Some(n));

        let dev = DeviceBuilder::new("gp16", 16.0, 16.0)
            .fill(SiteKind::Logic)
            .column(SiteKind::Dsp, 7)
            .build();
        let mut model = PlacementModel::from_netlist(&nl);
        model.units[0].set_location(3.0, 3.0);
        model.units[1].set_location(9.0, 9.0);
        model.create_grid_bins(&dev, 5.0, 5.0);

        let mut gp = GlobalPlacer::new(&config());
        let sink = DiagnosticSink::new();
        gp.global_placement_fixed_clb(&mut model, &nl, &dev, 1, 0.0002, &sink);

        // the LUT stayed put and is movable again afterwards
        assert_eq!(model.units[0].location(), (3.0, 3.0));
        assert!(!model.units[0].is_fixed);
        assert!((gp.pseudo_net_weight() - 0.0002).abs() < 1e-15);
    }

    #[test]
    fn clock_region_targets_pull_units() {
        let (mut nl, mut model) = pulled_pair();
        let dev = device();
        model.create_grid_bins(&dev, 5.0, 5.0);
        // strong anchor target away from the net pull
        model
            .pu_clock_region_targets
            .insert(PuId::from_raw(0), (2.0, 14.0));

        let mut gp = GlobalPlacer::new(&config());
        gp.set_pseudo_net_weight(100.0);
        let sink = DiagnosticSink::new();
        gp.global_placement_clb_elements(&mut model, &mut nl, &dev, None, &opts(1), &sink);

        let (x, y) = model.units[0].location();
        assert!((x - 2.0).abs() < 1.0);
        assert!((y - 14.0).abs() < 1.0);
    }

    #[test]
    fn empty_model_iterations_are_noops() {
        let mut nl = Netlist::new();
        let dev = device();
        let mut model = PlacementModel::from_netlist(&nl);
        let mut gp = GlobalPlacer::new(&config());
        let sink = DiagnosticSink::new();
        gp.global_placement_clb_elements(&mut model, &mut nl, &dev, None, &opts(2), &sink);
        assert_eq!(model.unit_count(), 0);
    }
}
