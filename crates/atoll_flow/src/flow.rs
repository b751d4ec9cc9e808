//! The placement schedule.
//!
//! Orchestrates the full mixed-size flow: seed placement, timing-driven
//! global placement phases with decaying pseudo-net weights and grid
//! refinement, the checkpoint round-trip before final packing, static
//! timing analysis around the packer, and the final dumps. HPWL is
//! reported after every milestone.

use atoll_common::AtollResult;
use atoll_config::PlacerConfig;
use atoll_device::Device;
use atoll_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Stage};
use atoll_model::{
    dump_placement_units, load_placement_units, update_b2b_and_get_total_hpwl, PlacementModel,
};
use atoll_netlist::Netlist;
use atoll_pack::{PackerParams, ParallelSitePacker};
use atoll_place::{ClbPlacementOptions, GlobalPlacer};
use atoll_timing::{
    backward_levelization, forward_levelization, set_longest_path_length,
    PlacementTimingOptimizer, TimingGraph,
};

/// Coarse utilization grid resolution for the early phases.
const COARSE_BIN_SIZE: f64 = 5.0;

/// Refined utilization grid resolution for the later phases.
const FINE_BIN_SIZE: f64 = 2.0;

/// Logic utilization target after grid refinement.
const REFINED_LOGIC_UTILIZATION: f64 = 0.9;

/// Auction rounds of the final packer.
const PACKER_MAX_ITER: usize = 30;

/// Runs the complete placement flow and returns the final model.
///
/// The netlist is mutated only through net timing enhancements. A
/// combinational loop in the design or a design that cannot fit the
/// device aborts the flow; everything else degrades to warnings.
pub fn run_placement(
    netlist: &mut Netlist,
    device: &Device,
    config: &PlacerConfig,
    sink: &DiagnosticSink,
) -> AtollResult<PlacementModel> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(|e| atoll_common::AbortError::in_stage("worker pool", e.to_string()))?;
    pool.install(|| run_placement_inner(netlist, device, config, sink))
}

fn run_placement_inner(
    netlist: &mut Netlist,
    device: &Device,
    config: &PlacerConfig,
    sink: &DiagnosticSink,
) -> AtollResult<PlacementModel> {
    let mut model = PlacementModel::from_netlist(netlist);
    model.print_stat(netlist, sink);
    model.create_grid_bins(device, COARSE_BIN_SIZE, COARSE_BIN_SIZE);
    model.verify_device_for_design(netlist, device, sink)?;

    let mut graph = TimingGraph::build_simple_timing_graph(netlist);
    forward_levelization(&mut graph, netlist, sink)?;
    backward_levelization(&mut graph, netlist, sink)?;
    set_longest_path_length(&mut graph);
    let long_path_thr = graph.long_path_threshold;

    let mut optimizer = PlacementTimingOptimizer::new(config, device);
    let mut placer = GlobalPlacer::new(config);
    let total_iters = config.global_placement_iterations;
    let y2x = config.y2x_ratio;

    // Seed placement, then pull long paths together before solving.
    placer.cluster_placement(&mut model, netlist, device, sink);
    optimizer.cluster_long_path_in_one_clock_region(
        &graph, &mut model, netlist, device, long_path_thr, 0.5, sink,
    );
    placer.global_placement_fixed_clb(&mut model, netlist, device, 1, 0.0002, sink);

    placer.global_placement_clb_elements(
        &mut model,
        netlist,
        device,
        Some((&graph, &mut optimizer)),
        &ClbPlacementOptions {
            iterations: total_iters / 3,
            macro_legalize: false,
            spread_passes: 5,
            enable_timing: true,
            timing_net_weight: true,
            displacement_limit: 200.0,
        },
        sink,
    );
    report_hpwl(&mut model, netlist, y2x, "after first global phase", sink);

    // Refine the grid, decay the anchor weights, and legalize macros.
    optimizer.cluster_long_path_in_one_clock_region(
        &graph, &mut model, netlist, device, long_path_thr, 0.5, sink,
    );
    placer.set_pseudo_net_weight(placer.pseudo_net_weight() * 0.85);
    placer.set_macro_legalization_parameters(
        placer.macro_pseudo_net_enhance_cnt() * 0.8,
        placer.macro_legalization_weight() * 0.8,
    );
    model.create_grid_bins(device, FINE_BIN_SIZE, FINE_BIN_SIZE);
    model.bins.adjust_logic_utilization(REFINED_LOGIC_UTILIZATION);
    placer.global_placement_clb_elements(
        &mut model,
        netlist,
        device,
        Some((&graph, &mut optimizer)),
        &ClbPlacementOptions {
            iterations: total_iters * 2 / 9,
            macro_legalize: true,
            spread_passes: 5,
            enable_timing: true,
            timing_net_weight: true,
            displacement_limit: 200.0,
        },
        sink,
    );
    model.pu_clock_region_targets.clear();
    report_hpwl(&mut model, netlist, y2x, "after macro legalization phase", sink);

    // Incremental LUT-FF pairing runs outside this flow; the schedule
    // resumes with fresh clustering and tighter spreading bounds.
    optimizer.cluster_long_path_in_one_clock_region(
        &graph, &mut model, netlist, device, long_path_thr, 0.5, sink,
    );
    placer.set_pseudo_net_weight(placer.pseudo_net_weight() * 0.85);
    placer.set_macro_legalization_parameters(
        placer.macro_pseudo_net_enhance_cnt() * 0.8,
        placer.macro_legalization_weight() * 0.8,
    );
    placer.set_neighbor_displacement_upperbound(3.0);
    placer.global_placement_clb_elements(
        &mut model,
        netlist,
        device,
        Some((&graph, &mut optimizer)),
        &ClbPlacementOptions {
            iterations: total_iters * 2 / 9,
            macro_legalize: true,
            spread_passes: 5,
            enable_timing: true,
            timing_net_weight: true,
            displacement_limit: 25.0,
        },
        sink,
    );

    placer.set_neighbor_displacement_upperbound(2.0);
    placer.global_placement_clb_elements(
        &mut model,
        netlist,
        device,
        Some((&graph, &mut optimizer)),
        &ClbPlacementOptions {
            iterations: total_iters * 2 / 9,
            macro_legalize: true,
            spread_passes: 5,
            enable_timing: true,
            timing_net_weight: true,
            displacement_limit: 25.0,
        },
        sink,
    );

    // Final phase: timing stays on but no fresh net-weight refresh or
    // clock-region anchoring.
    placer.global_placement_clb_elements(
        &mut model,
        netlist,
        device,
        Some((&graph, &mut optimizer)),
        &ClbPlacementOptions {
            iterations: total_iters / 2,
            macro_legalize: true,
            spread_passes: 5,
            enable_timing: true,
            timing_net_weight: false,
            displacement_limit: 25.0,
        },
        sink,
    );
    report_hpwl(&mut model, netlist, y2x, "after global placement", sink);

    // Checkpoint round-trip before final packing.
    model.clear_transient_flags();
    if let Some(path) = config.dump_path("PUInfoBeforeFinalPacking") {
        match dump_placement_units(&model, &path) {
            Ok(written) => {
                if let Err(e) = load_placement_units(&mut model, &written) {
                    sink.emit(Diagnostic::warning(
                        DiagnosticCode::new(Stage::Dump, 40),
                        format!("checkpoint reload failed: {e}"),
                    ));
                }
            }
            Err(e) => sink.emit(Diagnostic::warning(
                DiagnosticCode::new(Stage::Dump, 41),
                format!("checkpoint dump failed: {e}"),
            )),
        }
        report_hpwl(&mut model, netlist, y2x, "after checkpoint round-trip", sink);
    }

    optimizer.conduct_static_timing_analysis(&mut graph, &mut model, netlist, device, sink);

    // Final packing.
    let mut packer = ParallelSitePacker::new(PackerParams::default());
    packer.pack_clbs(&mut model, netlist, device, PACKER_MAX_ITER, true, sink);
    packer.set_pu_location_to_packed_site(&mut model, device);
    optimizer.conduct_static_timing_analysis(&mut graph, &mut model, netlist, device, sink);
    report_hpwl(&mut model, netlist, y2x, "after site packing", sink);

    packer.update_packed_macro(&mut model, netlist, device, true, true, y2x);
    if let Some(path) = config.dump_path("congestionInfo") {
        if let Err(e) = model.bins.dump_congestion(&path) {
            sink.emit(Diagnostic::warning(
                DiagnosticCode::new(Stage::Dump, 42),
                format!("congestion dump failed: {e}"),
            ));
        }
    }

    model.clear_transient_flags();
    if let Some(path) = config.dump_path("PUInfoFinal") {
        if let Err(e) = dump_placement_units(&model, &path) {
            sink.emit(Diagnostic::warning(
                DiagnosticCode::new(Stage::Dump, 43),
                format!("final checkpoint dump failed: {e}"),
            ));
        }
    }

    report_hpwl(&mut model, netlist, y2x, "placement done", sink);
    Ok(model)
}

fn report_hpwl(
    model: &mut PlacementModel,
    netlist: &Netlist,
    y2x: f64,
    milestone: &str,
    sink: &DiagnosticSink,
) {
    let hpwl = update_b2b_and_get_total_hpwl(model, netlist, y2x);
    sink.emit(Diagnostic::note(
        DiagnosticCode::new(Stage::GlobalPlacement, 6),
        format!("{milestone}: total HPWL = {hpwl:.2}"),
    ));
}
