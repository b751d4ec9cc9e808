//! Cell spreading against the utilization grid.
//!
//! Spreading relieves overfilled bins by shifting units toward
//! neighboring bins with headroom, one bounded step per pass. Moves are
//! planned in parallel from a consistent location snapshot and committed
//! at the end of the pass; each moved unit's post-spread location becomes
//! an anchor pseudo-net for the next quadratic solve.

use atoll_device::{Device, SiteKind};
use atoll_model::{PlacementModel, PuId, PuKind};
use atoll_netlist::Netlist;
use rayon::prelude::*;

/// One planned unit move.
#[derive(Debug, Clone, Copy)]
struct PlannedMove {
    pu: PuId,
    x: f64,
    y: f64,
}

/// Runs `passes` spreading passes and returns the post-spread locations
/// of every moved unit, for use as anchor pseudo-nets.
///
/// Each pass moves units out of bins whose demand exceeds the effective
/// capacity, toward the adjacent bin with the most headroom, displacing
/// each unit at most `displacement_cap`.
pub fn spread_cells(
    model: &mut PlacementModel,
    netlist: &Netlist,
    device: &Device,
    displacement_cap: f64,
    passes: usize,
) -> Vec<(PuId, f64, f64)> {
    let mut moved: std::collections::HashMap<PuId, (f64, f64)> = std::collections::HashMap::new();

    for _ in 0..passes {
        model.update_cell_locations(netlist);
        model.update_bin_demand(netlist, device);

        // Units per bin, with their per-kind element weight. A macro is
        // binned by its anchor and weighted by its member count.
        let bin_count = model.bins.bins.len();
        if bin_count == 0 {
            break;
        }
        let mut bin_units: Vec<Vec<(PuId, SiteKind, f64)>> = vec![Vec::new(); bin_count];
        for unit in &model.units {
            if unit.is_fixed {
                continue;
            }
            let (kind, weight) = match unit.kind {
                PuKind::UnpackedCell(cell) => {
                    let cell = netlist.cell(cell);
                    if cell.is_virtual {
                        continue;
                    }
                    (cell.kind.site_kind(), 1.0)
                }
                PuKind::Macro(m) => {
                    let m = netlist.design_macro(m);
                    let kind = netlist.cell(m.anchor()).kind.site_kind();
                    (kind, m.cells.len() as f64)
                }
            };
            let idx = model.bins.bin_index_at(unit.x, unit.y, device);
            bin_units[idx].push((unit.id, kind, weight));
        }

        let bins = &model.bins;
        let plans: Vec<Vec<PlannedMove>> = (0..bin_count)
            .into_par_iter()
            .map(|idx| {
                let mut plan = Vec::new();
                for kind in SiteKind::ALL {
                    let util = bins.utilization[kind.index()];
                    let overflow = bins.bins[idx].overflow(kind, util);
                    if overflow <= 0.0 {
                        continue;
                    }

                    // Neighbor with the most headroom receives the excess.
                    let target = bins
                        .neighbors(idx)
                        .into_iter()
                        .map(|n| (n, -bins.bins[n].overflow(kind, util)))
                        .max_by(|a, b| a.1.partial_cmp(&b.1).expect("finite headroom"));
                    let Some((target_idx, headroom)) = target else {
                        continue;
                    };
                    if headroom <= 0.0 {
                        continue;
                    }

                    let (tx, ty) = bins.bins[target_idx].center();
                    let mut candidates: Vec<&(PuId, SiteKind, f64)> = bin_units[idx]
                        .iter()
                        .filter(|(_, k, _)| *k == kind)
                        .collect();
                    // Move the units already closest to the target first.
                    candidates.sort_by(|a, b| {
                        let da = unit_dist(model, a.0, tx, ty);
                        let db = unit_dist(model, b.0, tx, ty);
                        da.partial_cmp(&db).expect("finite distance")
                    });

                    let mut remaining = overflow.min(headroom);
                    for (pu, _, weight) in candidates {
                        if remaining <= 0.0 {
                            break;
                        }
                        let unit = model.unit(*pu);
                        let (dx, dy) = (tx - unit.x, ty - unit.y);
                        let dist = dx.abs() + dy.abs();
                        if dist < 1e-12 {
                            continue;
                        }
                        let scale = (displacement_cap / dist).min(1.0);
                        plan.push(PlannedMove {
                            pu: *pu,
                            x: unit.x + dx * scale,
                            y: unit.y + dy * scale,
                        });
                        remaining -= weight;
                    }
                }
                plan
            })
            .collect();

        // Commit: all reads above saw the pass-start snapshot.
        let mut any = false;
        for plan in plans {
            for m in plan {
                let (x, y) = model.legalize_xy_in_area(netlist, device, m.pu, m.x, m.y);
                model.unit_mut(m.pu).set_location(x, y);
                moved.insert(m.pu, (x, y));
                any = true;
            }
        }
        if !any {
            break;
        }
    }

    model.update_cell_locations(netlist);
    moved.into_iter().map(|(pu, (x, y))| (pu, x, y)).collect()
}

fn unit_dist(model: &PlacementModel, pu: PuId, x: f64, y: f64) -> f64 {
    let unit = model.unit(pu);
    (unit.x - x).abs() + (unit.y - y).abs()
}
