//! Macro shape legalization via pseudo-net anchors.
//!
//! A macro is legal when every member cell, at the anchor position plus
//! its shape offset, lands on a site compatible with the cell's kind.
//! Illegal macros are pulled toward the nearest feasible anchor with a
//! pseudo-net whose weight grows per attempt; a macro that stays illegal
//! after the attempt budget is reported and left at its best-effort
//! location for the packer to resolve.

use crate::b2b::Anchor;
use atoll_device::Device;
use atoll_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Stage};
use atoll_model::{PlacementModel, PuId, PuKind};
use atoll_netlist::Netlist;
use std::collections::HashMap;

/// Search radius for feasible anchor positions.
const LEGAL_ANCHOR_SEARCH_RADIUS: i64 = 24;

/// Tracks per-macro legalization attempts across outer iterations.
pub struct MacroLegalizer {
    attempts: HashMap<PuId, u32>,
    reported: std::collections::HashSet<PuId>,
}

impl MacroLegalizer {
    /// Creates a legalizer with no attempt history.
    pub fn new() -> Self {
        Self {
            attempts: HashMap::new(),
            reported: std::collections::HashSet::new(),
        }
    }

    /// Resets the attempt history (called when the weight schedule decays
    /// between phases).
    pub fn reset(&mut self) {
        self.attempts.clear();
        self.reported.clear();
    }

    /// Produces legalization pseudo-net anchors for every illegal macro.
    ///
    /// The anchor weight is `base_weight` scaled by the macro's attempt
    /// count; once a macro exceeds `max_attempts` it is warned about once
    /// and no longer anchored.
    pub fn collect_anchors(
        &mut self,
        model: &PlacementModel,
        netlist: &Netlist,
        device: &Device,
        base_weight: f64,
        max_attempts: u32,
        sink: &DiagnosticSink,
    ) -> (Vec<Anchor>, Vec<Anchor>) {
        let mut x_anchors = Vec::new();
        let mut y_anchors = Vec::new();

        for unit in &model.units {
            if !unit.is_macro() || unit.is_fixed {
                continue;
            }
            if macro_is_legal(model, netlist, device, unit.id) {
                self.attempts.remove(&unit.id);
                continue;
            }

            let attempt = self.attempts.entry(unit.id).or_insert(0);
            *attempt += 1;
            if *attempt > max_attempts {
                if self.reported.insert(unit.id) {
                    let name = match unit.kind {
                        PuKind::Macro(m) => netlist.design_macro(m).name.clone(),
                        PuKind::UnpackedCell(_) => unreachable!("only macros are legalized"),
                    };
                    sink.emit(Diagnostic::warning(
                        DiagnosticCode::new(Stage::GlobalPlacement, 20),
                        format!(
                            "macro '{name}' not legalized after {max_attempts} attempts, leaving at best-effort location"
                        ),
                    ));
                }
                continue;
            }

            let Some((tx, ty)) = find_nearest_legal_anchor(model, netlist, device, unit.id)
            else {
                continue;
            };
            let weight = base_weight * *attempt as f64;
            x_anchors.push(Anchor {
                pu: unit.id,
                target: tx,
                weight,
            });
            y_anchors.push(Anchor {
                pu: unit.id,
                target: ty,
                weight,
            });
        }
        (x_anchors, y_anchors)
    }
}

impl Default for MacroLegalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks whether every member cell of the macro unit sits on a
/// compatible site when locations are rounded to the grid.
pub fn macro_is_legal(
    model: &PlacementModel,
    netlist: &Netlist,
    device: &Device,
    pu: PuId,
) -> bool {
    anchor_is_legal(model, netlist, device, pu, model.unit(pu).x, model.unit(pu).y)
}

fn anchor_is_legal(
    model: &PlacementModel,
    netlist: &Netlist,
    device: &Device,
    pu: PuId,
    x: f64,
    y: f64,
) -> bool {
    let PuKind::Macro(m) = model.unit(pu).kind else {
        return true;
    };
    let m = netlist.design_macro(m);
    m.cells.iter().zip(&m.offsets).all(|(&cell, &(dx, dy))| {
        let kind = netlist.cell(cell).kind.site_kind();
        device.has_site_of_kind_at(kind, x + dx, y + dy)
    })
}

/// Finds the feasible anchor position nearest to the macro's current
/// location, searching outward ring by ring over the site grid.
pub fn find_nearest_legal_anchor(
    model: &PlacementModel,
    netlist: &Netlist,
    device: &Device,
    pu: PuId,
) -> Option<(f64, f64)> {
    let unit = model.unit(pu);
    let cx = unit.x.round() as i64;
    let cy = unit.y.round() as i64;

    for radius in 0..=LEGAL_ANCHOR_SEARCH_RADIUS {
        let mut best: Option<(f64, (f64, f64))> = None;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs().max(dy.abs()) != radius {
                    continue;
                }
                let (x, y) = ((cx + dx) as f64, (cy + dy) as f64);
                if x < 0.0 || y < 0.0 || x >= device.width || y >= device.height {
                    continue;
                }
                if anchor_is_legal(model, netlist, device, pu, x, y) {
                    let dist = (x - unit.x).abs() + (y - unit.y).abs();
                    if best.map(|(d, _)| dist < d).unwrap_or(true) {
                        best = Some((dist, (x, y)));
                    }
                }
            }
        }
        if let Some((_, loc)) = best {
            return Some(loc);
        }
    }
    None
}
