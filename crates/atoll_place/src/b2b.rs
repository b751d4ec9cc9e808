//! Bound-to-bound quadratic system assembly.
//!
//! Each net is decomposed against its extremal pins: every non-extreme
//! pin connects to both bounds, and the bounds connect to each other,
//! with weights `w / (p - 1) / max(|delta|, EPS)` where `w` is the
//! timing-enhanced net weight and `delta` the current pin separation on
//! the axis. Fixed units fold into the right-hand side; pseudo-net
//! anchors add to the diagonal. The result is one positive-definite
//! system per axis.

use crate::solver::{SparseMatrix, TripletBuilder};
use atoll_model::{PlacementModel, PuId};
use atoll_netlist::{Netlist, PinId};

/// Minimum pin separation used in B2B edge weights.
pub const B2B_EPS: f64 = 1e-5;

/// The placement axis a system is assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Horizontal.
    X,
    /// Vertical.
    Y,
}

/// A pseudo-net anchor pulling one unit toward a target coordinate.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    /// The anchored unit.
    pub pu: PuId,
    /// Target coordinate on the assembled axis.
    pub target: f64,
    /// Anchor weight.
    pub weight: f64,
}

/// Maps movable units to dense solver indices.
pub struct MovableIndex {
    pu_to_idx: Vec<Option<u32>>,
    idx_to_pu: Vec<PuId>,
}

impl MovableIndex {
    /// Builds the index over all non-fixed units.
    pub fn build(model: &PlacementModel) -> Self {
        let mut pu_to_idx = vec![None; model.unit_count()];
        let mut idx_to_pu = Vec::new();
        for unit in &model.units {
            if !unit.is_fixed {
                pu_to_idx[unit.id.as_raw() as usize] = Some(idx_to_pu.len() as u32);
                idx_to_pu.push(unit.id);
            }
        }
        Self { pu_to_idx, idx_to_pu }
    }

    /// Solver index of a unit, `None` when the unit is fixed.
    pub fn index_of(&self, pu: PuId) -> Option<u32> {
        self.pu_to_idx[pu.as_raw() as usize]
    }

    /// The unit at a solver index.
    pub fn pu_at(&self, idx: usize) -> PuId {
        self.idx_to_pu[idx]
    }

    /// Number of movable units.
    pub fn len(&self) -> usize {
        self.idx_to_pu.len()
    }

    /// Whether no unit is movable.
    pub fn is_empty(&self) -> bool {
        self.idx_to_pu.is_empty()
    }
}

/// One axis of the quadratic placement problem.
pub struct QuadraticSystem {
    /// The symmetric positive-definite matrix.
    pub matrix: SparseMatrix,
    /// The right-hand side.
    pub rhs: Vec<f64>,
    /// Current coordinates of the movable units (warm start).
    pub start: Vec<f64>,
}

/// Assembles the B2B system for one axis.
///
/// Expects `update_b2b_and_get_total_hpwl` to have refreshed pin
/// locations and per-net extremes. `anchors` carries all pseudo-nets of
/// this iteration (spreading, clock-region, macro legalization).
pub fn build_axis_system(
    netlist: &Netlist,
    model: &PlacementModel,
    index: &MovableIndex,
    axis: Axis,
    anchors: &[Anchor],
) -> QuadraticSystem {
    let n = index.len();
    let mut triplets = TripletBuilder::new(n);
    let mut rhs = vec![0.0; n];

    for net in &netlist.nets {
        let Some(ext) = model.net_extremes[net.id.as_raw() as usize] else {
            continue;
        };
        let p = net.pin_count();
        let weight = net.timing_enhancement / (p - 1) as f64;
        let (lo, hi) = match axis {
            Axis::X => (ext.min_x, ext.max_x),
            Axis::Y => (ext.min_y, ext.max_y),
        };

        add_b2b_edge(netlist, model, index, axis, &mut triplets, &mut rhs, lo, hi, weight);
        for pin in net.pins() {
            if pin == lo || pin == hi {
                continue;
            }
            add_b2b_edge(netlist, model, index, axis, &mut triplets, &mut rhs, pin, lo, weight);
            add_b2b_edge(netlist, model, index, axis, &mut triplets, &mut rhs, pin, hi, weight);
        }
    }

    for anchor in anchors {
        if let Some(i) = index.index_of(anchor.pu) {
            triplets.add(i, i, anchor.weight);
            rhs[i as usize] += anchor.weight * anchor.target;
        }
    }

    // A tiny diagonal regularizer keeps units untouched by any net or
    // anchor where they are.
    let start: Vec<f64> = (0..n)
        .map(|i| {
            let unit = model.unit(index.pu_at(i));
            match axis {
                Axis::X => unit.x,
                Axis::Y => unit.y,
            }
        })
        .collect();
    for (i, &coord) in start.iter().enumerate() {
        triplets.add(i as u32, i as u32, 1e-9);
        rhs[i] += 1e-9 * coord;
    }

    QuadraticSystem {
        matrix: triplets.build(),
        rhs,
        start,
    }
}

/// Adds one weighted two-pin edge of the B2B decomposition.
#[allow(clippy::too_many_arguments)]
fn add_b2b_edge(
    netlist: &Netlist,
    model: &PlacementModel,
    index: &MovableIndex,
    axis: Axis,
    triplets: &mut TripletBuilder,
    rhs: &mut [f64],
    pin_a: PinId,
    pin_b: PinId,
    net_weight: f64,
) {
    let (pos_a, off_a, idx_a) = pin_on_axis(netlist, model, index, axis, pin_a);
    let (pos_b, off_b, idx_b) = pin_on_axis(netlist, model, index, axis, pin_b);

    let w = net_weight / (pos_a - pos_b).abs().max(B2B_EPS);

    match (idx_a, idx_b) {
        (Some(i), Some(j)) => {
            triplets.add(i, i, w);
            triplets.add(j, j, w);
            triplets.add(i, j, -w);
            triplets.add(j, i, -w);
            rhs[i as usize] += w * (off_b - off_a);
            rhs[j as usize] += w * (off_a - off_b);
        }
        (Some(i), None) => {
            triplets.add(i, i, w);
            rhs[i as usize] += w * (pos_b - off_a);
        }
        (None, Some(j)) => {
            triplets.add(j, j, w);
            rhs[j as usize] += w * (pos_a - off_b);
        }
        (None, None) => {}
    }
}

/// Resolves a pin to its axis position, its offset from the owning
/// unit's origin, and the unit's solver index (if movable).
fn pin_on_axis(
    netlist: &Netlist,
    model: &PlacementModel,
    index: &MovableIndex,
    axis: Axis,
    pin: PinId,
) -> (f64, f64, Option<u32>) {
    let cell = netlist.pin(pin).cell;
    let pu = model.unit_of_cell(cell);
    let unit = model.unit(pu);
    let (px, py) = model.pin_location(pin);
    let (pos, origin) = match axis {
        Axis::X => (px, unit.x),
        Axis::Y => (py, unit.y),
    };
    (pos, pos - origin, index.index_of(pu))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::CgSolver;
    use atoll_model::update_b2b_and_get_total_hpwl;
    use atoll_netlist::{CellKind, PinDirection};

    fn two_cell_net(x0: f64, x1: f64) -> (Netlist, PlacementModel) {
        let mut nl = Netlist::new();
        let a = nl.add_cell("a", CellKind::Lut { inputs: 4 });
        let b = nl.add_cell("b", CellKind::Ff);
        let n = nl.add_net("n");
        nl.add_pin(a, "O", PinDirection::Output, Some(n));
        nl.add_pin(b, "D", PinDirection::Input, Some(n));
        let mut model = PlacementModel::from_netlist(&nl);
        model.units[0].set_location(x0, 0.0);
        model.units[1].set_location(x1, 0.0);
        update_b2b_and_get_total_hpwl(&mut model, &nl, 1.0);
        (nl, model)
    }

    #[test]
    fn two_pin_edge_weight() {
        // pins 10 apart: edge weight = w / (p-1) / |delta| = 1 / 1 / 10
        let (nl, model) = two_cell_net(0.0, 10.0);
        let index = MovableIndex::build(&model);
        let sys = build_axis_system(&nl, &model, &index, Axis::X, &[]);
        // diagonal picks up the edge weight (plus the tiny regularizer)
        assert!((sys.matrix.diag(0) - 0.1).abs() < 1e-6);
        assert!((sys.matrix.diag(1) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn solver_pulls_movable_to_fixed() {
        let (nl, mut model) = two_cell_net(0.0, 10.0);
        model.units[1].set_fixed();
        update_b2b_and_get_total_hpwl(&mut model, &nl, 1.0);
        let index = MovableIndex::build(&model);
        assert_eq!(index.len(), 1);

        let sys = build_axis_system(&nl, &model, &index, Axis::X, &[]);
        let out = CgSolver::default().solve(&sys.matrix, &sys.rhs, &sys.start);
        assert!(out.converged);
        // the only optimum is on top of the fixed pin
        assert!((out.x[0] - 10.0).abs() < 1e-3);
    }

    #[test]
    fn anchor_pulls_isolated_unit() {
        let mut nl = Netlist::new();
        nl.add_cell("solo", CellKind::Ff);
        let mut model = PlacementModel::from_netlist(&nl);
        model.units[0].set_location(2.0, 2.0);
        update_b2b_and_get_total_hpwl(&mut model, &nl, 1.0);

        let index = MovableIndex::build(&model);
        let anchors = [Anchor {
            pu: PuId::from_raw(0),
            target: 7.0,
            weight: 1.0,
        }];
        let sys = build_axis_system(&nl, &model, &index, Axis::X, &anchors);
        let out = CgSolver::default().solve(&sys.matrix, &sys.rhs, &sys.start);
        assert!((out.x[0] - 7.0).abs() < 1e-6);
    }

    #[test]
    fn unconnected_unit_stays_put() {
        let mut nl = Netlist::new();
        nl.add_cell("solo", CellKind::Ff);
        let mut model = PlacementModel::from_netlist(&nl);
        model.units[0].set_location(3.5, 1.0);
        update_b2b_and_get_total_hpwl(&mut model, &nl, 1.0);

        let index = MovableIndex::build(&model);
        let sys = build_axis_system(&nl, &model, &index, Axis::X, &[]);
        let out = CgSolver::default().solve(&sys.matrix, &sys.rhs, &sys.start);
        assert!((out.x[0] - 3.5).abs() < 1e-6);
    }

    #[test]
    fn timing_enhanced_net_weighs_more() {
        let (nl, model) = two_cell_net(0.0, 10.0);
        let index = MovableIndex::build(&model);
        let plain = build_axis_system(&nl, &model, &index, Axis::X, &[]);

        let mut nl2 = nl.clone();
        nl2.net_mut(atoll_netlist::NetId::from_raw(0)).enhance_timing(3.0);
        let boosted = build_axis_system(&nl2, &model, &index, Axis::X, &[]);
        assert!(boosted.matrix.diag(0) > plain.matrix.diag(0) * 2.5);
    }

    #[test]
    fn three_pin_net_connects_middle_to_both_bounds() {
        let mut nl = Netlist::new();
        let a = nl.add_cell("a", CellKind::Lut { inputs: 4 });
        let b = nl.add_cell("b", CellKind::Ff);
        let c = nl.add_cell("c", CellKind::Ff);
        let n = nl.add_net("n");
        nl.add_pin(a, "O", PinDirection::Output, Some(n));
        nl.add_pin(b, "D", PinDirection::Input, Some(n));
        nl.add_pin(c, "D", PinDirection::Input, Some(n));
        let mut model = PlacementModel::from_netlist(&nl);
        model.units[0].set_location(0.0, 0.0);
        model.units[1].set_location(5.0, 0.0);
        model.units[2].set_location(10.0, 0.0);
        update_b2b_and_get_total_hpwl(&mut model, &nl, 1.0);

        // fix the bounds: the middle unit must settle between them
        model.units[0].set_fixed();
        model.units[2].set_fixed();
        update_b2b_and_get_total_hpwl(&mut model, &nl, 1.0);
        let index = MovableIndex::build(&model);
        let sys = build_axis_system(&nl, &model, &index, Axis::X, &[]);
        let out = CgSolver::default().solve(&sys.matrix, &sys.rhs, &sys.start);
        assert!(out.x[0] > 0.0 && out.x[0] < 10.0);
    }

    #[test]
    fn macro_member_offsets_fold_into_rhs() {
        // A two-cell macro whose second member connects to a fixed cell:
        // the solved anchor position compensates for the member offset.
        let mut nl = Netlist::new();
        let m0 = nl.add_cell("m0", CellKind::Carry);
        let m1 = nl.add_cell("m1", CellKind::Carry);
        nl.add_macro("mac", vec![m0, m1], vec![(0.0, 0.0), (2.0, 0.0)]);
        let f = nl.add_cell("fixed", CellKind::Ff);
        let n = nl.add_net("n");
        nl.add_pin(m1, "O", PinDirection::Output, Some(n));
        nl.add_pin(f, "D", PinDirection::Input, Some(n));

        let mut model = PlacementModel::from_netlist(&nl);
        let macro_pu = model.unit_of_cell(m0);
        let fixed_pu = model.unit_of_cell(f);
        model.unit_mut(macro_pu).set_location(0.0, 0.0);
        model.unit_mut(fixed_pu).set_location(8.0, 0.0);
        model.unit_mut(fixed_pu).set_fixed();
        update_b2b_and_get_total_hpwl(&mut model, &nl, 1.0);

        let index = MovableIndex::build(&model);
        let sys = build_axis_system(&nl, &model, &index, Axis::X, &[]);
        let out = CgSolver::default().solve(&sys.matrix, &sys.rhs, &sys.start);
        // m1 sits at anchor + 2, so the anchor lands at 6 to close the net
        let i = index.index_of(macro_pu).unwrap() as usize;
        assert!((out.x[i] - 6.0).abs() < 1e-3);
    }
}
