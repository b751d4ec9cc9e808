//! LUT pairing within a packed site.
//!
//! Two LUTs committed to the same site may share a fracturable basic
//! element when their combined distinct input nets fit the element's
//! input capacity and they already share enough nets to make the fused
//! routing worthwhile.

use atoll_netlist::{CellId, NetId, Netlist, PinDirection};
use std::collections::HashSet;

/// Input capacity of a fracturable LUT basic element.
pub const PAIRED_LUT_INPUT_CAPACITY: usize = 6;

/// Returns the distinct input nets of a LUT cell.
fn input_nets(netlist: &Netlist, cell: CellId) -> HashSet<NetId> {
    netlist
        .cell(cell)
        .pins
        .iter()
        .filter_map(|&p| {
            let pin = netlist.pin(p);
            if pin.direction == PinDirection::Input {
                pin.net
            } else {
                None
            }
        })
        .collect()
}

/// The shared-net ratio of two LUTs: shared nets over the union.
pub fn net_share(netlist: &Netlist, a: CellId, b: CellId) -> f64 {
    let nets_a = input_nets(netlist, a);
    let nets_b = input_nets(netlist, b);
    let union = nets_a.union(&nets_b).count();
    if union == 0 {
        return 0.0;
    }
    nets_a.intersection(&nets_b).count() as f64 / union as f64
}

/// Returns `true` if two LUTs can share one basic element.
pub fn can_pair(netlist: &Netlist, a: CellId, b: CellId, net_share_threshold: f64) -> bool {
    let nets_a = input_nets(netlist, a);
    let nets_b = input_nets(netlist, b);
    let union = nets_a.union(&nets_b).count();
    if union > PAIRED_LUT_INPUT_CAPACITY {
        return false;
    }
    let share = if union == 0 {
        0.0
    } else {
        nets_a.intersection(&nets_b).count() as f64 / union as f64
    };
    share >= net_share_threshold
}

/// Greedily pairs the LUTs of one site.
///
/// Each LUT pairs with the unpaired partner of highest net share that
/// satisfies [`can_pair`]; the rest stay on their own elements.
pub fn pair_luts_in_site(
    netlist: &Netlist,
    luts: &[CellId],
    net_share_threshold: f64,
) -> Vec<(CellId, CellId)> {
    let mut pairs = Vec::new();
    let mut taken = vec![false; luts.len()];
    for i in 0..luts.len() {
        if taken[i] {
            continue;
        }
        let mut best: Option<(usize, f64)> = None;
        for j in (i + 1)..luts.len() {
            if taken[j] || !can_pair(netlist, luts[i], luts[j], net_share_threshold) {
                continue;
            }
            let share = net_share(netlist, luts[i], luts[j]);
            if best.map(|(_, s)| share > s).unwrap_or(true) {
                best = Some((j, share));
            }
        }
        if let Some((j, _)) = best {
            taken[i] = true;
            taken[j] = true;
            pairs.push((luts[i], luts[j]));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use atoll_netlist::CellKind;

    /// Builds LUTs wired to the given shared input nets.
    fn luts_with_nets(net_lists: &[&[usize]]) -> (Netlist, Vec<CellId>) {
        let mut nl = Netlist::new();
        let max_net = net_lists.iter().flat_map(|l| l.iter()).max().copied().unwrap_or(0);
        let nets: Vec<_> = (0..=max_net).map(|i| nl.add_net(format!("n{i}"))).collect();
        let mut cells = Vec::new();
        for (i, list) in net_lists.iter().enumerate() {
            let c = nl.add_cell(format!("lut_{i}"), CellKind::Lut { inputs: 6 });
            for (k, &net) in list.iter().enumerate() {
                nl.add_pin(c, format!("I{k}"), PinDirection::Input, Some(nets[net]));
            }
            cells.push(c);
        }
        (nl, cells)
    }

    #[test]
    fn identical_inputs_share_fully() {
        let (nl, cells) = luts_with_nets(&[&[0, 1, 2], &[0, 1, 2]]);
        assert_eq!(net_share(&nl, cells[0], cells[1]), 1.0);
        assert!(can_pair(&nl, cells[0], cells[1], 0.5));
    }

    #[test]
    fn disjoint_inputs_do_not_pair() {
        let (nl, cells) = luts_with_nets(&[&[0, 1, 2], &[3, 4, 5]]);
        assert_eq!(net_share(&nl, cells[0], cells[1]), 0.0);
        assert!(!can_pair(&nl, cells[0], cells[1], 0.5));
    }

    #[test]
    fn capacity_bound_blocks_wide_union() {
        // 4 + 4 distinct inputs exceed the 6-input element
        let (nl, cells) = luts_with_nets(&[&[0, 1, 2, 3], &[4, 5, 6, 7]]);
        assert!(!can_pair(&nl, cells[0], cells[1], 0.0));
    }

    #[test]
    fn partial_share_meets_threshold() {
        // union {0,1,2,3} = 4 nets, shared {1,2} = 2: share 0.5
        let (nl, cells) = luts_with_nets(&[&[0, 1, 2], &[1, 2, 3]]);
        assert_eq!(net_share(&nl, cells[0], cells[1]), 0.5);
        assert!(can_pair(&nl, cells[0], cells[1], 0.5));
        assert!(!can_pair(&nl, cells[0], cells[1], 0.6));
    }

    #[test]
    fn greedy_pairing_prefers_best_partner() {
        let (nl, cells) = luts_with_nets(&[
            &[0, 1, 2],    // lut_0
            &[0, 1, 3],    // lut_1: share 0.5 with lut_0
            &[0, 1, 2],    // lut_2: share 1.0 with lut_0
        ]);
        let pairs = pair_luts_in_site(&nl, &cells, 0.5);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0], (cells[0], cells[2]));
    }

    #[test]
    fn no_inputs_no_pairing() {
        let (nl, cells) = luts_with_nets(&[&[], &[]]);
        assert!(pair_luts_in_site(&nl, &cells, 0.5).is_empty());
    }
}
