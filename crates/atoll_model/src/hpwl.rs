//! Wirelength bookkeeping: per-net bound pins and total HPWL.
//!
//! The bound-to-bound net model needs the extremal pin on each axis of
//! every net; those extremes are refreshed together with the HPWL total so
//! the quadratic solver always linearizes against current locations.

use crate::model::PlacementModel;
use atoll_netlist::{Netlist, PinId};
use serde::{Deserialize, Serialize};

/// The extremal pins of a net on both axes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NetExtremes {
    /// Pin with the minimum X coordinate.
    pub min_x: PinId,
    /// Pin with the maximum X coordinate.
    pub max_x: PinId,
    /// Pin with the minimum Y coordinate.
    pub min_y: PinId,
    /// Pin with the maximum Y coordinate.
    pub max_y: PinId,
}

/// Refreshes cell/pin locations and per-net extremes, returning the total
/// half-perimeter wirelength.
///
/// For each net with at least two pins,
/// `hpwl = (max_x - min_x) + y2x_ratio * (max_y - min_y)`.
/// Nets with fewer than two pins contribute nothing and get no extremes.
pub fn update_b2b_and_get_total_hpwl(
    model: &mut PlacementModel,
    netlist: &Netlist,
    y2x_ratio: f64,
) -> f64 {
    model.update_cell_locations(netlist);
    model.set_pin_locations(netlist);

    let mut total = 0.0;
    for net in &netlist.nets {
        let idx = net.id.as_raw() as usize;
        if net.pin_count() < 2 {
            model.net_extremes[idx] = None;
            continue;
        }

        let mut pins = net.pins();
        let first = pins.next().expect("net has pins");
        let (fx, fy) = model.pin_location(first);
        let mut ext = NetExtremes {
            min_x: first,
            max_x: first,
            min_y: first,
            max_y: first,
        };
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (fx, fx, fy, fy);

        for pin in pins {
            let (x, y) = model.pin_location(pin);
            if x < min_x {
                min_x = x;
                ext.min_x = pin;
            }
            if x > max_x {
                max_x = x;
                ext.max_x = pin;
            }
            if y < min_y {
                min_y = y;
                ext.min_y = pin;
            }
            if y > max_y {
                max_y = y;
                ext.max_y = pin;
            }
        }

        total += (max_x - min_x) + y2x_ratio * (max_y - min_y);
        model.net_extremes[idx] = Some(ext);
    }
    total
}
