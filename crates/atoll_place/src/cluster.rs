//! Connectivity-clustered seed placement.
//!
//! Before the first quadratic solve every unit needs a coarse location.
//! Units are grouped by net connectivity (small nets only, so clock and
//! reset fanouts do not glue the whole design together), each cluster is
//! assigned a random center on the device, and members land around that
//! center with a small deterministic scatter.

use atoll_device::Device;
use atoll_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Stage};
use atoll_model::{PlacementModel, PuId};
use atoll_netlist::Netlist;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Nets larger than this do not contribute to connectivity clustering.
const CLUSTER_NET_SIZE_LIMIT: usize = 16;

/// Cap on cluster size, to keep seed clusters local.
const CLUSTER_SIZE_LIMIT: usize = 64;

/// Seed for the cluster-center generator, fixed for reproducible runs.
const CLUSTER_SEED: u64 = 0x0a7011;

/// Assigns every movable unit a coarse seed location.
pub fn cluster_placement(
    model: &mut PlacementModel,
    netlist: &Netlist,
    device: &Device,
    sink: &DiagnosticSink,
) {
    let n = model.unit_count();
    if n == 0 {
        return;
    }

    // Union-find over units, joined through small nets.
    let mut parent: Vec<u32> = (0..n as u32).collect();
    fn find(parent: &mut [u32], i: u32) -> u32 {
        let mut root = i;
        while parent[root as usize] != root {
            root = parent[root as usize];
        }
        let mut cur = i;
        while parent[cur as usize] != root {
            let next = parent[cur as usize];
            parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    for net in &netlist.nets {
        if net.pin_count() < 2 || net.pin_count() > CLUSTER_NET_SIZE_LIMIT {
            continue;
        }
        let mut pins = net.pins();
        let first = model
            .unit_of_cell(netlist.pin(pins.next().expect("net has pins")).cell)
            .as_raw();
        for pin in pins {
            let other = model.unit_of_cell(netlist.pin(pin).cell).as_raw();
            let (ra, rb) = (find(&mut parent, first), find(&mut parent, other));
            if ra != rb {
                parent[rb as usize] = ra;
            }
        }
    }

    // Bucket units per cluster root, splitting oversized clusters.
    let mut clusters: std::collections::HashMap<u32, Vec<PuId>> = std::collections::HashMap::new();
    for i in 0..n as u32 {
        let root = find(&mut parent, i);
        clusters.entry(root).or_default().push(PuId::from_raw(i));
    }

    let mut rng = StdRng::seed_from_u64(CLUSTER_SEED);
    let mut cluster_count = 0usize;
    for (_, members) in clusters {
        for chunk in members.chunks(CLUSTER_SIZE_LIMIT) {
            cluster_count += 1;
            let cx = rng.gen_range(0.0..device.width);
            let cy = rng.gen_range(0.0..device.height);
            for (k, &pu) in chunk.iter().enumerate() {
                if model.unit(pu).is_fixed {
                    continue;
                }
                // Deterministic scatter so members do not stack exactly.
                let jitter_x = (k % 8) as f64 * 0.25;
                let jitter_y = (k / 8) as f64 * 0.25;
                let (x, y) =
                    model.legalize_xy_in_area(netlist, device, pu, cx + jitter_x, cy + jitter_y);
                model.unit_mut(pu).set_location(x, y);
            }
        }
    }

    model.update_cell_locations(netlist);
    sink.emit(Diagnostic::note(
        DiagnosticCode::new(Stage::GlobalPlacement, 3),
        format!("cluster placement seeded {n} units in {cluster_count} clusters"),
    ));
}
