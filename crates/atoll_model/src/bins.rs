//! Per-type resource utilization grid bins.
//!
//! The device is partitioned into rectangular bins. Each bin accumulates
//! per-site-kind capacity (from the device) and demand (from the placed
//! cells); the spreading step of the global placer moves cells out of
//! overfilled bins. Utilization targets scale the effective capacity so
//! spreading can be made more or less aggressive per phase.

use atoll_device::{Device, SiteKind};
use atoll_netlist::{CellId, Netlist};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// One rectangular bin of the utilization grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bin {
    /// Column index of this bin.
    pub col: usize,
    /// Row index of this bin.
    pub row: usize,
    /// Left edge (inclusive).
    pub x0: f64,
    /// Bottom edge (inclusive).
    pub y0: f64,
    /// Right edge (exclusive).
    pub x1: f64,
    /// Top edge (exclusive).
    pub y1: f64,
    /// Basic-element capacity per site kind, indexed by [`SiteKind::index`].
    pub capacity: [f64; SiteKind::COUNT],
    /// Accumulated demand per site kind.
    pub demand: [f64; SiteKind::COUNT],
}

impl Bin {
    /// Returns the bin's center.
    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Demand in excess of effective capacity for `kind` (negative when
    /// the bin has headroom).
    pub fn overflow(&self, kind: SiteKind, utilization: f64) -> f64 {
        let i = kind.index();
        self.demand[i] - self.capacity[i] * utilization
    }
}

/// The utilization grid over the whole device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridBins {
    /// Bin width used to build the grid.
    pub bin_w: f64,
    /// Bin height used to build the grid.
    pub bin_h: f64,
    /// Number of bin columns.
    pub cols: usize,
    /// Number of bin rows.
    pub rows: usize,
    /// Bins in row-major order.
    pub bins: Vec<Bin>,
    /// Per-kind utilization targets scaling effective capacity.
    pub utilization: [f64; SiteKind::COUNT],
}

impl GridBins {
    /// An empty zero-bin grid, the state before [`build`](Self::build).
    pub fn empty() -> Self {
        Self {
            bin_w: 0.0,
            bin_h: 0.0,
            cols: 0,
            rows: 0,
            bins: Vec::new(),
            utilization: [1.0; SiteKind::COUNT],
        }
    }

    /// Builds the grid at the given resolution, accumulating capacity from
    /// the device's sites.
    pub fn build(device: &Device, bin_w: f64, bin_h: f64) -> Self {
        let cols = (device.width / bin_w).ceil().max(1.0) as usize;
        let rows = (device.height / bin_h).ceil().max(1.0) as usize;
        let mut bins = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                bins.push(Bin {
                    col,
                    row,
                    x0: col as f64 * bin_w,
                    y0: row as f64 * bin_h,
                    x1: ((col + 1) as f64 * bin_w).min(device.width),
                    y1: ((row + 1) as f64 * bin_h).min(device.height),
                    capacity: [0.0; SiteKind::COUNT],
                    demand: [0.0; SiteKind::COUNT],
                });
            }
        }

        let mut grid = Self {
            bin_w,
            bin_h,
            cols,
            rows,
            bins,
            utilization: [1.0; SiteKind::COUNT],
        };
        for site in &device.sites {
            let idx = grid.bin_index_at(site.x, site.y, device);
            grid.bins[idx].capacity[site.kind.index()] +=
                device.elements_per_site(site.kind) as f64;
        }
        grid
    }

    /// Returns the index of the bin containing the clamped location.
    pub fn bin_index_at(&self, x: f64, y: f64, device: &Device) -> usize {
        let x = x.clamp(0.0, device.width - 1e-9);
        let y = y.clamp(0.0, device.height - 1e-9);
        let col = ((x / self.bin_w) as usize).min(self.cols - 1);
        let row = ((y / self.bin_h) as usize).min(self.rows - 1);
        row * self.cols + col
    }

    /// Recomputes per-bin demand from the current cell locations.
    ///
    /// Every non-virtual cell contributes one basic element of its site
    /// kind to the bin containing its location. `cell_location` resolves a
    /// cell to its placed location.
    pub fn update_demand_with(
        &mut self,
        netlist: &Netlist,
        device: &Device,
        cell_location: impl Fn(CellId) -> (f64, f64),
    ) {
        for bin in &mut self.bins {
            bin.demand = [0.0; SiteKind::COUNT];
        }
        for cell in &netlist.cells {
            if cell.is_virtual {
                continue;
            }
            let (x, y) = cell_location(cell.id);
            let idx = self.bin_index_at(x, y, device);
            self.bins[idx].demand[cell.kind.site_kind().index()] += 1.0;
        }
    }

    /// Scales the logic (LUT/FF) utilization target.
    pub fn adjust_logic_utilization(&mut self, ratio: f64) {
        self.utilization[SiteKind::Logic.index()] = ratio;
    }

    /// Total demand over all bins for `kind`.
    pub fn total_demand(&self, kind: SiteKind) -> f64 {
        self.bins.iter().map(|b| b.demand[kind.index()]).sum()
    }

    /// Total raw capacity over all bins for `kind`.
    pub fn total_capacity(&self, kind: SiteKind) -> f64 {
        self.bins.iter().map(|b| b.capacity[kind.index()]).sum()
    }

    /// Returns the indices of the (up to 4) edge-adjacent neighbor bins.
    pub fn neighbors(&self, idx: usize) -> Vec<usize> {
        let col = self.bins[idx].col;
        let row = self.bins[idx].row;
        let mut out = Vec::with_capacity(4);
        if col > 0 {
            out.push(idx - 1);
        }
        if col + 1 < self.cols {
            out.push(idx + 1);
        }
        if row > 0 {
            out.push(idx - self.cols);
        }
        if row + 1 < self.rows {
            out.push(idx + self.cols);
        }
        out
    }

    /// Writes a per-bin congestion table (`col row kind demand capacity`)
    /// to the given path.
    pub fn dump_congestion(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        for bin in &self.bins {
            for kind in SiteKind::ALL {
                let i = kind.index();
                if bin.capacity[i] == 0.0 && bin.demand[i] == 0.0 {
                    continue;
                }
                writeln!(
                    file,
                    "{} {} {:?} {} {}",
                    bin.col, bin.row, kind, bin.demand[i], bin.capacity[i]
                )?;
            }
        }
        Ok(())
    }
}
