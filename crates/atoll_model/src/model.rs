//! The placement model.
//!
//! Aggregates the placement units (one per macro, one per non-macro cell),
//! the derived per-cell and per-pin locations, the utilization grid bins,
//! and the clock-region anchor targets produced by the timing optimizer.
//! The model borrows nothing: operations take the netlist and device by
//! reference, so ownership stays acyclic.

use crate::bins::GridBins;
use crate::hpwl::NetExtremes;
use crate::ids::PuId;
use crate::unit::{PlacementUnit, PuKind};
use atoll_common::{AbortError, AtollResult};
use atoll_device::{Device, SiteKind};
use atoll_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Stage};
use atoll_netlist::{CellId, Netlist, PinId};
use std::collections::HashMap;

/// The placement model: units, locations, bins, and anchor targets.
#[derive(Debug, Clone)]
pub struct PlacementModel {
    /// All placement units.
    pub units: Vec<PlacementUnit>,
    /// Dense map from cell ID to owning unit.
    cell_to_unit: Vec<PuId>,
    /// Per-cell locations derived from unit locations and macro offsets.
    cell_locations: Vec<(f64, f64)>,
    /// Per-pin locations derived from cell locations and pin offsets.
    pin_locations: Vec<(f64, f64)>,
    /// The utilization grid bins; empty until
    /// [`create_grid_bins`](Self::create_grid_bins).
    pub bins: GridBins,
    /// Per-net bound pins, refreshed by
    /// [`update_b2b_and_get_total_hpwl`](crate::hpwl::update_b2b_and_get_total_hpwl).
    pub net_extremes: Vec<Option<NetExtremes>>,
    /// Clock-region anchor targets assigned by the timing optimizer,
    /// consumed as pseudo-nets by the global placer.
    pub pu_clock_region_targets: HashMap<PuId, (f64, f64)>,
}

impl PlacementModel {
    /// Builds the model from a netlist with pre-formed macros: one unit
    /// per macro plus one unit per cell outside any macro.
    pub fn from_netlist(netlist: &Netlist) -> Self {
        let mut units = Vec::new();
        let mut cell_to_unit = vec![PuId::from_raw(0); netlist.cell_count()];

        for m in &netlist.macros {
            let id = PuId::from_raw(units.len() as u32);
            units.push(PlacementUnit::new(id, PuKind::Macro(m.id)));
            for &cell in &m.cells {
                cell_to_unit[cell.as_raw() as usize] = id;
            }
        }
        for cell in &netlist.cells {
            if cell.macro_id.is_none() {
                let id = PuId::from_raw(units.len() as u32);
                units.push(PlacementUnit::new(id, PuKind::UnpackedCell(cell.id)));
                cell_to_unit[cell.id.as_raw() as usize] = id;
            }
        }

        Self {
            units,
            cell_to_unit,
            cell_locations: vec![(0.0, 0.0); netlist.cell_count()],
            pin_locations: vec![(0.0, 0.0); netlist.pin_count()],
            bins: GridBins::empty(),
            net_extremes: vec![None; netlist.net_count()],
            pu_clock_region_targets: HashMap::new(),
        }
    }

    /// Returns the unit with the given ID.
    pub fn unit(&self, id: PuId) -> &PlacementUnit {
        &self.units[id.as_raw() as usize]
    }

    /// Returns a mutable reference to the unit with the given ID.
    pub fn unit_mut(&mut self, id: PuId) -> &mut PlacementUnit {
        &mut self.units[id.as_raw() as usize]
    }

    /// Returns the number of placement units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Returns the unit owning the given cell.
    pub fn unit_of_cell(&self, cell: CellId) -> PuId {
        self.cell_to_unit[cell.as_raw() as usize]
    }

    /// Returns the current location of a cell.
    ///
    /// Valid after [`update_cell_locations`](Self::update_cell_locations).
    pub fn cell_location(&self, cell: CellId) -> (f64, f64) {
        self.cell_locations[cell.as_raw() as usize]
    }

    /// Returns the current location of a pin.
    ///
    /// Valid after [`set_pin_locations`](Self::set_pin_locations).
    pub fn pin_location(&self, pin: PinId) -> (f64, f64) {
        self.pin_locations[pin.as_raw() as usize]
    }

    /// Calls `f` with every member cell of the unit and the location the
    /// cell takes when the unit sits at its current location.
    pub fn for_each_cell(
        &self,
        netlist: &Netlist,
        pu: PuId,
        mut f: impl FnMut(CellId, f64, f64),
    ) {
        let unit = self.unit(pu);
        match unit.kind {
            PuKind::UnpackedCell(cell) => f(cell, unit.x, unit.y),
            PuKind::Macro(m) => {
                let m = netlist.design_macro(m);
                for (&cell, &(dx, dy)) in m.cells.iter().zip(&m.offsets) {
                    f(cell, unit.x + dx, unit.y + dy);
                }
            }
        }
    }

    /// Returns the member cells of the unit (one for unpacked cells).
    pub fn member_cells(&self, netlist: &Netlist, pu: PuId) -> Vec<CellId> {
        match self.unit(pu).kind {
            PuKind::UnpackedCell(cell) => vec![cell],
            PuKind::Macro(m) => netlist.design_macro(m).cells.clone(),
        }
    }

    /// Propagates unit locations to per-cell locations, applying macro
    /// shape offsets.
    pub fn update_cell_locations(&mut self, netlist: &Netlist) {
        for i in 0..self.units.len() {
            let unit = &self.units[i];
            match unit.kind {
                PuKind::UnpackedCell(cell) => {
                    self.cell_locations[cell.as_raw() as usize] = (unit.x, unit.y);
                }
                PuKind::Macro(m) => {
                    let (x, y) = (unit.x, unit.y);
                    let m = netlist.design_macro(m);
                    for (&cell, &(dx, dy)) in m.cells.iter().zip(&m.offsets) {
                        self.cell_locations[cell.as_raw() as usize] = (x + dx, y + dy);
                    }
                }
            }
        }
    }

    /// Derives per-pin locations from the cell locations and pin offsets.
    pub fn set_pin_locations(&mut self, netlist: &Netlist) {
        for pin in &netlist.pins {
            let (cx, cy) = self.cell_locations[pin.cell.as_raw() as usize];
            self.pin_locations[pin.id.as_raw() as usize] =
                (cx + pin.offset_x, cy + pin.offset_y);
        }
    }

    /// Legalizes a candidate location for the unit into the device area.
    ///
    /// For macros the whole shape must stay on the device, so the anchor
    /// range is shrunk by the shape's offset bounding box.
    pub fn legalize_xy_in_area(
        &self,
        netlist: &Netlist,
        device: &Device,
        pu: PuId,
        x: f64,
        y: f64,
    ) -> (f64, f64) {
        match self.unit(pu).kind {
            PuKind::UnpackedCell(_) => device.clamp_location(x, y),
            PuKind::Macro(m) => {
                let m = netlist.design_macro(m);
                let min_dx = m.offsets.iter().map(|o| o.0).fold(f64::INFINITY, f64::min);
                let max_dx = m.offsets.iter().map(|o| o.0).fold(f64::NEG_INFINITY, f64::max);
                let min_dy = m.offsets.iter().map(|o| o.1).fold(f64::INFINITY, f64::min);
                let max_dy = m.offsets.iter().map(|o| o.1).fold(f64::NEG_INFINITY, f64::max);
                let max_x = (device.width - 1.0 - max_dx).max(-min_dx);
                let max_y = (device.height - 1.0 - max_dy).max(-min_dy);
                (x.clamp(-min_dx, max_x), y.clamp(-min_dy, max_y))
            }
        }
    }

    /// Creates (or re-creates) the utilization grid at the given resolution.
    pub fn create_grid_bins(&mut self, device: &Device, bin_w: f64, bin_h: f64) {
        let utilization = self.bins.utilization;
        self.bins = GridBins::build(device, bin_w, bin_h);
        self.bins.utilization = utilization;
    }

    /// Recomputes bin demand from the current cell locations.
    pub fn update_bin_demand(&mut self, netlist: &Netlist, device: &Device) {
        let cell_locations = &self.cell_locations;
        self.bins.update_demand_with(netlist, device, |cell| {
            cell_locations[cell.as_raw() as usize]
        });
    }

    /// Clears attributes that checkpoints do not record: the packed mark
    /// and fixed flags that are not locked in.
    pub fn clear_transient_flags(&mut self) {
        for unit in &mut self.units {
            if unit.is_packed {
                unit.reset_packed();
            }
            if unit.is_fixed && !unit.is_locked {
                unit.set_unfixed();
            }
        }
    }

    /// Checks that per-type design demand fits the device capacity.
    ///
    /// A design that cannot fit is a construction error: an error
    /// diagnostic names each overcommitted resource and an `Err` is
    /// returned.
    pub fn verify_device_for_design(
        &self,
        netlist: &Netlist,
        device: &Device,
        sink: &DiagnosticSink,
    ) -> AtollResult<()> {
        let mut demand = [0u64; SiteKind::COUNT];
        for cell in &netlist.cells {
            if !cell.is_virtual {
                demand[cell.kind.site_kind().index()] += 1;
            }
        }
        let mut ok = true;
        for kind in SiteKind::ALL {
            let need = demand[kind.index()];
            let have = device.total_capacity(kind);
            if need > have {
                ok = false;
                sink.emit(Diagnostic::error(
                    DiagnosticCode::new(Stage::Model, 1),
                    format!("design needs {need} {kind:?} elements but device {} provides {have}", device.name),
                ));
            }
        }
        if ok {
            Ok(())
        } else {
            Err(AbortError::in_stage(
                "device check",
                "design demand exceeds device capacity",
            ))
        }
    }

    /// Emits a summary note with unit/cell/net counts.
    pub fn print_stat(&self, netlist: &Netlist, sink: &DiagnosticSink) {
        let macros = self.units.iter().filter(|u| u.is_macro()).count();
        sink.emit(Diagnostic::note(
            DiagnosticCode::new(Stage::Model, 2),
            format!(
                "placement model: {} units ({} macros), {} cells, {} nets, {} pins",
                self.unit_count(),
                macros,
                netlist.cell_count(),
                netlist.net_count(),
                netlist.pin_count()
            ),
        ));
    }
}
