//! Core design data structures.
//!
//! The [`Netlist`] is the in-memory design model the placer consumes:
//! cells (with type tags and per-cell pin lists), pins (with offsets
//! relative to the owning cell's origin), nets (hyperedges with a timing
//! enhancement scalar), and pre-formed macros with rigid shape offsets.
//! It is populated once by the external ingestion layer and only nets'
//! timing enhancements mutate afterwards.

use crate::ids::{CellId, MacroId, NetId, PinId};
use atoll_device::SiteKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upper bound (exclusive) on the pin count of a timing-enhanceable net.
pub const TIMING_ENHANCE_MAX_PINS: usize = 1000;

/// The type of a design cell, determining what site kind it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// A look-up table with the given number of inputs.
    Lut {
        /// Number of inputs (typically 4 or 6).
        inputs: u8,
    },
    /// A D flip-flop (the sequential element of the fabric).
    Ff,
    /// A carry-chain cell.
    Carry,
    /// An intra-slice multiplexer cell.
    Mux,
    /// A block RAM primitive.
    Bram,
    /// A DSP primitive.
    Dsp,
    /// An I/O buffer.
    Io,
}

impl CellKind {
    /// Returns `true` if cells of this kind terminate timing paths.
    pub fn is_sequential(self) -> bool {
        matches!(self, CellKind::Ff)
    }

    /// The site kind that can host a cell of this kind.
    pub fn site_kind(self) -> SiteKind {
        match self {
            CellKind::Lut { .. } | CellKind::Ff | CellKind::Carry | CellKind::Mux => {
                SiteKind::Logic
            }
            CellKind::Bram => SiteKind::Bram,
            CellKind::Dsp => SiteKind::Dsp,
            CellKind::Io => SiteKind::Io,
        }
    }
}

/// The control set of a flip-flop: flip-flops sharing a site must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ControlSet {
    /// The clock net.
    pub clock: Option<NetId>,
    /// The clock-enable net.
    pub clock_enable: Option<NetId>,
    /// The set/reset net.
    pub set_reset: Option<NetId>,
}

/// Direction of a pin relative to its owning cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinDirection {
    /// A signal flowing into the cell.
    Input,
    /// A signal driven by the cell.
    Output,
}

/// A cell in the design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// The unique ID of this cell.
    pub id: CellId,
    /// Human-readable cell name.
    pub name: String,
    /// The physical cell type.
    pub kind: CellKind,
    /// The pins owned by this cell.
    pub pins: Vec<PinId>,
    /// The macro this cell belongs to, if any.
    pub macro_id: Option<MacroId>,
    /// Virtual cells contribute to the netlist topology only: they occupy
    /// no site and carry no timing node.
    pub is_virtual: bool,
    /// The control set of a flip-flop cell (`None` for other kinds).
    pub control_set: Option<ControlSet>,
}

/// A pin on a cell.
///
/// A pin's location is its cell's location plus the pin offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    /// The unique ID of this pin; pin IDs are dense across the design.
    pub id: PinId,
    /// Human-readable pin name (e.g., "O", "D", "Q").
    pub name: String,
    /// Direction of the pin relative to the cell.
    pub direction: PinDirection,
    /// The cell that owns this pin.
    pub cell: CellId,
    /// The net this pin is connected to (`None` = unconnected).
    pub net: Option<NetId>,
    /// X offset of the pin relative to the cell origin.
    pub offset_x: f64,
    /// Y offset of the pin relative to the cell origin.
    pub offset_y: f64,
}

/// A net (hyperedge) in the design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    /// The unique ID of this net.
    pub id: NetId,
    /// Human-readable net name.
    pub name: String,
    /// The driver pin (at most one output).
    pub driver: Option<PinId>,
    /// The sink pins.
    pub sinks: Vec<PinId>,
    /// Accumulated timing enhancement factor, always >= 1.0. Multiplies
    /// the net's weight in the wirelength objective.
    pub timing_enhancement: f64,
}

impl Net {
    /// Total pin count (driver + sinks).
    pub fn pin_count(&self) -> usize {
        self.sinks.len() + usize::from(self.driver.is_some())
    }

    /// Iterates over all pins of the net, driver first.
    pub fn pins(&self) -> impl Iterator<Item = PinId> + '_ {
        self.driver.into_iter().chain(self.sinks.iter().copied())
    }

    /// Returns `true` if the net's pin count makes it eligible for timing
    /// enhancement: more than one pin and fewer than
    /// [`TIMING_ENHANCE_MAX_PINS`].
    pub fn timing_enhancement_eligible(&self) -> bool {
        let p = self.pin_count();
        p > 1 && p < TIMING_ENHANCE_MAX_PINS
    }

    /// Multiplies the accumulated timing enhancement by `ratio`.
    pub fn enhance_timing(&mut self, ratio: f64) {
        self.timing_enhancement *= ratio;
    }

    /// Resets the timing enhancement to the neutral 1.0.
    pub fn reset_timing_enhancement(&mut self) {
        self.timing_enhancement = 1.0;
    }
}

/// A pre-formed multi-cell macro with a rigid shape.
///
/// All member cells move together; a member cell's location is the macro
/// anchor location plus its shape offset. The first member is the anchor
/// and must have offset `(0, 0)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Macro {
    /// The unique ID of this macro.
    pub id: MacroId,
    /// Human-readable macro name.
    pub name: String,
    /// Member cells, anchor first.
    pub cells: Vec<CellId>,
    /// Per-member `(dx, dy)` shape offsets, parallel to `cells`.
    pub offsets: Vec<(f64, f64)>,
}

impl Macro {
    /// The anchor cell of this macro.
    pub fn anchor(&self) -> CellId {
        self.cells[0]
    }
}

/// The design netlist consumed by the placer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netlist {
    /// All cells in the design.
    pub cells: Vec<Cell>,
    /// All pins in the design.
    pub pins: Vec<Pin>,
    /// All nets in the design.
    pub nets: Vec<Net>,
    /// All macros in the design.
    pub macros: Vec<Macro>,
    /// Auxiliary index: cell name to ID (rebuilt on deserialization).
    #[serde(skip)]
    pub cell_by_name: HashMap<String, CellId>,
}

impl Netlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cell and returns its ID.
    pub fn add_cell(&mut self, name: impl Into<String>, kind: CellKind) -> CellId {
        let id = CellId::from_raw(self.cells.len() as u32);
        let name = name.into();
        self.cell_by_name.insert(name.clone(), id);
        self.cells.push(Cell {
            id,
            name,
            kind,
            pins: Vec::new(),
            macro_id: None,
            is_virtual: false,
            control_set: None,
        });
        id
    }

    /// Adds a net and returns its ID.
    pub fn add_net(&mut self, name: impl Into<String>) -> NetId {
        let id = NetId::from_raw(self.nets.len() as u32);
        self.nets.push(Net {
            id,
            name: name.into(),
            driver: None,
            sinks: Vec::new(),
            timing_enhancement: 1.0,
        });
        id
    }

    /// Adds a pin on `cell`, wiring it into the cell's pin list and, if a
    /// net is given, into the net as driver (output pins) or sink.
    pub fn add_pin(
        &mut self,
        cell: CellId,
        name: impl Into<String>,
        direction: PinDirection,
        net: Option<NetId>,
    ) -> PinId {
        let id = PinId::from_raw(self.pins.len() as u32);
        self.pins.push(Pin {
            id,
            name: name.into(),
            direction,
            cell,
            net,
            offset_x: 0.0,
            offset_y: 0.0,
        });
        self.cells[cell.as_raw() as usize].pins.push(id);
        if let Some(net) = net {
            let net = &mut self.nets[net.as_raw() as usize];
            match direction {
                PinDirection::Output => net.driver = Some(id),
                PinDirection::Input => net.sinks.push(id),
            }
        }
        id
    }

    /// Groups cells into a macro with the given shape offsets; the first
    /// member is the anchor and its offset must be `(0, 0)`.
    pub fn add_macro(
        &mut self,
        name: impl Into<String>,
        cells: Vec<CellId>,
        offsets: Vec<(f64, f64)>,
    ) -> MacroId {
        debug_assert_eq!(cells.len(), offsets.len());
        debug_assert_eq!(offsets.first(), Some(&(0.0, 0.0)));
        let id = MacroId::from_raw(self.macros.len() as u32);
        for &cell in &cells {
            self.cells[cell.as_raw() as usize].macro_id = Some(id);
        }
        self.macros.push(Macro {
            id,
            name: name.into(),
            cells,
            offsets,
        });
        id
    }

    /// Returns the cell with the given ID.
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.as_raw() as usize]
    }

    /// Returns a mutable reference to the cell with the given ID.
    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.as_raw() as usize]
    }

    /// Returns the pin with the given ID.
    pub fn pin(&self, id: PinId) -> &Pin {
        &self.pins[id.as_raw() as usize]
    }

    /// Returns a mutable reference to the pin with the given ID.
    pub fn pin_mut(&mut self, id: PinId) -> &mut Pin {
        &mut self.pins[id.as_raw() as usize]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.as_raw() as usize]
    }

    /// Returns a mutable reference to the net with the given ID.
    pub fn net_mut(&mut self, id: NetId) -> &mut Net {
        &mut self.nets[id.as_raw() as usize]
    }

    /// Returns the macro with the given ID.
    pub fn design_macro(&self, id: MacroId) -> &Macro {
        &self.macros[id.as_raw() as usize]
    }

    /// Returns the number of cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Returns the number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Returns the number of pins.
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Resets every net's timing enhancement to the neutral 1.0.
    pub fn reset_net_enhancements(&mut self) {
        for net in &mut self.nets {
            net.reset_timing_enhancement();
        }
    }

    /// Rebuilds auxiliary indices after deserialization.
    pub fn rebuild_indices(&mut self) {
        self.cell_by_name.clear();
        for (i, cell) in self.cells.iter().enumerate() {
            self.cell_by_name
                .insert(cell.name.clone(), CellId::from_raw(i as u32));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_netlist() {
        let nl = Netlist::new();
        assert_eq!(nl.cell_count(), 0);
        assert_eq!(nl.net_count(), 0);
        assert_eq!(nl.pin_count(), 0);
    }

    #[test]
    fn add_cell_and_lookup() {
        let mut nl = Netlist::new();
        let id = nl.add_cell("lut_0", CellKind::Lut { inputs: 6 });
        assert_eq!(nl.cell_count(), 1);
        assert_eq!(nl.cell(id).name, "lut_0");
        assert_eq!(nl.cell_by_name["lut_0"], id);
    }

    #[test]
    fn pin_wiring() {
        let mut nl = Netlist::new();
        let c0 = nl.add_cell("lut_0", CellKind::Lut { inputs: 4 });
        let c1 = nl.add_cell("ff_0", CellKind::Ff);
        let net = nl.add_net("n0");
        let p_out = nl.add_pin(c0, "O", PinDirection::Output, Some(net));
        let p_in = nl.add_pin(c1, "D", PinDirection::Input, Some(net));

        assert_eq!(nl.net(net).driver, Some(p_out));
        assert_eq!(nl.net(net).sinks, vec![p_in]);
        assert_eq!(nl.net(net).pin_count(), 2);
        assert_eq!(nl.cell(c0).pins, vec![p_out]);
        assert_eq!(nl.pin(p_in).cell, c1);
    }

    #[test]
    fn net_pins_driver_first() {
        let mut nl = Netlist::new();
        let c0 = nl.add_cell("a", CellKind::Ff);
        let c1 = nl.add_cell("b", CellKind::Ff);
        let net = nl.add_net("n");
        let sink = nl.add_pin(c1, "D", PinDirection::Input, Some(net));
        let driver = nl.add_pin(c0, "Q", PinDirection::Output, Some(net));
        let pins: Vec<_> = nl.net(net).pins().collect();
        assert_eq!(pins, vec![driver, sink]);
    }

    #[test]
    fn timing_enhancement_eligibility() {
        let mut nl = Netlist::new();
        let c = nl.add_cell("a", CellKind::Ff);
        let net = nl.add_net("n");
        nl.add_pin(c, "Q", PinDirection::Output, Some(net));
        // Single-pin net is ineligible
        assert!(!nl.net(net).timing_enhancement_eligible());

        let c2 = nl.add_cell("b", CellKind::Ff);
        nl.add_pin(c2, "D", PinDirection::Input, Some(net));
        assert!(nl.net(net).timing_enhancement_eligible());
    }

    #[test]
    fn huge_net_ineligible() {
        let mut nl = Netlist::new();
        let drv = nl.add_cell("drv", CellKind::Lut { inputs: 6 });
        let net = nl.add_net("fanout");
        nl.add_pin(drv, "O", PinDirection::Output, Some(net));
        for i in 0..999 {
            let c = nl.add_cell(format!("sink_{i}"), CellKind::Ff);
            nl.add_pin(c, "D", PinDirection::Input, Some(net));
        }
        assert_eq!(nl.net(net).pin_count(), 1000);
        assert!(!nl.net(net).timing_enhancement_eligible());
    }

    #[test]
    fn enhancement_accumulates_and_resets() {
        let mut nl = Netlist::new();
        let net = nl.add_net("n");
        nl.net_mut(net).enhance_timing(2.0);
        nl.net_mut(net).enhance_timing(3.0);
        assert_eq!(nl.net(net).timing_enhancement, 6.0);
        nl.reset_net_enhancements();
        assert_eq!(nl.net(net).timing_enhancement, 1.0);
    }

    #[test]
    fn macro_membership() {
        let mut nl = Netlist::new();
        let a = nl.add_cell("carry_0", CellKind::Carry);
        let b = nl.add_cell("carry_1", CellKind::Carry);
        let c = nl.add_cell("carry_2", CellKind::Carry);
        let m = nl.add_macro(
            "chain",
            vec![a, b, c],
            vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)],
        );
        assert_eq!(nl.design_macro(m).anchor(), a);
        assert_eq!(nl.cell(b).macro_id, Some(m));
        assert_eq!(nl.design_macro(m).offsets[2], (0.0, 2.0));
    }

    #[test]
    fn cell_kind_site_mapping() {
        assert_eq!(
            CellKind::Lut { inputs: 6 }.site_kind(),
            atoll_device::SiteKind::Logic
        );
        assert_eq!(CellKind::Ff.site_kind(), atoll_device::SiteKind::Logic);
        assert_eq!(CellKind::Bram.site_kind(), atoll_device::SiteKind::Bram);
        assert_eq!(CellKind::Dsp.site_kind(), atoll_device::SiteKind::Dsp);
        assert_eq!(CellKind::Io.site_kind(), atoll_device::SiteKind::Io);
        assert!(CellKind::Ff.is_sequential());
        assert!(!CellKind::Carry.is_sequential());
    }

    #[test]
    fn control_set_equality() {
        let a = ControlSet {
            clock: Some(NetId::from_raw(0)),
            clock_enable: Some(NetId::from_raw(1)),
            set_reset: None,
        };
        let b = a;
        let c = ControlSet {
            clock: Some(NetId::from_raw(2)),
            ..a
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn serde_roundtrip() {
        let mut nl = Netlist::new();
        let c0 = nl.add_cell("lut_0", CellKind::Lut { inputs: 4 });
        let net = nl.add_net("n0");
        nl.add_pin(c0, "O", PinDirection::Output, Some(net));
        nl.net_mut(net).enhance_timing(1.5);

        let json = serde_json::to_string(&nl).unwrap();
        let mut restored: Netlist = serde_json::from_str(&json).unwrap();
        restored.rebuild_indices();

        assert_eq!(restored.cell_count(), 1);
        assert_eq!(restored.net(net).timing_enhancement, 1.5);
        assert!(restored.cell_by_name.contains_key("lut_0"));
    }
}
