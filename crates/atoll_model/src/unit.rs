//! Placement units: the atomic movable entities of the global placer.
//!
//! A unit is either a single unpacked cell or a whole macro. The two arms
//! are a closed tagged variant so hot loops dispatch on the tag instead of
//! downcasting.

use crate::ids::PuId;
use atoll_netlist::{CellId, MacroId};
use serde::{Deserialize, Serialize};

/// What a placement unit stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PuKind {
    /// A single cell outside any macro.
    UnpackedCell(CellId),
    /// A rigid multi-cell macro, moved by its anchor.
    Macro(MacroId),
}

/// A placement unit: location plus movability state.
///
/// `is_locked` implies `is_fixed`. A fixed unit is never moved by the
/// solver but may be un-fixed explicitly; a locked unit may not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementUnit {
    /// The unique ID of this unit.
    pub id: PuId,
    /// What this unit stands for.
    pub kind: PuKind,
    /// X coordinate of the unit (macro anchor for macros).
    pub x: f64,
    /// Y coordinate of the unit.
    pub y: f64,
    /// Fixed units are skipped by the solver.
    pub is_fixed: bool,
    /// Locked units are fixed permanently (e.g., user constraints).
    pub is_locked: bool,
    /// Set once the site packer has bound the unit to a site.
    pub is_packed: bool,
}

impl PlacementUnit {
    /// Creates an unplaced, movable unit at the origin.
    pub fn new(id: PuId, kind: PuKind) -> Self {
        Self {
            id,
            kind,
            x: 0.0,
            y: 0.0,
            is_fixed: false,
            is_locked: false,
            is_packed: false,
        }
    }

    /// Returns the unit's location.
    pub fn location(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Moves the unit to the given location.
    pub fn set_location(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    /// Fixes the unit in place for subsequent solver iterations.
    pub fn set_fixed(&mut self) {
        self.is_fixed = true;
    }

    /// Un-fixes the unit unless it is locked.
    pub fn set_unfixed(&mut self) {
        if !self.is_locked {
            self.is_fixed = false;
        }
    }

    /// Locks the unit; locked implies fixed.
    pub fn set_locked(&mut self) {
        self.is_locked = true;
        self.is_fixed = true;
    }

    /// Marks the unit as bound to a packed site.
    pub fn set_packed(&mut self) {
        self.is_packed = true;
    }

    /// Clears the packed mark.
    pub fn reset_packed(&mut self) {
        self.is_packed = false;
    }

    /// Returns `true` if this unit is a macro.
    pub fn is_macro(&self) -> bool {
        matches!(self.kind, PuKind::Macro(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> PlacementUnit {
        PlacementUnit::new(PuId::from_raw(0), PuKind::UnpackedCell(CellId::from_raw(0)))
    }

    #[test]
    fn new_unit_is_movable() {
        let pu = unit();
        assert!(!pu.is_fixed);
        assert!(!pu.is_locked);
        assert!(!pu.is_packed);
        assert_eq!(pu.location(), (0.0, 0.0));
    }

    #[test]
    fn set_location() {
        let mut pu = unit();
        pu.set_location(3.5, 7.25);
        assert_eq!(pu.location(), (3.5, 7.25));
    }

    #[test]
    fn fix_and_unfix() {
        let mut pu = unit();
        pu.set_fixed();
        assert!(pu.is_fixed);
        pu.set_unfixed();
        assert!(!pu.is_fixed);
    }

    #[test]
    fn locked_implies_fixed() {
        let mut pu = unit();
        pu.set_locked();
        assert!(pu.is_locked);
        assert!(pu.is_fixed);
        // Unfixing a locked unit is a no-op
        pu.set_unfixed();
        assert!(pu.is_fixed);
    }

    #[test]
    fn macro_tag() {
        let pu = PlacementUnit::new(PuId::from_raw(1), PuKind::Macro(MacroId::from_raw(0)));
        assert!(pu.is_macro());
        assert!(!unit().is_macro());
    }

    #[test]
    fn packed_flag() {
        let mut pu = unit();
        pu.set_packed();
        assert!(pu.is_packed);
        pu.reset_packed();
        assert!(!pu.is_packed);
    }

    #[test]
    fn serde_roundtrip() {
        let mut pu = unit();
        pu.set_location(1.0, 2.0);
        pu.set_fixed();
        let json = serde_json::to_string(&pu).unwrap();
        let restored: PlacementUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.location(), (1.0, 2.0));
        assert!(restored.is_fixed);
    }
}
