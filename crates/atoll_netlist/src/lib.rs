//! Design model for the Atoll placer.
//!
//! Cells, pins, nets, and pre-formed macros as populated by the external
//! ingestion and initial-packing layers. The core only mutates net timing
//! enhancements; everything else is read-only after construction.

#![warn(missing_docs)]

pub mod data;
pub mod ids;

pub use data::{
    Cell, CellKind, ControlSet, Macro, Net, Netlist, Pin, PinDirection, TIMING_ENHANCE_MAX_PINS,
};
pub use ids::{CellId, MacroId, NetId, PinId};
