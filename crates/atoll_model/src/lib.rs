//! Placement model for the Atoll placer.
//!
//! Owns the placement units and everything derived from their locations:
//! per-cell and per-pin coordinates, the utilization grid bins, per-net
//! bound pins for the wirelength model, and checkpointing. The global
//! placer and the site packer are the only mutators.

#![warn(missing_docs)]

pub mod bins;
pub mod checkpoint;
pub mod hpwl;
pub mod ids;
pub mod model;
pub mod unit;

pub use bins::{Bin, GridBins};
pub use checkpoint::{dump_placement_units, load_placement_units, CheckpointError};
pub use hpwl::{update_b2b_and_get_total_hpwl, NetExtremes};
pub use ids::PuId;
pub use model::PlacementModel;
pub use unit::{PlacementUnit, PuKind};
