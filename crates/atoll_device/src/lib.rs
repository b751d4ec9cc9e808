//! Device model for the Atoll placer.
//!
//! Exposes the read-only view of an island-style FPGA the core subsystems
//! consume: a grid of typed sites, per-site basic-element capacities, and
//! the clock-region partitioning with its `(x, y)` to region lookup. The
//! external ingestion layer populates the model from device dumps; tests
//! build small grids with [`DeviceBuilder`].

#![warn(missing_docs)]

pub mod device;
pub mod ids;
pub mod types;

pub use device::{Device, DeviceBuilder};
pub use ids::{ClockRegionId, SiteId};
pub use types::{ClockRegion, Site, SiteKind};
