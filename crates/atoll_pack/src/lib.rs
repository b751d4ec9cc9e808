//! Parallel site packing for the Atoll placer.
//!
//! The final legalization stage: globally placed logic units are bound to
//! concrete sites under unit-count, LUT-count, and control-set
//! constraints, with worker parallelism over candidate scoring and
//! site-stripe resolution.

#![warn(missing_docs)]

pub mod lut_pair;
pub mod packer;
pub mod params;

pub use lut_pair::{can_pair, net_share, pair_luts_in_site, PAIRED_LUT_INPUT_CAPACITY};
pub use packer::ParallelSitePacker;
pub use params::{PackerParams, TieBreak};
