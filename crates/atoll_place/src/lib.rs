//! Analytical global placement for the Atoll placer.
//!
//! Alternates weighted least-squares wirelength solves (bound-to-bound
//! net model, diagonal-preconditioned conjugate gradients) with
//! non-linear cell spreading against the utilization grid, augmented
//! with pseudo-net anchors for spread positions, clock-region targets,
//! and macro legalization.

#![warn(missing_docs)]

pub mod b2b;
pub mod cluster;
pub mod legalizer;
pub mod placer;
pub mod solver;
pub mod spreading;

pub use b2b::{build_axis_system, Anchor, Axis, MovableIndex, QuadraticSystem, B2B_EPS};
pub use cluster::cluster_placement;
pub use legalizer::{find_nearest_legal_anchor, macro_is_legal, MacroLegalizer};
pub use placer::{ClbPlacementOptions, GlobalPlacer};
pub use solver::{CgOutcome, CgSolver, SparseMatrix, TripletBuilder};
pub use spreading::spread_cells;
