//! The Atoll placement flow.
//!
//! Callable as a library: hand [`run_placement`] an in-memory design and
//! device model plus a validated configuration, and it runs the full
//! analytical mixed-size schedule through to packed site locations.

#![warn(missing_docs)]

pub mod flow;

pub use flow::run_placement;
