//! Timing engine for the Atoll placer.
//!
//! Builds a per-cell timing graph from the design, levelizes it between
//! register boundaries, propagates arrival/required times with a
//! wirelength-based delay model, and feeds the results back into
//! placement as net-weight enhancements and clock-region anchors.

#![warn(missing_docs)]

pub mod delay;
pub mod graph;
pub mod ids;
pub mod levelize;
pub mod optimizer;
pub mod sta;

pub use delay::{DelayModel, CLOCK_REGION_CROSSING_PENALTY};
pub use graph::{TimingEdge, TimingGraph, TimingNode, DEFAULT_CLOCK_PERIOD, DEFAULT_INNER_DELAY};
pub use ids::{TimingEdgeId, TimingNodeId};
pub use levelize::{backward_levelization, forward_levelization, set_longest_path_length};
pub use optimizer::PlacementTimingOptimizer;
pub use sta::{
    back_propagate_required_arrival_time, back_trace_delay_longest_path_from_node,
    propagate_arrival_time, trace_back_from_node, trace_forward_from_node,
};
