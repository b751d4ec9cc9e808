//! Packer tuning parameters.

use serde::{Deserialize, Serialize};

/// How equal-cost site bids are broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieBreak {
    /// Lowest unit ID wins.
    First,
    /// Highest unit ID wins.
    Last,
}

/// Tuning parameters of the parallel site packer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackerParams {
    /// Base Manhattan radius of the candidate-site search.
    pub neighbor_radius: f64,
    /// Candidate sites kept per unit.
    pub max_candidate_sites_per_pu: usize,
    /// Weight of congestion in the search radius and site cost.
    pub congestion_weight: f64,
    /// Minimum shared-net ratio for two LUTs to share a basic element.
    pub net_share_threshold: f64,
    /// Maximum units committed to one site.
    pub max_pus_per_site: usize,
    /// Maximum LUTs committed to one site.
    pub max_luts_per_site: usize,
    /// Relative radius growth per search retry.
    pub search_expansion_step: f64,
    /// Equal-cost bid resolution policy.
    pub tie_break: TieBreak,
}

impl Default for PackerParams {
    fn default() -> Self {
        Self {
            neighbor_radius: 3.0,
            max_candidate_sites_per_pu: 10,
            congestion_weight: 0.25,
            net_share_threshold: 0.5,
            max_pus_per_site: 6,
            max_luts_per_site: 10,
            search_expansion_step: 0.1,
            tie_break: TieBreak::First,
        }
    }
}
