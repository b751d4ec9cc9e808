//! Shared data types for the device model.
//!
//! The device is a grid of sites. Each site has a kind determining which
//! design cells it can host and how many basic elements it contains. Sites
//! are partitioned into rectangular clock regions; crossing a region
//! boundary costs clock-distribution delay, which the timing model charges
//! per crossed column.

use crate::ids::{ClockRegionId, SiteId};
use serde::{Deserialize, Serialize};

/// The functional kind of a site in the device grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteKind {
    /// A configurable logic block hosting LUTs, flip-flops, and carry chains.
    Logic,
    /// A DSP multiply-accumulate column site.
    Dsp,
    /// A block RAM column site.
    Bram,
    /// An I/O pad site.
    Io,
}

impl SiteKind {
    /// Number of site kinds; used to size per-kind accumulation arrays.
    pub const COUNT: usize = 4;

    /// All site kinds, indexable by [`SiteKind::index`].
    pub const ALL: [SiteKind; SiteKind::COUNT] =
        [SiteKind::Logic, SiteKind::Dsp, SiteKind::Bram, SiteKind::Io];

    /// Returns the dense index of this kind, matching [`SiteKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            SiteKind::Logic => 0,
            SiteKind::Dsp => 1,
            SiteKind::Bram => 2,
            SiteKind::Io => 3,
        }
    }
}

/// A site (placement location) in the device grid.
///
/// Sites sit on integer coordinates of the placement plane. A logic site
/// groups several LUT and FF basic elements; the per-kind element counts
/// live on the [`Device`](crate::Device) since they are uniform per family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// The unique ID of this site.
    pub id: SiteId,
    /// The functional kind of this site.
    pub kind: SiteKind,
    /// X coordinate in the placement plane.
    pub x: f64,
    /// Y coordinate in the placement plane.
    pub y: f64,
    /// The clock region containing this site.
    pub clock_region: ClockRegionId,
}

/// A rectangular clock region of the device.
///
/// Clock regions tile the device in a `cols x rows` grid. The horizontal
/// center of a region column is the anchor target used when long timing
/// paths are pulled into a single region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockRegion {
    /// The unique ID of this clock region.
    pub id: ClockRegionId,
    /// Column index of this region (0-based, left to right).
    pub col: u32,
    /// Row index of this region (0-based, bottom to top).
    pub row: u32,
    /// Left edge in placement coordinates (inclusive).
    pub left: f64,
    /// Right edge in placement coordinates (exclusive).
    pub right: f64,
    /// Bottom edge in placement coordinates (inclusive).
    pub bottom: f64,
    /// Top edge in placement coordinates (exclusive).
    pub top: f64,
}

impl ClockRegion {
    /// Returns the horizontal center of this region.
    pub fn center_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_indices_match_all() {
        for (i, kind) in SiteKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn kind_count() {
        assert_eq!(SiteKind::ALL.len(), SiteKind::COUNT);
    }

    #[test]
    fn clock_region_center() {
        let cr = ClockRegion {
            id: ClockRegionId::from_raw(0),
            col: 0,
            row: 0,
            left: 10.0,
            right: 20.0,
            bottom: 0.0,
            top: 30.0,
        };
        assert_eq!(cr.center_x(), 15.0);
    }

    #[test]
    fn site_serde_roundtrip() {
        let site = Site {
            id: SiteId::from_raw(9),
            kind: SiteKind::Dsp,
            x: 4.0,
            y: 17.0,
            clock_region: ClockRegionId::from_raw(1),
        };
        let json = serde_json::to_string(&site).unwrap();
        let restored: Site = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, site.id);
        assert_eq!(restored.kind, SiteKind::Dsp);
        assert_eq!(restored.x, 4.0);
    }
}
