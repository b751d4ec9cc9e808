//! The device model and its construction.
//!
//! A [`Device`] is built once by the external ingestion layer (or directly
//! in tests via [`DeviceBuilder`]) and then only read. It answers the
//! queries the core subsystems need: site lookup by area and kind, clock
//! region lookup by location, per-kind element capacities, and the overall
//! placement extent.

use crate::ids::{ClockRegionId, SiteId};
use crate::types::{ClockRegion, Site, SiteKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An island-style FPGA device model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Device name (e.g., a part number).
    pub name: String,
    /// Placement-plane width; valid X coordinates are `[0, width)`.
    pub width: f64,
    /// Placement-plane height; valid Y coordinates are `[0, height)`.
    pub height: f64,
    /// All sites in the device.
    pub sites: Vec<Site>,
    /// All clock regions, row-major (`row * cols + col`).
    pub clock_regions: Vec<ClockRegion>,
    /// Number of clock-region columns.
    pub clock_region_cols: u32,
    /// Number of clock-region rows.
    pub clock_region_rows: u32,
    /// Basic elements per site, indexed by [`SiteKind::index`].
    pub elements_per_site: [u32; SiteKind::COUNT],
    /// Spatial index: integer coordinate to sites at that coordinate.
    #[serde(skip)]
    site_at_coord: HashMap<(i64, i64), Vec<SiteId>>,
}

impl Device {
    /// Returns the site with the given ID.
    pub fn site(&self, id: SiteId) -> &Site {
        &self.sites[id.as_raw() as usize]
    }

    /// Returns the number of sites.
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Returns the clock region `(col, row)` containing the clamped location.
    ///
    /// Locations outside the device are clamped onto it first, so every
    /// query resolves to a region.
    pub fn clock_region_at(&self, x: f64, y: f64) -> (u32, u32) {
        let region_w = self.width / self.clock_region_cols as f64;
        let region_h = self.height / self.clock_region_rows as f64;
        let x = x.clamp(0.0, self.width - 1e-9);
        let y = y.clamp(0.0, self.height - 1e-9);
        let col = ((x / region_w) as u32).min(self.clock_region_cols - 1);
        let row = ((y / region_h) as u32).min(self.clock_region_rows - 1);
        (col, row)
    }

    /// Returns the clock region at the given column/row.
    pub fn clock_region(&self, col: u32, row: u32) -> &ClockRegion {
        let idx = (row * self.clock_region_cols + col) as usize;
        &self.clock_regions[idx]
    }

    /// Returns the horizontal center of a clock-region column.
    pub fn clock_region_column_center(&self, col: u32) -> f64 {
        self.clock_region(col, 0).center_x()
    }

    /// Returns the number of basic elements a site of `kind` provides.
    pub fn elements_per_site(&self, kind: SiteKind) -> u32 {
        self.elements_per_site[kind.index()]
    }

    /// Total basic-element capacity of the device for `kind`.
    pub fn total_capacity(&self, kind: SiteKind) -> u64 {
        let sites = self.sites.iter().filter(|s| s.kind == kind).count() as u64;
        sites * self.elements_per_site(kind) as u64
    }

    /// Returns the sites at the integer coordinate `(x, y)`.
    pub fn sites_at(&self, x: i64, y: i64) -> &[SiteId] {
        self.site_at_coord
            .get(&(x, y))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Collects the sites of `kind` within Manhattan distance `radius` of
    /// `(x, y)`, ordered by distance from the query point.
    pub fn sites_in_radius(&self, kind: SiteKind, x: f64, y: f64, radius: f64) -> Vec<SiteId> {
        let r = radius.ceil() as i64;
        let cx = x.round() as i64;
        let cy = y.round() as i64;
        let mut found: Vec<(f64, SiteId)> = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                if (dx.abs() + dy.abs()) as f64 > radius {
                    continue;
                }
                for &id in self.sites_at(cx + dx, cy + dy) {
                    let site = self.site(id);
                    if site.kind == kind {
                        let dist = (site.x - x).abs() + (site.y - y).abs();
                        found.push((dist, id));
                    }
                }
            }
        }
        found.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// Returns `true` if some site of `kind` exists at the integer
    /// coordinate nearest to `(x, y)`.
    pub fn has_site_of_kind_at(&self, kind: SiteKind, x: f64, y: f64) -> bool {
        self.sites_at(x.round() as i64, y.round() as i64)
            .iter()
            .any(|&id| self.site(id).kind == kind)
    }

    /// Clamps a location onto the device placement plane.
    pub fn clamp_location(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x.clamp(0.0, (self.width - 1.0).max(0.0)),
            y.clamp(0.0, (self.height - 1.0).max(0.0)),
        )
    }

    /// Rebuilds the spatial index; needed after deserialization.
    pub fn rebuild_index(&mut self) {
        self.site_at_coord.clear();
        for site in &self.sites {
            self.site_at_coord
                .entry((site.x.round() as i64, site.y.round() as i64))
                .or_default()
                .push(site.id);
        }
    }
}

/// Builder for [`Device`] models.
///
/// The external ingestion layer populates this from the device dump; tests
/// construct small grids directly.
pub struct DeviceBuilder {
    name: String,
    width: f64,
    height: f64,
    clock_region_cols: u32,
    clock_region_rows: u32,
    elements_per_site: [u32; SiteKind::COUNT],
    sites: Vec<(SiteKind, f64, f64)>,
}

impl DeviceBuilder {
    /// Creates a builder for a device with the given placement extent.
    pub fn new(name: impl Into<String>, width: f64, height: f64) -> Self {
        let mut elements_per_site = [1; SiteKind::COUNT];
        elements_per_site[SiteKind::Logic.index()] = 16;
        Self {
            name: name.into(),
            width,
            height,
            clock_region_cols: 1,
            clock_region_rows: 1,
            elements_per_site,
            sites: Vec::new(),
        }
    }

    /// Sets the clock-region grid dimensions.
    pub fn clock_regions(mut self, cols: u32, rows: u32) -> Self {
        self.clock_region_cols = cols.max(1);
        self.clock_region_rows = rows.max(1);
        self
    }

    /// Sets the basic-element count per site of `kind`.
    pub fn elements_per_site(mut self, kind: SiteKind, count: u32) -> Self {
        self.elements_per_site[kind.index()] = count;
        self
    }

    /// Adds a single site at the given location.
    pub fn site(mut self, kind: SiteKind, x: f64, y: f64) -> Self {
        self.sites.push((kind, x, y));
        self
    }

    /// Fills every integer coordinate of the device with a site of `kind`.
    pub fn fill(mut self, kind: SiteKind) -> Self {
        for y in 0..self.height as u32 {
            for x in 0..self.width as u32 {
                self.sites.push((kind, x as f64, y as f64));
            }
        }
        self
    }

    /// Fills the column at `x` with sites of `kind`, replacing any
    /// previously added sites in that column.
    pub fn column(mut self, kind: SiteKind, x: u32) -> Self {
        self.sites.retain(|&(_, sx, _)| sx as u32 != x);
        for y in 0..self.height as u32 {
            self.sites.push((kind, x as f64, y as f64));
        }
        self
    }

    /// Finalizes the device, assigning site and clock-region IDs.
    pub fn build(self) -> Device {
        let region_w = self.width / self.clock_region_cols as f64;
        let region_h = self.height / self.clock_region_rows as f64;

        let mut clock_regions = Vec::new();
        for row in 0..self.clock_region_rows {
            for col in 0..self.clock_region_cols {
                let id = ClockRegionId::from_raw(row * self.clock_region_cols + col);
                clock_regions.push(ClockRegion {
                    id,
                    col,
                    row,
                    left: col as f64 * region_w,
                    right: (col + 1) as f64 * region_w,
                    bottom: row as f64 * region_h,
                    top: (row + 1) as f64 * region_h,
                });
            }
        }

        let mut device = Device {
            name: self.name,
            width: self.width,
            height: self.height,
            sites: Vec::with_capacity(self.sites.len()),
            clock_regions,
            clock_region_cols: self.clock_region_cols,
            clock_region_rows: self.clock_region_rows,
            elements_per_site: self.elements_per_site,
            site_at_coord: HashMap::new(),
        };

        for (i, (kind, x, y)) in self.sites.into_iter().enumerate() {
            let (col, row) = device.clock_region_at(x, y);
            let cr = ClockRegionId::from_raw(row * device.clock_region_cols + col);
            device.sites.push(Site {
                id: SiteId::from_raw(i as u32),
                kind,
                x,
                y,
                clock_region: cr,
            });
        }
        device.rebuild_index();
        device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_device() -> Device {
        DeviceBuilder::new("test16", 16.0, 16.0)
            .clock_regions(4, 2)
            .fill(SiteKind::Logic)
            .column(SiteKind::Dsp, 7)
            .build()
    }

    #[test]
    fn build_fills_sites() {
        let dev = small_device();
        assert_eq!(dev.site_count(), 16 * 16);
        assert_eq!(dev.clock_regions.len(), 8);
    }

    #[test]
    fn clock_region_lookup() {
        let dev = small_device();
        assert_eq!(dev.clock_region_at(0.0, 0.0), (0, 0));
        assert_eq!(dev.clock_region_at(15.9, 15.9), (3, 1));
        assert_eq!(dev.clock_region_at(4.5, 7.0), (1, 0));
        // Out-of-range locations clamp onto the device
        assert_eq!(dev.clock_region_at(-3.0, 100.0), (0, 1));
    }

    #[test]
    fn clock_region_column_centers() {
        let dev = small_device();
        // 16 wide, 4 columns: each column is 4 wide
        assert_eq!(dev.clock_region_column_center(0), 2.0);
        assert_eq!(dev.clock_region_column_center(3), 14.0);
    }

    #[test]
    fn dsp_column_replaces_logic() {
        let dev = small_device();
        assert!(dev.has_site_of_kind_at(SiteKind::Dsp, 7.0, 3.0));
        assert!(!dev.has_site_of_kind_at(SiteKind::Logic, 7.0, 3.0));
        assert!(dev.has_site_of_kind_at(SiteKind::Logic, 6.0, 3.0));
    }

    #[test]
    fn sites_in_radius_sorted_by_distance() {
        let dev = small_device();
        let near = dev.sites_in_radius(SiteKind::Logic, 3.0, 3.0, 2.0);
        assert!(!near.is_empty());
        let first = dev.site(near[0]);
        assert_eq!((first.x, first.y), (3.0, 3.0));
        let mut last_dist = 0.0;
        for id in &near {
            let s = dev.site(*id);
            let d = (s.x - 3.0).abs() + (s.y - 3.0).abs();
            assert!(d >= last_dist);
            assert!(d <= 2.0);
            last_dist = d;
        }
    }

    #[test]
    fn capacity_accounting() {
        let dev = DeviceBuilder::new("cap", 4.0, 4.0)
            .fill(SiteKind::Logic)
            .build();
        assert_eq!(dev.elements_per_site(SiteKind::Logic), 16);
        assert_eq!(dev.total_capacity(SiteKind::Logic), 16 * 16);
        assert_eq!(dev.total_capacity(SiteKind::Dsp), 0);
    }

    #[test]
    fn clamp_location() {
        let dev = small_device();
        assert_eq!(dev.clamp_location(-4.0, 99.0), (0.0, 15.0));
        assert_eq!(dev.clamp_location(3.5, 3.5), (3.5, 3.5));
    }

    #[test]
    fn serde_roundtrip_rebuilds_index() {
        let dev = small_device();
        let json = serde_json::to_string(&dev).unwrap();
        let mut restored: Device = serde_json::from_str(&json).unwrap();
        assert!(restored.sites_at(3, 3).is_empty());
        restored.rebuild_index();
        assert_eq!(restored.sites_at(3, 3).len(), 1);
        assert_eq!(restored.site_count(), dev.site_count());
    }
}
