//! The parallel site packer.
//!
//! Packs globally placed logic units onto concrete sites. Candidate
//! sites are enumerated per unit within a congestion-scaled radius, then
//! auction rounds run: units bid on their cheapest feasible candidates,
//! workers resolve bids over disjoint stripes of sites from a consistent
//! load snapshot, and winners commit at the end of the round. A unit
//! appearing on two sites keeps the cheaper one and the loser re-queues.

use crate::lut_pair::pair_luts_in_site;
use crate::params::{PackerParams, TieBreak};
use atoll_device::{Device, SiteId, SiteKind};
use atoll_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Stage};
use atoll_model::{update_b2b_and_get_total_hpwl, PlacementModel, PuId, PuKind};
use atoll_netlist::{CellId, CellKind, ControlSet, Netlist};
use rayon::prelude::*;
use std::collections::HashMap;

/// Sites per auction stripe; each stripe is owned by one worker.
const SITES_PER_STRIPE: usize = 64;

/// Candidate-search retries before a unit is declared stuck this round.
const SEARCH_RETRIES: usize = 12;

/// Placement demand of one packable unit.
#[derive(Debug, Clone)]
struct PuDemand {
    pu: PuId,
    x: f64,
    y: f64,
    luts: usize,
    ffs: usize,
    control_set: Option<ControlSet>,
    /// Member shape: offsets that must land on logic sites.
    shape: Vec<(f64, f64)>,
    /// Criticality divisor for the displacement cost.
    timing_weight: f64,
    candidates: Vec<SiteId>,
}

/// Committed load of one site.
#[derive(Debug, Clone, Default)]
struct SiteLoad {
    pus: Vec<PuId>,
    luts: usize,
    ffs: usize,
    control_set: Option<ControlSet>,
}

/// One bid of a unit on a site.
#[derive(Debug, Clone, Copy)]
struct Bid {
    site: SiteId,
    demand_idx: usize,
    cost: f64,
}

/// The parallel site packer and its final assignment.
pub struct ParallelSitePacker {
    params: PackerParams,
    pu_site: HashMap<PuId, SiteId>,
    site_load: HashMap<SiteId, SiteLoad>,
    unpacked: Vec<PuId>,
    lut_pairs: Vec<(CellId, CellId)>,
}

impl ParallelSitePacker {
    /// Creates a packer with the given parameters.
    pub fn new(params: PackerParams) -> Self {
        Self {
            params,
            pu_site: HashMap::new(),
            site_load: HashMap::new(),
            unpacked: Vec::new(),
            lut_pairs: Vec::new(),
        }
    }

    /// The site a unit was packed onto.
    pub fn site_of(&self, pu: PuId) -> Option<SiteId> {
        self.pu_site.get(&pu).copied()
    }

    /// Units that could not be packed.
    pub fn unpacked_units(&self) -> &[PuId] {
        &self.unpacked
    }

    /// LUT pairs sharing a basic element, per the latest packing.
    pub fn lut_pairs(&self) -> &[(CellId, CellId)] {
        &self.lut_pairs
    }

    /// Packs all logic units onto sites.
    ///
    /// Runs up to `max_iter` auction rounds. Units with no feasible site
    /// afterwards are warned about and left at their current location; a
    /// unit whose own flip-flops disagree on a control set is an error
    /// for that unit only and packing continues without it.
    pub fn pack_clbs(
        &mut self,
        model: &mut PlacementModel,
        netlist: &Netlist,
        device: &Device,
        max_iter: usize,
        with_timing: bool,
        sink: &DiagnosticSink,
    ) {
        self.pu_site.clear();
        self.site_load.clear();
        self.unpacked.clear();
        self.lut_pairs.clear();

        model.update_cell_locations(netlist);
        let mut demands = self.collect_demands(model, netlist, with_timing, sink);
        if demands.is_empty() {
            return;
        }

        self.enumerate_candidates(&mut demands, model, netlist, device);

        let mut pending: Vec<usize> = (0..demands.len()).collect();
        for _round in 0..max_iter {
            if pending.is_empty() {
                break;
            }
            let winners = self.auction_round(&demands, &pending, device);
            if winners.is_empty() {
                break;
            }
            for &(site, idx) in &winners {
                let demand = &demands[idx];
                let load = self.site_load.entry(site).or_default();
                load.pus.push(demand.pu);
                load.luts += demand.luts;
                load.ffs += demand.ffs;
                if load.control_set.is_none() {
                    load.control_set = demand.control_set;
                }
                self.pu_site.insert(demand.pu, site);
            }
            let won: std::collections::HashSet<usize> =
                winners.iter().map(|&(_, idx)| idx).collect();
            pending.retain(|idx| !won.contains(idx));
        }

        for idx in pending {
            let pu = demands[idx].pu;
            self.unpacked.push(pu);
            sink.emit(Diagnostic::warning(
                DiagnosticCode::new(Stage::Packing, 30),
                format!("no feasible site for unit {pu}, leaving at its current location"),
            ));
        }

        self.pair_site_luts(model, netlist);
        sink.emit(Diagnostic::note(
            DiagnosticCode::new(Stage::Packing, 31),
            format!(
                "site packing done: {} units packed onto {} sites, {} unpacked, {} LUT pairs",
                self.pu_site.len(),
                self.site_load.len(),
                self.unpacked.len(),
                self.lut_pairs.len()
            ),
        ));
    }

    /// Snaps every packed unit's location to its site.
    pub fn set_pu_location_to_packed_site(&self, model: &mut PlacementModel, device: &Device) {
        for (&pu, &site) in &self.pu_site {
            let site = device.site(site);
            let unit = model.unit_mut(pu);
            unit.set_location(site.x, site.y);
            unit.set_packed();
        }
    }

    /// Propagates packed anchor locations through macros and refreshes
    /// bin congestion; optionally recomputes and returns the total HPWL.
    pub fn update_packed_macro(
        &self,
        model: &mut PlacementModel,
        netlist: &Netlist,
        device: &Device,
        apply_to_macros: bool,
        recompute_hpwl: bool,
        y2x_ratio: f64,
    ) -> Option<f64> {
        if apply_to_macros {
            model.update_cell_locations(netlist);
        }
        let hpwl = if recompute_hpwl {
            Some(update_b2b_and_get_total_hpwl(model, netlist, y2x_ratio))
        } else {
            None
        };
        model.update_bin_demand(netlist, device);
        hpwl
    }

    /// Builds the demand records of all packable (all-logic) units,
    /// rejecting units with internally inconsistent control sets.
    fn collect_demands(
        &self,
        model: &PlacementModel,
        netlist: &Netlist,
        with_timing: bool,
        sink: &DiagnosticSink,
    ) -> Vec<PuDemand> {
        let mut demands = Vec::new();
        'units: for unit in &model.units {
            if unit.is_fixed && unit.is_locked {
                continue;
            }
            let members: Vec<(CellId, f64, f64)> = match unit.kind {
                PuKind::UnpackedCell(cell) => vec![(cell, 0.0, 0.0)],
                PuKind::Macro(m) => {
                    let m = netlist.design_macro(m);
                    m.cells
                        .iter()
                        .zip(&m.offsets)
                        .map(|(&c, &(dx, dy))| (c, dx, dy))
                        .collect()
                }
            };

            let mut luts = 0;
            let mut ffs = 0;
            let mut control_set: Option<ControlSet> = None;
            let mut shape = Vec::with_capacity(members.len());
            for &(cell, dx, dy) in &members {
                let cell = netlist.cell(cell);
                if cell.is_virtual {
                    continue;
                }
                if cell.kind.site_kind() != SiteKind::Logic {
                    continue 'units;
                }
                shape.push((dx, dy));
                match cell.kind {
                    CellKind::Lut { .. } => luts += 1,
                    CellKind::Ff => {
                        ffs += 1;
                        let cs = cell.control_set.unwrap_or_default();
                        match control_set {
                            None => control_set = Some(cs),
                            Some(existing) if existing != cs => {
                                sink.emit(Diagnostic::error(
                                    DiagnosticCode::new(Stage::Packing, 32),
                                    format!(
                                        "unit {} has conflicting control sets (cell '{}'), cannot be packed",
                                        unit.id, cell.name
                                    ),
                                ));
                                continue 'units;
                            }
                            Some(_) => {}
                        }
                    }
                    _ => {}
                }
            }
            if shape.is_empty() {
                continue;
            }

            let timing_weight = if with_timing {
                members
                    .iter()
                    .flat_map(|&(cell, _, _)| netlist.cell(cell).pins.iter())
                    .filter_map(|&p| netlist.pin(p).net)
                    .map(|n| netlist.net(n).timing_enhancement)
                    .fold(1.0_f64, f64::max)
            } else {
                1.0
            };

            demands.push(PuDemand {
                pu: unit.id,
                x: unit.x,
                y: unit.y,
                luts,
                ffs,
                control_set,
                shape,
                timing_weight,
                candidates: Vec::new(),
            });
        }
        demands
    }

    /// Enumerates candidate sites per unit, in parallel, expanding the
    /// search radius until compatible sites appear.
    fn enumerate_candidates(
        &self,
        demands: &mut [PuDemand],
        model: &PlacementModel,
        _netlist: &Netlist,
        device: &Device,
    ) {
        let params = &self.params;
        let bins = &model.bins;
        demands.par_iter_mut().for_each(|demand| {
            let congestion = if bins.bins.is_empty() {
                0.0
            } else {
                let idx = bins.bin_index_at(demand.x, demand.y, device);
                let bin = &bins.bins[idx];
                let i = SiteKind::Logic.index();
                let cap = bin.capacity[i] * bins.utilization[i];
                if cap > 0.0 {
                    (bin.demand[i] / cap - 1.0).max(0.0)
                } else {
                    0.0
                }
            };

            let mut radius = params.neighbor_radius * (1.0 + params.congestion_weight * congestion);
            for _ in 0..SEARCH_RETRIES {
                let found: Vec<SiteId> = device
                    .sites_in_radius(SiteKind::Logic, demand.x, demand.y, radius)
                    .into_iter()
                    .filter(|&s| {
                        let site = device.site(s);
                        demand.shape.iter().all(|&(dx, dy)| {
                            device.has_site_of_kind_at(SiteKind::Logic, site.x + dx, site.y + dy)
                        })
                    })
                    .take(params.max_candidate_sites_per_pu)
                    .collect();
                if !found.is_empty() {
                    demand.candidates = found;
                    return;
                }
                radius *= 1.0 + params.search_expansion_step;
            }
        });
    }

    /// Runs one auction round and returns the committed `(site, demand)`
    /// winners.
    fn auction_round(
        &self,
        demands: &[PuDemand],
        pending: &[usize],
        device: &Device,
    ) -> Vec<(SiteId, usize)> {
        let params = &self.params;
        let ff_capacity = device.elements_per_site(SiteKind::Logic) as usize;

        // Bidding: each pending unit proposes its two cheapest feasible
        // candidates against the committed load snapshot.
        let mut bids: Vec<Bid> = pending
            .par_iter()
            .flat_map_iter(|&idx| {
                let demand = &demands[idx];
                let mut scored: Vec<Bid> = demand
                    .candidates
                    .iter()
                    .filter(|&&s| self.site_fits(s, demand, ff_capacity))
                    .map(|&s| {
                        let site = device.site(s);
                        let displacement =
                            (site.x - demand.x).abs() + (site.y - demand.y).abs();
                        let load = self.site_load.get(&s).map(|l| l.pus.len()).unwrap_or(0);
                        Bid {
                            site: s,
                            demand_idx: idx,
                            cost: displacement / demand.timing_weight
                                + params.congestion_weight * load as f64,
                        }
                    })
                    .collect();
                scored.sort_by(|a, b| a.cost.partial_cmp(&b.cost).expect("finite cost"));
                scored.truncate(2);
                scored
            })
            .collect();

        // Stripe resolution: sites are grouped and each stripe of sites
        // is resolved by one worker against the same snapshot.
        bids.sort_by(|a, b| a.site.cmp(&b.site));
        let mut per_site: Vec<(SiteId, Vec<Bid>)> = Vec::new();
        for bid in bids {
            match per_site.last_mut() {
                Some((site, list)) if *site == bid.site => list.push(bid),
                _ => per_site.push((bid.site, vec![bid])),
            }
        }

        let tentative: Vec<(SiteId, usize, f64)> = per_site
            .par_chunks(SITES_PER_STRIPE)
            .flat_map_iter(|stripe| {
                let mut accepted = Vec::new();
                for (site, site_bids) in stripe {
                    let mut site_bids = site_bids.clone();
                    site_bids.sort_by(|a, b| {
                        a.cost.partial_cmp(&b.cost).expect("finite cost").then_with(|| {
                            let (pa, pb) =
                                (demands[a.demand_idx].pu, demands[b.demand_idx].pu);
                            match params.tie_break {
                                TieBreak::First => pa.cmp(&pb),
                                TieBreak::Last => pb.cmp(&pa),
                            }
                        })
                    });

                    let mut load = self.site_load.get(site).cloned().unwrap_or_default();
                    for bid in site_bids {
                        let demand = &demands[bid.demand_idx];
                        if !load_fits(&load, demand, params, ff_capacity) {
                            continue;
                        }
                        load.pus.push(demand.pu);
                        load.luts += demand.luts;
                        load.ffs += demand.ffs;
                        if load.control_set.is_none() {
                            load.control_set = demand.control_set;
                        }
                        accepted.push((*site, bid.demand_idx, bid.cost));
                    }
                }
                accepted
            })
            .collect();

        // A unit that won on two sites keeps the cheaper one.
        let mut best: HashMap<usize, (SiteId, f64)> = HashMap::new();
        for (site, idx, cost) in tentative {
            match best.get(&idx) {
                Some(&(_, existing)) if existing <= cost => {}
                _ => {
                    best.insert(idx, (site, cost));
                }
            }
        }
        best.into_iter().map(|(idx, (site, _))| (site, idx)).collect()
    }

    fn site_fits(&self, site: SiteId, demand: &PuDemand, ff_capacity: usize) -> bool {
        match self.site_load.get(&site) {
            None => true,
            Some(load) => load_fits(load, demand, &self.params, ff_capacity),
        }
    }

    /// Pairs the LUTs committed to each site.
    fn pair_site_luts(&mut self, model: &PlacementModel, netlist: &Netlist) {
        let threshold = self.params.net_share_threshold;
        let mut pairs = Vec::new();
        for load in self.site_load.values() {
            let mut luts: Vec<CellId> = Vec::new();
            for &pu in &load.pus {
                for cell in model.member_cells(netlist, pu) {
                    if matches!(netlist.cell(cell).kind, CellKind::Lut { .. }) {
                        luts.push(cell);
                    }
                }
            }
            pairs.extend(pair_luts_in_site(netlist, &luts, threshold));
        }
        self.lut_pairs = pairs;
    }
}

fn load_fits(
    load: &SiteLoad,
    demand: &PuDemand,
    params: &PackerParams,
    ff_capacity: usize,
) -> bool {
    if load.pus.len() >= params.max_pus_per_site {
        return false;
    }
    if load.luts + demand.luts > params.max_luts_per_site {
        return false;
    }
    if load.ffs + demand.ffs > ff_capacity {
        return false;
    }
    match (load.control_set, demand.control_set) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}
