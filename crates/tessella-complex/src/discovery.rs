//! Neighbor discovery: given a cell and one of its facet rows, find the
//! cell on the other side, or prove there is none.
//!
//! A flipped key does not guarantee a region exists (the flipped system
//! can be infeasible, and a feasible same-key set can even be disconnected
//! from the facet in question), so every candidate is certified by an
//! interior witness before a [`Polyhedron`] is built.

use crate::network::Mlp;
use crate::polyhedron::{HalfspaceSystem, Polyhedron};
use crate::solver::FeasibilitySolver;
use ndarray::{Array1, ArrayView1};
use tessella_core::{RegionKey, Result, SearchConfig};
use tracing::trace;

/// Finds the cells adjacent to a given cell, one flipped unit at a time.
pub struct NeighborFinder<'a> {
    network: &'a Mlp,
    solver: &'a dyn FeasibilitySolver,
    cfg: &'a SearchConfig,
}

impl<'a> NeighborFinder<'a> {
    pub fn new(
        network: &'a Mlp,
        solver: &'a dyn FeasibilitySolver,
        cfg: &'a SearchConfig,
    ) -> Self {
        Self {
            network,
            solver,
            cfg,
        }
    }

    #[inline]
    pub(crate) fn solver(&self) -> &'a dyn FeasibilitySolver {
        self.solver
    }

    /// The cell across facet row `unit` of `poly`, or `None` when the
    /// flipped system has no interior.
    ///
    /// Tries a reflection witness first: the interior point mirrored
    /// across the unit's hyperplane, accepted when it lands strictly
    /// inside the candidate system and the network assigns it the flipped
    /// key. Only when the mirror misses does the feasibility solver run,
    /// once per radius in the escalation sequence, centered on the
    /// current cell's witness.
    pub fn neighbor_across(
        &self,
        poly: &Polyhedron,
        unit: usize,
    ) -> Result<Option<Polyhedron>> {
        if self.network.is_dead_unit(unit) || poly.is_dead_row(unit, self.cfg) {
            return Ok(None);
        }
        let candidate = poly.key().flip(unit);
        let system = HalfspaceSystem::for_key(self.network, &candidate);

        if let Some(witness) = self.reflection_witness(poly, unit, &system, &candidate)? {
            trace!(unit, "neighbor admitted by reflection witness");
            return Polyhedron::from_key(self.network, candidate, witness, self.cfg).map(Some);
        }

        for &radius in &self.cfg.radius_sequence {
            let found = self.solver.interior_point(
                system.a.view(),
                system.b.view(),
                Some(poly.interior_point()),
                radius,
                self.cfg,
            )?;
            if let Some(witness) = found {
                trace!(unit, radius, "neighbor admitted by feasibility query");
                return Polyhedron::from_key(self.network, candidate, witness, self.cfg)
                    .map(Some);
            }
        }
        trace!(unit, "flip pruned, no interior found");
        Ok(None)
    }

    /// Mirror the cell's interior point across row `unit`'s hyperplane and
    /// accept it only when strictly inside every candidate row and the
    /// network agrees on the key. The key check matters: the mirrored
    /// point can cross additional unit boundaries of deeper layers.
    fn reflection_witness(
        &self,
        poly: &Polyhedron,
        unit: usize,
        system: &HalfspaceSystem,
        candidate: &RegionKey,
    ) -> Result<Option<Array1<f64>>> {
        let row = poly.halfspace_coeffs().row(unit).to_owned();
        let norm_sq = row.dot(&row);
        if norm_sq < self.cfg.tol_dead_unit {
            return Ok(None);
        }
        let ip = poly.interior_point();
        let dist = (row.dot(&ip) + poly.halfspace_offsets()[unit]) / norm_sq;
        let mirrored = &ip.to_owned() - &(&row * (2.0 * dist));
        if !strictly_inside(system, mirrored.view(), self.cfg) {
            return Ok(None);
        }
        if self.network.point_to_key(mirrored.view())? != *candidate {
            return Ok(None);
        }
        Ok(Some(mirrored))
    }
}

/// All rows satisfied with margin, ignoring numerically dead rows with a
/// feasible offset (an always-satisfied constraint).
fn strictly_inside(system: &HalfspaceSystem, point: ArrayView1<f64>, cfg: &SearchConfig) -> bool {
    system
        .a
        .rows()
        .into_iter()
        .zip(system.b.iter())
        .all(|(row, &off)| {
            let max_coeff = row.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            if max_coeff < cfg.tol_dead_unit {
                off <= cfg.tol_containment
            } else {
                row.dot(&point) + off <= -cfg.tol_facet
            }
        })
}
