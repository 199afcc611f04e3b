//! Central configuration for search tolerances and bounds.
//!
//! All tunable numerical constants used across the engine live here with
//! their defaults. Callers override fields before a search begins; the
//! engine never hard-codes a tolerance.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tolerances and bounds read by polyhedron construction, neighbor
/// discovery, and the search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// A point satisfies a halfspace row `a·x + b <= 0` if the left side is
    /// at most this value. Used by containment checks and witnesses.
    pub tol_containment: f64,

    /// A unit whose weight row (or region-local halfspace row) has max-abs
    /// below this can never flip; neighbor discovery skips it.
    pub tol_dead_unit: f64,

    /// Tolerance for a halfspace row counting as tight on the boundary when
    /// identifying supporting facets.
    pub tol_facet: f64,

    /// Facet query stops with "facet" once the achievable violation reaches
    /// this value (best-objective stop).
    pub shi_best_obj_stop: f64,

    /// Facet query stops with "not a facet" once the bound on achievable
    /// violation falls to this value (best-bound stop). Results between the
    /// two stops are ambiguous and discarded.
    pub shi_best_bound_stop: f64,

    /// Max-abs disagreement allowed between a polyhedron's affine map and a
    /// direct network evaluation at its interior point.
    pub tol_verify_map: f64,

    /// A vertex is trusted only if the aggregate violation over its
    /// supporting halfspaces stays below this.
    pub vertex_trust_threshold: f64,

    /// Radius bounds tried in order when searching for an interior point of
    /// a candidate neighbor. Smallest first: small radii keep the LP fast,
    /// the last entry decides infeasibility.
    pub radius_sequence: Vec<f64>,

    /// Box half-width for facet-tightness queries. Keeps the LP bounded
    /// without clipping real facet structure.
    pub search_bound: f64,

    /// Weight of the Euclidean bias term in the A* cost
    /// `f = hamming + astar_bias_weight * bias`. The bias is negative and
    /// rewards candidates geometrically closer to the goal.
    pub astar_bias_weight: f64,

    /// How long a worker waits on the frontier queue before re-checking
    /// whether the search has terminated.
    pub queue_wait_timeout: Duration,

    /// Residual artificial-variable mass above which phase 1 of the bundled
    /// simplex declares the system infeasible.
    pub tol_lp_infeasible: f64,

    /// Sample count for Monte-Carlo volume estimation.
    pub volume_samples: usize,

    /// Pivot cap for the bundled simplex solver. Bland's rule guarantees
    /// termination; the cap converts a numerically stuck basis into an
    /// explicit solver error instead of a hang.
    pub max_simplex_iters: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tol_containment: 1e-6,
            tol_dead_unit: 1e-8,
            tol_facet: 1e-6,
            shi_best_obj_stop: 1e-6,
            shi_best_bound_stop: -1e-6,
            tol_verify_map: 1e-6,
            vertex_trust_threshold: 1e-6,
            radius_sequence: vec![0.01, 0.1, 1.0, 10.0, 100.0],
            search_bound: 1e8,
            astar_bias_weight: 0.9,
            queue_wait_timeout: Duration::from_millis(500),
            tol_lp_infeasible: 1e-7,
            volume_samples: 20_000,
            max_simplex_iters: 10_000,
        }
    }
}

impl SearchConfig {
    /// Check internal consistency of the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.radius_sequence.is_empty() {
            return Err(Error::InvalidConfig("radius_sequence is empty".into()));
        }
        if self.radius_sequence.iter().any(|&r| !(r > 0.0) || !r.is_finite())
            || self.radius_sequence.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(Error::InvalidConfig(
                "radius_sequence must be positive and strictly increasing".into(),
            ));
        }
        for (name, v) in [
            ("tol_containment", self.tol_containment),
            ("tol_dead_unit", self.tol_dead_unit),
            ("tol_facet", self.tol_facet),
            ("tol_verify_map", self.tol_verify_map),
            ("vertex_trust_threshold", self.vertex_trust_threshold),
            ("tol_lp_infeasible", self.tol_lp_infeasible),
            ("search_bound", self.search_bound),
        ] {
            if !(v > 0.0) || !v.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be finite and positive, got {v}"
                )));
            }
        }
        if self.shi_best_obj_stop <= 0.0 {
            return Err(Error::InvalidConfig(
                "shi_best_obj_stop must be positive".into(),
            ));
        }
        if self.shi_best_bound_stop >= 0.0 {
            return Err(Error::InvalidConfig(
                "shi_best_bound_stop must be negative".into(),
            ));
        }
        if self.max_simplex_iters == 0 {
            return Err(Error::InvalidConfig("max_simplex_iters must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SearchConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_unordered_radius_sequence() {
        let cfg = SearchConfig {
            radius_sequence: vec![1.0, 0.5],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_nonpositive_tolerance() {
        let cfg = SearchConfig {
            tol_facet: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_nonpositive_infeasibility_tolerance() {
        let cfg = SearchConfig {
            tol_lp_infeasible: -1e-7,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
