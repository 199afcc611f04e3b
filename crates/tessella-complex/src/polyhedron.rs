//! The geometric object for one cell of the region complex.
//!
//! A [`Polyhedron`] owns the halfspace system induced by its region key
//! (one sign constraint per ReLU unit), the affine map the network computes
//! on the cell, and an interior point witnessing feasibility. Supporting
//! facets and vertices are computed lazily.

use crate::network::Mlp;
use crate::solver::{FeasibilitySolver, Tightness};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tessella_core::{Error, RegionKey, Result, SearchConfig};

/// One polyhedral cell: halfspaces `A x + b <= 0`, the local affine map
/// `x -> W x + c`, and an interior witness.
#[derive(Debug, Clone)]
pub struct Polyhedron {
    key: RegionKey,
    /// (num_units, d) halfspace normals.
    a: Array2<f64>,
    /// (num_units,) halfspace offsets.
    b: Array1<f64>,
    /// (out_dim, d) linear part of the local map.
    map_w: Array2<f64>,
    /// (out_dim,) offset of the local map.
    map_b: Array1<f64>,
    interior: Array1<f64>,
    shis: OnceLock<BTreeSet<usize>>,
    vertices: OnceLock<Vec<Array1<f64>>>,
}

impl Polyhedron {
    /// Build the cell for `key`, using `interior` as its witness.
    ///
    /// Propagates the affine map layer by layer, zeroing the rows of
    /// inactive units at each ReLU, and emits one sign-constraint row per
    /// unit. The resulting map is validated against a direct network
    /// evaluation at the witness; disagreement beyond `cfg.tol_verify_map`
    /// is fatal and the polyhedron is not constructed.
    pub fn from_key(
        network: &Mlp,
        key: RegionKey,
        interior: Array1<f64>,
        cfg: &SearchConfig,
    ) -> Result<Self> {
        if key.len() != network.num_units() {
            return Err(Error::ShapeMismatch {
                expected: vec![network.num_units()],
                got: vec![key.len()],
            });
        }
        if interior.len() != network.input_dim() {
            return Err(Error::ShapeMismatch {
                expected: vec![network.input_dim()],
                got: vec![interior.len()],
            });
        }
        let system = HalfspaceSystem::for_key(network, &key);
        let poly = Self {
            key,
            a: system.a,
            b: system.b,
            map_w: system.map_w,
            map_b: system.map_b,
            interior,
            shis: OnceLock::new(),
            vertices: OnceLock::new(),
        };
        poly.validate_map(network, cfg)?;
        Ok(poly)
    }

    /// Build the cell containing `point`, with `point` as the witness.
    pub fn from_point(
        network: &Mlp,
        point: ArrayView1<f64>,
        cfg: &SearchConfig,
    ) -> Result<Self> {
        let key = network.point_to_key(point)?;
        Self::from_key(network, key, point.to_owned(), cfg)
    }

    /// Verify the propagated map against a direct network evaluation at the
    /// interior witness. A mismatch means the halfspace construction and
    /// the network disagree about which cell the witness lies in.
    fn validate_map(&self, network: &Mlp, cfg: &SearchConfig) -> Result<()> {
        let direct = network.forward(self.interior.view())?;
        let mapped = self.eval(self.interior.view());
        let max_err = direct
            .iter()
            .zip(mapped.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0_f64, f64::max);
        if max_err > cfg.tol_verify_map {
            return Err(Error::MapMismatch {
                index: None,
                max_err,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn key(&self) -> &RegionKey {
        &self.key
    }

    #[inline]
    pub fn halfspace_coeffs(&self) -> ArrayView2<'_, f64> {
        self.a.view()
    }

    #[inline]
    pub fn halfspace_offsets(&self) -> ArrayView1<'_, f64> {
        self.b.view()
    }

    /// The local affine map `(W, c)` with network output `W x + c` on the cell.
    #[inline]
    pub fn affine_map(&self) -> (ArrayView2<'_, f64>, ArrayView1<'_, f64>) {
        (self.map_w.view(), self.map_b.view())
    }

    #[inline]
    pub fn interior_point(&self) -> ArrayView1<'_, f64> {
        self.interior.view()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.a.ncols()
    }

    #[inline]
    pub fn num_halfspaces(&self) -> usize {
        self.a.nrows()
    }

    /// Apply the cell's affine map.
    pub fn eval(&self, point: ArrayView1<f64>) -> Array1<f64> {
        self.map_w.dot(&point) + &self.map_b
    }

    /// True iff every halfspace row is satisfied within the containment
    /// tolerance. Points on a decision boundary may be claimed by both
    /// adjacent cells under this test.
    pub fn contains(&self, point: ArrayView1<f64>, cfg: &SearchConfig) -> bool {
        self.a
            .rows()
            .into_iter()
            .zip(self.b.iter())
            .all(|(row, &off)| row.dot(&point) + off <= cfg.tol_containment)
    }

    /// Whether row `i` is numerically zero for this region (its unit's sign
    /// cannot change anywhere in the cell's neighborhood).
    pub fn is_dead_row(&self, i: usize, cfg: &SearchConfig) -> bool {
        self.a
            .row(i)
            .iter()
            .fold(0.0_f64, |m, v| m.max(v.abs()))
            < cfg.tol_dead_unit
    }

    /// Indices of the rows that are true facets of the cell, computed on
    /// first use and cached.
    ///
    /// A cheap projection witness decides the common case: the interior
    /// point projected onto a row's hyperplane, if strictly inside all
    /// other rows, proves the row is a facet. Remaining rows go to the
    /// solver's bounded tightness query; ambiguous answers count as
    /// non-facets (under-connection over false edges).
    pub fn supporting_halfspaces(
        &self,
        solver: &dyn FeasibilitySolver,
        cfg: &SearchConfig,
    ) -> Result<&BTreeSet<usize>> {
        if let Some(shis) = self.shis.get() {
            return Ok(shis);
        }
        let mut shis = BTreeSet::new();
        for i in 0..self.num_halfspaces() {
            if self.is_dead_row(i, cfg) {
                continue;
            }
            if self.projection_witness(i, cfg) {
                shis.insert(i);
                continue;
            }
            let tightness =
                solver.facet_tightness(self.a.view(), self.b.view(), i, self.interior.view(), cfg)?;
            if tightness == Tightness::Facet {
                shis.insert(i);
            }
        }
        Ok(self.shis.get_or_init(|| shis))
    }

    /// Project the interior point onto row `i`'s hyperplane and accept the
    /// row as a facet if the projection strictly satisfies all other rows.
    fn projection_witness(&self, i: usize, cfg: &SearchConfig) -> bool {
        let row = self.a.row(i);
        let norm_sq = row.dot(&row);
        if norm_sq < cfg.tol_dead_unit {
            return false;
        }
        let dist = (row.dot(&self.interior) + self.b[i]) / norm_sq;
        let projected = &self.interior - &(&row * dist);
        for (j, (r, &off)) in self.a.rows().into_iter().zip(self.b.iter()).enumerate() {
            if j == i {
                continue;
            }
            if r.dot(&projected) + off > -cfg.tol_facet {
                return false;
            }
        }
        true
    }

    /// Vertices of the cell, from enumerating d-tuples of halfspace rows.
    ///
    /// Cost is `C(num_halfspaces, d)` dense solves; intended for
    /// low-dimensional inspection, never called by search. A candidate is
    /// trusted only when the aggregate violation over its defining rows is
    /// below `cfg.vertex_trust_threshold`; untrusted candidates are
    /// discarded rather than kept.
    pub fn vertices(&self, cfg: &SearchConfig) -> &[Array1<f64>] {
        self.vertices.get_or_init(|| {
            let d = self.dim();
            let live: Vec<usize> = (0..self.num_halfspaces())
                .filter(|&i| !self.is_dead_row(i, cfg))
                .collect();
            if live.len() < d {
                return Vec::new();
            }
            let mut found: Vec<Array1<f64>> = Vec::new();
            let mut combo = vec![0usize; d];
            enumerate_combinations(&live, d, &mut combo, 0, 0, &mut |rows| {
                let mut mat = Array2::zeros((d, d));
                let mut rhs = Array1::zeros(d);
                for (r, &idx) in rows.iter().enumerate() {
                    mat.row_mut(r).assign(&self.a.row(idx));
                    rhs[r] = -self.b[idx];
                }
                let Some(x) = solve_dense(mat, rhs) else {
                    return;
                };
                if !self.contains(x.view(), cfg) {
                    return;
                }
                let trust: f64 = rows
                    .iter()
                    .map(|&idx| (self.a.row(idx).dot(&x) + self.b[idx]).abs())
                    .sum();
                if trust < cfg.vertex_trust_threshold {
                    found.push(x);
                }
            });
            dedup_points(&mut found, cfg.tol_containment);
            found
        })
    }

    /// Monte-Carlo volume estimate over the vertex bounding box.
    ///
    /// Returns `None` for cells without enough trusted vertices to span a
    /// box (unbounded or degenerate). Opt-in and seeded; never computed
    /// during plain search.
    pub fn volume(&self, cfg: &SearchConfig, seed: u64) -> Option<f64> {
        let verts = self.vertices(cfg);
        let d = self.dim();
        if verts.len() < d + 1 {
            return None;
        }
        let mut lo = verts[0].clone();
        let mut hi = verts[0].clone();
        for v in verts {
            for j in 0..d {
                lo[j] = lo[j].min(v[j]);
                hi[j] = hi[j].max(v[j]);
            }
        }
        let box_volume: f64 = (0..d).map(|j| hi[j] - lo[j]).product();
        if box_volume <= 0.0 {
            return Some(0.0);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut inside = 0usize;
        let mut sample = Array1::zeros(d);
        for _ in 0..cfg.volume_samples {
            for j in 0..d {
                sample[j] = rng.gen_range(lo[j]..=hi[j]);
            }
            if self.contains(sample.view(), cfg) {
                inside += 1;
            }
        }
        Some(box_volume * inside as f64 / cfg.volume_samples as f64)
    }

    /// Replace the cached facet set (used when facets were computed on a
    /// detached copy of the system, e.g. by a worker thread).
    pub(crate) fn cache_supporting_halfspaces(&self, shis: BTreeSet<usize>) {
        let _ = self.shis.set(shis);
    }

    /// The cached facet set, if already computed.
    pub fn cached_supporting_halfspaces(&self) -> Option<&BTreeSet<usize>> {
        self.shis.get()
    }
}

/// The raw halfspace system and affine map induced by a region key, before
/// any witness is known. Candidate systems for neighbor probes are built
/// here and handed to the feasibility solver.
pub(crate) struct HalfspaceSystem {
    pub a: Array2<f64>,
    pub b: Array1<f64>,
    pub map_w: Array2<f64>,
    pub map_b: Array1<f64>,
}

impl HalfspaceSystem {
    /// Propagate the affine map for `key` layer by layer, masking inactive
    /// units at each ReLU, and collect one sign-constraint row per unit.
    /// The caller is responsible for checking `key.len()`.
    pub(crate) fn for_key(network: &Mlp, key: &RegionKey) -> Self {
        let d = network.input_dim();
        let mut a = Array2::zeros((network.num_units(), d));
        let mut b = Array1::zeros(network.num_units());

        let mut cur_w = Array2::eye(d);
        let mut cur_b = Array1::zeros(d);
        let mut unit = 0usize;
        for (layer, &relu) in network.layers().iter().zip(network.relu_flags()) {
            let mut pre_w = layer.weight.dot(&cur_w);
            let mut pre_b = layer.weight.dot(&cur_b) + &layer.bias;
            if relu {
                for j in 0..layer.out_dim() {
                    let active = key.get(unit);
                    // Active unit: pre > 0, i.e. -(w . x + c) <= 0.
                    let sign = if active { -1.0 } else { 1.0 };
                    for k in 0..d {
                        a[[unit, k]] = sign * pre_w[[j, k]];
                    }
                    b[unit] = sign * pre_b[j];
                    if !active {
                        for k in 0..d {
                            pre_w[[j, k]] = 0.0;
                        }
                        pre_b[j] = 0.0;
                    }
                    unit += 1;
                }
            }
            cur_w = pre_w;
            cur_b = pre_b;
        }
        Self {
            a,
            b,
            map_w: cur_w,
            map_b: cur_b,
        }
    }
}

fn enumerate_combinations(
    items: &[usize],
    k: usize,
    combo: &mut Vec<usize>,
    depth: usize,
    start: usize,
    visit: &mut impl FnMut(&[usize]),
) {
    if depth == k {
        visit(combo);
        return;
    }
    for i in start..items.len() {
        combo[depth] = items[i];
        enumerate_combinations(items, k, combo, depth + 1, i + 1, visit);
    }
}

/// Solve `mat x = rhs` by Gaussian elimination with partial pivoting.
/// Returns `None` for (near-)singular systems.
fn solve_dense(mut mat: Array2<f64>, mut rhs: Array1<f64>) -> Option<Array1<f64>> {
    let n = mat.nrows();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r, &s| {
                mat[[r, col]]
                    .abs()
                    .partial_cmp(&mat[[s, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("non-empty range");
        if mat[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                mat.swap([col, j], [pivot_row, j]);
            }
            rhs.swap(col, pivot_row);
        }
        for r in col + 1..n {
            let f = mat[[r, col]] / mat[[col, col]];
            if f == 0.0 {
                continue;
            }
            for j in col..n {
                mat[[r, j]] -= f * mat[[col, j]];
            }
            rhs[r] -= f * rhs[col];
        }
    }
    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut acc = rhs[row];
        for j in row + 1..n {
            acc -= mat[[row, j]] * x[j];
        }
        x[row] = acc / mat[[row, row]];
    }
    Some(x)
}

fn dedup_points(points: &mut Vec<Array1<f64>>, tol: f64) {
    points.sort_by(|a, b| {
        for (x, y) in a.iter().zip(b.iter()) {
            match x.partial_cmp(y) {
                Some(std::cmp::Ordering::Equal) | None => continue,
                Some(ord) => return ord,
            }
        }
        std::cmp::Ordering::Equal
    });
    points.dedup_by(|a, b| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0_f64, f64::max)
            < tol
    });
}
