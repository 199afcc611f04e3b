//! LP feasibility queries behind a narrow capability boundary.
//!
//! Search correctness rests on exactly two queries (and nothing else):
//! finding an interior point of a halfspace system within a radius, and
//! deciding whether a row is a supporting facet. Both are expressed on the
//! [`FeasibilitySolver`] trait so an external LP/MILP backend can be
//! substituted without touching any search logic.
//!
//! The bundled [`SimplexSolver`] is a dense two-phase simplex with Bland's
//! rule. Rows are normalized to unit length and coordinates are recentered
//! on the caller-supplied witness before solving, which keeps the tableau
//! well-conditioned at the 1e-6 tolerances the facet contract needs.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tessella_core::{Error, Result, SearchConfig};
use tracing::trace;

/// Outcome of a facet-tightness query for one halfspace row.
///
/// The contract is conservative: `Facet` is only reported when the solver
/// proved the row's hyperplane reachable while all other rows hold;
/// `Ambiguous` results must be treated as non-facets by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tightness {
    /// The row is a geometrically active boundary of the polyhedron.
    Facet,
    /// The row is dominated by the others and never produces a neighbor.
    NotFacet,
    /// Achievable violation sits between the two stopping tolerances.
    Ambiguous,
}

/// Feasibility/optimization backend for halfspace systems `A x + b <= 0`.
pub trait FeasibilitySolver: Send + Sync {
    /// Find a point strictly inside all halfspaces, maximizing the minimum
    /// slack (Chebyshev-center objective), restricted to the box
    /// `|x - center|_inf <= radius` (`center` defaults to the origin).
    ///
    /// `Ok(None)` means no strictly interior point exists within that
    /// radius. This is a normal outcome, not an error.
    fn interior_point(
        &self,
        a: ArrayView2<f64>,
        b: ArrayView1<f64>,
        center: Option<ArrayView1<f64>>,
        radius: f64,
        cfg: &SearchConfig,
    ) -> Result<Option<Array1<f64>>>;

    /// Decide whether `row` is a supporting facet: maximize the row's
    /// violation subject to all other rows, stopping once the best
    /// objective reaches `cfg.shi_best_obj_stop` (facet) or the bound drops
    /// to `cfg.shi_best_bound_stop` (not a facet). `center` must be a point
    /// inside the polyhedron (rows other than `row` satisfied).
    fn facet_tightness(
        &self,
        a: ArrayView2<f64>,
        b: ArrayView1<f64>,
        row: usize,
        center: ArrayView1<f64>,
        cfg: &SearchConfig,
    ) -> Result<Tightness>;
}

/// Dense two-phase simplex over the system rows.
///
/// The working box for facet queries is clamped to [`Self::FACET_BOX`] even
/// when `cfg.search_bound` is larger: a facet tight only beyond that range
/// is reported `NotFacet`, which errs toward under-connection as required.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimplexSolver;

impl SimplexSolver {
    /// Working box half-width for facet-tightness queries.
    const FACET_BOX: f64 = 1e4;
    /// Headroom allowed beyond the target hyperplane; the query only needs
    /// to know the sign of the achievable violation, not its magnitude.
    const VIOLATION_CAP: f64 = 1.0;
    /// Pivot tolerance.
    const EPS: f64 = 1e-9;
}

/// Normalized copy of the system with numerically dead rows removed.
///
/// Returns `None` if a dead row is unsatisfiable (0·x + b <= 0 with b > 0),
/// which makes the whole system empty. `kept[i]` is the original index of
/// normalized row i.
fn normalize_rows(
    a: ArrayView2<f64>,
    b: ArrayView1<f64>,
    cfg: &SearchConfig,
) -> Option<(Array2<f64>, Array1<f64>, Vec<usize>)> {
    let d = a.ncols();
    let mut rows = Vec::new();
    let mut rhs = Vec::new();
    let mut kept = Vec::new();
    for (i, row) in a.rows().into_iter().enumerate() {
        let norm = row.dot(&row).sqrt();
        if norm < cfg.tol_dead_unit {
            if b[i] > cfg.tol_containment {
                return None;
            }
            continue;
        }
        rows.extend(row.iter().map(|v| v / norm));
        rhs.push(b[i] / norm);
        kept.push(i);
    }
    let m = kept.len();
    let a_norm = Array2::from_shape_vec((m, d), rows).expect("row-major construction");
    Some((a_norm, Array1::from_vec(rhs), kept))
}

impl FeasibilitySolver for SimplexSolver {
    fn interior_point(
        &self,
        a: ArrayView2<f64>,
        b: ArrayView1<f64>,
        center: Option<ArrayView1<f64>>,
        radius: f64,
        cfg: &SearchConfig,
    ) -> Result<Option<Array1<f64>>> {
        let d = a.ncols();
        let Some((an, bn, _)) = normalize_rows(a, b, cfg) else {
            return Ok(None);
        };
        let m = an.nrows();
        let origin = center
            .map(|c| c.to_owned())
            .unwrap_or_else(|| Array1::zeros(d));
        // Shift to x = origin + y - radius (so y >= 0), with vars (y, r).
        // Rows are unit-normal, so the slack variable enters each row with
        // coefficient exactly 1:
        //   a_i. y + r <= radius * sum(a_i) - (a_i . origin + b_i)
        //   y_j <= 2 radius,  r <= radius
        let n = d + 1;
        let rows = m + d + 1;
        let mut lp_a = Array2::zeros((rows, n));
        let mut lp_b = Array1::zeros(rows);
        for i in 0..m {
            let row = an.row(i);
            for j in 0..d {
                lp_a[[i, j]] = row[j];
            }
            lp_a[[i, d]] = 1.0;
            lp_b[i] = radius * row.sum() - (row.dot(&origin) + bn[i]);
        }
        for j in 0..d {
            lp_a[[m + j, j]] = 1.0;
            lp_b[m + j] = 2.0 * radius;
        }
        lp_a[[m + d, d]] = 1.0;
        lp_b[m + d] = radius;
        let mut obj = Array1::zeros(n);
        obj[d] = 1.0;

        match solve_max(&lp_a, &lp_b, &obj, cfg)? {
            LpOutcome::Infeasible => Ok(None),
            LpOutcome::Optimal { x: y, value } => {
                if value <= cfg.tol_containment {
                    // Feasible but not strictly interior at this radius.
                    trace!(slack = value, radius, "interior point not strict");
                    return Ok(None);
                }
                let mut point = origin;
                for j in 0..d {
                    point[j] += y[j] - radius;
                }
                Ok(Some(point))
            }
        }
    }

    fn facet_tightness(
        &self,
        a: ArrayView2<f64>,
        b: ArrayView1<f64>,
        row: usize,
        center: ArrayView1<f64>,
        cfg: &SearchConfig,
    ) -> Result<Tightness> {
        let d = a.ncols();
        let Some((an, bn, kept)) = normalize_rows(a, b, cfg) else {
            return Ok(Tightness::NotFacet);
        };
        let Some(target) = kept.iter().position(|&orig| orig == row) else {
            // The row itself is numerically dead: it can never be tight.
            return Ok(Tightness::NotFacet);
        };
        let m = an.nrows();
        let bound = cfg.search_bound.min(Self::FACET_BOX);
        // Maximize the target row's violation a_t . x + b_t subject to all
        // other rows, a cap on the violation itself, and the working box.
        // Shift to x = center + y - bound so y >= 0.
        let rows = m + d;
        let mut lp_a = Array2::zeros((rows, d));
        let mut lp_b = Array1::zeros(rows);
        for i in 0..m {
            let r = an.row(i);
            for j in 0..d {
                lp_a[[i, j]] = r[j];
            }
            let rhs = bound * r.sum() - (r.dot(&center) + bn[i]);
            lp_b[i] = if i == target {
                rhs + Self::VIOLATION_CAP
            } else {
                rhs
            };
        }
        for j in 0..d {
            lp_a[[m + j, j]] = 1.0;
            lp_b[m + j] = 2.0 * bound;
        }
        let obj = an.row(target).to_owned();

        match solve_max(&lp_a, &lp_b, &obj, cfg)? {
            LpOutcome::Infeasible => Ok(Tightness::NotFacet),
            LpOutcome::Optimal { x: y, .. } => {
                let mut point = center.to_owned();
                for j in 0..d {
                    point[j] += y[j] - bound;
                }
                let violation = an.row(target).dot(&point) + bn[target];
                if violation >= cfg.shi_best_obj_stop {
                    Ok(Tightness::Facet)
                } else if violation <= cfg.shi_best_bound_stop {
                    Ok(Tightness::NotFacet)
                } else {
                    trace!(row, violation, "ambiguous facet query discarded");
                    Ok(Tightness::Ambiguous)
                }
            }
        }
    }
}

enum LpOutcome {
    Optimal { x: Array1<f64>, value: f64 },
    Infeasible,
}

/// Full simplex tableau: `m` constraint rows over structural, slack, and
/// artificial columns, plus a maintained reduced-cost row.
struct Tableau {
    m: usize,
    n: usize,
    cols: usize,
    /// Row-major (m x cols) constraint coefficients.
    tab: Vec<f64>,
    rhs: Vec<f64>,
    basis: Vec<usize>,
    /// Reduced costs for the phase currently being solved.
    reduced: Vec<f64>,
    max_iters: usize,
}

impl Tableau {
    #[inline]
    fn at(&self, i: usize, j: usize) -> f64 {
        self.tab[i * self.cols + j]
    }

    #[inline]
    fn is_artificial(&self, j: usize) -> bool {
        j >= self.n + self.m
    }

    /// Rebuild the reduced-cost row for the objective `cost(j)` over the
    /// current basis: r_j = c_j - sum_i c_B[i] * T[i][j].
    fn load_objective(&mut self, cost: &dyn Fn(usize) -> f64) {
        for j in 0..self.cols {
            self.reduced[j] = cost(j);
        }
        for i in 0..self.m {
            let cb = cost(self.basis[i]);
            if cb != 0.0 {
                for j in 0..self.cols {
                    self.reduced[j] -= cb * self.tab[i * self.cols + j];
                }
            }
        }
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let cols = self.cols;
        let p = self.tab[row * cols + col];
        for v in &mut self.tab[row * cols..(row + 1) * cols] {
            *v /= p;
        }
        self.rhs[row] /= p;
        for i in 0..self.m {
            if i == row {
                continue;
            }
            let f = self.tab[i * cols + col];
            if f.abs() <= SimplexSolver::EPS {
                continue;
            }
            for j in 0..cols {
                self.tab[i * cols + j] -= f * self.tab[row * cols + j];
            }
            self.rhs[i] -= f * self.rhs[row];
            self.tab[i * cols + col] = 0.0;
        }
        let f = self.reduced[col];
        if f.abs() > 0.0 {
            for j in 0..cols {
                self.reduced[j] -= f * self.tab[row * cols + j];
            }
            self.reduced[col] = 0.0;
        }
        self.basis[row] = col;
    }

    /// Run simplex iterations until no improving column remains.
    ///
    /// Bland's rule everywhere (lowest-index entering column, lowest basis
    /// index on ratio ties), so the method terminates; `max_iters` converts
    /// a numerically stuck basis into `Error::Solver` rather than cycling.
    fn optimize(&mut self, allow_artificial: bool) -> Result<()> {
        let eps = SimplexSolver::EPS;
        for _ in 0..self.max_iters {
            let entering = (0..self.cols).find(|&j| {
                (allow_artificial || !self.is_artificial(j))
                    && self.reduced[j] > eps
                    && !self.basis.contains(&j)
            });
            let Some(col) = entering else {
                return Ok(());
            };
            let mut best: Option<(f64, usize)> = None;
            for i in 0..self.m {
                let t = self.at(i, col);
                if t > eps {
                    let ratio = self.rhs[i].max(0.0) / t;
                    let better = match best {
                        None => true,
                        Some((r, bi)) => {
                            ratio < r - eps
                                || (ratio < r + eps && self.basis[i] < self.basis[bi])
                        }
                    };
                    if better {
                        best = Some((ratio, i));
                    }
                }
            }
            let Some((_, row)) = best else {
                // Unbounded improving direction. The callers always box
                // their variables, so this indicates a malformed system.
                return Err(Error::Solver("unbounded LP in boxed query".into()));
            };
            self.pivot(row, col);
        }
        Err(Error::Solver(format!(
            "simplex iteration cap ({}) exceeded",
            self.max_iters
        )))
    }
}

/// Maximize `obj . x` subject to `a x <= b`, `x >= 0`, via two-phase
/// simplex (phase 1 only when some rhs is negative).
fn solve_max(
    a: &Array2<f64>,
    b: &Array1<f64>,
    obj: &Array1<f64>,
    cfg: &SearchConfig,
) -> Result<LpOutcome> {
    let eps = SimplexSolver::EPS;
    let (m, n) = (a.nrows(), a.ncols());
    let num_art = b.iter().filter(|&&v| v < 0.0).count();
    let cols = n + m + num_art;

    let mut t = Tableau {
        m,
        n,
        cols,
        tab: vec![0.0; m * cols],
        rhs: vec![0.0; m],
        basis: vec![0; m],
        reduced: vec![0.0; cols],
        max_iters: cfg.max_simplex_iters,
    };
    let mut next_art = n + m;
    for i in 0..m {
        let flip = if b[i] < 0.0 { -1.0 } else { 1.0 };
        for j in 0..n {
            t.tab[i * cols + j] = flip * a[[i, j]];
        }
        t.tab[i * cols + n + i] = flip;
        t.rhs[i] = flip * b[i];
        if flip < 0.0 {
            t.tab[i * cols + next_art] = 1.0;
            t.basis[i] = next_art;
            next_art += 1;
        } else {
            t.basis[i] = n + i;
        }
    }

    if num_art > 0 {
        // Phase 1: drive the artificial variables to zero.
        let nm = n + m;
        t.load_objective(&|j| if j >= nm { -1.0 } else { 0.0 });
        t.optimize(true)?;
        let infeas: f64 = (0..m)
            .filter(|&i| t.basis[i] >= nm)
            .map(|i| t.rhs[i].max(0.0))
            .sum();
        if infeas > cfg.tol_lp_infeasible {
            return Ok(LpOutcome::Infeasible);
        }
        // Pivot leftover artificials (basic at zero) out where possible;
        // rows that admit no pivot are redundant and stay inert.
        for i in 0..m {
            if t.basis[i] < nm {
                continue;
            }
            if let Some(col) = (0..nm).find(|&j| t.at(i, j).abs() > eps) {
                t.pivot(i, col);
            }
        }
    }

    // Phase 2 over the real objective, artificials barred from re-entry.
    t.load_objective(&|j| if j < n { obj[j] } else { 0.0 });
    t.optimize(false)?;

    let mut x = Array1::zeros(n);
    for i in 0..m {
        if t.basis[i] < n {
            x[t.basis[i]] = t.rhs[i].max(0.0);
        }
    }
    let value = obj.dot(&x);
    Ok(LpOutcome::Optimal { x, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn cfg() -> SearchConfig {
        SearchConfig::default()
    }

    /// Unit square: x <= 1, -x <= 1, y <= 1, -y <= 1 as `a.x + b <= 0`.
    fn unit_square() -> (Array2<f64>, Array1<f64>) {
        (
            array![[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]],
            array![-1.0, -1.0, -1.0, -1.0],
        )
    }

    #[test]
    fn chebyshev_center_of_unit_square() {
        let (a, b) = unit_square();
        let p = SimplexSolver
            .interior_point(a.view(), b.view(), None, 10.0, &cfg())
            .unwrap()
            .expect("square has an interior");
        assert_abs_diff_eq!(p[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn infeasible_system_returns_none() {
        // x <= -1 and -x <= -1 simultaneously.
        let a = array![[1.0, 0.0], [-1.0, 0.0]];
        let b = array![1.0, 1.0];
        let p = SimplexSolver
            .interior_point(a.view(), b.view(), None, 10.0, &cfg())
            .unwrap();
        assert!(p.is_none());
    }

    #[test]
    fn region_outside_radius_is_infeasible_until_escalation() {
        // 4 <= x <= 6, |y| <= 1: no interior point within radius 1 of the
        // origin, found at radius 10.
        let a = array![[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]];
        let b = array![-6.0, 4.0, -1.0, -1.0];
        let solver = SimplexSolver;
        assert!(solver
            .interior_point(a.view(), b.view(), None, 1.0, &cfg())
            .unwrap()
            .is_none());
        let p = solver
            .interior_point(a.view(), b.view(), None, 10.0, &cfg())
            .unwrap()
            .expect("reachable at radius 10");
        assert!(p[0] > 4.0 && p[0] < 6.0);
        assert!(p[1].abs() < 1.0);
    }

    #[test]
    fn recentered_box_reaches_far_regions() {
        let a = array![[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]];
        let b = array![-101.0, 99.0, -1.0, -1.0];
        let center = array![99.5, 0.0];
        let p = SimplexSolver
            .interior_point(a.view(), b.view(), Some(center.view()), 2.0, &cfg())
            .unwrap()
            .expect("reachable from a nearby center");
        assert!(p[0] > 99.0 && p[0] < 101.0);
    }

    #[test]
    fn redundant_row_is_not_a_facet() {
        // Unit square plus the dominated constraint x <= 2.
        let a = array![
            [1.0, 0.0],
            [-1.0, 0.0],
            [0.0, 1.0],
            [0.0, -1.0],
            [1.0, 0.0]
        ];
        let b = array![-1.0, -1.0, -1.0, -1.0, -2.0];
        let center = array![0.0, 0.0];
        let solver = SimplexSolver;
        for row in 0..4 {
            assert_eq!(
                solver
                    .facet_tightness(a.view(), b.view(), row, center.view(), &cfg())
                    .unwrap(),
                Tightness::Facet,
                "row {row} bounds the square"
            );
        }
        assert_eq!(
            solver
                .facet_tightness(a.view(), b.view(), 4, center.view(), &cfg())
                .unwrap(),
            Tightness::NotFacet
        );
    }

    #[test]
    fn dead_row_is_not_a_facet() {
        let a = array![[1.0, 0.0], [-1.0, 0.0], [0.0, 0.0]];
        let b = array![-1.0, -1.0, -0.5];
        let center = array![0.0, 0.0];
        assert_eq!(
            SimplexSolver
                .facet_tightness(a.view(), b.view(), 2, center.view(), &cfg())
                .unwrap(),
            Tightness::NotFacet
        );
    }

    #[test]
    fn unsatisfiable_dead_row_empties_the_system() {
        // 0 . x + 1 <= 0 cannot hold.
        let a = array![[1.0, 0.0], [0.0, 0.0]];
        let b = array![-1.0, 1.0];
        assert!(SimplexSolver
            .interior_point(a.view(), b.view(), None, 10.0, &cfg())
            .unwrap()
            .is_none());
    }

    #[test]
    fn interior_point_has_positive_slack_on_all_rows() {
        let a = array![[1.0, 1.0], [-1.0, 0.5], [0.0, -1.0]];
        let b = array![-1.0, -1.0, -1.0];
        let p = SimplexSolver
            .interior_point(a.view(), b.view(), None, 10.0, &cfg())
            .unwrap()
            .expect("feasible triangle");
        for i in 0..3 {
            let v = a.row(i).dot(&p) + b[i];
            assert!(v < -1e-6, "row {i} not strictly satisfied: {v}");
        }
    }
}
