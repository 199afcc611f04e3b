//! Search drivers over the cell-adjacency graph.
//!
//! [`bfs`] and [`dfs`] share one worker loop and differ only in frontier
//! discipline and limits. Workers certify neighbors outside the complex
//! lock (solver calls dominate the cost) and take the lock only for the
//! register/connect critical section, so a racing duplicate discovery
//! costs a wasted solve, never a duplicate cell.
//!
//! [`hamming_astar`] is a targeted variant: it expands toward a goal key
//! ordered by Hamming distance, discovering cells on demand, and returns
//! a path of complex indices.

use crate::complex::Complex;
use crate::discovery::NeighborFinder;
use crate::polyhedron::Polyhedron;
use crate::queue::{BlockingQueue, Order, Popped};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Mutex;
use tessella_core::{Error, Result};
use tracing::{debug, info};

/// Why an exploration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every reachable cell was admitted and expanded.
    Exhausted,
    /// The cell budget was hit; later discoveries were discarded.
    BudgetReached,
    /// The depth limit pruned at least one expansion.
    DepthReached,
}

/// Summary of one exploration run.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Total cells admitted, the seed included.
    pub admitted: usize,
    /// Deepest admitted cell, in edges from the seed.
    pub max_depth_reached: usize,
    pub reason: Termination,
    /// Per-cell volume estimates, indexed like the complex. `None` per
    /// cell for unbounded cells; `None` overall unless requested.
    pub volumes: Option<Vec<Option<f64>>>,
}

/// Breadth-first exploration from an admitted seed cell, stopping once
/// `max_polys` cells are admitted.
pub fn bfs(
    complex: &mut Complex,
    start: usize,
    max_polys: usize,
    nworkers: usize,
) -> Result<SearchOutcome> {
    explore(
        complex,
        start,
        Order::Fifo,
        Limits {
            max_polys,
            max_depth: usize::MAX,
            with_volumes: false,
        },
        nworkers,
    )
}

/// Depth-first exploration from an admitted seed cell. Cells at
/// `max_depth` edges from the seed are admitted but not expanded. With
/// `get_volumes`, a seeded Monte-Carlo volume is estimated for every
/// admitted cell after the walk.
pub fn dfs(
    complex: &mut Complex,
    start: usize,
    max_depth: usize,
    nworkers: usize,
    get_volumes: bool,
) -> Result<SearchOutcome> {
    explore(
        complex,
        start,
        Order::Lifo,
        Limits {
            max_polys: usize::MAX,
            max_depth,
            with_volumes: get_volumes,
        },
        nworkers,
    )
}

struct Limits {
    max_polys: usize,
    max_depth: usize,
    with_volumes: bool,
}

#[derive(Default)]
struct Stats {
    max_depth_reached: usize,
    budget_hit: bool,
    depth_pruned: bool,
}

fn explore(
    complex: &mut Complex,
    start: usize,
    order: Order,
    limits: Limits,
    nworkers: usize,
) -> Result<SearchOutcome> {
    if start >= complex.len() {
        return Err(Error::InvalidConfig(format!(
            "start index {start} out of range for {} cells",
            complex.len()
        )));
    }
    if limits.max_polys == 0 {
        return Err(Error::InvalidConfig("max_polys must be positive".into()));
    }
    let network = complex.network().clone();
    let solver = complex.solver().clone();
    let cfg = complex.config().clone();
    let nworkers = nworkers.max(1);

    let queue: BlockingQueue<(usize, usize)> = BlockingQueue::new();
    queue.push((start, 0));
    let shared = Mutex::new(&mut *complex);
    let stats = Mutex::new(Stats::default());
    let failure: Mutex<Option<Error>> = Mutex::new(None);

    std::thread::scope(|scope| {
        for _ in 0..nworkers {
            scope.spawn(|| {
                let finder = NeighborFinder::new(&network, solver.as_ref(), &cfg);
                loop {
                    match queue.pop(order, cfg.queue_wait_timeout) {
                        Popped::Finished => break,
                        Popped::TimedOut => {
                            if failure.lock().unwrap_or_else(|e| e.into_inner()).is_some() {
                                break;
                            }
                        }
                        Popped::Item((idx, depth)) => {
                            let outcome = expand_cell(
                                &shared, &queue, &stats, &finder, &limits, idx, depth,
                            );
                            if let Err(e) = outcome {
                                let mut slot =
                                    failure.lock().unwrap_or_else(|p| p.into_inner());
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                                queue.close();
                            }
                            queue.task_done();
                        }
                    }
                }
            });
        }
    });
    drop(shared);

    if let Some(e) = failure
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .take()
    {
        return Err(e);
    }

    let stats = stats.into_inner().unwrap_or_else(|p| p.into_inner());
    let reason = if stats.budget_hit {
        Termination::BudgetReached
    } else if stats.depth_pruned {
        Termination::DepthReached
    } else {
        Termination::Exhausted
    };
    let volumes = if limits.with_volumes {
        let cfg_ref = complex.config().clone();
        Some(
            complex
                .polys()
                .par_iter()
                .enumerate()
                .map(|(i, p)| p.volume(&cfg_ref, i as u64))
                .collect(),
        )
    } else {
        None
    };
    let outcome = SearchOutcome {
        admitted: complex.len(),
        max_depth_reached: stats.max_depth_reached,
        reason,
        volumes,
    };
    info!(
        admitted = outcome.admitted,
        max_depth = outcome.max_depth_reached,
        reason = ?outcome.reason,
        "exploration finished"
    );
    Ok(outcome)
}

/// Expand one popped cell: certify its facets, probe each flip, and admit
/// whatever exists on the other side. Solver work happens on a detached
/// clone of the cell; the complex lock covers only lookups and the
/// register/connect step.
fn expand_cell(
    shared: &Mutex<&mut Complex>,
    queue: &BlockingQueue<(usize, usize)>,
    stats: &Mutex<Stats>,
    finder: &NeighborFinder<'_>,
    limits: &Limits,
    idx: usize,
    depth: usize,
) -> Result<()> {
    let (snapshot, cfg) = {
        let guard = shared.lock().unwrap_or_else(|p| p.into_inner());
        (guard.poly(idx).clone(), guard.config().clone())
    };
    let shis = snapshot
        .supporting_halfspaces(finder.solver(), &cfg)?
        .clone();
    {
        let guard = shared.lock().unwrap_or_else(|p| p.into_inner());
        guard.poly(idx).cache_supporting_halfspaces(shis.clone());
    }
    debug!(cell = idx, depth, facets = shis.len(), "expanding cell");

    for unit in shis {
        let candidate = snapshot.key().flip(unit);
        let known = {
            let guard = shared.lock().unwrap_or_else(|p| p.into_inner());
            guard.index_of(&candidate)
        };
        if let Some(j) = known {
            let mut guard = shared.lock().unwrap_or_else(|p| p.into_inner());
            guard.connect(idx, j);
            continue;
        }
        let Some(neighbor) = finder.neighbor_across(&snapshot, unit)? else {
            continue;
        };
        admit(shared, queue, stats, limits, idx, depth, neighbor);
    }
    Ok(())
}

fn admit(
    shared: &Mutex<&mut Complex>,
    queue: &BlockingQueue<(usize, usize)>,
    stats: &Mutex<Stats>,
    limits: &Limits,
    from: usize,
    depth: usize,
    neighbor: Polyhedron,
) {
    let mut guard = shared.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(j) = guard.index_of(neighbor.key()) {
        // Another worker won the race; keep the edge, drop the copy.
        guard.connect(from, j);
        return;
    }
    if guard.len() >= limits.max_polys {
        let mut s = stats.lock().unwrap_or_else(|p| p.into_inner());
        if !s.budget_hit {
            s.budget_hit = true;
            queue.close();
        }
        return;
    }
    let (j, fresh) = guard.register(neighbor);
    guard.connect(from, j);
    let at_budget = guard.len() >= limits.max_polys;
    drop(guard);

    let mut s = stats.lock().unwrap_or_else(|p| p.into_inner());
    let next_depth = depth + 1;
    s.max_depth_reached = s.max_depth_reached.max(next_depth);
    if at_budget && !s.budget_hit {
        s.budget_hit = true;
        queue.close();
        return;
    }
    if fresh {
        if next_depth < limits.max_depth {
            drop(s);
            queue.push((j, next_depth));
        } else {
            s.depth_pruned = true;
        }
    }
}

/// Heap entry ordered so the smallest f-score pops first, ties broken by
/// lower remaining Hamming distance, then lower index for determinism.
#[derive(Debug)]
struct AstarEntry {
    f: f64,
    hamming: usize,
    g: usize,
    idx: usize,
}

impl PartialEq for AstarEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for AstarEntry {}

impl Ord for AstarEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // f-scores are finite by construction.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.hamming.cmp(&self.hamming))
            .then_with(|| other.idx.cmp(&self.idx))
    }
}
impl PartialOrd for AstarEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* from one admitted cell to another, guided by Hamming distance to
/// the goal key plus a small geometric bias toward the goal's witness.
///
/// Neighbors are discovered on demand and admitted into the complex as a
/// side effect. Returns the path as complex indices from start to end,
/// or `None` when the goal is unreachable. The per-step bias lies in
/// `(-1, 0)` scaled below one, so it orders candidates within a Hamming
/// level without breaking admissibility of the unit-cost heuristic.
pub fn hamming_astar(
    complex: &mut Complex,
    start: usize,
    end: usize,
    nworkers: usize,
) -> Result<Option<Vec<usize>>> {
    if start >= complex.len() || end >= complex.len() {
        return Err(Error::InvalidConfig(format!(
            "endpoints ({start}, {end}) out of range for {} cells",
            complex.len()
        )));
    }
    let network = complex.network().clone();
    let solver = complex.solver().clone();
    let cfg = complex.config().clone();
    let goal_key = complex.poly(end).key().clone();
    let goal_ip = complex.poly(end).interior_point().to_owned();

    let heuristic = |poly: &Polyhedron| -> f64 {
        let hd = poly.key().hamming(&goal_key) as f64;
        let diff = &poly.interior_point().to_owned() - &goal_ip;
        let bias = -1.0 / (1.0 + diff.dot(&diff).sqrt());
        hd + cfg.astar_bias_weight * bias
    };

    let pool = if nworkers > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(nworkers)
                .build()
                .map_err(|e| Error::Solver(e.to_string()))?,
        )
    } else {
        None
    };

    let mut open = BinaryHeap::new();
    let mut best_g: HashMap<usize, usize> = HashMap::new();
    let mut parent: HashMap<usize, usize> = HashMap::new();
    best_g.insert(start, 0);
    open.push(AstarEntry {
        f: heuristic(complex.poly(start)),
        hamming: complex.poly(start).key().hamming(&goal_key),
        g: 0,
        idx: start,
    });

    while let Some(entry) = open.pop() {
        if entry.idx == end {
            let mut path = vec![end];
            let mut cur = end;
            while cur != start {
                cur = parent[&cur];
                path.push(cur);
            }
            path.reverse();
            info!(steps = path.len() - 1, "goal-directed search reached the goal");
            return Ok(Some(path));
        }
        if best_g.get(&entry.idx).map_or(false, |&g| g < entry.g) {
            continue; // stale heap entry
        }

        let snapshot = complex.poly(entry.idx).clone();
        let shis = snapshot.supporting_halfspaces(solver.as_ref(), &cfg)?.clone();
        complex
            .poly(entry.idx)
            .cache_supporting_halfspaces(shis.clone());

        let mut successors: std::collections::BTreeSet<usize> = std::collections::BTreeSet::new();
        let mut unknown: Vec<usize> = Vec::new();
        for u in shis {
            match complex.index_of(&snapshot.key().flip(u)) {
                Some(j) => {
                    complex.connect(entry.idx, j);
                    successors.insert(j);
                }
                None => unknown.push(u),
            }
        }
        let finder = NeighborFinder::new(&network, solver.as_ref(), &cfg);
        let discovered: Vec<Option<Polyhedron>> = match &pool {
            Some(pool) => pool.install(|| {
                unknown
                    .par_iter()
                    .map(|&u| finder.neighbor_across(&snapshot, u))
                    .collect::<Result<Vec<_>>>()
            })?,
            None => unknown
                .iter()
                .map(|&u| finder.neighbor_across(&snapshot, u))
                .collect::<Result<Vec<_>>>()?,
        };
        for poly in discovered.into_iter().flatten() {
            let (j, _) = complex.register(poly);
            complex.connect(entry.idx, j);
            successors.insert(j);
        }

        for j in successors {
            let g = entry.g + 1;
            if best_g.get(&j).map_or(true, |&old| g < old) {
                best_g.insert(j, g);
                parent.insert(j, entry.idx);
                open.push(AstarEntry {
                    f: g as f64 + heuristic(complex.poly(j)),
                    hamming: complex.poly(j).key().hamming(&goal_key),
                    g,
                    idx: j,
                });
            }
        }
    }
    debug!("goal-directed search exhausted the reachable frontier");
    Ok(None)
}
