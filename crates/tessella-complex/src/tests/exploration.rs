use super::random_complex;
use crate::dual::DualGraph;
use crate::search::{bfs, dfs, Termination};
use crate::solver::SimplexSolver;
use ndarray::array;
use std::collections::BTreeSet;
use tessella_core::RegionKey;

#[test]
fn bfs_and_dfs_admit_the_same_cells() {
    let mut by_bfs = random_complex(&[2, 6], 7);
    let start = by_bfs.seed(array![0.1, 0.2].view()).unwrap();
    let out = bfs(&mut by_bfs, start, usize::MAX, 1).unwrap();
    assert_eq!(out.reason, Termination::Exhausted);
    assert!(out.admitted > 1, "six hyperplanes must cut the plane");

    let mut by_dfs = random_complex(&[2, 6], 7);
    let start = by_dfs.seed(array![0.1, 0.2].view()).unwrap();
    let out_dfs = dfs(&mut by_dfs, start, usize::MAX, 1, false).unwrap();
    assert_eq!(out_dfs.reason, Termination::Exhausted);

    let keys_bfs: BTreeSet<RegionKey> = by_bfs.keys().cloned().collect();
    let keys_dfs: BTreeSet<RegionKey> = by_dfs.keys().cloned().collect();
    assert_eq!(keys_bfs, keys_dfs);

    // Visit order differs but the adjacency must not.
    let g_bfs = DualGraph::from_complex(&by_bfs);
    let g_dfs = DualGraph::from_complex(&by_dfs);
    assert!(g_bfs.same_cells_and_edges(&g_dfs));
}

#[test]
fn parallel_workers_agree_with_one() {
    let mut serial = random_complex(&[2, 5], 13);
    let start = serial.seed(array![-0.3, 0.4].view()).unwrap();
    bfs(&mut serial, start, usize::MAX, 1).unwrap();

    let mut parallel = random_complex(&[2, 5], 13);
    let start = parallel.seed(array![-0.3, 0.4].view()).unwrap();
    bfs(&mut parallel, start, usize::MAX, 4).unwrap();

    let a: BTreeSet<RegionKey> = serial.keys().cloned().collect();
    let b: BTreeSet<RegionKey> = parallel.keys().cloned().collect();
    assert_eq!(a, b);
    assert_eq!(serial.num_edges(), parallel.num_edges());
}

#[test]
fn budget_stops_the_walk() {
    let mut complex = random_complex(&[2, 6], 7);
    let start = complex.seed(array![0.1, 0.2].view()).unwrap();
    let out = bfs(&mut complex, start, 3, 1).unwrap();
    assert_eq!(out.reason, Termination::BudgetReached);
    assert_eq!(out.admitted, 3);
    assert_eq!(complex.len(), 3);
}

#[test]
fn depth_limited_dfs_reports_pruning() {
    let mut complex = random_complex(&[6, 8, 10], 21);
    let seed = ndarray::Array1::zeros(6);
    let start = complex.seed(seed.view()).unwrap();
    let out = dfs(&mut complex, start, 2, 2, false).unwrap();
    assert_eq!(out.max_depth_reached, 2);
    assert!(out.admitted >= 2, "depth-2 walk must leave the seed cell");
    // Every admitted cell has a certified facet set once expanded.
    let cfg = complex.config().clone();
    for i in 0..complex.len() {
        let shis = complex
            .poly(i)
            .supporting_halfspaces(&SimplexSolver, &cfg)
            .unwrap();
        assert!(!shis.is_empty(), "cell {i} has no facets");
    }
}

#[test]
fn dfs_can_attach_volumes() {
    let mut complex = random_complex(&[2, 6], 7);
    let start = complex.seed(array![0.1, 0.2].view()).unwrap();
    let out = dfs(&mut complex, start, usize::MAX, 1, true).unwrap();
    let volumes = out.volumes.expect("requested volumes");
    assert_eq!(volumes.len(), complex.len());
    // A full arrangement of lines has unbounded outer cells.
    assert!(volumes.iter().any(Option::is_none));
}
