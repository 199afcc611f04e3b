use super::random_complex;
use crate::dual::{recover, DualGraph};
use crate::search::bfs;
use ndarray::{array, Array1};

#[test]
fn random_net_round_trips_through_the_dual_graph() {
    let mut complex = random_complex(&[2, 6], 41);
    let seed = array![0.4, -0.7];
    let start = complex.seed(seed.view()).unwrap();
    bfs(&mut complex, start, usize::MAX, 2).unwrap();
    let graph = DualGraph::from_complex(&complex);
    assert!(graph.num_nodes() > 1);

    let rebuilt = recover(
        complex.network().clone(),
        &graph,
        seed.view(),
        complex.config().clone(),
        complex.solver().clone(),
    )
    .unwrap();
    assert_eq!(rebuilt.len(), complex.len());
    assert_eq!(rebuilt.num_edges(), complex.num_edges());
    assert!(graph.same_cells_and_edges(&DualGraph::from_complex(&rebuilt)));
}

/// Exhaustive walks from different seeds describe one and the same
/// complex, up to admission order.
#[test]
fn two_seeds_yield_isomorphic_graphs() {
    let mut first = random_complex(&[4, 8], 23);
    let s = first.seed(Array1::from(vec![0.2; 4]).view()).unwrap();
    bfs(&mut first, s, usize::MAX, 4).unwrap();

    let mut second = random_complex(&[4, 8], 23);
    let s = second
        .seed(Array1::from(vec![-0.3, 0.1, 0.4, -0.2]).view())
        .unwrap();
    bfs(&mut second, s, usize::MAX, 4).unwrap();

    let g1 = DualGraph::from_complex(&first);
    let g2 = DualGraph::from_complex(&second);
    assert!(g1.same_cells_and_edges(&g2));
    // The first run's seed cell is a member of the second run's complex.
    assert!(second.contains_key(first.poly(0).key()));
}
