//! The dual graph: cells as nodes, shared facets as edges, with all
//! geometry stripped. A dual graph plus the network and one seed point is
//! enough to rebuild the full complex, which [`recover`] does and then
//! verifies against the graph it started from.

use crate::complex::Complex;
use crate::network::Mlp;
use crate::polyhedron::{HalfspaceSystem, Polyhedron};
use crate::solver::FeasibilitySolver;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tessella_core::{Error, RegionKey, Result, SearchConfig};
use tracing::{debug, warn};

/// Serializable adjacency structure of a complex. Node order follows the
/// complex's admission order; edges are stored once with `a < b`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DualGraph {
    nodes: Vec<RegionKey>,
    edges: Vec<(usize, usize)>,
}

impl DualGraph {
    pub fn from_complex(complex: &Complex) -> Self {
        let nodes: Vec<RegionKey> = complex.keys().cloned().collect();
        let mut edges = Vec::with_capacity(complex.num_edges());
        for a in 0..complex.len() {
            for &b in complex.neighbors(a) {
                if a < b {
                    edges.push((a, b));
                }
            }
        }
        Self { nodes, edges }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn nodes(&self) -> &[RegionKey] {
        &self.nodes
    }

    #[inline]
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Edges as unordered key pairs, for index-free comparison of graphs
    /// built by different explorations.
    pub fn edge_keys(&self) -> BTreeSet<(RegionKey, RegionKey)> {
        self.edges
            .iter()
            .map(|&(a, b)| {
                let (x, y) = (self.nodes[a].clone(), self.nodes[b].clone());
                if x <= y {
                    (x, y)
                } else {
                    (y, x)
                }
            })
            .collect()
    }

    /// Key set comparison ignoring admission order.
    pub fn same_cells_and_edges(&self, other: &DualGraph) -> bool {
        let mine: BTreeSet<_> = self.nodes.iter().cloned().collect();
        let theirs: BTreeSet<_> = other.nodes.iter().cloned().collect();
        mine == theirs && self.edge_keys() == other.edge_keys()
    }
}

/// Rebuild a full complex from a dual graph, the network it came from,
/// and one point inside any of its cells.
///
/// The walk replays the graph's edges breadth-first from the seeded cell.
/// Each step certifies the target key with an interior-point query
/// centered on the already-recovered side of the edge, escalating through
/// the radius sequence. The result is checked against the input graph;
/// any shortfall in nodes or edges is a [`Error::RecoveryMismatch`].
pub fn recover(
    network: Arc<Mlp>,
    graph: &DualGraph,
    seed_point: ArrayView1<f64>,
    cfg: SearchConfig,
    solver: Arc<dyn FeasibilitySolver>,
) -> Result<Complex> {
    let mut complex = Complex::new(network.clone(), cfg.clone(), solver.clone())?;
    let seed_key = network.point_to_key(seed_point)?;
    let seed_node = graph
        .nodes
        .iter()
        .position(|k| *k == seed_key)
        .ok_or_else(|| Error::InvalidConfig("seed point lies outside the graph's cells".into()))?;

    let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(a, b) in &graph.edges {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    // node index in the graph -> index in the recovered complex
    let mut recovered: HashMap<usize, usize> = HashMap::new();
    let seed_idx = complex.seed(seed_point)?;
    recovered.insert(seed_node, seed_idx);

    let mut frontier = VecDeque::from([seed_node]);
    while let Some(node) = frontier.pop_front() {
        let here = recovered[&node];
        let center = complex.poly(here).interior_point().to_owned();
        for &next in adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(&j) = recovered.get(&next) {
                complex.connect(here, j);
                continue;
            }
            match certify(&network, &graph.nodes[next], center.view(), &cfg, solver.as_ref())? {
                Some(poly) => {
                    let (j, fresh) = complex.register(poly);
                    complex.connect(here, j);
                    recovered.insert(next, j);
                    if fresh {
                        frontier.push_back(next);
                    }
                }
                None => {
                    warn!(node = next, "graph edge target found infeasible during recovery");
                }
            }
        }
    }

    let expected_edges = graph.num_edges();
    let got_edges = complex.num_edges();
    if complex.len() != graph.num_nodes() || got_edges != expected_edges {
        return Err(Error::RecoveryMismatch {
            expected_nodes: graph.num_nodes(),
            got_nodes: complex.len(),
            expected_edges,
            got_edges,
        });
    }
    for key in graph.nodes() {
        if !complex.contains_key(key) {
            return Err(Error::RecoveryMismatch {
                expected_nodes: graph.num_nodes(),
                got_nodes: complex.len(),
                expected_edges,
                got_edges,
            });
        }
    }
    debug!(
        nodes = complex.len(),
        edges = got_edges,
        "complex recovered from dual graph"
    );
    Ok(complex)
}

/// Find an interior witness for `key` and build its cell, or `None` when
/// no witness exists at any escalation radius.
fn certify(
    network: &Mlp,
    key: &RegionKey,
    center: ArrayView1<f64>,
    cfg: &SearchConfig,
    solver: &dyn FeasibilitySolver,
) -> Result<Option<Polyhedron>> {
    let system = HalfspaceSystem::for_key(network, key);
    let mut witness: Option<Array1<f64>> = None;
    for &radius in &cfg.radius_sequence {
        if let Some(point) =
            solver.interior_point(system.a.view(), system.b.view(), Some(center), radius, cfg)?
        {
            witness = Some(point);
            break;
        }
    }
    match witness {
        Some(point) => Polyhedron::from_key(network, key.clone(), point, cfg).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::AffineLayer;
    use crate::search::bfs;
    use crate::solver::SimplexSolver;
    use ndarray::array;

    fn quadrant_complex() -> Complex {
        let cfg = SearchConfig::default();
        let layer = AffineLayer::new(array![[1.0, 0.0], [0.0, 1.0]], array![0.0, 0.0]).unwrap();
        let net = Mlp::new(vec![layer], vec![true], &cfg).unwrap();
        Complex::new(Arc::new(net), cfg, Arc::new(SimplexSolver)).unwrap()
    }

    #[test]
    fn quadrant_dual_graph_is_a_four_cycle() {
        let mut complex = quadrant_complex();
        let start = complex.seed(array![1.0, 1.0].view()).unwrap();
        bfs(&mut complex, start, usize::MAX, 1).unwrap();
        let graph = DualGraph::from_complex(&complex);
        assert_eq!(graph.num_nodes(), 4);
        // Opposite quadrants meet only at the origin, not along a facet.
        assert_eq!(graph.num_edges(), 4);
    }

    #[test]
    fn recovery_round_trips() {
        let mut complex = quadrant_complex();
        let start = complex.seed(array![1.0, 1.0].view()).unwrap();
        bfs(&mut complex, start, usize::MAX, 1).unwrap();
        let graph = DualGraph::from_complex(&complex);

        let rebuilt = recover(
            complex.network().clone(),
            &graph,
            array![0.5, 2.0].view(),
            complex.config().clone(),
            complex.solver().clone(),
        )
        .unwrap();
        let regraph = DualGraph::from_complex(&rebuilt);
        assert!(graph.same_cells_and_edges(&regraph));
    }

    #[test]
    fn seed_outside_graph_is_rejected() {
        let mut complex = quadrant_complex();
        let start = complex.seed(array![1.0, 1.0].view()).unwrap();
        bfs(&mut complex, start, 2, 1).unwrap();
        let mut graph = DualGraph::from_complex(&complex);
        graph.nodes.truncate(1);
        graph.edges.clear();
        let err = recover(
            complex.network().clone(),
            &graph,
            array![-1.0, -1.0].view(),
            complex.config().clone(),
            complex.solver().clone(),
        );
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn serde_round_trip() {
        let mut complex = quadrant_complex();
        let start = complex.seed(array![1.0, 1.0].view()).unwrap();
        bfs(&mut complex, start, usize::MAX, 1).unwrap();
        let graph = DualGraph::from_complex(&complex);
        let json = serde_json::to_string(&graph).unwrap();
        let back: DualGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(graph, back);
    }
}
