//! The region complex: discovered cells, their keys, and the adjacency
//! relation between them.
//!
//! Registration is keyed on the region key and happens at most once per
//! key, so concurrent searchers can race to discover the same cell and
//! only one copy is admitted. Adjacency is symmetric and stored as sorted
//! index sets, which keeps iteration order deterministic.

use crate::network::Mlp;
use crate::polyhedron::Polyhedron;
use crate::solver::FeasibilitySolver;
use ndarray::ArrayView1;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tessella_core::{RegionKey, Result, SearchConfig};
use tracing::debug;

/// The growing complex of linear-region cells of one network.
pub struct Complex {
    network: Arc<Mlp>,
    cfg: SearchConfig,
    solver: Arc<dyn FeasibilitySolver>,
    polys: Vec<Polyhedron>,
    index_of: HashMap<RegionKey, usize>,
    adjacency: Vec<BTreeSet<usize>>,
}

impl Complex {
    pub fn new(
        network: Arc<Mlp>,
        cfg: SearchConfig,
        solver: Arc<dyn FeasibilitySolver>,
    ) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            network,
            cfg,
            solver,
            polys: Vec::new(),
            index_of: HashMap::new(),
            adjacency: Vec::new(),
        })
    }

    #[inline]
    pub fn network(&self) -> &Arc<Mlp> {
        &self.network
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig {
        &self.cfg
    }

    #[inline]
    pub fn solver(&self) -> &Arc<dyn FeasibilitySolver> {
        &self.solver
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.polys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.polys.is_empty()
    }

    #[inline]
    pub fn poly(&self, index: usize) -> &Polyhedron {
        &self.polys[index]
    }

    #[inline]
    pub fn polys(&self) -> &[Polyhedron] {
        &self.polys
    }

    pub fn index_of(&self, key: &RegionKey) -> Option<usize> {
        self.index_of.get(key).copied()
    }

    pub fn neighbors(&self, index: usize) -> &BTreeSet<usize> {
        &self.adjacency[index]
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Admit a cell, returning its index and whether it was newly added.
    /// A cell whose key is already present is dropped and the existing
    /// index returned; the complex never holds two cells with one key.
    pub fn register(&mut self, poly: Polyhedron) -> (usize, bool) {
        if let Some(&idx) = self.index_of.get(poly.key()) {
            return (idx, false);
        }
        let idx = self.polys.len();
        self.index_of.insert(poly.key().clone(), idx);
        self.polys.push(poly);
        self.adjacency.push(BTreeSet::new());
        debug!(index = idx, total = self.polys.len(), "cell registered");
        (idx, true)
    }

    /// Record that two admitted cells share a facet.
    pub fn connect(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.adjacency[a].insert(b);
        self.adjacency[b].insert(a);
    }

    /// Build and admit the cell containing `point`, returning its index.
    pub fn seed(&mut self, point: ArrayView1<f64>) -> Result<usize> {
        let poly = Polyhedron::from_point(&self.network, point, &self.cfg)?;
        let (idx, fresh) = self.register(poly);
        if fresh {
            debug!(index = idx, "seed cell admitted");
        }
        Ok(idx)
    }

    /// The admitted cell containing `point`, if any. Resolution goes
    /// through the key first; the containment check guards against a
    /// point on a cell boundary whose key belongs to a different,
    /// not-yet-admitted cell.
    pub fn point_to_poly(&self, point: ArrayView1<f64>) -> Result<Option<usize>> {
        let key = self.network.point_to_key(point)?;
        if let Some(&idx) = self.index_of.get(&key) {
            if self.polys[idx].contains(point, &self.cfg) {
                return Ok(Some(idx));
            }
        }
        Ok(self
            .polys
            .iter()
            .position(|p| p.contains(point, &self.cfg)))
    }

    /// Whether the cell with this key has been admitted.
    pub fn contains_key(&self, key: &RegionKey) -> bool {
        self.index_of.contains_key(key)
    }

    /// All admitted keys, in admission order.
    pub fn keys(&self) -> impl Iterator<Item = &RegionKey> + '_ {
        self.polys.iter().map(Polyhedron::key)
    }
}
