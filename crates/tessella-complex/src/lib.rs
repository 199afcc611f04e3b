//! Exploration of the linear-region complex of feedforward ReLU networks.
//!
//! A ReLU network partitions its input space into polyhedral cells, one
//! per activation pattern, and computes a single affine map on each. This
//! crate builds those cells explicitly and walks the adjacency graph
//! between them:
//! - [`Mlp`] holds the network and maps points to activation keys
//! - [`Polyhedron`] is one cell: halfspaces, local map, facets, vertices
//! - [`Complex`] accumulates discovered cells and their adjacency
//! - [`bfs`] / [`dfs`] explore the complex in parallel; [`hamming_astar`]
//!   steers toward a goal cell
//! - [`DualGraph`] strips the geometry down to keys and edges, and
//!   [`recover`] rebuilds the full complex from it
//!
//! Every admitted cell is certified by an interior point, found with the
//! pluggable [`FeasibilitySolver`] (a dense two-phase simplex by default).

pub mod complex;
pub mod discovery;
pub mod dual;
pub mod network;
pub mod polyhedron;
pub mod queue;
pub mod search;
pub mod solver;

pub use complex::Complex;
pub use discovery::NeighborFinder;
pub use dual::{recover, DualGraph};
pub use network::{AffineLayer, Mlp};
pub use polyhedron::Polyhedron;
pub use queue::{BlockingQueue, Order, Popped};
pub use search::{bfs, dfs, hamming_astar, SearchOutcome, Termination};
pub use solver::{FeasibilitySolver, SimplexSolver, Tightness};

pub use tessella_core::{Error, RegionKey, Result, SearchConfig};

#[cfg(test)]
mod tests;
