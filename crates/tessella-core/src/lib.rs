//! Core types for tessella: exploring the piecewise-linear region complex
//! of feedforward ReLU networks.
//!
//! This crate provides the foundational abstractions shared by the search
//! engine: the region-key bit-vector that identifies a polyhedral cell, the
//! tolerance configuration read by every geometric query, and the error
//! taxonomy for the failures that must not be silently tolerated.

pub mod config;
pub mod key;

pub use config::SearchConfig;
pub use key::RegionKey;

/// Error types for tessella operations.
///
/// Infeasibility of a candidate region is deliberately *not* represented
/// here: a neighbor that does not exist is a normal search outcome and is
/// expressed as `Option::None` by the discovery layer. The variants below
/// all indicate that the geometric model was built or queried incorrectly.
#[derive(Debug)]
pub enum Error {
    /// A point or layer had the wrong dimensionality.
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// A constructed polyhedron's affine map disagrees with a direct
    /// evaluation of the network beyond tolerance. Fatal for that
    /// polyhedron: it must not be admitted into a Complex.
    MapMismatch {
        /// Index of the polyhedron's region in the Complex, if assigned.
        index: Option<usize>,
        /// Largest absolute disagreement observed.
        max_err: f64,
    },

    /// Dual-graph recovery produced a Complex whose node or edge counts
    /// differ from the source graph.
    RecoveryMismatch {
        expected_nodes: usize,
        got_nodes: usize,
        expected_edges: usize,
        got_edges: usize,
    },

    /// The network has no layers.
    EmptyNetwork,

    /// A configuration value failed validation.
    InvalidConfig(String),

    /// The LP/MILP backend failed in a way that is not plain infeasibility
    /// (iteration cap, numerically unusable basis, missing witness during
    /// recovery).
    Solver(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ShapeMismatch { expected, got } => {
                write!(f, "Shape mismatch: expected {:?}, got {:?}", expected, got)
            }
            Error::MapMismatch { index, max_err } => match index {
                Some(i) => write!(
                    f,
                    "Affine map of region {} disagrees with network evaluation (max err {:.3e})",
                    i, max_err
                ),
                None => write!(
                    f,
                    "Affine map disagrees with network evaluation (max err {:.3e})",
                    max_err
                ),
            },
            Error::RecoveryMismatch {
                expected_nodes,
                got_nodes,
                expected_edges,
                got_edges,
            } => write!(
                f,
                "Dual-graph recovery mismatch: {} nodes / {} edges recovered, \
                 source graph has {} nodes / {} edges",
                got_nodes, got_edges, expected_nodes, expected_edges
            ),
            Error::EmptyNetwork => write!(f, "Network has no layers"),
            Error::InvalidConfig(s) => write!(f, "Invalid configuration: {}", s),
            Error::Solver(s) => write!(f, "Solver failure: {}", s),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
