//! End-to-end tests over small networks whose region complexes are
//! cheap to exhaust.

mod astar;
mod exploration;
mod membership;
mod recovery;

use crate::complex::Complex;
use crate::network::Mlp;
use crate::solver::SimplexSolver;
use std::sync::Arc;
use tessella_core::SearchConfig;

/// A complex over a random single-hidden-layer net, ready to seed.
pub(crate) fn random_complex(widths: &[usize], seed: u64) -> Complex {
    let cfg = SearchConfig::default();
    let net = Mlp::random(widths, seed, &cfg).expect("valid widths");
    Complex::new(Arc::new(net), cfg, Arc::new(SimplexSolver)).expect("valid config")
}
