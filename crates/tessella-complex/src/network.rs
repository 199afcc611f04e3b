//! The feedforward network whose linear regions we explore.
//!
//! An [`Mlp`] is an ordered sequence of affine layers with ReLU activations
//! on all but the last layer. The network is immutable for the lifetime of
//! a Complex; everything the engine needs from it is the forward pass, the
//! per-unit pre-activation signs, and the layer parameters for affine-map
//! propagation.

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessella_core::{Error, RegionKey, Result, SearchConfig};

/// One affine layer `y = x W^T + b`, weight stored as (out, in) like a
/// torch `Linear`.
#[derive(Debug, Clone)]
pub struct AffineLayer {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl AffineLayer {
    pub fn new(weight: Array2<f64>, bias: Array1<f64>) -> Result<Self> {
        if weight.nrows() != bias.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![weight.nrows()],
                got: vec![bias.len()],
            });
        }
        Ok(Self { weight, bias })
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.weight.nrows()
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.weight.ncols()
    }
}

/// A fully-connected ReLU network.
///
/// ReLU applies after every layer except the last; a single-layer network
/// keeps its ReLU so the region structure is nontrivial. Units are numbered
/// globally in layer order, first layer first.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<AffineLayer>,
    /// relu[i] is true iff layer i is followed by a ReLU.
    relu: Vec<bool>,
    /// Total number of ReLU units across all layers.
    num_units: usize,
    /// Units whose incoming weight row is numerically zero: their sign is
    /// structurally constant over the whole domain. Precomputed once.
    dead_units: Vec<bool>,
}

impl Mlp {
    /// Build a network from explicit layers. `relu` flags must match the
    /// layer count; chained layer dimensions must agree.
    pub fn new(layers: Vec<AffineLayer>, relu: Vec<bool>, cfg: &SearchConfig) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::EmptyNetwork);
        }
        if relu.len() != layers.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![layers.len()],
                got: vec![relu.len()],
            });
        }
        for pair in layers.windows(2) {
            if pair[0].out_dim() != pair[1].in_dim() {
                return Err(Error::ShapeMismatch {
                    expected: vec![pair[0].out_dim()],
                    got: vec![pair[1].in_dim()],
                });
            }
        }
        let num_units = layers
            .iter()
            .zip(&relu)
            .filter(|(_, &r)| r)
            .map(|(l, _)| l.out_dim())
            .sum();
        let mut dead_units = Vec::with_capacity(num_units);
        for (layer, &r) in layers.iter().zip(&relu) {
            if !r {
                continue;
            }
            for row in layer.weight.rows() {
                let max_abs = row.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
                dead_units.push(max_abs < cfg.tol_dead_unit);
            }
        }
        Ok(Self {
            layers,
            relu,
            num_units,
            dead_units,
        })
    }

    /// Random network with the given widths, `widths[0]` being the input
    /// dimension. Kaiming-style uniform init, reproducible from `seed`.
    pub fn random(widths: &[usize], seed: u64, cfg: &SearchConfig) -> Result<Self> {
        if widths.len() < 2 {
            return Err(Error::EmptyNetwork);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(widths.len() - 1);
        for pair in widths.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = (1.0 / fan_in as f64).sqrt();
            let weight =
                Array2::from_shape_fn((fan_out, fan_in), |_| rng.gen_range(-bound..bound));
            let bias = Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound));
            layers.push(AffineLayer::new(weight, bias)?);
        }
        let n = layers.len();
        // ReLU on all but the last layer; a single affine layer keeps its
        // ReLU so the input space is actually partitioned.
        let relu: Vec<bool> = (0..n).map(|i| i + 1 < n || n == 1).collect();
        Self::new(layers, relu, cfg)
    }

    #[inline]
    pub fn layers(&self) -> &[AffineLayer] {
        &self.layers
    }

    #[inline]
    pub fn relu_flags(&self) -> &[bool] {
        &self.relu
    }

    /// Input dimension.
    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layers[0].in_dim()
    }

    /// Output dimension.
    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layers.last().expect("non-empty").out_dim()
    }

    /// Total number of ReLU units (bits in a region key).
    #[inline]
    pub fn num_units(&self) -> usize {
        self.num_units
    }

    /// Whether unit `index` is structurally dead (weight row numerically
    /// zero, sign constant across the whole domain).
    #[inline]
    pub fn is_dead_unit(&self, index: usize) -> bool {
        self.dead_units[index]
    }

    /// Forward evaluation of the full network.
    pub fn forward(&self, point: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_input(point)?;
        let mut x = point.to_owned();
        for (layer, &r) in self.layers.iter().zip(&self.relu) {
            x = layer.weight.dot(&x) + &layer.bias;
            if r {
                x.mapv_inplace(|v| v.max(0.0));
            }
        }
        Ok(x)
    }

    /// Evaluate the network and record the sign of every ReLU
    /// pre-activation as the corresponding key bit.
    ///
    /// Tie-break convention, part of the region-key contract: a
    /// pre-activation of exactly zero is inactive. Active means strictly
    /// positive. Points exactly on a decision boundary therefore fall into
    /// the cell on the inactive side; two adjacent cells may both claim
    /// such a point under tolerance-based containment tests.
    pub fn point_to_key(&self, point: ArrayView1<f64>) -> Result<RegionKey> {
        self.check_input(point)?;
        let mut bits = Vec::with_capacity(self.num_units);
        let mut x = point.to_owned();
        for (layer, &r) in self.layers.iter().zip(&self.relu) {
            x = layer.weight.dot(&x) + &layer.bias;
            if r {
                bits.extend(x.iter().map(|&v| v > 0.0));
                x.mapv_inplace(|v| v.max(0.0));
            }
        }
        Ok(RegionKey::from_bits(bits))
    }

    fn check_input(&self, point: ArrayView1<f64>) -> Result<()> {
        if point.len() != self.input_dim() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.input_dim()],
                got: vec![point.len()],
            });
        }
        Ok(())
    }
}
