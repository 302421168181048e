// src/core/classifier/network.rs
//
// Fixed CNN architecture for the binary hemorrhage classifier. The layer
// layout and parameter names must not change: weight checkpoints are keyed
// against them. Dropout layers from training carry no parameters and are
// identity at inference, so they do not appear here.

use anyhow::{ensure, Result};
use ndarray::{Array1, Array2, Array3, Array4};
use rand::Rng;

const BN_EPS: f32 = 1e-5;

/// 3x3 convolution, stride 1, padding 1. Weight layout [out, in, 3, 3].
#[derive(Debug, Clone)]
pub struct Conv2d {
    pub weight: Array4<f32>,
    pub bias: Array1<f32>,
}

impl Conv2d {
    pub fn random(out_c: usize, in_c: usize, rng: &mut impl Rng) -> Self {
        let bound = 1.0 / ((in_c * 9) as f32).sqrt();
        Self {
            weight: Array4::from_shape_fn((out_c, in_c, 3, 3), |_| rng.random_range(-bound..bound)),
            bias: Array1::from_shape_fn(out_c, |_| rng.random_range(-bound..bound)),
        }
    }

    /// Forward pass via im2col + matmul; spatial size is preserved.
    pub fn forward(&self, input: &Array3<f32>) -> Array3<f32> {
        let (in_c, h, w) = input.dim();
        let out_c = self.weight.dim().0;

        let mut cols = Array2::<f32>::zeros((in_c * 9, h * w));
        for ic in 0..in_c {
            for ky in 0..3usize {
                let dy = ky as isize - 1;
                for kx in 0..3usize {
                    let dx = kx as isize - 1;
                    let row = ic * 9 + ky * 3 + kx;
                    for y in 0..h {
                        let sy = y as isize + dy;
                        if sy < 0 || sy >= h as isize {
                            continue;
                        }
                        for x in 0..w {
                            let sx = x as isize + dx;
                            if sx < 0 || sx >= w as isize {
                                continue;
                            }
                            cols[[row, y * w + x]] = input[[ic, sy as usize, sx as usize]];
                        }
                    }
                }
            }
        }

        let kernel = self
            .weight
            .view()
            .into_shape_with_order((out_c, in_c * 9))
            .expect("conv weight is contiguous");
        let mut out = kernel.dot(&cols);
        for (mut row, &b) in out.outer_iter_mut().zip(self.bias.iter()) {
            row += b;
        }
        out.into_shape_with_order((out_c, h, w))
            .expect("matmul output is contiguous")
    }
}

/// Inference-mode batch normalization using the trained running statistics.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    pub weight: Array1<f32>,
    pub bias: Array1<f32>,
    pub running_mean: Array1<f32>,
    pub running_var: Array1<f32>,
}

impl BatchNorm2d {
    /// Identity-initialized statistics, matching an untrained layer.
    pub fn identity(channels: usize) -> Self {
        Self {
            weight: Array1::ones(channels),
            bias: Array1::zeros(channels),
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
        }
    }

    pub fn forward_inplace(&self, x: &mut Array3<f32>) {
        for (c, mut plane) in x.outer_iter_mut().enumerate() {
            let scale = self.weight[c] / (self.running_var[c] + BN_EPS).sqrt();
            let shift = self.bias[c] - self.running_mean[c] * scale;
            plane.mapv_inplace(|v| v * scale + shift);
        }
    }
}

/// Fully-connected layer. Weight layout [out, in].
#[derive(Debug, Clone)]
pub struct Linear {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    pub fn random(out_f: usize, in_f: usize, rng: &mut impl Rng) -> Self {
        let bound = 1.0 / (in_f as f32).sqrt();
        Self {
            weight: Array2::from_shape_fn((out_f, in_f), |_| rng.random_range(-bound..bound)),
            bias: Array1::from_shape_fn(out_f, |_| rng.random_range(-bound..bound)),
        }
    }

    pub fn forward(&self, x: &Array1<f32>) -> Array1<f32> {
        self.weight.dot(x) + &self.bias
    }
}

fn relu_inplace3(x: &mut Array3<f32>) {
    x.mapv_inplace(|v| v.max(0.0));
}

fn relu_inplace1(x: &mut Array1<f32>) {
    x.mapv_inplace(|v| v.max(0.0));
}

/// 2x2 max-pool with stride 2; odd trailing rows/columns are dropped.
fn max_pool2(input: &Array3<f32>) -> Array3<f32> {
    let (c, h, w) = input.dim();
    let (oh, ow) = (h / 2, w / 2);
    Array3::from_shape_fn((c, oh, ow), |(ch, y, x)| {
        let (sy, sx) = (y * 2, x * 2);
        input[[ch, sy, sx]]
            .max(input[[ch, sy, sx + 1]])
            .max(input[[ch, sy + 1, sx]])
            .max(input[[ch, sy + 1, sx + 1]])
    })
}

/// One feature block: conv-bn-relu twice, then 2x2 max-pool.
#[derive(Debug, Clone)]
pub struct ConvBlock {
    pub conv1: Conv2d,
    pub bn1: BatchNorm2d,
    pub conv2: Conv2d,
    pub bn2: BatchNorm2d,
}

impl ConvBlock {
    pub fn random(in_c: usize, out_c: usize, rng: &mut impl Rng) -> Self {
        Self {
            conv1: Conv2d::random(out_c, in_c, rng),
            bn1: BatchNorm2d::identity(out_c),
            conv2: Conv2d::random(out_c, out_c, rng),
            bn2: BatchNorm2d::identity(out_c),
        }
    }

    pub fn forward(&self, input: &Array3<f32>) -> Array3<f32> {
        let mut x = self.conv1.forward(input);
        self.bn1.forward_inplace(&mut x);
        relu_inplace3(&mut x);
        let mut x = self.conv2.forward(&x);
        self.bn2.forward_inplace(&mut x);
        relu_inplace3(&mut x);
        max_pool2(&x)
    }
}

/// Channel widths of the four feature blocks, input first.
pub const BLOCK_WIDTHS: [(usize, usize); 4] = [(1, 32), (32, 64), (64, 128), (128, 256)];

/// The complete network: four conv blocks, global average pooling, and a
/// three-layer classifier head producing two logits.
#[derive(Debug, Clone)]
pub struct HemorrhageNet {
    pub blocks: Vec<ConvBlock>,
    pub fc1: Linear,
    pub fc2: Linear,
    pub fc3: Linear,
}

impl HemorrhageNet {
    /// Randomly initialized parameters; only ever used as the degraded
    /// fallback when no checkpoint could be loaded.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            blocks: BLOCK_WIDTHS
                .iter()
                .map(|&(i, o)| ConvBlock::random(i, o, rng))
                .collect(),
            fc1: Linear::random(128, 256, rng),
            fc2: Linear::random(64, 128, rng),
            fc3: Linear::random(2, 64, rng),
        }
    }

    /// Forward pass over a single-channel input, producing the two raw
    /// logits (no-hemorrhage, hemorrhage). Input spatial size is arbitrary
    /// as long as all four pools stay non-degenerate (>= 16x16).
    pub fn forward(&self, input: &Array3<f32>) -> Result<Array1<f32>> {
        let (c, h, w) = input.dim();
        ensure!(c == 1, "expected single-channel input, got {c} channels");
        ensure!(
            h >= 16 && w >= 16,
            "input {h}x{w} too small for four pooling stages"
        );

        let mut x = self.blocks[0].forward(input);
        for block in &self.blocks[1..] {
            x = block.forward(&x);
        }

        // Global average pool collapses each channel plane to one value.
        let channels = x.dim().0;
        let plane = (x.dim().1 * x.dim().2) as f32;
        let pooled = Array1::from_shape_fn(channels, |ch| {
            x.index_axis(ndarray::Axis(0), ch).sum() / plane
        });

        let mut h1 = self.fc1.forward(&pooled);
        relu_inplace1(&mut h1);
        let mut h2 = self.fc2.forward(&h1);
        relu_inplace1(&mut h2);
        Ok(self.fc3.forward(&h2))
    }
}

/// Numerically stable two-class softmax.
pub fn softmax2(logits: &Array1<f32>) -> Result<[f32; 2]> {
    ensure!(logits.len() == 2, "expected 2 logits, got {}", logits.len());
    let (a, b) = (logits[0], logits[1]);
    ensure!(a.is_finite() && b.is_finite(), "non-finite logits: [{a}, {b}]");
    let m = a.max(b);
    let (ea, eb) = ((a - m).exp(), (b - m).exp());
    let sum = ea + eb;
    Ok([ea / sum, eb / sum])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_conv_identity_kernel_preserves_input() {
        let mut weight = Array4::zeros((1, 1, 3, 3));
        weight[[0, 0, 1, 1]] = 1.0;
        let conv = Conv2d {
            weight,
            bias: Array1::zeros(1),
        };
        let input = Array3::from_shape_fn((1, 4, 4), |(_, y, x)| (y * 4 + x) as f32);
        let out = conv.forward(&input);
        assert_eq!(out, input);
    }

    #[test]
    fn test_conv_bias_and_padding() {
        // All-ones 3x3 kernel over a uniform image: interior pixels see 9
        // contributions, corners only 4 (zero padding).
        let conv = Conv2d {
            weight: Array4::ones((1, 1, 3, 3)),
            bias: Array1::from_elem(1, 0.5),
        };
        let input = Array3::ones((1, 5, 5));
        let out = conv.forward(&input);
        assert!((out[[0, 2, 2]] - 9.5).abs() < 1e-6);
        assert!((out[[0, 0, 0]] - 4.5).abs() < 1e-6);
    }

    #[test]
    fn test_max_pool_halves_and_takes_max() {
        let input = Array3::from_shape_vec(
            (1, 2, 4),
            vec![1.0, 5.0, 2.0, 0.0, 3.0, 4.0, 1.0, 7.0],
        )
        .unwrap();
        let out = max_pool2(&input);
        assert_eq!(out.dim(), (1, 1, 2));
        assert_eq!(out[[0, 0, 0]], 5.0);
        assert_eq!(out[[0, 0, 1]], 7.0);
    }

    #[test]
    fn test_batchnorm_normalizes_with_running_stats() {
        let bn = BatchNorm2d {
            weight: array![2.0],
            bias: array![1.0],
            running_mean: array![3.0],
            running_var: array![4.0],
        };
        let mut x = Array3::from_elem((1, 1, 1), 5.0);
        bn.forward_inplace(&mut x);
        // (5 - 3) / 2 * 2 + 1 = 3 (eps shifts it marginally below).
        assert!((x[[0, 0, 0]] - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_forward_shapes_and_softmax_sum() {
        let mut rng = rand::rng();
        let net = HemorrhageNet::random(&mut rng);
        let input = Array3::from_shape_fn((1, 32, 32), |(_, y, x)| ((x + y) % 7) as f32 / 7.0);
        let logits = net.forward(&input).unwrap();
        assert_eq!(logits.len(), 2);
        let probs = softmax2(&logits).unwrap();
        assert!((probs[0] + probs[1] - 1.0).abs() < 1e-5);
        assert!(probs[0] >= 0.0 && probs[1] >= 0.0);
    }

    #[test]
    fn test_forward_rejects_undersized_input() {
        let mut rng = rand::rng();
        let net = HemorrhageNet::random(&mut rng);
        let input = Array3::ones((1, 8, 8));
        assert!(net.forward(&input).is_err());
    }

    #[test]
    fn test_softmax_rejects_non_finite() {
        assert!(softmax2(&array![f32::NAN, 0.0]).is_err());
        assert!(softmax2(&array![f32::INFINITY, 0.0]).is_err());
    }
}
