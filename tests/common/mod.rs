#![allow(dead_code)]

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use lenet_q::config::ModelConfig;
use lenet_q::lenet::{LeNetShapes, LeNetWeights, INPUT_SHAPE};
use lenet_q::tensor::{Shape, Tensor};

/// Deterministic uniform weights scaled by fan-in, so activations stay in a
/// range where the INT8 path tracks the FP32 one.
pub fn random_weights(config: &ModelConfig, seed: u64) -> LeNetWeights {
    let shapes = LeNetShapes::for_config(config).unwrap();
    let mut weights = LeNetWeights::zeros(&shapes);
    let mut rng = SmallRng::seed_from_u64(seed);
    for layer in [&mut weights.conv1, &mut weights.conv2, &mut weights.fc1, &mut weights.fc2] {
        let fan_in = (layer.kernel.c * layer.kernel.h * layer.kernel.w) as f32;
        let bound = (1.0 / fan_in).sqrt();
        for v in layer.kernel.as_mut_slice() {
            *v = rng.gen_range(-bound..bound);
        }
        for v in layer.bias.as_mut_slice() {
            *v = rng.gen_range(-0.05..0.05);
        }
    }
    weights
}

pub fn random_tensor(shape: Shape, lo: f32, hi: f32, seed: u64) -> Tensor {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut t = Tensor::zeros(shape);
    for v in t.as_mut_slice() {
        *v = rng.gen_range(lo..hi);
    }
    t
}

/// A digit-like image: pixels in [0, 1], mostly dark.
pub fn random_image(seed: u64) -> Tensor {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut t = Tensor::zeros(INPUT_SHAPE);
    for v in t.as_mut_slice() {
        if rng.gen_bool(0.2) {
            *v = rng.gen_range(0.0..1.0);
        }
    }
    t
}

pub fn tensor_from(shape: Shape, data: &[f32]) -> Tensor {
    Tensor::from_vec(shape, data.to_vec()).unwrap()
}
