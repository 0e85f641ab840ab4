//! LeNet inference with two numerically distinct execution paths.
//!
//! Every weighted and pooling layer exists in FP32 and in an INT8 fixed-point
//! form. The quantized layers calibrate per-tensor scales from the data on
//! each call, multiply-accumulate in 32-bit integers and requantize with an
//! integer multiply-and-shift before dequantizing back to FP32, so the two
//! paths are interchangeable layer by layer.
//!
//! # Example
//!
//! ```no_run
//! use lenet_q::config::ModelConfig;
//! use lenet_q::lenet::{lenet, LeNetWeights};
//! use lenet_q::mnist::Mnist;
//! use lenet_q::network::argmax;
//!
//! # fn main() -> lenet_q::Result<()> {
//! let config = ModelConfig::quantized();
//! let weights = LeNetWeights::load("data/lenet.raw", &config)?;
//! let net = lenet(&config, weights)?;
//!
//! let images = Mnist::new("data/t10k-images-idx3-ubyte")?;
//! let mut scratch = net.scratch();
//! let image = images.at(0);
//! let probs = net.predict_into(&image, &mut scratch);
//! println!("predicted {}", argmax(probs));
//! # Ok(())
//! # }
//! ```

/// Error type shared by the fallible loaders and model construction.
pub mod error;
/// FP32 and INT8 NCHW tensors.
pub mod tensor;
/// Quantization primitives: calibration, quantize, requantize, dequantize.
pub mod quantization;
/// Direct convolution (FP32 and INT8) and padding modes.
pub mod conv;
/// 2x2 stride-2 pooling with a compile-time reduction.
pub mod pool;
/// Layer trait, layer implementations and the sequential network.
pub mod network;
/// Build-time model options.
pub mod config;
/// LeNet topology, weights and builder.
pub mod lenet;
/// MNIST dataset loaders.
pub mod mnist;
/// Parallel accuracy evaluation and FP32/INT8 comparison.
pub mod benchmark;

pub use error::{LenetError, Result};
