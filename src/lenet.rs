//! The LeNet topology: Conv1 -> ReLU -> Pool1 -> Conv2 -> ReLU -> Pool2 ->
//! FC1 (ReLU) -> FC2 -> Softmax, for 28x28 grayscale digits.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::info;

use crate::config::{ModelConfig, PoolMode, Precision};
use crate::conv::{conv_output_size, PaddingMode};
use crate::error::{LenetError, Result};
use crate::network::*;
use crate::pool::{pool_output_size, Average, Max};
use crate::tensor::{Shape, Tensor};

pub const IMG_DEPTH: usize = 1;
pub const IMG_HEIGHT: usize = 28;
pub const IMG_WIDTH: usize = 28;
pub const INPUT_SHAPE: Shape = Shape::chw(IMG_DEPTH, IMG_HEIGHT, IMG_WIDTH);

pub const CONV1_NBOUTPUT: usize = 20;
pub const CONV2_NBOUTPUT: usize = 40;
pub const CONV_DIM: usize = 5;
pub const CONV_STRIDE: usize = 1;
pub const FC1_NBOUTPUT: usize = 400;
pub const NUM_CLASSES: usize = 10;

/// Kernel and bias of one weighted layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerWeights {
    pub kernel: Tensor,
    pub bias: Tensor,
}

impl LayerWeights {
    pub fn new(kernel: Tensor, bias: Tensor) -> Result<Self> {
        if bias.len() != kernel.n {
            return Err(LenetError::ShapeMismatch {
                what: "bias",
                expected: kernel.n,
                actual: bias.len(),
            });
        }
        Ok(LayerWeights { kernel, bias })
    }

    pub fn zeros(kernel_shape: Shape) -> Self {
        LayerWeights {
            kernel: Tensor::zeros(kernel_shape),
            bias: Tensor::new1(kernel_shape.n),
        }
    }

    fn check(&self, what: &str, kernel_shape: Shape) -> Result<()> {
        if self.kernel.shape() != kernel_shape || self.bias.len() != kernel_shape.n {
            return Err(LenetError::InvalidData(format!(
                "{what}: expected kernel {kernel_shape} with {} biases, got kernel {} with {} biases",
                kernel_shape.n,
                self.kernel.shape(),
                self.bias.len()
            )));
        }
        Ok(())
    }
}

/// Kernel shapes of the four weighted layers for one configuration.
///
/// The spatial size reaching FC1 depends on the convolution padding, so the
/// FC1 kernel shape (`[400, 40, H, W]`) is derived from the config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeNetShapes {
    pub conv1: Shape,
    pub conv2: Shape,
    pub fc1: Shape,
    pub fc2: Shape,
}

impl LeNetShapes {
    pub fn for_config(config: &ModelConfig) -> Result<Self> {
        let spatial = |what: &str, size: usize| {
            if size == 0 {
                Err(LenetError::InvalidData(format!("{what} output collapses to zero size")))
            } else {
                Ok(size)
            }
        };
        let pad1 = config.conv1_padding.pad(CONV_DIM);
        let pad2 = config.conv2_padding.pad(CONV_DIM);

        let conv1_h = spatial("conv1", conv_output_size(IMG_HEIGHT, CONV_DIM, CONV_STRIDE, pad1))?;
        let conv1_w = spatial("conv1", conv_output_size(IMG_WIDTH, CONV_DIM, CONV_STRIDE, pad1))?;
        let pool1_h = spatial("pool1", pool_output_size(conv1_h))?;
        let pool1_w = spatial("pool1", pool_output_size(conv1_w))?;
        let conv2_h = spatial("conv2", conv_output_size(pool1_h, CONV_DIM, CONV_STRIDE, pad2))?;
        let conv2_w = spatial("conv2", conv_output_size(pool1_w, CONV_DIM, CONV_STRIDE, pad2))?;
        let pool2_h = spatial("pool2", pool_output_size(conv2_h))?;
        let pool2_w = spatial("pool2", pool_output_size(conv2_w))?;

        // the raw weight file must stay addressable in bytes
        FC1_NBOUTPUT
            .checked_mul(CONV2_NBOUTPUT)
            .and_then(|n| n.checked_mul(pool2_h))
            .and_then(|n| n.checked_mul(pool2_w))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                LenetError::InvalidData(format!("fc1 kernel over a {pool2_h}x{pool2_w} map is too large"))
            })?;

        Ok(LeNetShapes {
            conv1: Shape::new(CONV1_NBOUTPUT, IMG_DEPTH, CONV_DIM, CONV_DIM),
            conv2: Shape::new(CONV2_NBOUTPUT, CONV1_NBOUTPUT, CONV_DIM, CONV_DIM),
            fc1: Shape::new(FC1_NBOUTPUT, CONV2_NBOUTPUT, pool2_h, pool2_w),
            fc2: Shape::new(NUM_CLASSES, FC1_NBOUTPUT, 1, 1),
        })
    }

    fn in_file_order(&self) -> [Shape; 4] {
        [self.conv1, self.conv2, self.fc1, self.fc2]
    }

    /// Number of f32 values in a raw weight file for these shapes.
    pub fn total_params(&self) -> usize {
        self.in_file_order().iter().map(|s| s.numel() + s.n).sum()
    }
}

/// All weights of a LeNet model.
#[derive(Clone, Debug, PartialEq)]
pub struct LeNetWeights {
    pub conv1: LayerWeights,
    pub conv2: LayerWeights,
    pub fc1: LayerWeights,
    pub fc2: LayerWeights,
}

impl LeNetWeights {
    pub fn zeros(shapes: &LeNetShapes) -> Self {
        LeNetWeights {
            conv1: LayerWeights::zeros(shapes.conv1),
            conv2: LayerWeights::zeros(shapes.conv2),
            fc1: LayerWeights::zeros(shapes.fc1),
            fc2: LayerWeights::zeros(shapes.fc2),
        }
    }

    pub fn check(&self, shapes: &LeNetShapes) -> Result<()> {
        self.conv1.check("conv1", shapes.conv1)?;
        self.conv2.check("conv2", shapes.conv2)?;
        self.fc1.check("fc1", shapes.fc1)?;
        self.fc2.check("fc2", shapes.fc2)
    }

    /// Load a raw little-endian f32 weight file.
    ///
    /// Layout: conv1 kernel, conv1 bias, conv2 kernel, conv2 bias, fc1 kernel,
    /// fc1 bias, fc2 kernel, fc2 bias; kernels row-major in their NCHW shapes.
    /// The file must contain exactly the parameters implied by `config`.
    pub fn load<P: AsRef<Path>>(path: P, config: &ModelConfig) -> Result<Self> {
        let path = path.as_ref();
        let shapes = LeNetShapes::for_config(config)?;
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        let weights = Self::from_le_bytes(&bytes, &shapes)?;
        info!("loaded {} parameters from {}", shapes.total_params(), path.display());
        Ok(weights)
    }

    pub fn from_le_bytes(bytes: &[u8], shapes: &LeNetShapes) -> Result<Self> {
        let expected = shapes.total_params() * 4;
        if bytes.len() != expected {
            return Err(LenetError::InvalidData(format!(
                "weight file holds {} bytes, expected {}",
                bytes.len(),
                expected
            )));
        }
        let mut values = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]));

        let mut take = |shape: Shape| -> Result<Tensor> {
            Tensor::from_vec(shape, values.by_ref().take(shape.numel()).collect())
        };
        let mut layer = |kernel_shape: Shape| -> Result<LayerWeights> {
            let kernel = take(kernel_shape)?;
            let bias = take(Shape::new(kernel_shape.n, 1, 1, 1))?;
            LayerWeights::new(kernel, bias)
        };

        Ok(LeNetWeights {
            conv1: layer(shapes.conv1)?,
            conv2: layer(shapes.conv2)?,
            fc1: layer(shapes.fc1)?,
            fc2: layer(shapes.fc2)?,
        })
    }
}

fn conv_layer(precision: Precision, weights: LayerWeights, padding: PaddingMode) -> Box<dyn Layer> {
    let LayerWeights { kernel, bias } = weights;
    match precision {
        Precision::Float => Box::new(Conv2dLayer::new(kernel, bias, CONV_STRIDE, padding)),
        Precision::Quantized => Box::new(Conv2dLayerQ::new(kernel, bias, CONV_STRIDE, padding)),
    }
}

fn linear_layer(precision: Precision, weights: LayerWeights, relu: bool) -> Box<dyn Layer> {
    let LayerWeights { kernel, bias } = weights;
    match (precision, relu) {
        (Precision::Float, false) => Box::new(LinearLayer::new(kernel, bias)),
        (Precision::Float, true) => Box::new(LinearLayer::with_relu(kernel, bias)),
        (Precision::Quantized, false) => Box::new(LinearLayerQ::new(kernel, bias)),
        (Precision::Quantized, true) => Box::new(LinearLayerQ::with_relu(kernel, bias)),
    }
}

fn pool_layer(precision: Precision, pooling: PoolMode) -> Box<dyn Layer> {
    match (precision, pooling) {
        (Precision::Float, PoolMode::Max) => Box::new(Pool2dLayer::<Max>::new()),
        (Precision::Float, PoolMode::Average) => Box::new(Pool2dLayer::<Average>::new()),
        (Precision::Quantized, PoolMode::Max) => Box::new(Pool2dLayerQ::<Max>::new()),
        (Precision::Quantized, PoolMode::Average) => Box::new(Pool2dLayerQ::<Average>::new()),
    }
}

/// Assemble the LeNet pipeline for `config` from `weights`.
///
/// Every weight tensor is checked against the shape chain the config implies.
/// The returned network is immutable and can be shared across threads.
pub fn lenet(config: &ModelConfig, weights: LeNetWeights) -> Result<NeuralNetwork> {
    let shapes = LeNetShapes::for_config(config)?;
    weights.check(&shapes)?;
    let LeNetWeights { conv1, conv2, fc1, fc2 } = weights;
    let precision = config.precision;

    let mut net = NeuralNetwork::new(INPUT_SHAPE);
    net.add(conv_layer(precision, conv1, config.conv1_padding));
    net.add(Box::new(ReLuLayer::new()));
    net.add(pool_layer(precision, config.pooling));
    net.add(conv_layer(precision, conv2, config.conv2_padding));
    net.add(Box::new(ReLuLayer::new()));
    net.add(pool_layer(precision, config.pooling));
    net.add(linear_layer(precision, fc1, true));
    net.add(linear_layer(precision, fc2, false));
    net.add(Box::new(SoftMaxLayer::new()));

    info!(
        "built {:?} LeNet ({:?} pooling): {} layers, shapes {:?}",
        config.precision,
        config.pooling,
        net.num_layers(),
        net.layer_shapes().iter().map(Shape::to_string).collect::<Vec<_>>()
    );
    Ok(net)
}
