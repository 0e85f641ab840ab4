/// FP32 layer implementations (Conv2d, Linear, Pool2d, ReLu, SoftMax).
mod layers;
/// Dynamically calibrated INT8 layer implementations.
mod layers_i8;

pub use layers::*;
pub use layers_i8::*;

use std::fmt;
use std::time::{Duration, Instant};

use log::debug;

use crate::config::Precision;
use crate::tensor::{Shape, Tensor};

/// Identifies the type of a neural network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    Conv2d,
    Linear,
    LinearReLu,
    MaxPool2d,
    AvgPool2d,
    ReLu,
    SoftMax,
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerType::Conv2d => write!(f, "Conv2d"),
            LayerType::Linear => write!(f, "Linear"),
            LayerType::LinearReLu => write!(f, "Linear+ReLu"),
            LayerType::MaxPool2d => write!(f, "MaxPool2d"),
            LayerType::AvgPool2d => write!(f, "AvgPool2d"),
            LayerType::ReLu => write!(f, "ReLu"),
            LayerType::SoftMax => write!(f, "SoftMax"),
        }
    }
}

/// A stateless forward operator.
///
/// A layer owns its (read-only) weights and nothing else. `fwd` reads `input`
/// and overwrites every element of the caller's `output`, which must already
/// have the shape reported by [`Layer::output_shape`]. Layers are `Send +
/// Sync` so one network can serve concurrent inferences.
pub trait Layer: Send + Sync {
    fn layer_type(&self) -> LayerType;

    fn precision(&self) -> Precision {
        Precision::Float
    }

    fn output_shape(&self, input: Shape) -> Shape;

    fn fwd(&self, input: &Tensor, output: &mut Tensor);

    fn weights_ref(&self) -> Option<&Tensor> {
        None
    }

    fn bias_ref(&self) -> Option<&Tensor> {
        None
    }
}

/// Caller-owned scratch buffers for one forward pass: one output tensor per
/// layer. Reusing an `Activations` across calls never changes results, since
/// every layer overwrites its whole buffer.
#[derive(Clone, Debug)]
pub struct Activations {
    buffers: Vec<Tensor>,
}

impl Activations {
    pub fn new(shapes: &[Shape]) -> Self {
        Activations {
            buffers: shapes.iter().map(|&s| Tensor::zeros(s)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Output of layer `idx` from the most recent pass.
    pub fn get(&self, idx: usize) -> &Tensor {
        &self.buffers[idx]
    }

    pub fn memory_bytes(&self) -> usize {
        self.buffers.iter().map(|t| t.len() * 4).sum()
    }
}

/// A fixed chain of layers evaluated front to back.
pub struct NeuralNetwork {
    input_shape: Shape,
    layers: Vec<Box<dyn Layer>>,
    shapes: Vec<Shape>,
}

impl NeuralNetwork {
    pub fn new(input_shape: Shape) -> Self {
        NeuralNetwork {
            input_shape,
            layers: Vec::new(),
            shapes: Vec::new(),
        }
    }

    pub fn add(&mut self, layer: Box<dyn Layer>) {
        let shape = layer.output_shape(self.output_shape());
        self.shapes.push(shape);
        self.layers.push(layer);
    }

    pub fn input_shape(&self) -> Shape {
        self.input_shape
    }

    pub fn output_shape(&self) -> Shape {
        self.shapes.last().copied().unwrap_or(self.input_shape)
    }

    /// Output shape of every layer, in order.
    pub fn layer_shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_weight_memory(&self) -> Vec<usize> {
        self.layers
            .iter()
            .map(|l| {
                let w = l.weights_ref().map_or(0, Tensor::len);
                let b = l.bias_ref().map_or(0, Tensor::len);
                (w + b) * 4
            })
            .collect()
    }

    /// Allocate a scratch arena sized for this network.
    pub fn scratch(&self) -> Activations {
        Activations::new(&self.shapes)
    }

    /// Run one forward pass using only the caller's scratch buffers.
    ///
    /// # Panics
    ///
    /// If `input` does not have the network's input shape or `scratch` was
    /// not built for this network.
    pub fn predict_into<'a>(&self, input: &'a Tensor, scratch: &'a mut Activations) -> &'a Tensor {
        self.run(input, scratch, |_, _| {});
        scratch.buffers.last().unwrap_or(input)
    }

    fn run(
        &self,
        input: &Tensor,
        scratch: &mut Activations,
        mut on_layer: impl FnMut(usize, Duration),
    ) {
        assert_eq!(input.shape(), self.input_shape, "predict: input has the wrong shape");
        assert_eq!(scratch.buffers.len(), self.layers.len(), "predict: scratch built for another network");

        for (i, layer) in self.layers.iter().enumerate() {
            let (done, rest) = scratch.buffers.split_at_mut(i);
            let src = if i == 0 { input } else { &done[i - 1] };
            let dst = &mut rest[0];
            let start = Instant::now();
            layer.fwd(src, dst);
            on_layer(i, start.elapsed());
            debug!("layer {} {}: {} -> {}", i, layer.layer_type(), src.shape(), dst.shape());
        }
    }

    pub fn predict(&self, input: &Tensor) -> Tensor {
        let mut scratch = self.scratch();
        self.predict_into(input, &mut scratch).clone()
    }

    pub fn predict_with_intermediates(&self, input: &Tensor) -> Vec<Tensor> {
        let mut scratch = self.scratch();
        self.run(input, &mut scratch, |_, _| {});
        scratch.buffers
    }

    pub fn predict_timed(&self, input: &Tensor) -> (Vec<Tensor>, Vec<(LayerType, Duration)>) {
        let mut scratch = self.scratch();
        let mut timings = Vec::with_capacity(self.layers.len());
        self.run(input, &mut scratch, |i, elapsed| {
            timings.push((self.layers[i].layer_type(), elapsed));
        });
        (scratch.buffers, timings)
    }
}

/// Index of the largest element (first one on ties).
pub fn argmax(tensor: &Tensor) -> usize {
    let mut max_val = f32::MIN;
    let mut max_idx = 0;
    for (i, &v) in tensor.as_slice().iter().enumerate() {
        if v > max_val {
            max_val = v;
            max_idx = i;
        }
    }
    max_idx
}
