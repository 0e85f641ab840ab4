use std::marker::PhantomData;

use crate::conv::{conv2d, conv_output_size, PaddingMode};
use crate::pool::{pool2d, pool_output_size, PoolReduce};
use crate::tensor::{Shape, Tensor};
use super::{Layer, LayerType};

/// Dense matrix-vector product: `output[o] = bias[o] + sum_i input[i] * weights[o][i]`.
///
/// `weights` is `N_out x ...`; each row is read flattened in CHW order, and so
/// is `input`, so a `[N_out, C, H, W]` kernel lines up with a `1 x C x H x W`
/// activation map without an explicit flatten.
///
/// # Panics
///
/// If the flattened sizes of `input`, `weights` rows, `bias` and `output` disagree.
pub fn linear(input: &Tensor, weights: &Tensor, bias: &Tensor, output: &mut Tensor) {
    let out_features = weights.n;
    let in_features = weights.c * weights.h * weights.w;
    assert_eq!(input.len(), in_features, "linear: input size does not match weights");
    assert_eq!(bias.len(), out_features, "linear: bias length does not match weights");
    assert_eq!(output.len(), out_features, "linear: output buffer has the wrong size");

    let x = input.as_slice();
    let bias = bias.as_slice();
    for (o, out) in output.as_mut_slice().iter_mut().enumerate() {
        let sum: f32 = weights.row(o).iter().zip(x).map(|(w, v)| w * v).sum();
        *out = bias[o] + sum;
    }
}

/// Elementwise `max(x, 0)`.
pub fn relu(input: &Tensor, output: &mut Tensor) {
    assert_eq!(input.len(), output.len(), "relu: output buffer has the wrong size");
    for (out, &v) in output.as_mut_slice().iter_mut().zip(input.as_slice()) {
        *out = v.max(0.0);
    }
}

pub(crate) fn relu_inplace(tensor: &mut Tensor) {
    for v in tensor.as_mut_slice() {
        *v = v.max(0.0);
    }
}

/// Numerically stable softmax over a score vector.
///
/// The maximum is subtracted before exponentiating; a zero denominator is
/// replaced by one.
pub fn softmax(input: &[f32], output: &mut [f32]) {
    assert_eq!(input.len(), output.len(), "softmax: output buffer has the wrong size");
    let max_val = input
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, |m, v| if v > m { v } else { m });

    let mut sum = 0.0f32;
    for (out, &v) in output.iter_mut().zip(input) {
        *out = (v - max_val).exp();
        sum += *out;
    }
    if sum == 0.0 {
        sum = 1.0;
    }
    for out in output.iter_mut() {
        *out /= sum;
    }
}

/// 2D convolution layer (FP32).
pub struct Conv2dLayer {
    stride: usize,
    padding: PaddingMode,
    weights: Tensor,
    bias: Tensor,
}

impl Conv2dLayer {
    /// `weights` is `C_out x C_in x K x K`, `bias` holds `C_out` values.
    pub fn new(weights: Tensor, bias: Tensor, stride: usize, padding: PaddingMode) -> Self {
        Conv2dLayer { stride, padding, weights, bias }
    }

    pub fn kernel_size(&self) -> usize {
        self.weights.h
    }

    pub fn pad(&self) -> usize {
        self.padding.pad(self.kernel_size())
    }
}

pub(crate) fn conv_output_shape(weights: &Tensor, stride: usize, pad: usize, input: Shape) -> Shape {
    Shape::chw(
        weights.n,
        conv_output_size(input.h, weights.h, stride, pad),
        conv_output_size(input.w, weights.w, stride, pad),
    )
}

impl Layer for Conv2dLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::Conv2d
    }

    fn output_shape(&self, input: Shape) -> Shape {
        conv_output_shape(&self.weights, self.stride, self.pad(), input)
    }

    fn fwd(&self, input: &Tensor, output: &mut Tensor) {
        conv2d(input, &self.weights, &self.bias, self.stride, self.pad(), output);
    }

    fn weights_ref(&self) -> Option<&Tensor> {
        Some(&self.weights)
    }

    fn bias_ref(&self) -> Option<&Tensor> {
        Some(&self.bias)
    }
}

/// Fully-connected layer (FP32), optionally followed by ReLU.
pub struct LinearLayer {
    relu: bool,
    weights: Tensor,
    bias: Tensor,
}

impl LinearLayer {
    pub fn new(weights: Tensor, bias: Tensor) -> Self {
        LinearLayer { relu: false, weights, bias }
    }

    pub fn with_relu(weights: Tensor, bias: Tensor) -> Self {
        LinearLayer { relu: true, weights, bias }
    }
}

impl Layer for LinearLayer {
    fn layer_type(&self) -> LayerType {
        if self.relu { LayerType::LinearReLu } else { LayerType::Linear }
    }

    fn output_shape(&self, _input: Shape) -> Shape {
        Shape::chw(self.weights.n, 1, 1)
    }

    fn fwd(&self, input: &Tensor, output: &mut Tensor) {
        linear(input, &self.weights, &self.bias, output);
        if self.relu {
            relu_inplace(output);
        }
    }

    fn weights_ref(&self) -> Option<&Tensor> {
        Some(&self.weights)
    }

    fn bias_ref(&self) -> Option<&Tensor> {
        Some(&self.bias)
    }
}

/// 2x2, stride-2 pooling layer (FP32) with reduction `R`.
pub struct Pool2dLayer<R: PoolReduce> {
    _reduce: PhantomData<fn() -> R>,
}

impl<R: PoolReduce> Pool2dLayer<R> {
    pub fn new() -> Self {
        Pool2dLayer { _reduce: PhantomData }
    }
}

impl<R: PoolReduce> Default for Pool2dLayer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: PoolReduce> Layer for Pool2dLayer<R> {
    fn layer_type(&self) -> LayerType {
        R::LAYER_TYPE
    }

    fn output_shape(&self, input: Shape) -> Shape {
        Shape::chw(input.c, pool_output_size(input.h), pool_output_size(input.w))
    }

    fn fwd(&self, input: &Tensor, output: &mut Tensor) {
        pool2d::<R>(input, output);
    }
}

/// ReLU activation layer.
#[derive(Default)]
pub struct ReLuLayer;

impl ReLuLayer {
    pub fn new() -> Self {
        ReLuLayer
    }
}

impl Layer for ReLuLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::ReLu
    }

    fn output_shape(&self, input: Shape) -> Shape {
        input
    }

    fn fwd(&self, input: &Tensor, output: &mut Tensor) {
        relu(input, output);
    }
}

/// Softmax over the flattened input. Always FP32.
#[derive(Default)]
pub struct SoftMaxLayer;

impl SoftMaxLayer {
    pub fn new() -> Self {
        SoftMaxLayer
    }
}

impl Layer for SoftMaxLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::SoftMax
    }

    fn output_shape(&self, input: Shape) -> Shape {
        input
    }

    fn fwd(&self, input: &Tensor, output: &mut Tensor) {
        softmax(input.as_slice(), output.as_mut_slice());
    }
}
