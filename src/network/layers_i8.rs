use std::marker::PhantomData;

use log::{trace, warn};

use crate::config::Precision;
use crate::conv::{conv2d_i8, PaddingMode};
use crate::pool::{pool2d_i8, pool_output_size, PoolReduce};
use crate::quantization::{
    calibrate, clamp_i8, dequantize, quantize_bias, quantize_tensor, requantize, RequantParams,
};
use crate::tensor::{Shape, Tensor, TensorI8};
use super::layers::{conv_output_shape, relu_inplace};
use super::{Layer, LayerType};

/// Integer core of the quantized dense layer: one bias-seeded 32-bit
/// accumulator per output feature.
pub fn linear_i8_accumulate(input: &[i8], weights: &TensorI8, bias: &[i32], acc: &mut [i32]) {
    let in_features = weights.c * weights.h * weights.w;
    assert_eq!(input.len(), in_features, "linear_i8: input size does not match weights");
    assert_eq!(bias.len(), weights.n, "linear_i8: bias length does not match weights");
    assert_eq!(acc.len(), weights.n, "linear_i8: accumulator buffer has the wrong size");

    for (o, out) in acc.iter_mut().enumerate() {
        *out = weights
            .row(o)
            .iter()
            .zip(input)
            .fold(bias[o], |sum, (&w, &x)| sum.saturating_add(w as i32 * x as i32));
    }
}

/// Quantized dense layer with float input and output.
///
/// Same calibrate, quantize, accumulate, requantize, dequantize sequence as
/// [`conv2d_i8`], over the same CHW flattening as [`super::linear`]. The output
/// scale equals the input scale.
pub fn linear_i8(input: &Tensor, weights: &Tensor, bias: &Tensor, output: &mut Tensor) {
    assert_eq!(output.len(), weights.n, "linear_i8: output buffer has the wrong size");

    let input_params = calibrate(input);
    let weight_params = calibrate(weights);
    let (sx, sw) = (input_params.scale, weight_params.scale);
    let sy = sx;
    let requant = RequantParams::from_ratio((sx * sw) / sy);
    trace!("linear_i8: sx={sx:e} sw={sw:e} requant={requant:?}");
    if requant.is_identity() {
        warn!("linear_i8: rescale ratio {:e} rounds to zero, passing accumulators through", sw);
    }

    let input_q = quantize_tensor(input, &input_params);
    let weights_q = quantize_tensor(weights, &weight_params);
    let bias_q = quantize_bias(bias, sx, sw);

    let mut acc = vec![0i32; weights.n];
    linear_i8_accumulate(&input_q.data, &weights_q, &bias_q, &mut acc);

    for (out, &a) in output.as_mut_slice().iter_mut().zip(&acc) {
        *out = dequantize(clamp_i8(requantize(a, requant)), sy);
    }
}

/// INT8 quantized 2D convolution layer.
pub struct Conv2dLayerQ {
    stride: usize,
    padding: PaddingMode,
    weights: Tensor,
    bias: Tensor,
}

impl Conv2dLayerQ {
    /// Weights stay in FP32; they are calibrated and quantized on every call.
    pub fn new(weights: Tensor, bias: Tensor, stride: usize, padding: PaddingMode) -> Self {
        Conv2dLayerQ { stride, padding, weights, bias }
    }

    pub fn pad(&self) -> usize {
        self.padding.pad(self.weights.h)
    }
}

impl Layer for Conv2dLayerQ {
    fn layer_type(&self) -> LayerType {
        LayerType::Conv2d
    }

    fn precision(&self) -> Precision {
        Precision::Quantized
    }

    fn output_shape(&self, input: Shape) -> Shape {
        conv_output_shape(&self.weights, self.stride, self.pad(), input)
    }

    fn fwd(&self, input: &Tensor, output: &mut Tensor) {
        conv2d_i8(input, &self.weights, &self.bias, self.stride, self.pad(), output);
    }

    fn weights_ref(&self) -> Option<&Tensor> {
        Some(&self.weights)
    }

    fn bias_ref(&self) -> Option<&Tensor> {
        Some(&self.bias)
    }
}

/// INT8 quantized fully-connected layer, optionally followed by ReLU on the
/// dequantized output.
pub struct LinearLayerQ {
    relu: bool,
    weights: Tensor,
    bias: Tensor,
}

impl LinearLayerQ {
    pub fn new(weights: Tensor, bias: Tensor) -> Self {
        LinearLayerQ { relu: false, weights, bias }
    }

    pub fn with_relu(weights: Tensor, bias: Tensor) -> Self {
        LinearLayerQ { relu: true, weights, bias }
    }
}

impl Layer for LinearLayerQ {
    fn layer_type(&self) -> LayerType {
        if self.relu { LayerType::LinearReLu } else { LayerType::Linear }
    }

    fn precision(&self) -> Precision {
        Precision::Quantized
    }

    fn output_shape(&self, _input: Shape) -> Shape {
        Shape::chw(self.weights.n, 1, 1)
    }

    fn fwd(&self, input: &Tensor, output: &mut Tensor) {
        linear_i8(input, &self.weights, &self.bias, output);
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

/// INT8 quantized 2x2, stride-2 pooling layer with reduction `R`.
pub struct Pool2dLayerQ<R: PoolReduce> {
    _reduce: PhantomData<fn() -> R>,
}

impl<R: PoolReduce> Pool2dLayerQ<R> {
    pub fn new() -> Self {
        Pool2dLayerQ { _reduce: PhantomData }
    }
}

impl<R: PoolReduce> Default for Pool2dLayerQ<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: PoolReduce> Layer for Pool2dLayerQ<R> {
    fn layer_type(&self) -> LayerType {
        R::LAYER_TYPE
    }

    fn precision(&self) -> Precision {
        Precision::Quantized
    }

    fn output_shape(&self, input: Shape) -> Shape {
        Shape::chw(input.c, pool_output_size(input.h), pool_output_size(input.w))
    }

    fn fwd(&self, input: &Tensor, output: &mut Tensor) {
        pool2d_i8::<R>(input, output);
    }
}
