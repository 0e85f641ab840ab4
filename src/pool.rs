//! 2x2, stride-2 pooling in FP32 and INT8.
//!
//! The reduction (max or average) is a type parameter, so a pooling layer is
//! specialized once at construction and the window scan carries no branch on it.

use log::trace;

use crate::conv::conv_output_size;
use crate::network::LayerType;
use crate::quantization::{calibrate, dequantize, quantize_tensor};
use crate::tensor::{Tensor, TensorI8};

pub const POOL_SIZE: usize = 2;
pub const POOL_STRIDE: usize = 2;

/// Reduction applied to each pooling window.
pub trait PoolReduce: Send + Sync + 'static {
    const LAYER_TYPE: LayerType;

    /// Reduce the in-bounds elements of one window (never empty).
    fn reduce(window: &[f32]) -> f32;

    /// Same reduction in the quantized domain; the result shares the input's scale.
    fn reduce_i8(window: &[i8]) -> i8;
}

/// Max pooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

/// Average pooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Average;

impl PoolReduce for Max {
    const LAYER_TYPE: LayerType = LayerType::MaxPool2d;

    fn reduce(window: &[f32]) -> f32 {
        window.iter().fold(f32::MIN, |acc, &v| if v > acc { v } else { acc })
    }

    fn reduce_i8(window: &[i8]) -> i8 {
        window.iter().copied().max().unwrap_or(i8::MIN)
    }
}

impl PoolReduce for Average {
    const LAYER_TYPE: LayerType = LayerType::AvgPool2d;

    fn reduce(window: &[f32]) -> f32 {
        window.iter().sum::<f32>() / window.len() as f32
    }

    fn reduce_i8(window: &[i8]) -> i8 {
        let sum: i32 = window.iter().map(|&v| v as i32).sum();
        let n = window.len() as i32;
        // a mean of INT8 values always fits back in INT8
        let mean = if sum >= 0 { (sum + n / 2) / n } else { -((-sum + n / 2) / n) };
        mean as i8
    }
}

/// Spatial output size of a 2x2, stride-2 pool without padding.
pub fn pool_output_size(input: usize) -> usize {
    conv_output_size(input, POOL_SIZE, POOL_STRIDE, 0)
}

/// Walk every window of every channel, handing the in-bounds elements to `f`
/// together with the flat output index.
fn for_each_window<T: Copy>(
    channels: usize,
    in_h: usize,
    in_w: usize,
    get: impl Fn(usize, usize, usize) -> T,
    mut f: impl FnMut(usize, &[T]),
) {
    let out_h = pool_output_size(in_h);
    let out_w = pool_output_size(in_w);
    let mut window = Vec::with_capacity(POOL_SIZE * POOL_SIZE);
    for c in 0..channels {
        for oy in 0..out_h {
            for ox in 0..out_w {
                window.clear();
                for ky in 0..POOL_SIZE {
                    let iy = oy * POOL_STRIDE + ky;
                    if iy >= in_h {
                        continue;
                    }
                    for kx in 0..POOL_SIZE {
                        let ix = ox * POOL_STRIDE + kx;
                        if ix >= in_w {
                            continue;
                        }
                        window.push(get(c, iy, ix));
                    }
                }
                f((c * out_h + oy) * out_w + ox, &window[..]);
            }
        }
    }
}

fn check_output(input_c: usize, input_h: usize, input_w: usize, output: &Tensor) {
    assert_eq!(
        (output.n, output.c, output.h, output.w),
        (1, input_c, pool_output_size(input_h), pool_output_size(input_w)),
        "pool2d: output buffer has the wrong shape"
    );
}

/// FP32 pooling of a `1 x C x H x W` activation map.
pub fn pool2d<R: PoolReduce>(input: &Tensor, output: &mut Tensor) {
    check_output(input.c, input.h, input.w, output);
    let out = output.as_mut_slice();
    for_each_window(
        input.c,
        input.h,
        input.w,
        |c, y, x| input.get(0, c, y, x),
        |idx, window| out[idx] = R::reduce(window),
    );
}

/// Integer core of quantized pooling: both tensors share one scale.
pub fn pool2d_i8_quantized<R: PoolReduce>(input: &TensorI8, output: &mut TensorI8) {
    assert_eq!(
        (output.c, output.h, output.w),
        (input.c, pool_output_size(input.h), pool_output_size(input.w)),
        "pool2d_i8: output buffer has the wrong shape"
    );
    let out = &mut output.data;
    for_each_window(
        input.c,
        input.h,
        input.w,
        |c, y, x| input.get(0, c, y, x),
        |idx, window| out[idx] = R::reduce_i8(window),
    );
}

/// Quantized pooling with float input and output.
///
/// The input is calibrated and quantized on every call; the reduction runs in
/// INT8 and the winning value is dequantized with the same scale. For max
/// pooling this picks the same element as the float path, since quantization
/// under a positive scale preserves order.
pub fn pool2d_i8<R: PoolReduce>(input: &Tensor, output: &mut Tensor) {
    check_output(input.c, input.h, input.w, output);
    let params = calibrate(input);
    trace!("{}(i8): scale={:e}", R::LAYER_TYPE, params.scale);

    let input_q = quantize_tensor(input, &params);
    let mut output_q = TensorI8::zeros(output.shape());
    pool2d_i8_quantized::<R>(&input_q, &mut output_q);

    for (out, &q) in output.as_mut_slice().iter_mut().zip(&output_q.data) {
        *out = dequantize(q, params.scale);
    }
}
