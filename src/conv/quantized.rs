use log::{trace, warn};

use crate::quantization::{
    calibrate, clamp_i8, dequantize, quantize_bias, quantize_tensor, requantize, RequantParams,
};
use crate::tensor::{Tensor, TensorI8};

use super::{conv_output_size, tap};

/// Integer core of the quantized convolution.
///
/// Writes one 32-bit accumulator per output element (`C_out x H_out x W_out`,
/// row-major), each seeded with its channel's quantized bias. Taps that fall
/// outside the input are skipped exactly as in [`super::conv2d`].
pub fn conv2d_i8_accumulate(
    input: &TensorI8,
    weights: &TensorI8,
    bias: &[i32],
    stride: usize,
    pad: usize,
    acc: &mut [i32],
) {
    let out_channels = weights.n;
    let in_channels = weights.c;
    let out_h = conv_output_size(input.h, weights.h, stride, pad);
    let out_w = conv_output_size(input.w, weights.w, stride, pad);
    assert_eq!(input.c, in_channels, "conv2d_i8: input channels do not match kernel");
    assert_eq!(bias.len(), out_channels, "conv2d_i8: bias length does not match kernel");
    assert_eq!(acc.len(), out_channels * out_h * out_w, "conv2d_i8: accumulator buffer has the wrong size");

    for m in 0..out_channels {
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut sum = bias[m];
                for c in 0..in_channels {
                    for ky in 0..weights.h {
                        let Some(iy) = tap(oy, ky, stride, pad, input.h) else { continue };
                        for kx in 0..weights.w {
                            let Some(ix) = tap(ox, kx, stride, pad, input.w) else { continue };
                            let x = input.get(0, c, iy, ix) as i32;
                            let w = weights.get(m, c, ky, kx) as i32;
                            sum = sum.saturating_add(x * w);
                        }
                    }
                }
                acc[(m * out_h + oy) * out_w + ox] = sum;
            }
        }
    }
}

/// Quantized convolution with float input and output.
///
/// Input and kernel are calibrated and quantized independently on every call.
/// The output scale is taken equal to the input scale, so accumulators are
/// rescaled by the weight scale alone, saturated to INT8 and dequantized.
///
/// # Panics
///
/// If `output` is not `1 x C_out x H_out x W_out` for the given stride and pad.
pub fn conv2d_i8(
    input: &Tensor,
    weights: &Tensor,
    bias: &Tensor,
    stride: usize,
    pad: usize,
    output: &mut Tensor,
) {
    let out_h = conv_output_size(input.h, weights.h, stride, pad);
    let out_w = conv_output_size(input.w, weights.w, stride, pad);
    assert_eq!(
        (output.n, output.c, output.h, output.w),
        (1, weights.n, out_h, out_w),
        "conv2d_i8: output buffer has the wrong shape"
    );

    let input_params = calibrate(input);
    let weight_params = calibrate(weights);
    let (sx, sw) = (input_params.scale, weight_params.scale);
    let sy = sx;
    let requant = RequantParams::from_ratio((sx * sw) / sy);
    trace!("conv2d_i8: sx={sx:e} sw={sw:e} requant={requant:?}");
    if requant.is_identity() {
        warn!("conv2d_i8: rescale ratio {:e} rounds to zero, passing accumulators through", sw);
    }

    let input_q = quantize_tensor(input, &input_params);
    let weights_q = quantize_tensor(weights, &weight_params);
    let bias_q = quantize_bias(bias, sx, sw);

    let mut acc = vec![0i32; output.len()];
    conv2d_i8_accumulate(&input_q, &weights_q, &bias_q, stride, pad, &mut acc);

    for (out, &a) in output.as_mut_slice().iter_mut().zip(&acc) {
        *out = dequantize(clamp_i8(requantize(a, requant)), sy);
    }
}
