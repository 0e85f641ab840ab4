use crate::tensor::Tensor;

use super::{conv_output_size, tap};

/// Direct FP32 convolution.
///
/// `input` is `1 x C_in x H_in x W_in`, `weights` is `C_out x C_in x K x K`,
/// `bias` holds `C_out` values. Each output element is
/// `bias[m] + sum(input[c][y*stride+ky-pad][x*stride+kx-pad] * weights[m][c][ky][kx])`
/// over taps that land inside the input. No activation is applied.
///
/// # Panics
///
/// If `output` is not `1 x C_out x H_out x W_out` for the given stride and pad.
pub fn conv2d(
    input: &Tensor,
    weights: &Tensor,
    bias: &Tensor,
    stride: usize,
    pad: usize,
    output: &mut Tensor,
) {
    let out_channels = weights.n;
    let in_channels = weights.c;
    let kernel_size = weights.h;
    assert_eq!(input.c, in_channels, "conv2d: input channels do not match kernel");
    assert_eq!(bias.len(), out_channels, "conv2d: bias length does not match kernel");

    let out_h = conv_output_size(input.h, kernel_size, stride, pad);
    let out_w = conv_output_size(input.w, weights.w, stride, pad);
    assert_eq!(
        (output.n, output.c, output.h, output.w),
        (1, out_channels, out_h, out_w),
        "conv2d: output buffer has the wrong shape"
    );

    let bias = bias.as_slice();
    for m in 0..out_channels {
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut acc = bias[m];
                for c in 0..in_channels {
                    for ky in 0..kernel_size {
                        let Some(iy) = tap(oy, ky, stride, pad, input.h) else { continue };
                        for kx in 0..weights.w {
                            let Some(ix) = tap(ox, kx, stride, pad, input.w) else { continue };
                            acc += input.get(0, c, iy, ix) * weights.get(m, c, ky, kx);
                        }
                    }
                }
                output.set(0, m, oy, ox, acc);
            }
        }
    }
}
