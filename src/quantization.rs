//! Per-tensor symmetric INT8 quantization with dynamic calibration.
//!
//! Every quantized layer calibrates its operands from the data it is handed on
//! that call: the scale is `max(|x|) / 127`, there is no zero point, and no
//! statistics survive between calls.

use crate::tensor::{Tensor, TensorI8};

pub const QMIN: i32 = -128;
pub const QMAX: i32 = 127;

/// Lower bound on any calibrated scale, so an all-zero tensor still yields a
/// usable divisor.
pub const MIN_SCALE: f32 = 1e-8;

/// Fixed right shift used by [`RequantParams::from_ratio`].
pub const REQUANT_SHIFT: u32 = 24;

/// Symmetric quantization parameters: `real_value = scale * quantized_value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
}

impl QuantParams {
    pub fn symmetric(max_abs: f32) -> Self {
        QuantParams {
            scale: (max_abs / QMAX as f32).max(MIN_SCALE),
        }
    }
}

/// Scan a tensor for its largest magnitude and derive its scale.
pub fn calibrate(tensor: &Tensor) -> QuantParams {
    QuantParams::symmetric(tensor.max_abs())
}

#[inline]
pub fn clamp_i8(v: i32) -> i8 {
    v.clamp(QMIN, QMAX) as i8
}

/// Round-half-away-from-zero of `value / scale`, saturated into `[-128, 127]`.
#[inline]
pub fn quantize(value: f32, scale: f32) -> i8 {
    // float-to-int `as` saturates and maps NaN to 0
    clamp_i8((value / scale).round() as i32)
}

#[inline]
pub fn dequantize(value: i8, scale: f32) -> f32 {
    value as f32 * scale
}

pub fn quantize_tensor(tensor: &Tensor, params: &QuantParams) -> TensorI8 {
    let mut out = TensorI8::new(tensor.n, tensor.c, tensor.h, tensor.w);
    for (q, &v) in out.data.iter_mut().zip(tensor.as_slice()) {
        *q = quantize(v, params.scale);
    }
    out
}

/// Calibrate and quantize in one pass over the caller's tensor.
pub fn quantize_tensor_symmetric(tensor: &Tensor) -> (TensorI8, QuantParams) {
    let params = calibrate(tensor);
    (quantize_tensor(tensor, &params), params)
}

pub fn dequantize_tensor(tensor: &TensorI8, params: &QuantParams) -> Tensor {
    let mut out = Tensor::new(tensor.n, tensor.c, tensor.h, tensor.w);
    for (v, &q) in out.as_mut_slice().iter_mut().zip(&tensor.data) {
        *v = dequantize(q, params.scale);
    }
    out
}

/// Quantize a bias vector into the accumulator domain of `input x weight`.
///
/// No saturation beyond the limits of `i32` itself.
pub fn quantize_bias(bias: &Tensor, input_scale: f32, weight_scale: f32) -> Vec<i32> {
    let acc_scale = input_scale * weight_scale;
    bias.as_slice()
        .iter()
        .map(|&b| (b / acc_scale).round() as i32)
        .collect()
}

/// Fixed-point approximation `multiplier / 2^shift` of a real rescale ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequantParams {
    pub multiplier: i32,
    pub shift: u32,
}

impl RequantParams {
    /// Pass the raw accumulator through unchanged.
    pub const IDENTITY: RequantParams = RequantParams { multiplier: 0, shift: 0 };

    /// Choose parameters for `ratio = (input_scale * weight_scale) / output_scale`.
    ///
    /// The shift is fixed at 24 bits. A multiplier that rounds to zero
    /// collapses to [`RequantParams::IDENTITY`].
    pub fn from_ratio(ratio: f32) -> Self {
        let m = (ratio as f64 * (1u64 << REQUANT_SHIFT) as f64).round() as i64;
        if m == 0 {
            return RequantParams::IDENTITY;
        }
        RequantParams {
            multiplier: m.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            shift: REQUANT_SHIFT,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.shift == 0
    }
}

/// Rescale a 32-bit accumulator by `multiplier / 2^shift`, rounding half away
/// from zero. The product is formed in 64 bits.
#[inline]
pub fn requantize(acc: i32, params: RequantParams) -> i32 {
    if params.is_identity() {
        return acc;
    }
    let t = acc as i64 * params.multiplier as i64;
    let half = 1i64 << (params.shift - 1);
    // round the magnitude so negative values are not biased toward -inf
    let scaled = if t >= 0 {
        (t + half) >> params.shift
    } else {
        -((-t + half) >> params.shift)
    };
    scaled.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;

    #[test]
    fn calibrate_all_zero_hits_floor() {
        let t = Tensor::new(1, 2, 3, 3);
        assert_eq!(calibrate(&t).scale, MIN_SCALE);
    }

    #[test]
    fn calibrate_uses_max_magnitude() {
        let t = Tensor::from_vec(Shape::chw(1, 1, 3), vec![0.5, -2.54, 1.0]).unwrap();
        assert!((calibrate(&t).scale - 0.02).abs() < 1e-7);
    }

    #[test]
    fn quantize_rounds_half_away_and_saturates() {
        assert_eq!(quantize(2.5, 1.0), 3);
        assert_eq!(quantize(-2.5, 1.0), -3);
        assert_eq!(quantize(1000.0, 1.0), 127);
        assert_eq!(quantize(-1000.0, 1.0), -128);
        assert_eq!(quantize(f32::NAN, 1.0), 0);
    }

    #[test]
    fn quantize_bias_divides_by_product_scale() {
        let b = Tensor::from_vec(Shape::new(2, 1, 1, 1), vec![0.5, -0.25]).unwrap();
        assert_eq!(quantize_bias(&b, 0.5, 0.01), vec![100, -50]);
    }

    #[test]
    fn requant_params_collapse_on_tiny_ratio() {
        assert_eq!(RequantParams::from_ratio(1e-9), RequantParams::IDENTITY);
        let p = RequantParams::from_ratio(0.5);
        assert_eq!(p.multiplier, 1 << 23);
        assert_eq!(p.shift, REQUANT_SHIFT);
    }

    #[test]
    fn requantize_rounds_symmetrically() {
        let half = RequantParams::from_ratio(0.5);
        assert_eq!(requantize(3, half), 2);
        assert_eq!(requantize(-3, half), -2);
        assert_eq!(requantize(1, half), 1);
        assert_eq!(requantize(-1, half), -1);

        let third = RequantParams::from_ratio(0.3);
        // -1 * 0.3 = -0.3 rounds to 0, not -1
        assert_eq!(requantize(-1, third), 0);
        assert_eq!(requantize(-10, third), -3);
    }

    #[test]
    fn requantize_identity_passes_through() {
        assert_eq!(requantize(-12345, RequantParams::IDENTITY), -12345);
    }

    #[test]
    fn requantize_wide_product_does_not_overflow() {
        let p = RequantParams::from_ratio(100.0);
        assert_eq!(requantize(i32::MAX, p), i32::MAX);
        assert_eq!(requantize(1_000_000, RequantParams::from_ratio(0.001)), 1000);
    }
}
