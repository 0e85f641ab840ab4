mod common;

use lenet_q::quantization::*;
use lenet_q::tensor::{Shape, Tensor};

use common::{random_tensor, tensor_from};

#[test]
fn symmetric_i8_roundtrip_within_half_step() {
    for seed in 0..8 {
        let t = random_tensor(Shape::chw(3, 7, 5), -4.0, 4.0, seed);
        let (quantized, params) = quantize_tensor_symmetric(&t);
        let restored = dequantize_tensor(&quantized, &params);
        for (i, (&orig, &back)) in t.as_slice().iter().zip(restored.as_slice()).enumerate() {
            assert!(
                (orig - back).abs() <= params.scale / 2.0 + 1e-6,
                "roundtrip error too large at {}: orig={}, restored={}, scale={}",
                i, orig, back, params.scale
            );
        }
    }
}

#[test]
fn max_magnitude_maps_to_full_range() {
    let t = tensor_from(Shape::chw(1, 1, 4), &[0.0, 1.1, -2.0, 0.5]);
    let (q, params) = quantize_tensor_symmetric(&t);
    assert!((params.scale - 2.0 / 127.0).abs() < 1e-7);
    assert_eq!(q.data, vec![0, 70, -127, 32]);
}

#[test]
fn all_zero_tensor_quantizes_to_zero() {
    let t = Tensor::new(1, 4, 3, 3);
    let (q, params) = quantize_tensor_symmetric(&t);
    assert_eq!(params.scale, MIN_SCALE);
    assert!(q.data.iter().all(|&v| v == 0));
}

#[test]
fn quantized_values_stay_in_range() {
    // values beyond the calibrated range saturate instead of wrapping
    let t = tensor_from(Shape::chw(1, 1, 3), &[10.0, -10.0, 0.0]);
    let q = quantize_tensor(&t, &QuantParams { scale: 0.01 });
    assert_eq!(q.data, vec![127, -128, 0]);
}

#[test]
fn quant_params_symmetric_zero_centered() {
    let params = QuantParams::symmetric(1.0);
    assert!((params.scale - 1.0 / 127.0).abs() < 1e-6);
    assert_eq!(QuantParams::symmetric(0.0).scale, MIN_SCALE);
}

#[test]
fn requantize_tracks_real_ratio() {
    for &ratio in &[0.75f32, 0.01, 1.0 / 127.0, 3.5] {
        let params = RequantParams::from_ratio(ratio);
        for acc in [-100_000, -1234, -7, 0, 5, 999, 65_536] {
            let expected = acc as f64 * ratio as f64;
            let got = requantize(acc, params) as f64;
            // multiplier rounding adds at most |acc| / 2^25 on top of the half-LSB
            let slack = 0.5 + acc.unsigned_abs() as f64 / (1u64 << 25) as f64 + 1e-9;
            assert!(
                (got - expected).abs() <= slack,
                "ratio {} acc {}: got {}, expected {}",
                ratio, acc, got, expected
            );
        }
    }
}

#[test]
fn requantize_passthrough_when_ratio_vanishes() {
    let params = RequantParams::from_ratio(1e-12);
    assert!(params.is_identity());
    assert_eq!(params.multiplier, 0);
    assert_eq!(requantize(4242, params), 4242);
}

#[test]
fn bias_quantization_uses_accumulator_scale() {
    let bias = tensor_from(Shape::new(3, 1, 1, 1), &[0.1, -0.2, 0.0]);
    let q = quantize_bias(&bias, 0.01, 0.1);
    assert_eq!(q, vec![100, -200, 0]);
}

#[test]
fn dequantize_scales_value() {
    assert_eq!(dequantize(-64, 0.5), -32.0);
    assert_eq!(dequantize(0, 123.0), 0.0);
}
