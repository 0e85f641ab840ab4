mod common;

use pretty_assertions::assert_eq;

use lenet_q::config::Precision;
use lenet_q::network::*;
use lenet_q::tensor::{Shape, Tensor};

use common::{random_tensor, tensor_from};

fn identity(n: usize) -> Tensor {
    let mut w = Tensor::new(n, n, 1, 1);
    for i in 0..n {
        w.set(i, i, 0, 0, 1.0);
    }
    w
}

#[test]
fn relu_zeros_negatives() {
    let input = tensor_from(Shape::chw(1, 1, 4), &[-1.0, 0.0, 0.5, -0.3]);
    let mut out = Tensor::zeros(input.shape());
    ReLuLayer::new().fwd(&input, &mut out);
    assert_eq!(out.as_slice(), &[0.0, 0.0, 0.5, 0.0]);
}

#[test]
fn softmax_of_zeros_is_uniform() {
    let mut out = [0.0f32; 10];
    softmax(&[0.0; 10], &mut out);
    for p in out {
        assert!((p - 0.1).abs() < 1e-6);
    }
}

#[test]
fn softmax_is_a_distribution() {
    let scores = random_tensor(Shape::chw(10, 1, 1), -30.0, 30.0, 3);
    let mut out = Tensor::zeros(scores.shape());
    SoftMaxLayer::new().fwd(&scores, &mut out);

    let sum: f32 = out.as_slice().iter().sum();
    assert!((sum - 1.0).abs() < 1e-5, "sum = {sum}");
    assert!(out.as_slice().iter().all(|&p| (0.0..=1.0).contains(&p)));
    assert_eq!(argmax(&out), argmax(&scores));
}

#[test]
fn softmax_ignores_constant_shift() {
    let a = [1.0f32, 2.0, 3.0, -4.0];
    let b: Vec<f32> = a.iter().map(|v| v + 1000.0).collect();
    let mut pa = [0.0f32; 4];
    let mut pb = [0.0f32; 4];
    softmax(&a, &mut pa);
    softmax(&b, &mut pb);
    for (x, y) in pa.iter().zip(&pb) {
        assert!((x - y).abs() < 1e-6);
    }
    assert!(pb.iter().all(|p| p.is_finite()));
}

#[test]
fn linear_identity_float_is_exact() {
    let input = tensor_from(Shape::chw(4, 1, 1), &[0.5, -1.0, 0.25, 0.75]);
    let mut out = Tensor::zeros(input.shape());
    linear(&input, &identity(4), &Tensor::new1(4), &mut out);
    assert_eq!(out.as_slice(), input.as_slice());
}

#[test]
fn linear_identity_quantized_within_one_step() {
    let input = tensor_from(Shape::chw(4, 1, 1), &[0.5, -1.0, 0.25, 0.75]);
    let mut out = Tensor::zeros(input.shape());
    linear_i8(&input, &identity(4), &Tensor::new1(4), &mut out);

    let sx = 1.0 / 127.0;
    for (x, y) in input.as_slice().iter().zip(out.as_slice()) {
        assert!((x - y).abs() <= sx, "{x} vs {y}");
    }
}

#[test]
fn linear_reads_kernel_rows_in_chw_order() {
    // a [2, 2, 1, 2] kernel against a 1x2x1x2 map: no explicit flatten
    let input = tensor_from(Shape::chw(2, 1, 2), &[1.0, 2.0, 3.0, 4.0]);
    let weights = tensor_from(Shape::new(2, 2, 1, 2), &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    let bias = tensor_from(Shape::new(2, 1, 1, 1), &[0.5, -0.5]);
    let mut out = Tensor::zeros(Shape::chw(2, 1, 1));
    linear(&input, &weights, &bias, &mut out);
    assert_eq!(out.as_slice(), &[1.5, 8.5]);
}

#[test]
fn linear_with_relu_clips_after_bias() {
    let weights = tensor_from(Shape::new(2, 2, 1, 1), &[1.0, 0.0, 0.0, -1.0]);
    let bias = Tensor::new1(2);
    let input = tensor_from(Shape::chw(2, 1, 1), &[1.0, 1.0]);

    let plain = LinearLayer::new(weights.clone(), bias.clone());
    let fused = LinearLayer::with_relu(weights.clone(), bias.clone());
    let fused_q = LinearLayerQ::with_relu(weights, bias);
    assert_eq!(plain.layer_type(), LayerType::Linear);
    assert_eq!(fused.layer_type(), LayerType::LinearReLu);
    assert_eq!(fused_q.precision(), Precision::Quantized);

    let mut out = Tensor::zeros(Shape::chw(2, 1, 1));
    plain.fwd(&input, &mut out);
    assert_eq!(out.as_slice(), &[1.0, -1.0]);
    fused.fwd(&input, &mut out);
    assert_eq!(out.as_slice(), &[1.0, 0.0]);
    fused_q.fwd(&input, &mut out);
    assert!(out.get(0, 1, 0, 0) == 0.0 && (out.get(0, 0, 0, 0) - 1.0).abs() <= 1.0 / 127.0);
}

#[test]
fn integer_dense_accumulate() {
    let mut weights = lenet_q::tensor::TensorI8::new(2, 3, 1, 1);
    weights.data.copy_from_slice(&[1, 2, 3, -1, -1, -1]);
    let mut acc = [0i32; 2];
    linear_i8_accumulate(&[10, -20, 5], &weights, &[100, 0], &mut acc);
    assert_eq!(acc, [100 + 10 - 40 + 15, -10 + 20 - 5]);
}

fn small_net() -> NeuralNetwork {
    let mut net = NeuralNetwork::new(Shape::chw(3, 1, 1));
    net.add(Box::new(LinearLayer::with_relu(
        random_tensor(Shape::new(5, 3, 1, 1), -1.0, 1.0, 1),
        random_tensor(Shape::new(5, 1, 1, 1), -0.1, 0.1, 2),
    )));
    net.add(Box::new(LinearLayer::new(
        random_tensor(Shape::new(4, 5, 1, 1), -1.0, 1.0, 3),
        Tensor::new1(4),
    )));
    net.add(Box::new(SoftMaxLayer::new()));
    net
}

#[test]
fn network_tracks_layer_shapes() {
    let net = small_net();
    assert_eq!(net.num_layers(), 3);
    assert_eq!(
        net.layer_shapes(),
        &[Shape::chw(5, 1, 1), Shape::chw(4, 1, 1), Shape::chw(4, 1, 1)]
    );
    assert_eq!(net.output_shape(), Shape::chw(4, 1, 1));
    assert_eq!(net.layer_weight_memory(), vec![(15 + 5) * 4, (20 + 4) * 4, 0]);
    assert_eq!(net.scratch().len(), 3);
}

#[test]
fn reusing_scratch_does_not_change_results() {
    let net = small_net();
    let a = tensor_from(Shape::chw(3, 1, 1), &[0.3, -0.7, 1.2]);
    let b = tensor_from(Shape::chw(3, 1, 1), &[-2.0, 0.1, 0.0]);

    let fresh_a = net.predict(&a);
    let fresh_b = net.predict(&b);

    let mut scratch = net.scratch();
    assert_eq!(net.predict_into(&a, &mut scratch), &fresh_a);
    assert_eq!(net.predict_into(&b, &mut scratch), &fresh_b);
    assert_eq!(net.predict_into(&a, &mut scratch), &fresh_a);
}

#[test]
fn intermediates_and_timings_cover_every_layer() {
    let net = small_net();
    let input = tensor_from(Shape::chw(3, 1, 1), &[1.0, 2.0, 3.0]);

    let outs = net.predict_with_intermediates(&input);
    assert_eq!(outs.len(), 3);
    assert!(outs[0].as_slice().iter().all(|&v| v >= 0.0));
    assert_eq!(outs[2], net.predict(&input));

    let (timed_outs, timings) = net.predict_timed(&input);
    assert_eq!(timed_outs, outs);
    let types: Vec<LayerType> = timings.iter().map(|t| t.0).collect();
    assert_eq!(types, vec![LayerType::LinearReLu, LayerType::Linear, LayerType::SoftMax]);
}

#[test]
#[should_panic(expected = "wrong shape")]
fn predict_rejects_wrong_input_shape() {
    let net = small_net();
    net.predict(&Tensor::new(1, 4, 1, 1));
}

#[test]
fn argmax_takes_first_of_ties() {
    let t = tensor_from(Shape::chw(4, 1, 1), &[0.1, 0.7, 0.7, 0.2]);
    assert_eq!(argmax(&t), 1);
}

#[test]
fn layer_type_display() {
    assert_eq!(LayerType::LinearReLu.to_string(), "Linear+ReLu");
    assert_eq!(LayerType::MaxPool2d.to_string(), "MaxPool2d");
}

#[test]
fn scratch_exposes_every_layer_output() {
    let net = small_net();
    let input = tensor_from(Shape::chw(3, 1, 1), &[0.5, 0.5, -1.0]);
    let mut scratch = net.scratch();
    assert_eq!(scratch.memory_bytes(), (5 + 4 + 4) * 4);

    let probs = net.predict_into(&input, &mut scratch).clone();
    let outs = net.predict_with_intermediates(&input);
    for (i, out) in outs.iter().enumerate() {
        assert_eq!(scratch.get(i), out);
    }
    assert_eq!(scratch.get(2), &probs);
}
