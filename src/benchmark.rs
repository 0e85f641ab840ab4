use std::fmt;
use std::time::{Duration, Instant};

use log::info;
use rayon::prelude::*;

use crate::mnist::{Mnist, MnistLabels};
use crate::network::{argmax, LayerType, NeuralNetwork};
use crate::tensor::Tensor;

/// Accuracy of one network over a labelled sample set.
#[derive(Debug, Clone)]
pub struct EvalReport {
    pub num_samples: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

impl EvalReport {
    pub fn success_rate(&self) -> f32 {
        if self.num_samples == 0 {
            return 0.0;
        }
        (1.0 - self.errors as f32 / self.num_samples as f32) * 100.0
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Errors: {} / {}    Success rate = {:.2}%    Time: {:.3}s",
            self.errors,
            self.num_samples,
            self.success_rate(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Predicted class of each of the first `num_samples` images, plus wall time.
///
/// Each rayon worker owns its scratch arena; the network is shared read-only.
fn classify(net: &NeuralNetwork, images: &Mnist, num_samples: usize) -> (Vec<usize>, Duration) {
    let start = Instant::now();
    let predictions = (0..num_samples)
        .into_par_iter()
        .map_init(
            || net.scratch(),
            |scratch, i| {
                let input = images.at(i);
                argmax(net.predict_into(&input, scratch))
            },
        )
        .collect();
    (predictions, start.elapsed())
}

fn report(predictions: &[usize], labels: &MnistLabels, elapsed: Duration) -> EvalReport {
    let errors = predictions
        .iter()
        .enumerate()
        .filter(|&(i, &p)| p != labels.at(i) as usize)
        .count();
    let report = EvalReport { num_samples: predictions.len(), errors, elapsed };
    info!("{}", report);
    report
}

/// Classify the first `limit` images in parallel and count mispredictions.
pub fn evaluate(net: &NeuralNetwork, images: &Mnist, labels: &MnistLabels, limit: usize) -> EvalReport {
    let num_samples = limit.min(images.len()).min(labels.len());
    let (predictions, elapsed) = classify(net, images, num_samples);
    report(&predictions, labels, elapsed)
}

/// Per-layer comparison of a float and a quantized network on one input.
#[derive(Debug, Clone)]
pub struct LayerMetrics {
    pub layer_idx: usize,
    pub layer_type: LayerType,
    pub float_time: Duration,
    pub quant_time: Duration,
    pub mse: f32,
}

/// Float vs quantized accuracy, agreement and per-layer error.
#[derive(Debug, Clone)]
pub struct CompareReport {
    pub layer_metrics: Vec<LayerMetrics>,
    pub float: EvalReport,
    pub quantized: EvalReport,
    pub agreement: f32,
}

pub fn tensor_mse(a: &Tensor, b: &Tensor) -> f32 {
    assert_eq!(a.shape(), b.shape(), "tensor_mse: shapes differ");
    if a.is_empty() {
        return 0.0;
    }
    let sum: f64 = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&x, &y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum();
    (sum / a.len() as f64) as f32
}

/// Run both networks over the same samples.
///
/// Per-layer timings and MSE are taken on the first sample; the two networks
/// must have the same layer chain.
pub fn compare(
    float_net: &NeuralNetwork,
    quant_net: &NeuralNetwork,
    images: &Mnist,
    labels: &MnistLabels,
    limit: usize,
) -> CompareReport {
    assert_eq!(float_net.layer_shapes(), quant_net.layer_shapes(), "compare: networks differ in topology");

    let mut layer_metrics = Vec::new();
    if !images.is_empty() {
        let first = images.at(0);
        let (float_outs, float_times) = float_net.predict_timed(&first);
        let (quant_outs, quant_times) = quant_net.predict_timed(&first);
        for (i, ((f_out, q_out), (f_t, q_t))) in float_outs
            .iter()
            .zip(&quant_outs)
            .zip(float_times.iter().zip(&quant_times))
            .enumerate()
        {
            layer_metrics.push(LayerMetrics {
                layer_idx: i,
                layer_type: f_t.0,
                float_time: f_t.1,
                quant_time: q_t.1,
                mse: tensor_mse(f_out, q_out),
            });
        }
    }

    // each network sees every sample once; agreement comes from the recorded predictions
    let num_samples = limit.min(images.len()).min(labels.len());
    let (float_pred, float_time) = classify(float_net, images, num_samples);
    let (quant_pred, quant_time) = classify(quant_net, images, num_samples);
    let float = report(&float_pred, labels, float_time);
    let quantized = report(&quant_pred, labels, quant_time);

    let agree = float_pred.iter().zip(&quant_pred).filter(|(a, b)| a == b).count();
    let agreement = if num_samples == 0 { 0.0 } else { agree as f32 / num_samples as f32 * 100.0 };

    CompareReport { layer_metrics, float, quantized, agreement }
}

impl fmt::Display for CompareReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Per-Layer Metrics (sample 0) ===")?;
        writeln!(
            f,
            "{:<6} {:<12} {:>10} {:>10} {:>12}",
            "Layer", "Type", "FP32 Time", "INT8 Time", "MSE"
        )?;
        for m in &self.layer_metrics {
            writeln!(
                f,
                "{:<6} {:<12} {:>8.3}ms {:>8.3}ms {:>12.6}",
                m.layer_idx,
                m.layer_type.to_string(),
                m.float_time.as_secs_f64() * 1000.0,
                m.quant_time.as_secs_f64() * 1000.0,
                m.mse
            )?;
        }
        writeln!(f, "\n=== Accuracy ({} samples) ===", self.float.num_samples)?;
        writeln!(f, "FP32: {}", self.float)?;
        writeln!(f, "INT8: {}", self.quantized)?;
        write!(
            f,
            "Drop: {:.2}%    Agreement: {:.2}%",
            self.float.success_rate() - self.quantized.success_rate(),
            self.agreement
        )
    }
}
