//! FP32 vs INT8 LeNet on the MNIST test set.
//!
//! Run with: `cargo run --release --example lenet_mnist -- --help`
//!
//! Expects a raw little-endian f32 weight file (see `LeNetWeights::load`) and
//! the MNIST test images and labels, optionally gzip-compressed.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use lenet_q::benchmark::compare;
use lenet_q::config::{ModelConfig, Precision};
use lenet_q::lenet::{lenet, LeNetWeights};
use lenet_q::mnist::{Mnist, MnistLabels};
use lenet_q::network::argmax;

#[derive(Parser, Debug)]
#[command(name = "lenet_mnist", about = "Compare FP32 and INT8 LeNet inference on MNIST")]
struct Args {
    /// Raw f32 weight file
    #[arg(long, default_value = "data/lenet.raw")]
    weights: String,

    /// MNIST test images (IDX3)
    #[arg(long, default_value = "data/t10k-images-idx3-ubyte")]
    images: String,

    /// MNIST test labels (IDX1)
    #[arg(long, default_value = "data/t10k-labels-idx1-ubyte.gz")]
    labels: String,

    /// JSON model config (padding and pooling); precision is overridden per run
    #[arg(long)]
    config: Option<String>,

    /// Number of test images to classify
    #[arg(long, default_value_t = 10_000)]
    limit: usize,

    /// Show the first image and both predictions before the benchmark
    #[arg(long, default_value_t = false)]
    show: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let base = match args.config.as_deref() {
        Some(path) => ModelConfig::from_file(path).with_context(|| format!("read config {path}"))?,
        None => ModelConfig::default(),
    };
    let float_config = base.with_precision(Precision::Float);
    let quant_config = base.with_precision(Precision::Quantized);

    let weights = LeNetWeights::load(&args.weights, &base)
        .with_context(|| format!("load weights {}", args.weights))?;
    let float_net = lenet(&float_config, weights.clone())?;
    let quant_net = lenet(&quant_config, weights)?;

    let images = Mnist::new(&args.images).with_context(|| format!("load images {}", args.images))?;
    let labels = MnistLabels::new(&args.labels).with_context(|| format!("load labels {}", args.labels))?;
    info!("{} images, {} labels", images.len(), labels.len());

    if args.show && !images.is_empty() {
        let input = images.at(0);
        println!("{}", images.render(0));
        let float_probs = float_net.predict(&input);
        let quant_probs = quant_net.predict(&input);
        println!("{:>5} {:>8} {:>8}", "class", "FP32", "INT8");
        for (c, (f, q)) in float_probs.as_slice().iter().zip(quant_probs.as_slice()).enumerate() {
            println!("{:>5} {:>7.2}% {:>7.2}%", c, f * 100.0, q * 100.0);
        }
        println!(
            "Predicted: FP32 {}  INT8 {}  Actual: {}\n",
            argmax(&float_probs),
            argmax(&quant_probs),
            labels.at(0)
        );
    }

    let report = compare(&float_net, &quant_net, &images, &labels, args.limit);
    println!("{report}");
    Ok(())
}
