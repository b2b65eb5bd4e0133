// Pair batches: prepare a dataset and inspect what the samplers produce
//
// Usage:
//   cargo run -p pair-batches-demo -- --dataset numbers --root data/
//   cargo run -p pair-batches-demo -- --dataset omniglot --root data/ --evaluation
//   cargo run -p pair-batches-demo -- --dataset svhn --root data/svhn
//   cargo run -p pair-batches-demo --features mat -- --dataset svhn --root data/svhn
//
// Logging is controlled with RUST_LOG, e.g. RUST_LOG=pairwise_data=debug.

use std::path::PathBuf;
use std::str::FromStr;

use pairwise_data::{
    NumbersConfig, NumbersDataset, OmniglotDataset, PairBatch, SamplerConfig, Split, SvhnConfig,
    SvhnDataset,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

// Configuration

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Which {
    Svhn,
    Numbers,
    Omniglot,
}

struct Config {
    dataset: Which,
    root: PathBuf,
    batch_size: usize,
    batches: usize,
    seed: Option<u64>,
    parallel: bool,
    download: bool,
    crop: bool,
    evaluation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: Which::Numbers,
            root: PathBuf::from("data"),
            batch_size: 32,
            batches: 3,
            seed: None,
            parallel: false,
            download: true,
            crop: false,
            evaluation: false,
        }
    }
}

fn usage() {
    println!("Pair batch sampling demo");
    println!();
    println!("Options:");
    println!("  --dataset <name>    svhn | numbers | omniglot (default: numbers)");
    println!("  --root <path>       Dataset root directory (default: data)");
    println!("  --batch-size <n>    Pairs per batch, rounded down to even (default: 32)");
    println!("  --batches <n>       Number of batches or samples to draw (default: 3)");
    println!("  --seed <n>          Seed the samplers for reproducible draws");
    println!("  --parallel          Decode batch images on the rayon pool");
    println!("  --no-download       Never fetch anything; use what is under --root");
    println!("  --crop              SVHN: fetch the cropped 32x32 variant");
    println!("  --evaluation        Omniglot: use images_evaluation");
}

fn fail(message: String) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn value<T: FromStr>(args: &[String], i: usize, flag: &str) -> T {
    args.get(i)
        .and_then(|a| a.parse().ok())
        .unwrap_or_else(|| fail(format!("invalid or missing value for {flag}")))
}

fn parse_args() -> Config {
    let mut cfg = Config::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--dataset" => {
                i += 1;
                cfg.dataset = match args.get(i).map(String::as_str) {
                    Some("svhn") => Which::Svhn,
                    Some("numbers") => Which::Numbers,
                    Some("omniglot") => Which::Omniglot,
                    other => fail(format!("unknown dataset: {other:?}")),
                };
            }
            "--root" => {
                i += 1;
                cfg.root = value(&args, i, "--root");
            }
            "--batch-size" => {
                i += 1;
                cfg.batch_size = value(&args, i, "--batch-size");
            }
            "--batches" => {
                i += 1;
                cfg.batches = value(&args, i, "--batches");
            }
            "--seed" => {
                i += 1;
                cfg.seed = Some(value(&args, i, "--seed"));
            }
            "--parallel" => cfg.parallel = true,
            "--no-download" => cfg.download = false,
            "--crop" => cfg.crop = true,
            "--evaluation" => cfg.evaluation = true,
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            other => fail(format!("Unknown argument: {other}")),
        }
        i += 1;
    }
    cfg
}

fn sampler_config(cfg: &Config) -> SamplerConfig {
    let sampler = SamplerConfig::default().parallel_decode(cfg.parallel);
    match cfg.seed {
        Some(seed) => sampler.seed(seed),
        None => sampler,
    }
}

fn report(n: usize, batch: &PairBatch) {
    let same = batch.labels.iter().filter(|&&l| l == 1.0).count();
    let shape = batch
        .images_a
        .first()
        .map(|img| format!("{:?}", img.shape))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  batch {n}: {} pairs ({same} same, {} different), image shape {shape}",
        batch.len(),
        batch.len() - same
    );
}

// Datasets

fn run_numbers(cfg: &Config) -> pairwise_data::Result<()> {
    let config = NumbersConfig::new(&cfg.root).sampler(sampler_config(cfg));
    let mut ds = if cfg.download {
        NumbersDataset::prepare(config)?
    } else {
        NumbersDataset::open(config)?
    };
    println!("Numbers: {} samples", ds.dataset_size());
    for (digit, paths) in ds.class_index().iter() {
        println!("  digit {digit}: {} samples", paths.len());
    }
    for n in 0..cfg.batches {
        report(n, &ds.random_batch_sample(cfg.batch_size)?);
    }
    Ok(())
}

fn run_omniglot(cfg: &Config) -> pairwise_data::Result<()> {
    let mut ds = OmniglotDataset::open(&cfg.root, !cfg.evaluation, sampler_config(cfg))?;
    println!(
        "Omniglot: {} samples in {} characters",
        ds.dataset_size(),
        ds.source().num_classes()
    );
    for n in 0..cfg.batches {
        report(n, &ds.random_batch_sample(cfg.batch_size)?);
    }
    Ok(())
}

fn run_svhn(cfg: &Config) -> pairwise_data::Result<()> {
    let mut config = SvhnConfig::new(&cfg.root).crop(cfg.crop);
    if let Some(seed) = cfg.seed {
        config = config.seed(seed);
    }
    let mut ds = SvhnDataset::new(config);
    if cfg.download {
        ds.download()?;
    }

    let prepared = ds.prepare_data()?;
    info!(?prepared, "SVHN preparation finished");

    let params = ds.normalization_parameters()?;
    println!(
        "SVHN: mean {:.3}, std {:.3}, range [{}, {}]",
        params.average, params.deviation, params.min, params.max
    );
    for split in Split::ALL {
        println!("  {split}: {} images", ds.dataset_size(split)?);
    }
    for _ in 0..cfg.batches {
        let sample = ds.random_sample(Split::Train)?;
        let digits: Vec<i64> = sample.label.values().map(|b| b.label).collect();
        println!("  sample {:?}: digits {digits:?}", sample.image.shape);
    }
    Ok(())
}

// Main

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = parse_args();
    let result = match cfg.dataset {
        Which::Svhn => run_svhn(&cfg),
        Which::Numbers => run_numbers(&cfg),
        Which::Omniglot => run_omniglot(&cfg),
    };
    if let Err(e) = result {
        fail(format!("error: {e}"));
    }
}
