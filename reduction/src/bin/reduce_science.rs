//! Reduce a single science frame with master bias, dark and flat frames.
//!
//! Writes the cleaned image and its cosmic-ray mask to one FITS file. Settings come
//! from an optional JSON config; command-line flags override it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use reduction::{reduce_with_config, ReductionConfig, ReductionInputs};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bias, dark and flat correct a science frame and mask cosmic rays"
)]
struct Args {
    /// Raw science frame
    #[arg(long)]
    science: PathBuf,

    /// Master bias frame
    #[arg(long)]
    bias: PathBuf,

    /// Master flat frame
    #[arg(long)]
    flat: PathBuf,

    /// Master dark frame, current per second
    #[arg(long)]
    dark: PathBuf,

    /// Output file (default: reduced_science.fits)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON reduction config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip cosmic-ray detection; the mask is written all zero
    #[arg(long)]
    no_cosmic_rays: bool,

    /// L.A.Cosmic detection limit in sigma
    #[arg(long)]
    sigclip: Option<f64>,

    /// Maximum L.A.Cosmic iterations
    #[arg(long)]
    niter: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ReductionConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReductionConfig::default(),
    };
    if let Some(output) = args.output {
        config.output_path = output;
    }
    if args.no_cosmic_rays {
        config.remove_cosmic_rays = false;
    }
    if let Some(sigclip) = args.sigclip {
        config.cosmic_ray.sigclip = sigclip;
    }
    if let Some(niter) = args.niter {
        config.cosmic_ray.niter = niter;
    }

    let inputs = ReductionInputs::new(args.science, args.bias, args.flat, args.dark);
    let reduced = reduce_with_config(&inputs, &config)
        .with_context(|| format!("reducing {}", inputs.science.display()))?;

    let (height, width) = reduced.image.dim();
    println!(
        "Reduced {width}x{height} frame, {} cosmic-ray pixel(s) flagged, written to {}",
        reduced.flagged_count(),
        config.output_path.display()
    );
    Ok(())
}
