use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faceval::{
    accuracy, classifier, config, dataset, gallery, Embedder, Encoder, GalleryRecord,
};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "faceval")]
#[command(
    version,
    about = "Face embedding accuracy via thresholded k-nearest-neighbour voting"
)]
struct Cli {
    /// Config file (defaults to the built-in path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct KnnArgs {
    /// Neighbours that may vote
    #[arg(short)]
    k: Option<usize>,
    /// Maximum neighbour distance
    #[arg(short, long)]
    threshold: Option<f32>,
    /// Recognition model (ONNX)
    #[arg(short, long)]
    model: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a labeled image folder and add it to a gallery
    Enroll {
        /// Dataset root, one directory per integer label
        #[arg(short, long)]
        images: PathBuf,
        /// Gallery file to append to
        #[arg(short, long)]
        gallery: PathBuf,
        /// Recognition model (ONNX)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
    /// Predict the label of face crops
    Predict {
        #[arg(short, long)]
        gallery: PathBuf,
        #[command(flatten)]
        knn: KnnArgs,
        /// Face crops to classify
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Measure accuracy over a labeled image folder
    Evaluate {
        #[arg(short, long)]
        gallery: PathBuf,
        /// Dataset root, one directory per integer label
        #[arg(short, long)]
        images: PathBuf,
        #[command(flatten)]
        knn: KnnArgs,
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Log min/max gallery distance for every query
        #[arg(long)]
        print_dist: bool,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Enroll {
            images,
            gallery,
            model,
        } => {
            let model = model.unwrap_or_else(|| cfg.model.clone());
            enroll(&images, &gallery, &model)
        }
        Commands::Predict {
            gallery,
            knn,
            images,
        } => predict(&apply(cfg, &knn), &gallery, &images),
        Commands::Evaluate {
            gallery,
            images,
            knn,
            batch_size,
            print_dist,
            json,
        } => {
            let mut cfg = apply(cfg, &knn);
            if let Some(b) = batch_size {
                cfg.batch_size = b;
            }
            cfg.print_dist |= print_dist;
            evaluate(&cfg, &gallery, &images, json)
        }
        Commands::Config { write } => show_config(&cfg, cli.config.as_deref(), write),
    }
}

fn apply(mut cfg: config::Config, knn: &KnnArgs) -> config::Config {
    if let Some(k) = knn.k {
        cfg.k = k;
    }
    if let Some(t) = knn.threshold {
        cfg.threshold = t;
    }
    if let Some(m) = &knn.model {
        cfg.model = m.clone();
    }
    cfg
}

/// Embedder over image files: decode then encode.
fn image_embedder(encoder: &mut Encoder) -> impl FnMut(&PathBuf) -> Result<Vec<f32>> + '_ {
    move |path: &PathBuf| {
        let img = image::open(path).with_context(|| format!("opening {}", path.display()))?;
        encoder.embed(&img)
    }
}

fn enroll(images: &Path, gallery_path: &Path, model: &Path) -> Result<()> {
    info!("Enrolling {} into {}", images.display(), gallery_path.display());

    let samples = dataset::scan_labeled_dir(images)?;
    if samples.is_empty() {
        anyhow::bail!("No images found under {}", images.display());
    }
    info!("Found {} image(s)", samples.len());

    let mut encoder = Encoder::from_file(model).context("Failed to initialize encoder")?;
    let mut embed = image_embedder(&mut encoder);

    let mut records = Vec::with_capacity(samples.len());
    for sample in &samples {
        match embed(&sample.path) {
            Ok(embedding) => records.push(GalleryRecord::new(sample.label, embedding)),
            Err(e) => warn!("{}: {:#}", sample.path.display(), e),
        }
    }

    let added = records.len();
    let total = gallery::append_records(gallery_path, records)
        .context("Failed to save gallery records")?;

    info!("✓ Enrolled {} face(s), gallery now holds {}", added, total);
    Ok(())
}

fn load_gallery(path: &Path) -> Result<gallery::Gallery> {
    let gallery = gallery::load_gallery(path).context("Failed to load gallery")?;
    if gallery.is_empty() {
        warn!(
            "Gallery {} is empty, every prediction will be unknown",
            path.display()
        );
    } else {
        info!("Loaded gallery with {} face(s)", gallery.len());
    }
    Ok(gallery)
}

fn predict(cfg: &config::Config, gallery_path: &Path, images: &[PathBuf]) -> Result<()> {
    let gallery = load_gallery(gallery_path)?;
    let mut encoder = Encoder::from_file(&cfg.model).context("Failed to initialize encoder")?;
    let mut embed = image_embedder(&mut encoder);

    let votes = classifier::predict_votes(images, &gallery, &mut embed, &cfg.knn_params())?;

    for (path, vote) in images.iter().zip(votes) {
        if vote.is_unknown() {
            println!("{}\tunknown", path.display());
        } else {
            println!(
                "{}\t{}\t(votes: {}, nearest: {:.4})",
                path.display(),
                vote.label,
                vote.support,
                vote.nearest.unwrap_or(f32::NAN)
            );
        }
    }
    Ok(())
}

fn evaluate(cfg: &config::Config, gallery_path: &Path, images: &Path, json: bool) -> Result<()> {
    let gallery = load_gallery(gallery_path)?;
    let samples = dataset::scan_labeled_dir(images)?;
    let batches = dataset::sample_batches(&samples, cfg.batch_size)?;
    info!(
        "Evaluating {} image(s) in {} batch(es), k={}, threshold={}",
        samples.len(),
        batches.len(),
        cfg.k,
        cfg.threshold
    );

    let mut encoder = Encoder::from_file(&cfg.model).context("Failed to initialize encoder")?;
    let mut embed = image_embedder(&mut encoder);

    let report = accuracy::evaluate_report(batches, &gallery, &mut embed, &cfg.knn_params())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("accuracy: {:.4}", report.accuracy);
        println!(
            "pooled:   {:.4} ({}/{})",
            report.pooled_accuracy(),
            report.correct,
            report.total
        );
    }
    Ok(())
}

fn show_config(cfg: &config::Config, path: Option<&Path>, write: bool) -> Result<()> {
    print!("{}", toml::to_string_pretty(cfg)?);
    if write {
        config::save_config(cfg, path)?;
        let shown = path.unwrap_or(&config::CONFIG_PATH);
        info!("✓ Wrote {}", shown.display());
    }
    Ok(())
}
