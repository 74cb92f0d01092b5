//! Segment one sweep and report what was found
//!
//! The sweep is either read from a JSON point batch (`--input`) or generated:
//! rolling ground in front of the sensor with a few upright objects on it.
//!
//! ```text
//! RUST_LOG=info segment_synthetic --objects 8 --output result.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use sweepseg_algorithms::{ClusterGrowth, Frame, FrameSummary, Plane, Segmented, Segmenter};
use sweepseg_core::{PointBatch, RawPoint, SegmentationConfig};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// segmentation configuration as JSON; a 16-beam preset is used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// point batch as JSON instead of a generated sweep
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// number of returns in the generated sweep
    #[arg(long, default_value_t = 28_800)]
    points: usize,

    /// number of upright objects in the generated sweep
    #[arg(long, default_value_t = 6)]
    objects: usize,

    /// random seed for the generated sweep
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// write per-point results and cluster growth to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    summary: FrameSummary,
    ground_plane: Plane,
    growth: &'a [ClusterGrowth],
    heights: &'a [f32],
    flags: Vec<u8>,
    cluster_ids: &'a [u32],
}

fn preset() -> SegmentationConfig {
    SegmentationConfig {
        mount_height: 1.73,
        max_theta: 1.6,
        theta_grid_size: 0.02,
        n_angular_grids: 160,
        min_dist: 1.0,
        dist_grid_size: 0.5,
        n_dist_grids: 120,
        dz_local: 0.15,
        dz_global: 0.35,
        max_slope: 0.1,
        min_grd_pts: 5,
        min_samples: 6,
        base_h_cut: 1.0,
        h_max_cut: 3.0,
        h_grid_size: 0.5,
    }
}

fn generate(config: &SegmentationConfig, n_points: usize, n_objects: usize, seed: u64) -> PointBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let ground_z = |x: f32, y: f32| -config.mount_height + 0.015 * y + 0.04 * (0.25 * x).sin();

    let per_object = if n_objects == 0 { 0 } else { n_points / 8 / n_objects };
    let n_ground = n_points - per_object * n_objects;
    let mut points = Vec::with_capacity(n_points);

    for _ in 0..n_ground {
        let theta: f32 = rng.gen_range(-1.2..1.2);
        let r: f32 = rng.gen_range(2.0..50.0);
        let (x, y) = (r * theta.sin(), r * theta.cos());
        if rng.gen_bool(0.01) {
            points.push(RawPoint::invalid(x, y, 0.0));
        } else {
            points.push(RawPoint::new(x, y, ground_z(x, y) + rng.gen_range(-0.02..0.02), 15.0));
        }
    }

    for _ in 0..n_objects {
        let theta: f32 = rng.gen_range(-1.0..1.0);
        let r: f32 = rng.gen_range(6.0..40.0);
        let (cx, cy) = (r * theta.sin(), r * theta.cos());
        let half_width: f32 = rng.gen_range(0.2..0.9);
        let height: f32 = rng.gen_range(0.8..2.8);
        for _ in 0..per_object {
            let x = cx + rng.gen_range(-half_width..half_width);
            let y = cy + rng.gen_range(-half_width..half_width);
            let h = rng.gen_range(0.2..height);
            points.push(RawPoint::new(x, y, ground_z(x, y) + h, 70.0));
        }
    }

    PointBatch::from_points(points)
}

fn load_config(path: Option<&Path>) -> Result<SegmentationConfig> {
    match path {
        Some(path) => SegmentationConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(preset()),
    }
}

fn load_batch(path: &Path) -> Result<PointBatch> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let batch = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing point batch {}", path.display()))?;
    Ok(batch)
}

fn write_report(path: &Path, frame: &Frame<Segmented>, config: &SegmentationConfig) -> Result<()> {
    let report = Report {
        summary: frame.summary(config),
        ground_plane: frame.ground_plane(),
        growth: frame.growth(),
        heights: frame.heights(),
        flags: frame.flags().iter().map(|f| f.bits()).collect(),
        cluster_ids: frame.cluster_ids(),
    };
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), &report)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let batch = match &args.input {
        Some(path) => load_batch(path)?,
        None => generate(&config, args.points, args.objects, args.seed),
    };
    info!("segmenting {} returns ({} valid)", batch.len(), batch.valid_count());

    let segmenter = Segmenter::new(config)?;
    let frame = segmenter.segment(&batch)?;

    let plane = frame.ground_plane();
    println!("ground plane: z = {:.4}x + {:.4}y + {:.3}", plane.a, plane.b, plane.c);
    println!("{}", frame.summary(segmenter.config()));
    for growth in frame.growth() {
        let size = frame.cluster_indices(growth.cluster_id).len();
        println!(
            "  cluster {:>3}: {:>5} points, {} seeds, grew {} layers",
            growth.cluster_id, size, growth.seeds, growth.layers_grown
        );
    }

    if let Some(path) = &args.output {
        write_report(path, &frame, segmenter.config())?;
        info!("wrote {}", path.display());
    }

    Ok(())
}
