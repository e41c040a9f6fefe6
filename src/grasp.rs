//! Grasp proposals from a patch scoring model.
//!
//! Square patches are sampled from the image and scored by a network that
//! outputs one score per grasp angle bin (18 bins of 10 degrees). The
//! `nbest` highest scoring (patch, angle) pairs become grasp rectangles.
//! The network itself lives behind [`GraspScorer`].
//!
//! Default grasp scale follows the model of Pinto and Gupta,
//! "Supersizing Self-supervision", for a 720x1280 image.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Number of angle bins scored per patch.
pub const ANGLE_BINS: usize = 18;
/// Largest batch handed to the scorer at once.
pub const MAX_BATCH_SIZE: usize = 128;

#[derive(Debug, Error)]
pub enum GraspError {
    #[error("nbest must be at least 1")]
    NoGraspRequested,
    #[error("asked for {nbest} grasps but only {available} scores exist")]
    NotEnoughScores { nbest: usize, available: usize },
    #[error("scorer returned {got} values for {patches} patches")]
    MalformedBatch { patches: usize, got: usize },
    #[error("scorer failed")]
    Scorer(#[from] anyhow::Error),
}

/// Command line of a grasp detection run.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct GraspArgs {
    /// The image to detect grasps on
    #[arg(long = "im", default_value = "./approach.jpg")]
    pub image: PathBuf,
    /// Grasp model to use
    #[arg(long, default_value = "./models/Grasp_model")]
    pub model: PathBuf,
    /// Number of patch samples. More is better but slower
    #[arg(long, default_value_t = 128)]
    pub nsamples: usize,
    /// Number of grasps to display
    #[arg(long, default_value_t = 10)]
    pub nbest: usize,
    /// Grasp size as a fraction of the longer image side
    #[arg(long, default_value_t = 0.234375)]
    pub gscale: f64,
    /// GPU device id, -1 for CPU
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub gpu: i32,
}

/// How samples are split into scorer batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub batches: usize,
}

impl BatchPlan {
    /// Batches of at most 128 samples.
    ///
    /// Above 128 samples every batch is full and one extra batch is added,
    /// so at least `nsamples` patches get scored.
    pub fn new(nsamples: usize) -> Self {
        if nsamples > MAX_BATCH_SIZE {
            BatchPlan {
                batch_size: MAX_BATCH_SIZE,
                batches: nsamples / MAX_BATCH_SIZE + 1,
            }
        } else {
            BatchPlan {
                batch_size: nsamples,
                batches: 1,
            }
        }
    }

    pub fn total(&self) -> usize {
        self.batch_size * self.batches
    }
}

/// Side length in pixels of a grasp patch.
pub fn patch_size(gscale: f64, width: u32, height: u32) -> u32 {
    (gscale * width.max(height) as f64) as u32
}

/// Scores for one batch of sampled patches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoredBatch {
    /// Patch centers as `(h, w)` pixel coordinates.
    pub centers: Vec<(f64, f64)>,
    /// `ANGLE_BINS` normalized scores per patch, patch major.
    pub scores: Vec<f32>,
}

/// A model that samples and scores grasp patches.
pub trait GraspScorer {
    fn score_batch(&mut self, patch_size: u32, batch_size: usize) -> anyhow::Result<ScoredBatch>;
}

/// A proposed grasp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraspRectangle {
    /// Row of the patch center.
    pub h: f64,
    /// Column of the patch center.
    pub w: f64,
    /// Angle bin, `0..ANGLE_BINS`.
    pub angle_bin: usize,
    pub size: u32,
    pub score: f32,
}

impl GraspRectangle {
    /// Grasp angle in radians relative to the image x axis.
    pub fn angle(&self) -> f64 {
        self.angle_bin as f64 * (PI / ANGLE_BINS as f64) - PI / 2.0
    }

    /// Corners as `(x, y)` in image coordinates.
    ///
    /// The first and third edges are the gripper plates.
    pub fn corners(&self) -> [(f64, f64); 4] {
        let length = self.size as f64 / 2.5;
        let width = self.size as f64 / 5.0;
        let (sin, cos) = self.angle().sin_cos();
        [
            (-length, -width),
            (length, -width),
            (length, width),
            (-length, width),
        ]
        .map(|(x, y)| (cos * x - sin * y + self.w, sin * x + cos * y + self.h))
    }
}

/// Sample, score and keep the `nbest` best grasps.
///
/// Ties with the `nbest`-th score are all kept, so more than `nbest`
/// rectangles may come back.
pub fn detect<S: GraspScorer>(
    scorer: &mut S,
    args: &GraspArgs,
    width: u32,
    height: u32,
) -> Result<Vec<GraspRectangle>, GraspError> {
    if args.nbest == 0 {
        return Err(GraspError::NoGraspRequested);
    }
    let plan = BatchPlan::new(args.nsamples);
    let size = patch_size(args.gscale, width, height);
    info!(
        "Scoring {} batches of {} patches of {} px",
        plan.batches, plan.batch_size, size
    );

    let mut centers = Vec::with_capacity(plan.total());
    let mut scores = Vec::with_capacity(plan.total() * ANGLE_BINS);
    for _ in 0..plan.batches {
        let batch = scorer.score_batch(size, plan.batch_size)?;
        if batch.scores.len() != batch.centers.len() * ANGLE_BINS {
            return Err(GraspError::MalformedBatch {
                patches: batch.centers.len(),
                got: batch.scores.len(),
            });
        }
        centers.extend(batch.centers);
        scores.extend(batch.scores);
    }

    if args.nbest > scores.len() {
        return Err(GraspError::NotEnoughScores {
            nbest: args.nbest,
            available: scores.len(),
        });
    }
    let mut sorted = scores.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let threshold = sorted[sorted.len() - args.nbest];

    let grasps = scores
        .iter()
        .enumerate()
        .filter(|(_, score)| **score >= threshold)
        .map(|(i, score)| {
            let (h, w) = centers[i / ANGLE_BINS];
            GraspRectangle {
                h,
                w,
                angle_bin: i % ANGLE_BINS,
                size,
                score: *score,
            }
        })
        .collect::<Vec<_>>();
    info!("Kept {} grasps above {}", grasps.len(), threshold);
    Ok(grasps)
}
