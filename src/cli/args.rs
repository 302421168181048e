//! CLI argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::{EngineConfig, DEFAULT_MODEL_PATH};

#[derive(Parser, Debug)]
#[command(name = "hemoscan")]
#[command(about = "Detect intracranial hemorrhage on head CT slices (raster or DICOM)")]
pub struct Args {
    /// Input image file or directory to scan
    pub input: PathBuf,

    /// NPZ weight checkpoint for the classifier
    #[arg(short, long, env = "HEMOSCAN_MODEL", default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// Downgrade confidence to low when the two class probabilities are
    /// within this margin of each other
    #[arg(long, value_name = "MARGIN")]
    pub close_call_margin: Option<f32>,

    /// Emit results as JSON, one object per input file
    #[arg(long)]
    pub json: bool,

    /// Show per-analyzer evidence details
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default().with_model_path(&self.model);
        config.close_call_downgrade = self.close_call_margin;
        config
    }
}
