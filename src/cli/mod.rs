// src/cli/mod.rs
//
// Command-line interface: single-file and batch analysis over a directory
// of CT slices.

mod args;
mod output;

pub use args::Args;
pub use output::{format_report, print_json};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use colorful::Colorful;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::core::{FormatHint, HemorrhageEngine};
use crate::detection::DetectionResult;

const IMAGE_EXTENSIONS: [&str; 8] = [
    "png", "jpg", "jpeg", "bmp", "tif", "tiff", "dcm", "dicom",
];

/// CLI entry point.
pub fn run() -> Result<()> {
    let args = Args::parse();

    let files = collect_image_files(&args.input)?;
    if files.is_empty() {
        println!("{}", "No image files found!".red());
        return Ok(());
    }

    let engine = HemorrhageEngine::new(args.engine_config());

    let results = if files.len() == 1 {
        vec![(files[0].clone(), analyze_file(&engine, &files[0]))]
    } else {
        println!("Found {} image file(s)\n", files.len());
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .expect("static template is valid"),
        );
        files
            .par_iter()
            .progress_with(bar)
            .map(|path| (path.clone(), analyze_file(&engine, path)))
            .collect()
    };

    let mut positives = 0usize;
    let mut failures = 0usize;
    for (path, outcome) in &results {
        match outcome {
            Ok(result) => {
                if result.prediction.is_positive() {
                    positives += 1;
                }
                if args.json {
                    print_json(path, result)?;
                } else {
                    println!("{}", format_report(path, result, args.verbose));
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {e:#}", path.display().to_string().red());
            }
        }
    }

    if results.len() > 1 && !args.json {
        println!(
            "{} analyzed, {} flagged, {} failed",
            results.len() - failures,
            positives,
            failures
        );
    }

    Ok(())
}

fn analyze_file(engine: &HemorrhageEngine, path: &Path) -> Result<DetectionResult> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let hint = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(FormatHint::from_filename)
        .unwrap_or(FormatHint::Unknown);
    Ok(engine.run_detection(&bytes, hint)?)
}

fn collect_image_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let matches_ext = |p: &Path| {
        p.extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    };

    if path.is_file() {
        if matches_ext(path) {
            files.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.path().is_file() && matches_ext(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
    }

    Ok(files)
}
