// Copyright (C) 2024 Bellande Artificial Intelligence Computer Vision Research Innovation Center, Ronaldson Bellande

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Builds one FixRes stream over an image folder and reports what it yields.

use bellande_fixres_pipeline::data::preprocessing::StreamKind;
use bellande_fixres_pipeline::utilities::config::Configuration;
use bellande_fixres_pipeline::Framework;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "fixres")]
#[command(about = "Inspect the batches of a FixRes training stream", long_about = None)]
struct Cli {
    /// YAML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image folder with one sub-directory per class
    #[arg(short, long)]
    data_root: Option<PathBuf>,

    /// Stream to build: initial, fine-tune or vanilla
    #[arg(short, long, default_value = "initial")]
    stream: StreamKind,

    /// Iterate the validation split instead of the training split
    #[arg(long)]
    eval: bool,

    #[arg(long, default_value_t = 1)]
    epochs: usize,

    /// Stop each epoch after this many batches
    #[arg(long)]
    max_batches: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Configuration::from_file(path)?,
        None => Configuration::default(),
    };
    if let Some(root) = &cli.data_root {
        config.data.root = Some(root.to_string_lossy().into_owned());
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(workers) = cli.workers {
        config.system.num_workers = workers;
    }
    if cli.seed.is_some() {
        config.system.seed = cli.seed;
    }
    if let Some(level) = &cli.log_level {
        config.system.log_level = level.clone();
    }

    let mut framework = Framework::from_config(config)?;
    framework.initialize()?;

    let (train, validation) = framework.load_image_folder()?;
    let train_split = !cli.eval;
    let dataset = if train_split { train } else { validation };
    let loader = framework.stream(cli.stream, train_split, dataset)?;

    info!(
        stream = %cli.stream,
        train = train_split,
        strategy = ?loader.preprocessor().strategy(),
        transforms = ?loader.preprocessor().transform_names(),
        examples = loader.len(),
        batches = loader.num_batches(),
        "stream ready"
    );

    let num_classes = framework.config().data.num_classes;
    for epoch in 0..cli.epochs {
        let started = Instant::now();
        let mut label_counts = vec![0usize; num_classes];
        let mut examples = 0usize;
        let mut batches = 0usize;

        for batch in loader.iter()? {
            let batch = batch?;
            for &label in &batch.labels {
                if let Some(count) = label_counts.get_mut(label) {
                    *count += 1;
                }
            }
            info!(
                epoch,
                batch = batches,
                shape = ?batch.images.shape(),
                "batch"
            );
            examples += batch.len();
            batches += 1;
            if cli.max_batches.map_or(false, |max| batches >= max) {
                break;
            }
        }

        let elapsed = started.elapsed();
        info!(
            epoch,
            batches,
            examples,
            labels = ?label_counts,
            elapsed_ms = elapsed.as_millis() as u64,
            images_per_sec = examples as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
            "epoch done"
        );
    }

    Ok(())
}
