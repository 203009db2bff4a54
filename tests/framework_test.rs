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

use std::error::Error;
use std::sync::Arc;

use bellande_fixres_pipeline::{
    core::{error::PipelineError, tensor::Tensor},
    data::{
        dataloader::DataLoader,
        dataset::{Dataset, Example, InMemoryDataset},
        preprocessing::StreamKind,
    },
    utilities::config::Configuration,
    Framework,
};

fn labelled_dataset(len: usize) -> Result<Arc<dyn Dataset>, PipelineError> {
    let examples = (0..len)
        .map(|i| Example::new(Tensor::from_fn(8, 10, |h, w, _| (h + w) as f32), i))
        .collect();
    Ok(Arc::new(InMemoryDataset::new(examples, len)?))
}

fn framework(workers: usize, seed: u64) -> Result<Framework, PipelineError> {
    let mut config = Configuration::default();
    config.batch_size = 4;
    config.system.num_workers = workers;
    config.system.prefetch = 0;
    config.system.seed = Some(seed);
    Framework::from_config(config)
}

fn labels(loader: &DataLoader) -> Result<Vec<usize>, PipelineError> {
    let mut labels = Vec::new();
    for batch in loader.iter()? {
        labels.extend(batch?.labels);
    }
    Ok(labels)
}

#[test]
fn test_streams_from_one_framework_draw_different_orders() -> Result<(), Box<dyn Error>> {
    let dataset = labelled_dataset(64)?;
    let framework = framework(1, 12)?;

    let first = framework.stream(StreamKind::Initial, true, Arc::clone(&dataset))?;
    let second = framework.stream(StreamKind::Initial, true, Arc::clone(&dataset))?;
    assert_ne!(labels(&first)?, labels(&second)?);
    Ok(())
}

#[test]
fn test_same_seed_replays_the_same_streams() -> Result<(), Box<dyn Error>> {
    let dataset = labelled_dataset(64)?;

    let a = framework(2, 12)?;
    let b = framework(2, 12)?;
    for _ in 0..2 {
        let left = a.stream(StreamKind::Vanilla, true, Arc::clone(&dataset))?;
        let right = b.stream(StreamKind::Vanilla, true, Arc::clone(&dataset))?;
        assert_eq!(labels(&left)?, labels(&right)?);
    }
    Ok(())
}

#[test]
fn test_loaders_share_one_worker_pool() -> Result<(), Box<dyn Error>> {
    let dataset = labelled_dataset(8)?;

    let parallel = framework(3, 0)?;
    let streams = parallel.streams(Arc::clone(&dataset), Arc::clone(&dataset))?;
    let first = streams
        .get(StreamKind::Initial, true)
        .pool()
        .ok_or("expected a worker pool")?;
    assert_eq!(first.current_num_threads(), 3);
    for kind in StreamKind::ALL {
        for train in [true, false] {
            let pool = streams.get(kind, train).pool().ok_or("expected a worker pool")?;
            assert!(Arc::ptr_eq(first, pool));
        }
    }
    let extra = parallel.stream(StreamKind::FineTune, false, Arc::clone(&dataset))?;
    assert!(extra.pool().map_or(false, |pool| Arc::ptr_eq(first, pool)));

    let single = framework(1, 0)?;
    let streams = single.streams(Arc::clone(&dataset), dataset)?;
    for kind in StreamKind::ALL {
        assert!(streams.get(kind, true).pool().is_none());
    }
    Ok(())
}
