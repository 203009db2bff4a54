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
    core::{error::PipelineError, random::Generator, tensor::Tensor},
    data::{
        dataloader::{collate_batch, make_dataset, Batch, DataLoader},
        dataset::{Dataset, Example, InMemoryDataset},
        preprocessing::{Preprocessor, StreamKind},
    },
    utilities::config::{AugmentationConfig, Configuration},
};

/// `len` small images whose label equals their index.
fn indexed_dataset(len: usize) -> Result<Arc<dyn Dataset>, PipelineError> {
    let examples = (0..len)
        .map(|i| {
            let image = Tensor::from_fn(12 + i % 5, 16 + i % 3, |h, w, c| {
                ((h + w + c + i) % 256) as f32
            });
            Example::new(image, i)
        })
        .collect();
    Ok(Arc::new(InMemoryDataset::new(examples, len.max(1))?))
}

fn config(batch_size: usize, workers: usize, prefetch: usize, seed: u64) -> Configuration {
    let mut config = Configuration::default();
    config.batch_size = batch_size;
    config.system.num_workers = workers;
    config.system.prefetch = prefetch;
    config.system.seed = Some(seed);
    config
}

fn collect_batches(
    dataset: Arc<dyn Dataset>,
    train: bool,
    resolution: u32,
    fixres: bool,
    config: &Configuration,
) -> Result<Vec<Batch>, PipelineError> {
    let loader = make_dataset(dataset, train, resolution, fixres, config)?;
    loader.iter()?.collect()
}

/// Fails the test if the pipeline reads anything from it.
struct UntouchableDataset;

impl Dataset for UntouchableDataset {
    fn len(&self) -> usize {
        4
    }

    fn get(&self, _index: usize) -> Result<Example, PipelineError> {
        panic!("dataset was read before the configuration was validated");
    }

    fn num_classes(&self) -> usize {
        5
    }
}

/// Fails on one index.
struct FlakyDataset {
    inner: Arc<dyn Dataset>,
    broken: usize,
}

impl Dataset for FlakyDataset {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, index: usize) -> Result<Example, PipelineError> {
        if index == self.broken {
            return Err(PipelineError::ImageError("corrupt file".into()));
        }
        self.inner.get(index)
    }

    fn num_classes(&self) -> usize {
        self.inner.num_classes()
    }
}

#[test]
fn test_batch_count_and_sizes() -> Result<(), Box<dyn Error>> {
    let config = config(128, 2, 1, 1);

    let batches = collect_batches(indexed_dataset(300)?, false, 128, false, &config)?;
    let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
    assert_eq!(sizes, vec![128, 128, 44]);
    assert_eq!(batches[0].images.shape(), &[128, 128, 128, 3]);
    assert_eq!(batches[2].images.shape(), &[44, 128, 128, 3]);

    let batches = collect_batches(indexed_dataset(256)?, true, 128, false, &config)?;
    let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
    assert_eq!(sizes, vec![128, 128]);
    Ok(())
}

#[test]
fn test_num_batches_matches_iteration() -> Result<(), Box<dyn Error>> {
    for (len, batch_size) in [(1, 4), (7, 4), (8, 4), (9, 4)] {
        let config = config(batch_size, 1, 0, 3);
        let loader = make_dataset(indexed_dataset(len)?, true, 128, false, &config)?;
        let expected = (len + batch_size - 1) / batch_size;
        assert_eq!(loader.num_batches(), expected);
        assert_eq!(loader.iter()?.count(), expected);
    }
    Ok(())
}

#[test]
fn test_huge_batch_size_counts_one_batch() -> Result<(), Box<dyn Error>> {
    let preprocessor = Preprocessor::new(
        StreamKind::Initial.config(false),
        &AugmentationConfig::default(),
    )?;
    let loader = DataLoader::new(
        indexed_dataset(3)?,
        preprocessor,
        usize::MAX,
        None,
        None,
        0,
        Generator::seeded(0),
    )?;
    assert_eq!(loader.num_batches(), 1);
    Ok(())
}

#[test]
fn test_overflowing_shuffle_window_is_rejected() -> Result<(), Box<dyn Error>> {
    let config = config(usize::MAX / 5, 1, 0, 0);
    let result = make_dataset(indexed_dataset(3)?, true, 128, false, &config);
    assert!(matches!(
        result,
        Err(PipelineError::InvalidConfiguration(_))
    ));
    Ok(())
}

#[test]
fn test_empty_dataset_yields_no_batches() -> Result<(), Box<dyn Error>> {
    let dataset: Arc<dyn Dataset> = Arc::new(InMemoryDataset::new(Vec::new(), 5)?);
    let config = config(8, 1, 1, 0);
    let loader = make_dataset(dataset, true, 224, true, &config)?;
    assert_eq!(loader.num_batches(), 0);
    assert_eq!(loader.iter()?.count(), 0);
    Ok(())
}

#[test]
fn test_eval_preserves_input_order() -> Result<(), Box<dyn Error>> {
    let config = config(16, 4, 2, 7);
    let batches = collect_batches(indexed_dataset(50)?, false, 224, true, &config)?;

    let labels: Vec<usize> = batches.iter().flat_map(|b| b.labels.clone()).collect();
    assert_eq!(labels, (0..50).collect::<Vec<_>>());
    for batch in &batches {
        assert_eq!(&batch.images.shape()[1..], &[224, 224, 3]);
    }
    Ok(())
}

#[test]
fn test_train_visits_every_example_once_in_shuffled_order() -> Result<(), Box<dyn Error>> {
    let config = config(16, 3, 1, 21);
    let batches = collect_batches(indexed_dataset(100)?, true, 128, false, &config)?;

    let labels: Vec<usize> = batches.iter().flat_map(|b| b.labels.clone()).collect();
    assert_ne!(labels, (0..100).collect::<Vec<_>>());

    let mut sorted = labels.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_seeded_loaders_are_reproducible() -> Result<(), Box<dyn Error>> {
    let dataset = indexed_dataset(40)?;

    let first = collect_batches(Arc::clone(&dataset), true, 128, false, &config(8, 4, 1, 99))?;
    let second = collect_batches(Arc::clone(&dataset), true, 128, false, &config(8, 4, 1, 99))?;
    assert_eq!(first, second);

    // Worker count and prefetch depth do not change the output.
    let sequential = collect_batches(dataset, true, 128, false, &config(8, 1, 0, 99))?;
    assert_eq!(first, sequential);
    Ok(())
}

#[test]
fn test_successive_epochs_reshuffle() -> Result<(), Box<dyn Error>> {
    let config = config(8, 2, 1, 5);
    let loader = make_dataset(indexed_dataset(64)?, true, 128, false, &config)?;

    let epoch = |loader: &DataLoader| {
        loader
            .iter()
            .and_then(|it| it.collect::<Result<Vec<Batch>, PipelineError>>())
            .map(|batches| {
                batches
                    .into_iter()
                    .flat_map(|b| b.labels)
                    .collect::<Vec<usize>>()
            })
    };

    let first = epoch(&loader)?;
    let second = epoch(&loader)?;
    assert_eq!(first.len(), 64);
    assert_eq!(second.len(), 64);
    assert_ne!(first, second);
    Ok(())
}

#[test]
fn test_unsupported_resolution_is_rejected_before_reading_data() {
    let config = config(8, 2, 1, 0);
    let result = make_dataset(Arc::new(UntouchableDataset), true, 100, false, &config);
    assert!(matches!(
        result,
        Err(PipelineError::UnsupportedResolution(100))
    ));
}

#[test]
fn test_source_errors_stop_the_epoch() -> Result<(), Box<dyn Error>> {
    for prefetch in [0, 2] {
        let dataset = Arc::new(FlakyDataset {
            inner: indexed_dataset(20)?,
            broken: 9,
        });
        let config = config(4, 2, prefetch, 0);
        let loader = make_dataset(dataset, false, 128, false, &config)?;

        let results: Vec<_> = loader.iter()?.collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok() && results[1].is_ok());
        assert!(matches!(results[2], Err(PipelineError::ImageError(_))));
    }
    Ok(())
}

#[test]
fn test_dropping_a_prefetched_iterator_early() -> Result<(), Box<dyn Error>> {
    let config = config(4, 2, 1, 0);
    let loader = make_dataset(indexed_dataset(64)?, true, 128, false, &config)?;

    let first = loader.iter()?.next().transpose()?;
    assert_eq!(first.map(|b| b.len()), Some(4));

    // The loader is still usable after an abandoned epoch.
    assert_eq!(loader.iter()?.count(), 16);
    Ok(())
}

#[test]
fn test_prefetch_deeper_than_the_epoch() -> Result<(), Box<dyn Error>> {
    let config = config(4, 2, 8, 0);
    let loader = make_dataset(indexed_dataset(10)?, false, 128, false, &config)?;

    let mut batches = loader.iter()?;
    let sizes: Vec<usize> = batches
        .by_ref()
        .map(|batch| batch.map(|b| b.len()))
        .collect::<Result<_, _>>()?;
    assert_eq!(sizes, vec![4, 4, 2]);
    assert!(batches.next().is_none());
    assert!(batches.next().is_none());
    Ok(())
}

#[test]
fn test_collate_rejects_mixed_shapes() {
    let batch = vec![
        Example::new(Tensor::zeros(&[4, 4, 3]), 0),
        Example::new(Tensor::zeros(&[4, 5, 3]), 1),
    ];
    assert!(matches!(
        collate_batch(batch),
        Err(PipelineError::ShapeMismatch(_))
    ));
}

#[test]
fn test_collate_stacks_images_in_order() -> Result<(), Box<dyn Error>> {
    let batch = vec![
        Example::new(Tensor::from_fn(2, 2, |_, _, _| 1.0), 4),
        Example::new(Tensor::from_fn(2, 2, |_, _, _| 2.0), 2),
    ];
    let collated = collate_batch(batch)?;
    assert_eq!(collated.images.shape(), &[2, 2, 2, 3]);
    assert_eq!(collated.labels, vec![4, 2]);
    assert!(collated.images.data()[..12].iter().all(|&v| v == 1.0));
    assert!(collated.images.data()[12..].iter().all(|&v| v == 2.0));
    Ok(())
}
