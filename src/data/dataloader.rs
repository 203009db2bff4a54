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

use crate::core::{error::PipelineError, random::Generator, tensor::Tensor};
use crate::data::dataset::{Dataset, Example};
use crate::data::preprocessing::{PreprocessConfig, Preprocessor};
use crate::data::sampler::{Sampler, SequentialSampler, WindowedShuffleSampler};
use crate::utilities::config::Configuration;
use crossbeam_channel::{bounded, Receiver};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info};

/// A collated group of preprocessed examples.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    /// `[batch, size, size, 3]`
    pub images: Tensor,
    pub labels: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub struct DataLoader {
    dataset: Arc<dyn Dataset>,
    preprocessor: Arc<Preprocessor>,
    batch_size: usize,
    sampler: Mutex<Box<dyn Sampler>>,
    generator: Mutex<Generator>,
    pool: Option<Arc<ThreadPool>>,
    prefetch: usize,
}

impl DataLoader {
    /// `shuffle_window` of `None` keeps source order. Without a `pool` examples are
    /// preprocessed on the producing thread. `prefetch` is the number of batches produced
    /// ahead on a background thread; zero produces batches on the caller's thread.
    pub fn new(
        dataset: Arc<dyn Dataset>,
        preprocessor: Preprocessor,
        batch_size: usize,
        shuffle_window: Option<usize>,
        pool: Option<Arc<ThreadPool>>,
        prefetch: usize,
        mut generator: Generator,
    ) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::InvalidParameter(
                "Batch size must be greater than 0".into(),
            ));
        }

        let sampler: Box<dyn Sampler> = match shuffle_window {
            Some(window) => Box::new(WindowedShuffleSampler::new(window, generator.fork())),
            None => Box::new(SequentialSampler),
        };

        Ok(DataLoader {
            dataset,
            preprocessor: Arc::new(preprocessor),
            batch_size,
            sampler: Mutex::new(sampler),
            generator: Mutex::new(generator),
            pool,
            prefetch,
        })
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Worker pool the examples are preprocessed on, if any.
    pub fn pool(&self) -> Option<&Arc<ThreadPool>> {
        self.pool.as_ref()
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Starts a new epoch over the dataset.
    pub fn iter(&self) -> Result<BatchIterator, PipelineError> {
        let order = self
            .sampler
            .lock()
            .map_err(|_| PipelineError::RuntimeError("sampler lock poisoned".into()))?
            .order(self.dataset.len());
        let generator = self
            .generator
            .lock()
            .map_err(|_| PipelineError::RuntimeError("generator lock poisoned".into()))?
            .fork();

        let producer = BatchProducer {
            dataset: Arc::clone(&self.dataset),
            preprocessor: Arc::clone(&self.preprocessor),
            pool: self.pool.clone(),
            order,
            batch_size: self.batch_size,
            generator,
            produced: 0,
        };

        if self.prefetch == 0 {
            return Ok(BatchIterator {
                state: IteratorState::Sequential {
                    producer,
                    done: false,
                },
            });
        }

        let (sender, receiver) = bounded(self.prefetch);
        let worker = thread::Builder::new()
            .name("fixres-prefetch".into())
            .spawn(move || {
                let mut producer = producer;
                while let Some(batch) = producer.next_batch() {
                    let failed = batch.is_err();
                    if sender.send(batch).is_err() || failed {
                        break;
                    }
                }
            })
            .map_err(|e| PipelineError::RuntimeError(e.to_string()))?;

        Ok(BatchIterator {
            state: IteratorState::Prefetched {
                receiver,
                worker: Some(worker),
            },
        })
    }
}

struct BatchProducer {
    dataset: Arc<dyn Dataset>,
    preprocessor: Arc<Preprocessor>,
    pool: Option<Arc<ThreadPool>>,
    order: Box<dyn Iterator<Item = usize> + Send>,
    batch_size: usize,
    generator: Generator,
    produced: usize,
}

impl BatchProducer {
    fn next_batch(&mut self) -> Option<Result<Batch, PipelineError>> {
        // Child generators are drawn in order so results do not depend on scheduling.
        let work: Vec<(usize, Generator)> = self
            .order
            .by_ref()
            .take(self.batch_size)
            .map(|index| (index, self.generator.fork()))
            .collect();

        if work.is_empty() {
            return None;
        }

        let started = Instant::now();
        let dataset = &self.dataset;
        let preprocessor = &self.preprocessor;
        let process =
            |(index, mut generator): (usize, Generator)| -> Result<Example, PipelineError> {
                let example = dataset.get(index)?;
                preprocessor.prepare(&example, &mut generator)
            };

        let examples: Result<Vec<Example>, PipelineError> = match &self.pool {
            Some(pool) => pool.install(|| work.into_par_iter().map(process).collect()),
            None => work.into_iter().map(process).collect(),
        };

        let batch = examples.and_then(collate_batch);
        if let Ok(batch) = &batch {
            debug!(
                batch = self.produced,
                size = batch.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "produced batch"
            );
        }
        self.produced += 1;
        Some(batch)
    }
}

/// Iterator over the batches of one epoch. Iteration stops after the first error.
pub struct BatchIterator {
    state: IteratorState,
}

enum IteratorState {
    Sequential {
        producer: BatchProducer,
        done: bool,
    },
    Prefetched {
        receiver: Receiver<Result<Batch, PipelineError>>,
        worker: Option<JoinHandle<()>>,
    },
}

impl Iterator for BatchIterator {
    type Item = Result<Batch, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.state {
            IteratorState::Sequential { producer, done } => {
                if *done {
                    return None;
                }
                let batch = producer.next_batch();
                if !matches!(batch, Some(Ok(_))) {
                    *done = true;
                }
                batch
            }
            IteratorState::Prefetched { receiver, worker } => match receiver.recv() {
                Ok(batch) => Some(batch),
                Err(_) => {
                    // Sender dropped: the producer has finished.
                    if let Some(handle) = worker.take() {
                        if handle.join().is_err() {
                            return Some(Err(PipelineError::RuntimeError(
                                "prefetch thread panicked".into(),
                            )));
                        }
                    }
                    None
                }
            },
        }
    }
}

/// Builds the rayon pool loaders share. One worker needs no pool.
pub fn worker_pool(num_workers: usize) -> Result<Option<Arc<ThreadPool>>, PipelineError> {
    if num_workers <= 1 {
        return Ok(None);
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .thread_name(|i| format!("fixres-worker-{}", i))
        .build()
        .map_err(|e| PipelineError::RuntimeError(e.to_string()))?;
    Ok(Some(Arc::new(pool)))
}

/// Builds a batched stream over `dataset` for one (train, resolution, fixres) policy.
///
/// The resolution is checked before anything else. Training streams are shuffled
/// through a window of `shuffle_multiplier * batch_size` examples.
pub fn make_dataset(
    dataset: Arc<dyn Dataset>,
    train: bool,
    resolution: u32,
    fixres: bool,
    config: &Configuration,
) -> Result<DataLoader, PipelineError> {
    let policy = PreprocessConfig::new(resolution, train, fixres)?;
    make_dataset_with(
        dataset,
        policy,
        config,
        Generator::new(config.system.seed),
        worker_pool(config.system.num_workers)?,
    )
}

/// Like [`make_dataset`] with an already validated policy, an explicit random source
/// and a worker pool that may be shared with other loaders.
pub fn make_dataset_with(
    dataset: Arc<dyn Dataset>,
    policy: PreprocessConfig,
    config: &Configuration,
    generator: Generator,
    pool: Option<Arc<ThreadPool>>,
) -> Result<DataLoader, PipelineError> {
    let preprocessor = Preprocessor::new(policy, &config.augmentation)?;
    let window = config
        .shuffle_multiplier
        .checked_mul(config.batch_size)
        .ok_or_else(|| {
            PipelineError::InvalidConfiguration(
                "shuffle_multiplier * batch_size overflows".to_string(),
            )
        })?;
    let shuffle_window = policy.train.then_some(window);

    info!(
        examples = dataset.len(),
        resolution = policy.resolution.pixels(),
        train = policy.train,
        fixres = policy.fixres,
        strategy = ?preprocessor.strategy(),
        batch_size = config.batch_size,
        "building dataset"
    );

    DataLoader::new(
        dataset,
        preprocessor,
        config.batch_size,
        shuffle_window,
        pool,
        config.system.prefetch,
        generator,
    )
}

fn get_batch_shape(tensors: &[Tensor]) -> Result<Vec<usize>, PipelineError> {
    if tensors.is_empty() {
        return Err(PipelineError::InvalidParameter(
            "Empty tensor batch".to_string(),
        ));
    }

    let base_shape = tensors[0].shape();

    // Verify all tensors have the same shape
    for (i, tensor) in tensors.iter().enumerate().skip(1) {
        if tensor.shape() != base_shape {
            return Err(PipelineError::ShapeMismatch(format!(
                "tensor 0 has shape {:?} but tensor {} has shape {:?}",
                base_shape,
                i,
                tensor.shape()
            )));
        }
    }

    // Create the batch shape: [batch_size, ...base_shape]
    let mut batch_shape = vec![tensors.len()];
    batch_shape.extend(base_shape);
    Ok(batch_shape)
}

pub fn collate_batch(batch: Vec<Example>) -> Result<Batch, PipelineError> {
    let (images, labels): (Vec<Tensor>, Vec<usize>) = batch
        .into_iter()
        .map(|example| (example.image, example.label))
        .unzip();

    let batch_shape = get_batch_shape(&images)?;
    let mut batched = Tensor::zeros(&batch_shape);
    for (i, image) in images.iter().enumerate() {
        copy_tensor_slice(&mut batched, i, image)?;
    }

    Ok(Batch {
        images: batched,
        labels,
    })
}

fn copy_tensor_slice(
    dest: &mut Tensor,
    batch_idx: usize,
    source: &Tensor,
) -> Result<(), PipelineError> {
    let batch_stride = dest.stride()[0];
    let start_idx = batch_idx * batch_stride;
    let end_idx = start_idx + batch_stride;

    if end_idx > dest.data().len() {
        return Err(PipelineError::IndexOutOfBounds);
    }

    if source.data().len() != batch_stride {
        return Err(PipelineError::ShapeMismatch(format!(
            "slice holds {} values, batch stride is {}",
            source.data().len(),
            batch_stride
        )));
    }

    dest.data_mut()[start_idx..end_idx].copy_from_slice(source.data());
    Ok(())
}
