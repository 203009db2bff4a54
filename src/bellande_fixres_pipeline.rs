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

use crate::core::{error::PipelineError, random::Generator};
use crate::data::dataloader::{make_dataset_with, worker_pool, DataLoader};
use crate::data::dataset::{train_val_split, Dataset, ImageFolder};
use crate::data::preprocessing::StreamKind;
use crate::utilities::config::Configuration;
use rayon::ThreadPool;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub mod core;
pub mod data;
pub mod utilities;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const FRAMEWORK_NAME: &str = "Bellande FixRes Pipeline";

pub struct Framework {
    config: Configuration,
    initialized: bool,
    generator: Mutex<Generator>,
    pool: Mutex<Option<Arc<ThreadPool>>>,
}

/// Training and validation loaders of the three FixRes streams.
pub struct Streams {
    pub initial_train: DataLoader,
    pub initial_val: DataLoader,
    pub fine_tune_train: DataLoader,
    pub fine_tune_val: DataLoader,
    pub vanilla_train: DataLoader,
    pub vanilla_val: DataLoader,
}

impl Streams {
    pub fn get(&self, kind: StreamKind, train: bool) -> &DataLoader {
        match (kind, train) {
            (StreamKind::Initial, true) => &self.initial_train,
            (StreamKind::Initial, false) => &self.initial_val,
            (StreamKind::FineTune, true) => &self.fine_tune_train,
            (StreamKind::FineTune, false) => &self.fine_tune_val,
            (StreamKind::Vanilla, true) => &self.vanilla_train,
            (StreamKind::Vanilla, false) => &self.vanilla_val,
        }
    }
}

impl Framework {
    pub fn new() -> Self {
        Self::build(Configuration::default())
    }

    pub fn with_config<P: AsRef<Path>>(config_path: P) -> Result<Self, PipelineError> {
        let config = Configuration::from_file(config_path)?;
        Ok(Self::build(config))
    }

    pub fn from_config(config: Configuration) -> Result<Self, PipelineError> {
        config
            .validate()
            .map_err(PipelineError::InvalidConfiguration)?;
        Ok(Self::build(config))
    }

    fn build(config: Configuration) -> Self {
        let generator = Generator::new(config.system.seed);
        Framework {
            config,
            initialized: false,
            generator: Mutex::new(generator),
            pool: Mutex::new(None),
        }
    }

    /// Child generator for the next loader. Loaders are seeded in creation order.
    fn fork_generator(&self) -> Result<Generator, PipelineError> {
        let mut generator = self
            .generator
            .lock()
            .map_err(|_| PipelineError::RuntimeError("generator lock poisoned".into()))?;
        Ok(generator.fork())
    }

    /// The worker pool every loader of this framework runs on, built on first use.
    fn shared_pool(&self) -> Result<Option<Arc<ThreadPool>>, PipelineError> {
        let mut pool = self
            .pool
            .lock()
            .map_err(|_| PipelineError::RuntimeError("pool lock poisoned".into()))?;
        if pool.is_none() {
            *pool = worker_pool(self.config.system.num_workers)?;
        }
        Ok(pool.clone())
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn initialize(&mut self) -> Result<(), PipelineError> {
        if self.initialized {
            return Ok(());
        }

        utilities::logging::init(&self.config.system.log_level)?;
        info!("{}", Self::system_info());

        self.initialized = true;
        Ok(())
    }

    /// Scans `data.root` and splits it into training and validation subsets.
    pub fn load_image_folder(&self) -> Result<(Arc<dyn Dataset>, Arc<dyn Dataset>), PipelineError> {
        let root = self.config.data.root.as_ref().ok_or_else(|| {
            PipelineError::InvalidConfiguration("data.root is not set".to_string())
        })?;

        let folder = ImageFolder::new(root)?;
        if folder.num_classes() != self.config.data.num_classes {
            return Err(PipelineError::InvalidConfiguration(format!(
                "expected {} classes under {}, found {}",
                self.config.data.num_classes,
                root,
                folder.num_classes()
            )));
        }

        let (train, validation) = train_val_split(
            Arc::new(folder),
            self.config.data.validation_fraction,
            self.config.system.seed,
        )?;
        info!(
            train = train.len(),
            validation = validation.len(),
            "split image folder"
        );
        Ok((Arc::new(train), Arc::new(validation)))
    }

    /// Builds one loader for the given stream and split. Every loader draws from its own
    /// generator forked from the configured seed and shares the framework's worker pool.
    pub fn stream(
        &self,
        kind: StreamKind,
        train: bool,
        dataset: Arc<dyn Dataset>,
    ) -> Result<DataLoader, PipelineError> {
        make_dataset_with(
            dataset,
            kind.config(train),
            &self.config,
            self.fork_generator()?,
            self.shared_pool()?,
        )
    }

    /// Builds all six loaders.
    pub fn streams(
        &self,
        train: Arc<dyn Dataset>,
        validation: Arc<dyn Dataset>,
    ) -> Result<Streams, PipelineError> {
        let build = |kind: StreamKind, split: bool| {
            let dataset = if split {
                Arc::clone(&train)
            } else {
                Arc::clone(&validation)
            };
            self.stream(kind, split, dataset)
        };

        Ok(Streams {
            initial_train: build(StreamKind::Initial, true)?,
            initial_val: build(StreamKind::Initial, false)?,
            fine_tune_train: build(StreamKind::FineTune, true)?,
            fine_tune_val: build(StreamKind::FineTune, false)?,
            vanilla_train: build(StreamKind::Vanilla, true)?,
            vanilla_val: build(StreamKind::Vanilla, false)?,
        })
    }

    pub fn get_version() -> &'static str {
        VERSION
    }

    pub fn get_name() -> &'static str {
        FRAMEWORK_NAME
    }

    pub fn system_info() -> String {
        format!(
            "{} v{}\n\
            CPU Threads: {}\n\
            Rayon Threads: {}",
            FRAMEWORK_NAME,
            VERSION,
            num_cpus::get(),
            rayon::current_num_threads(),
        )
    }
}

impl Default for Framework {
    fn default() -> Self {
        Self::new()
    }
}
