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
use glob::{glob, Pattern};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// An (image, label) pair. The image is an `[height, width, 3]` tensor with values in [0, 255].
#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    pub image: Tensor,
    pub label: usize,
}

impl Example {
    pub fn new(image: Tensor, label: usize) -> Self {
        Example { image, label }
    }
}

/// Trait defining the interface for datasets
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Result<Example, PipelineError>;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn num_classes(&self) -> usize;
}

/// Dataset backed by examples already held in memory.
pub struct InMemoryDataset {
    examples: Vec<Example>,
    num_classes: usize,
}

impl InMemoryDataset {
    pub fn new(examples: Vec<Example>, num_classes: usize) -> Result<Self, PipelineError> {
        for (index, example) in examples.iter().enumerate() {
            example.image.image_dims()?;
            if example.label >= num_classes {
                return Err(PipelineError::InvalidParameter(format!(
                    "example {} has label {} but only {} classes exist",
                    index, example.label, num_classes
                )));
            }
        }
        Ok(InMemoryDataset {
            examples,
            num_classes,
        })
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.examples.len()
    }

    fn get(&self, index: usize) -> Result<Example, PipelineError> {
        self.examples
            .get(index)
            .cloned()
            .ok_or(PipelineError::IndexOutOfBounds)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

/// Images laid out as `root/<class name>/<image file>`.
///
/// Class ids follow the sorted order of the class directory names. Images are decoded
/// lazily on every `get`.
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<(PathBuf, usize)>,
}

impl ImageFolder {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, PipelineError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(PipelineError::IOError(format!(
                "Invalid root directory: {}",
                root.display()
            )));
        }

        let mut classes = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let path = entry?.path();
            if path.is_dir() {
                if let Some(name) = path.file_name() {
                    classes.push(name.to_string_lossy().into_owned());
                }
            }
        }
        classes.sort();

        let mut samples = Vec::new();
        for (class_idx, class_name) in classes.iter().enumerate() {
            let mut files = Self::scan_images(&root.join(class_name))?;
            files.sort();
            samples.extend(files.into_iter().map(|path| (path, class_idx)));
        }

        if samples.is_empty() {
            return Err(PipelineError::IOError(format!(
                "No valid images found under {}",
                root.display()
            )));
        }

        debug!(
            root = %root.display(),
            classes = classes.len(),
            images = samples.len(),
            "scanned image folder"
        );

        Ok(ImageFolder {
            root,
            classes,
            samples,
        })
    }

    fn scan_images(class_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let pattern = format!(
            "{}/*",
            Pattern::escape(&class_dir.to_string_lossy())
        );
        let entries =
            glob(&pattern).map_err(|e| PipelineError::IOError(format!("Bad glob: {}", e)))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PipelineError::IOError(e.to_string()))?;
            if path.is_file() && Self::is_image(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|class| class == name)
    }
}

impl Dataset for ImageFolder {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<Example, PipelineError> {
        let (path, label) = self
            .samples
            .get(index)
            .ok_or(PipelineError::IndexOutOfBounds)?;
        let image = image::open(path)
            .map_err(|e| PipelineError::ImageError(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        Ok(Example::new(Tensor::from_rgb8(&image), *label))
    }

    fn num_classes(&self) -> usize {
        self.classes.len()
    }
}

/// View over a subset of another dataset's indices.
pub struct Subset {
    inner: Arc<dyn Dataset>,
    indices: Vec<usize>,
}

impl Subset {
    pub fn new(inner: Arc<dyn Dataset>, indices: Vec<usize>) -> Result<Self, PipelineError> {
        if indices.iter().any(|&index| index >= inner.len()) {
            return Err(PipelineError::IndexOutOfBounds);
        }
        Ok(Subset { inner, indices })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl Dataset for Subset {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, index: usize) -> Result<Example, PipelineError> {
        let inner_index = *self
            .indices
            .get(index)
            .ok_or(PipelineError::IndexOutOfBounds)?;
        self.inner.get(inner_index)
    }

    fn num_classes(&self) -> usize {
        self.inner.num_classes()
    }
}

/// Splits `dataset` into disjoint training and validation subsets.
///
/// Indices are permuted once with `seed` before the split, so folder-ordered sources
/// still get every class on both sides. Each subset keeps ascending index order.
pub fn train_val_split(
    dataset: Arc<dyn Dataset>,
    validation_fraction: f32,
    seed: Option<u64>,
) -> Result<(Subset, Subset), PipelineError> {
    if !(0.0..1.0).contains(&validation_fraction) {
        return Err(PipelineError::InvalidParameter(format!(
            "validation fraction must be in [0, 1), got {}",
            validation_fraction
        )));
    }

    let len = dataset.len();
    let mut indices: Vec<usize> = (0..len).collect();
    let mut generator = Generator::new(seed);
    indices.shuffle(generator.rng());

    let val_len = (len as f32 * validation_fraction).round() as usize;
    let mut val_indices = indices.split_off(len - val_len);
    indices.sort_unstable();
    val_indices.sort_unstable();

    let train = Subset::new(Arc::clone(&dataset), indices)?;
    let validation = Subset::new(dataset, val_indices)?;
    Ok((train, validation))
}
