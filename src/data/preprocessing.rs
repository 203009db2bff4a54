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

//! Resolution-dependent preprocessing policy.
//!
//! Low-resolution training uses an aggressive random-area crop, which makes objects
//! look larger than they do in a plainly resized test image. The fine-tune policy
//! resizes to `(large / small) * large` and center crops to `large`, so the apparent
//! object size at the large resolution matches what the network saw while training
//! at the small one.

use crate::core::{error::PipelineError, random::Generator, tensor::CHANNELS};
use crate::data::augmentation::{
    CenterCrop, Compose, RandomAreaCrop, RandomHorizontalFlip, Resize, Transform,
};
use crate::data::dataset::Example;
use crate::utilities::config::AugmentationConfig;
use std::fmt;
use std::str::FromStr;

pub const SMALL_RESOLUTION: u32 = 128;
pub const LARGE_RESOLUTION: u32 = 224;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    Small,
    Large,
}

impl Resolution {
    pub fn pixels(&self) -> usize {
        match self {
            Resolution::Small => SMALL_RESOLUTION as usize,
            Resolution::Large => LARGE_RESOLUTION as usize,
        }
    }
}

impl TryFrom<u32> for Resolution {
    type Error = PipelineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            SMALL_RESOLUTION => Ok(Resolution::Small),
            LARGE_RESOLUTION => Ok(Resolution::Large),
            other => Err(PipelineError::UnsupportedResolution(other)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}px", self.pixels())
    }
}

/// Side of the intermediate square the fine-tune policy resizes to before cropping.
pub fn fixres_resize_size() -> usize {
    (LARGE_RESOLUTION as f32 / SMALL_RESOLUTION as f32 * LARGE_RESOLUTION as f32) as usize
}

/// The closed set of per-example transform strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Random-area crop + resize + flip when training, plain resize otherwise.
    Initial { size: usize },
    /// Resize to `resize`, flip when training, center crop to `crop`.
    FineTune { resize: usize, crop: usize },
}

impl Strategy {
    pub fn select(resolution: Resolution, fixres: bool) -> Strategy {
        match (resolution, fixres) {
            (Resolution::Large, true) => Strategy::FineTune {
                resize: fixres_resize_size(),
                crop: resolution.pixels(),
            },
            (resolution, _) => Strategy::Initial {
                size: resolution.pixels(),
            },
        }
    }

    pub fn output_size(&self) -> usize {
        match *self {
            Strategy::Initial { size } => size,
            Strategy::FineTune { crop, .. } => crop,
        }
    }

    /// Assembles the transform chain of this strategy for the given mode.
    pub fn build(
        &self,
        train: bool,
        augmentation: &AugmentationConfig,
    ) -> Result<Compose, PipelineError> {
        let mut transforms: Vec<Box<dyn Transform>> = Vec::new();
        match *self {
            Strategy::Initial { size } => {
                if train {
                    transforms.push(Box::new(RandomAreaCrop::new(
                        (augmentation.min_area, augmentation.max_area),
                        (augmentation.min_aspect, augmentation.max_aspect),
                        augmentation.max_attempts,
                    )?));
                }
                transforms.push(Box::new(Resize::square(size)));
                if train {
                    transforms.push(Box::new(RandomHorizontalFlip::new(
                        augmentation.flip_probability,
                    )?));
                }
            }
            Strategy::FineTune { resize, crop } => {
                transforms.push(Box::new(Resize::square(resize)));
                if train {
                    transforms.push(Box::new(RandomHorizontalFlip::new(
                        augmentation.flip_probability,
                    )?));
                }
                transforms.push(Box::new(CenterCrop::square(crop)));
            }
        }
        Ok(Compose::new(transforms))
    }
}

/// The orthogonal policy switches for one stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreprocessConfig {
    pub resolution: Resolution,
    pub train: bool,
    pub fixres: bool,
}

impl PreprocessConfig {
    pub fn new(resolution: u32, train: bool, fixres: bool) -> Result<Self, PipelineError> {
        Ok(PreprocessConfig {
            resolution: Resolution::try_from(resolution)?,
            train,
            fixres,
        })
    }

    pub fn strategy(&self) -> Strategy {
        Strategy::select(self.resolution, self.fixres)
    }
}

/// The three training streams compared by the FixRes experiment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Small resolution with the initial policy.
    Initial,
    /// Large resolution with the fine-tune policy.
    FineTune,
    /// Large resolution with the initial policy.
    Vanilla,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [StreamKind::Initial, StreamKind::FineTune, StreamKind::Vanilla];

    pub fn resolution(&self) -> Resolution {
        match self {
            StreamKind::Initial => Resolution::Small,
            StreamKind::FineTune | StreamKind::Vanilla => Resolution::Large,
        }
    }

    pub fn fixres(&self) -> bool {
        matches!(self, StreamKind::FineTune)
    }

    pub fn config(&self, train: bool) -> PreprocessConfig {
        PreprocessConfig {
            resolution: self.resolution(),
            train,
            fixres: self.fixres(),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StreamKind::Initial => write!(f, "initial"),
            StreamKind::FineTune => write!(f, "fine-tune"),
            StreamKind::Vanilla => write!(f, "vanilla"),
        }
    }
}

impl FromStr for StreamKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "initial" | "small" => Ok(StreamKind::Initial),
            "fine-tune" | "finetune" | "fixres" => Ok(StreamKind::FineTune),
            "vanilla" => Ok(StreamKind::Vanilla),
            other => Err(PipelineError::InvalidParameter(format!(
                "unknown stream '{}', expected initial, fine-tune or vanilla",
                other
            ))),
        }
    }
}

/// Applies one stream's policy to individual examples.
pub struct Preprocessor {
    config: PreprocessConfig,
    strategy: Strategy,
    pipeline: Compose,
}

impl Preprocessor {
    pub fn new(
        config: PreprocessConfig,
        augmentation: &AugmentationConfig,
    ) -> Result<Self, PipelineError> {
        let strategy = config.strategy();
        let pipeline = strategy.build(config.train, augmentation)?;
        Ok(Preprocessor {
            config,
            strategy,
            pipeline,
        })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn transform_names(&self) -> Vec<&str> {
        self.pipeline.names()
    }

    /// Produces a new example whose image is `[size, size, 3]`; the label is untouched.
    pub fn prepare(
        &self,
        example: &Example,
        generator: &mut Generator,
    ) -> Result<Example, PipelineError> {
        let image = self.pipeline.apply(&example.image, generator)?;

        let size = self.strategy.output_size();
        if image.shape() != [size, size, CHANNELS] {
            return Err(PipelineError::ShapeMismatch(format!(
                "{:?} produced {:?}, expected [{}, {}, {}]",
                self.strategy,
                image.shape(),
                size,
                size,
                CHANNELS
            )));
        }

        Ok(Example::new(image, example.label))
    }
}

/// One-shot form of [`Preprocessor::prepare`] with the default augmentation settings.
///
/// The resolution is validated before the image is looked at.
pub fn prepare(
    example: &Example,
    resolution: u32,
    train: bool,
    fixres: bool,
    generator: &mut Generator,
) -> Result<Example, PipelineError> {
    let config = PreprocessConfig::new(resolution, train, fixres)?;
    Preprocessor::new(config, &AugmentationConfig::default())?.prepare(example, generator)
}
