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
use image::imageops::{self, FilterType};
use rand::Rng;
use tracing::trace;

/// Trait for image transformations
pub trait Transform: Send + Sync {
    fn apply(&self, image: &Tensor, generator: &mut Generator) -> Result<Tensor, PipelineError>;
    fn name(&self) -> &str;
}

pub struct Compose {
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Compose { transforms }
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }
}

impl Transform for Compose {
    fn apply(&self, image: &Tensor, generator: &mut Generator) -> Result<Tensor, PipelineError> {
        let mut current = image.clone();
        for transform in &self.transforms {
            current = transform.apply(&current, generator)?;
        }
        Ok(current)
    }

    fn name(&self) -> &str {
        "Compose"
    }
}

/// Interpolating resize of the whole frame (bilinear, no aspect preservation).
pub struct Resize {
    height: usize,
    width: usize,
}

impl Resize {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }
}

impl Transform for Resize {
    fn apply(&self, image: &Tensor, _generator: &mut Generator) -> Result<Tensor, PipelineError> {
        let (in_height, in_width) = image.image_dims()?;
        if self.height == 0 || self.width == 0 {
            return Err(PipelineError::InvalidParameter(
                "Resize target must be non-zero".into(),
            ));
        }
        if in_height == self.height && in_width == self.width {
            return Ok(image.clone());
        }

        let buffer = image.to_rgb32f()?;
        let resized = imageops::resize(
            &buffer,
            self.width as u32,
            self.height as u32,
            FilterType::Triangle,
        );
        Ok(Tensor::from_rgb32f(&resized))
    }

    fn name(&self) -> &str {
        "Resize"
    }
}

/// A crop window: top-left corner plus extent, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub top: usize,
    pub left: usize,
    pub height: usize,
    pub width: usize,
}

impl Region {
    pub fn full(height: usize, width: usize) -> Self {
        Region {
            top: 0,
            left: 0,
            height,
            width,
        }
    }

    pub fn area(&self) -> usize {
        self.height * self.width
    }
}

/// Crops a random window whose area is a uniformly drawn fraction of the image area.
///
/// Aspect ratios are drawn log-uniformly. When no attempt fits inside the image the
/// whole frame is used.
pub struct RandomAreaCrop {
    area_range: (f32, f32),
    aspect_range: (f32, f32),
    max_attempts: usize,
}

impl RandomAreaCrop {
    pub fn new(
        area_range: (f32, f32),
        aspect_range: (f32, f32),
        max_attempts: usize,
    ) -> Result<Self, PipelineError> {
        let (min_area, max_area) = area_range;
        if !(min_area > 0.0 && min_area <= max_area && max_area <= 1.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "area range must satisfy 0 < min <= max <= 1, got {:?}",
                area_range
            )));
        }
        let (min_aspect, max_aspect) = aspect_range;
        if !(min_aspect > 0.0 && min_aspect <= max_aspect) {
            return Err(PipelineError::InvalidParameter(format!(
                "aspect range must satisfy 0 < min <= max, got {:?}",
                aspect_range
            )));
        }
        Ok(Self {
            area_range,
            aspect_range,
            max_attempts,
        })
    }

    pub fn sample_region(&self, height: usize, width: usize, generator: &mut Generator) -> Region {
        let area = (height * width) as f32;
        let (log_min, log_max) = (self.aspect_range.0.ln(), self.aspect_range.1.ln());

        for _ in 0..self.max_attempts {
            let target_area = area * generator.uniform(self.area_range.0, self.area_range.1);
            let aspect = generator.uniform(log_min, log_max).exp();

            let crop_width = (target_area * aspect).sqrt().round() as usize;
            let crop_height = (target_area / aspect).sqrt().round() as usize;

            if crop_width == 0 || crop_height == 0 || crop_width > width || crop_height > height {
                continue;
            }

            let top = generator.rng().gen_range(0..=height - crop_height);
            let left = generator.rng().gen_range(0..=width - crop_width);
            return Region {
                top,
                left,
                height: crop_height,
                width: crop_width,
            };
        }

        trace!(height, width, "no crop window fitted, using the full image");
        Region::full(height, width)
    }
}

impl Transform for RandomAreaCrop {
    fn apply(&self, image: &Tensor, generator: &mut Generator) -> Result<Tensor, PipelineError> {
        let (height, width) = image.image_dims()?;
        let region = self.sample_region(height, width, generator);
        if region == Region::full(height, width) {
            return Ok(image.clone());
        }
        image.crop(region.top, region.left, region.height, region.width)
    }

    fn name(&self) -> &str {
        "RandomAreaCrop"
    }
}

pub struct RandomHorizontalFlip {
    probability: f32,
}

impl RandomHorizontalFlip {
    pub fn new(probability: f32) -> Result<Self, PipelineError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(PipelineError::InvalidParameter(format!(
                "flip probability must be in [0, 1], got {}",
                probability
            )));
        }
        Ok(Self { probability })
    }
}

impl Transform for RandomHorizontalFlip {
    fn apply(&self, image: &Tensor, generator: &mut Generator) -> Result<Tensor, PipelineError> {
        if generator.bernoulli(self.probability) {
            image.flip_horizontal()
        } else {
            image.image_dims()?;
            Ok(image.clone())
        }
    }

    fn name(&self) -> &str {
        "RandomHorizontalFlip"
    }
}

/// Center crop transformation
pub struct CenterCrop {
    height: usize,
    width: usize,
}

impl CenterCrop {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }
}

impl Transform for CenterCrop {
    fn apply(&self, image: &Tensor, _generator: &mut Generator) -> Result<Tensor, PipelineError> {
        let (in_height, in_width) = image.image_dims()?;

        if in_height < self.height || in_width < self.width {
            return Err(PipelineError::InvalidParameter(format!(
                "crop {}x{} larger than input {}x{}",
                self.height, self.width, in_height, in_width
            )));
        }

        let start_h = (in_height - self.height) / 2;
        let start_w = (in_width - self.width) / 2;
        image.crop(start_h, start_w, self.height, self.width)
    }

    fn name(&self) -> &str {
        "CenterCrop"
    }
}
