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

use crate::core::error::PipelineError;
use image::{Rgb32FImage, RgbImage};

/// Upper bound of the pixel value range held by image tensors.
pub const PIXEL_MAX: f32 = 255.0;

/// Number of channels of every image tensor.
pub const CHANNELS: usize = 3;

/// Dense row-major `f32` tensor. Images use the `[height, width, channels]` layout,
/// batches prepend the batch dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl Tensor {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, PipelineError> {
        let size: usize = shape.iter().product();
        if data.len() != size {
            return Err(PipelineError::InvalidShape(format!(
                "data holds {} values but shape {:?} requires {}",
                data.len(),
                shape,
                size
            )));
        }

        Ok(Tensor { data, shape })
    }

    pub fn zeros(shape: &[usize]) -> Self {
        let size = shape.iter().product();
        Tensor {
            data: vec![0.0; size],
            shape: shape.to_vec(),
        }
    }

    /// Builds an image tensor by evaluating `f(row, col, channel)` for every element.
    pub fn from_fn<F>(height: usize, width: usize, f: F) -> Self
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(height * width * CHANNELS);
        for h in 0..height {
            for w in 0..width {
                for c in 0..CHANNELS {
                    data.push(f(h, w, c));
                }
            }
        }
        Tensor {
            data,
            shape: vec![height, width, CHANNELS],
        }
    }

    // Data access methods
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    // Calculate stride for the current shape
    pub fn stride(&self) -> Vec<usize> {
        let mut stride = Vec::with_capacity(self.shape.len());
        let mut current_stride = 1;
        for &dim in self.shape.iter().rev() {
            stride.push(current_stride);
            current_stride *= dim;
        }
        stride.reverse();
        stride
    }

    /// Returns `(height, width)` of an image tensor, rejecting anything that is not
    /// a non-empty `[h, w, 3]` tensor.
    pub fn image_dims(&self) -> Result<(usize, usize), PipelineError> {
        match self.shape[..] {
            [height, width, CHANNELS] if height > 0 && width > 0 => Ok((height, width)),
            _ => Err(PipelineError::InvalidShape(format!(
                "expected a non-empty [height, width, {}] image, got {:?}",
                CHANNELS, self.shape
            ))),
        }
    }

    pub fn get(&self, row: usize, col: usize, channel: usize) -> Option<f32> {
        let (height, width) = self.image_dims().ok()?;
        if row >= height || col >= width || channel >= CHANNELS {
            return None;
        }
        self.data.get((row * width + col) * CHANNELS + channel).copied()
    }

    /// Copies the `height × width` window whose top-left corner is `(top, left)`.
    pub fn crop(
        &self,
        top: usize,
        left: usize,
        height: usize,
        width: usize,
    ) -> Result<Tensor, PipelineError> {
        let (in_height, in_width) = self.image_dims()?;

        if height == 0 || width == 0 {
            return Err(PipelineError::InvalidParameter(
                "Crop size must be non-zero".into(),
            ));
        }
        if top + height > in_height || left + width > in_width {
            return Err(PipelineError::InvalidParameter(format!(
                "crop {}x{} at ({}, {}) exceeds image {}x{}",
                height, width, top, left, in_height, in_width
            )));
        }

        let row_len = width * CHANNELS;
        let mut cropped = Vec::with_capacity(height * row_len);
        for h in top..top + height {
            let start = (h * in_width + left) * CHANNELS;
            cropped.extend_from_slice(&self.data[start..start + row_len]);
        }

        Ok(Tensor {
            data: cropped,
            shape: vec![height, width, CHANNELS],
        })
    }

    /// Mirrors the image along its vertical axis.
    pub fn flip_horizontal(&self) -> Result<Tensor, PipelineError> {
        let (height, width) = self.image_dims()?;

        let mut flipped = vec![0.0; self.data.len()];
        for h in 0..height {
            for w in 0..width {
                let src_idx = (h * width + w) * CHANNELS;
                let dst_idx = (h * width + (width - 1 - w)) * CHANNELS;
                flipped[dst_idx..dst_idx + CHANNELS]
                    .copy_from_slice(&self.data[src_idx..src_idx + CHANNELS]);
            }
        }

        Ok(Tensor {
            data: flipped,
            shape: self.shape.clone(),
        })
    }

    /// Converts to an `image` float buffer with channels scaled into [0, 1].
    pub fn to_rgb32f(&self) -> Result<Rgb32FImage, PipelineError> {
        let (height, width) = self.image_dims()?;
        let scaled: Vec<f32> = self.data.iter().map(|&v| v / PIXEL_MAX).collect();
        Rgb32FImage::from_raw(width as u32, height as u32, scaled).ok_or_else(|| {
            PipelineError::InvalidShape("Image buffer does not match tensor shape".into())
        })
    }

    /// Inverse of [`Tensor::to_rgb32f`]: channels are scaled back to [0, 255].
    pub fn from_rgb32f(image: &Rgb32FImage) -> Tensor {
        let (width, height) = image.dimensions();
        let data = image
            .pixels()
            .flat_map(|pixel| pixel.0.map(|v| v * PIXEL_MAX))
            .collect();
        Tensor {
            data,
            shape: vec![height as usize, width as usize, CHANNELS],
        }
    }

    pub fn from_rgb8(image: &RgbImage) -> Tensor {
        let (width, height) = image.dimensions();
        let data = image.as_raw().iter().map(|&v| v as f32).collect();
        Tensor {
            data,
            shape: vec![height as usize, width as usize, CHANNELS],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_copies_the_requested_window() {
        let tensor = Tensor::from_fn(4, 5, |h, w, _| (h * 10 + w) as f32);
        let cropped = tensor.crop(1, 2, 2, 3).unwrap();
        assert_eq!(cropped.shape(), &[2, 3, 3]);
        assert_eq!(cropped.get(0, 0, 0), Some(12.0));
        assert_eq!(cropped.get(1, 2, 2), Some(24.0));
    }

    #[test]
    fn crop_outside_the_image_is_rejected() {
        let tensor = Tensor::zeros(&[4, 4, 3]);
        assert!(tensor.crop(2, 0, 3, 4).is_err());
        assert!(tensor.crop(0, 0, 0, 4).is_err());
    }

    #[test]
    fn flip_mirrors_columns() {
        let tensor = Tensor::from_fn(2, 3, |_, w, c| (w * 3 + c) as f32);
        let flipped = tensor.flip_horizontal().unwrap();
        assert_eq!(flipped.get(0, 0, 1), tensor.get(0, 2, 1));
        assert_eq!(flipped.get(1, 2, 0), tensor.get(1, 0, 0));
        assert_eq!(flipped.flip_horizontal().unwrap(), tensor);
    }

    #[test]
    fn image_dims_rejects_non_rgb() {
        assert!(Tensor::zeros(&[4, 4, 1]).image_dims().is_err());
        assert!(Tensor::zeros(&[0, 4, 3]).image_dims().is_err());
        assert_eq!(Tensor::zeros(&[4, 6, 3]).image_dims().unwrap(), (4, 6));
    }
}
