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
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Configuration {
    // Batching configuration
    pub batch_size: usize,
    /// Shuffle window of training streams, in batches.
    pub shuffle_multiplier: usize,

    // Augmentation configuration
    pub augmentation: AugmentationConfig,

    // Data configuration
    pub data: DataConfig,

    // System configuration
    pub system: SystemConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Bounds of the crop area as a fraction of the image area.
    pub min_area: f32,
    pub max_area: f32,
    /// Bounds of the crop aspect ratio (width / height).
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub max_attempts: usize,
    pub flip_probability: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Image folder with one sub-directory per class.
    pub root: Option<String>,
    pub validation_fraction: f32,
    pub num_classes: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SystemConfig {
    pub num_workers: usize,
    /// Batches produced ahead of the consumer; 0 disables the prefetch thread.
    pub prefetch: usize,
    pub seed: Option<u64>,
    pub log_level: String,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        AugmentationConfig {
            min_area: 0.05,
            max_area: 1.0,
            min_aspect: 0.75,
            max_aspect: 1.33,
            max_attempts: 100,
            flip_probability: 0.5,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            root: None,
            validation_fraction: 0.15,
            num_classes: 5,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            num_workers: num_cpus::get(),
            prefetch: 1,
            seed: None,
            log_level: "info".to_string(),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            batch_size: 128,
            shuffle_multiplier: 10,
            augmentation: AugmentationConfig::default(),
            data: DataConfig::default(),
            system: SystemConfig::default(),
        }
    }
}

impl Configuration {
    /// Loads a YAML file, or JSON when the extension is `.json`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Configuration = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config
            .validate()
            .map_err(PipelineError::InvalidConfiguration)?;

        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("Batch size must be greater than 0".to_string());
        }

        if self.shuffle_multiplier == 0 {
            return Err("Shuffle multiplier must be greater than 0".to_string());
        }

        if self.shuffle_multiplier.checked_mul(self.batch_size).is_none() {
            return Err("Shuffle window (shuffle_multiplier * batch_size) overflows".to_string());
        }

        // Validate augmentation configuration
        let aug = &self.augmentation;
        if !(aug.min_area > 0.0 && aug.min_area <= aug.max_area && aug.max_area <= 1.0) {
            return Err("Crop area range must satisfy 0 < min <= max <= 1".to_string());
        }

        if !(aug.min_aspect > 0.0 && aug.min_aspect <= aug.max_aspect) {
            return Err("Crop aspect range must satisfy 0 < min <= max".to_string());
        }

        if aug.max_attempts == 0 {
            return Err("Crop attempts must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&aug.flip_probability) {
            return Err("Flip probability must be between 0 and 1".to_string());
        }

        // Validate data configuration
        if !(0.0..1.0).contains(&self.data.validation_fraction) {
            return Err("Validation fraction must be in [0, 1)".to_string());
        }

        if self.data.num_classes == 0 {
            return Err("Number of classes must be greater than 0".to_string());
        }

        if let Some(root) = &self.data.root {
            if !Path::new(root).is_dir() {
                return Err("Data root does not exist".to_string());
            }
        }

        // Validate system configuration
        if self.system.num_workers == 0 {
            return Err("Number of workers must be greater than 0".to_string());
        }

        if !LOG_LEVELS.contains(&self.system.log_level.to_ascii_lowercase().as_str()) {
            return Err(format!("Invalid log level: {}", self.system.log_level));
        }

        Ok(())
    }

    /// Takes every value of `other` that differs from the defaults.
    pub fn merge(&mut self, other: &Configuration) {
        let defaults = Configuration::default();

        if other.batch_size != defaults.batch_size {
            self.batch_size = other.batch_size;
        }
        if other.shuffle_multiplier != defaults.shuffle_multiplier {
            self.shuffle_multiplier = other.shuffle_multiplier;
        }
        if other.augmentation != defaults.augmentation {
            self.augmentation = other.augmentation.clone();
        }
        if other.data.root.is_some() {
            self.data.root = other.data.root.clone();
        }
        if other.data.validation_fraction != defaults.data.validation_fraction {
            self.data.validation_fraction = other.data.validation_fraction;
        }
        if other.data.num_classes != defaults.data.num_classes {
            self.data.num_classes = other.data.num_classes;
        }
        if other.system.num_workers != defaults.system.num_workers {
            self.system.num_workers = other.system.num_workers;
        }
        if other.system.prefetch != defaults.system.prefetch {
            self.system.prefetch = other.system.prefetch;
        }
        if other.system.seed.is_some() {
            self.system.seed = other.system.seed;
        }
        if other.system.log_level != defaults.system.log_level {
            self.system.log_level = other.system.log_level.clone();
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
