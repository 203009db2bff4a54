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
use std::fmt;

#[derive(Debug)]
pub enum PipelineError {
    UnsupportedResolution(u32),
    InvalidShape(String),
    ShapeMismatch(String),
    IndexOutOfBounds,
    IOError(String),
    ImageError(String),
    SerializationError(String),
    InvalidConfiguration(String),
    InvalidParameter(String),
    RuntimeError(String),
}

impl Error for PipelineError {}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PipelineError::UnsupportedResolution(value) => {
                write!(f, "Unsupported resolution: {}", value)
            }
            PipelineError::InvalidShape(msg) => write!(f, "Invalid tensor shape: {}", msg),
            PipelineError::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            PipelineError::IndexOutOfBounds => write!(f, "Index out of bounds"),
            PipelineError::IOError(err) => write!(f, "IO error: {}", err),
            PipelineError::ImageError(msg) => write!(f, "Image error: {}", msg),
            PipelineError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            PipelineError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            PipelineError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            PipelineError::RuntimeError(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        PipelineError::IOError(error.to_string())
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(error: image::ImageError) -> Self {
        PipelineError::ImageError(error.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(error: serde_yaml::Error) -> Self {
        PipelineError::SerializationError(error.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::SerializationError(error.to_string())
    }
}
