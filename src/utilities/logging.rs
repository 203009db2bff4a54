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
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn parse_level(level: &str) -> Result<Level, PipelineError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(PipelineError::InvalidConfiguration(format!(
            "Invalid log level: {}",
            other
        ))),
    }
}

/// Installs the global fmt subscriber. Returns `false` when one was already installed.
pub fn init(level: &str) -> Result<bool, PipelineError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level)?)
        .with_target(false)
        .finish();
    Ok(tracing::subscriber::set_global_default(subscriber).is_ok())
}
