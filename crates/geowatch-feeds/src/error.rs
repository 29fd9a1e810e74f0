// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error taxonomy shared by every feed.
//!
//! Fetch failures of any kind are caught at the poller boundary and recorded
//! as the source's last error; they never escape into other sources.

use thiserror::Error;

/// Errors produced while fetching or decoding a feed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Network failure or timeout before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-2xx status.
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Payload could not be parsed into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Payload parsed but is semantically invalid.
    #[error("validation error: {0}")]
    Validation(String),
}

impl FeedError {
    /// Short label used in status displays.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::HttpStatus { .. } => "http",
            Self::Decode(_) => "decode",
            Self::Validation(_) => "validation",
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<std::str::Utf8Error> for FeedError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::Decode(format!("invalid UTF-8: {err}"))
    }
}

/// Errors from the orbital propagator.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum PropagationError {
    #[error("mean motion must be positive, got {0} rev/day")]
    InvalidMeanMotion(f64),

    #[error("eccentricity must be in [0, 1), got {0}")]
    InvalidEccentricity(f64),
}

/// Errors from the settings persistence layer.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings store failure: {0}")]
    Store(String),

    #[error("operation not allowed while settings are {0}")]
    InvalidPhase(&'static str),
}
