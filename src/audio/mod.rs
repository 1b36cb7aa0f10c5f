// Audiobook Master - Audible/ACX submission preparation
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! External audio tooling
//!
//! Every collaborator the compliance pipeline talks to is a trait here, with
//! an ffmpeg-backed implementation:
//!
//! ## probe
//! - `MediaProber` / `FfprobeProber` - duration, bitrate, sample rate, channels
//! - `AudioFormat`, `ChannelLayout`
//!
//! ## converter
//! - `MediaEncoder` / `FfmpegEncoder` - loudness-normalized CBR MP3 encode
//! - `EncodeDirective`, `ProgressCallback`
//!
//! ## metadata
//! - `MetadataTagger` / `FfmpegTagger` - ID3 tags from a `MetadataProfile`
//!
//! ## visualize
//! - `Visualizer` / `FfmpegVisualizer` - waveform and loudness-meter images
//!
//! # FFmpeg Integration
//!
//! FFmpeg and FFprobe must be installed and available in PATH (or passed
//! explicitly):
//! - macOS: `brew install ffmpeg`
//! - Linux: `apt-get install ffmpeg` or `yum install ffmpeg`
//! - Windows: Download from https://ffmpeg.org/download.html

pub mod converter;
pub mod metadata;
pub mod probe;
pub mod visualize;

pub use converter::{EncodeDirective, FfmpegEncoder, MediaEncoder, ProgressCallback};
pub use metadata::{track_number_from_filename, FfmpegTagger, MetadataProfile, MetadataTagger};
pub use probe::{AudioFormat, ChannelLayout, FfprobeProber, MediaProber};
pub use visualize::{FfmpegVisualizer, Visualization, Visualizer, VISUALIZATION_DIR};

use crate::error::MasteringError;

/// Map a spawn failure to `FfmpegNotFound` or a generic tool error
pub(crate) fn tool_spawn_error(e: std::io::Error, tool: &str) -> MasteringError {
    if e.kind() == std::io::ErrorKind::NotFound {
        MasteringError::FfmpegNotFound
    } else {
        MasteringError::FfmpegError(format!("Failed to execute {}: {}", tool, e))
    }
}
