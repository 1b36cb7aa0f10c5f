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


//! Probed view of one audio file

use crate::audio::probe::{probe_channel_layout, AudioFormat, ChannelLayout, MediaProber};
use crate::error::{MasteringError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Attributes of one file as seen by a single analysis pass
///
/// Records are never updated; a remediated file gets a fresh record.
/// Failed probes are stored as sentinels: `None` duration, 0 bitrate,
/// 0 sample rate, mono.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioFileRecord {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub duration_minutes: Option<f64>,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub channels: ChannelLayout,
}

impl AudioFileRecord {
    /// Probe every attribute independently
    ///
    /// Only an unsupported extension is an error; probe failures degrade.
    pub async fn probe(path: &Path, prober: &dyn MediaProber) -> Result<Self> {
        let format = AudioFormat::from_path(path).ok_or_else(|| {
            MasteringError::UnsupportedAudioFormat(path.display().to_string())
        })?;

        let duration_minutes = match prober.duration_seconds(path).await {
            Ok(seconds) => Some(seconds / 60.0),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

        let bitrate_kbps = match prober.bitrate_bps(path).await {
            Ok(bps) => u32::try_from(bps / 1000).unwrap_or(u32::MAX),
            Err(e) => {
                debug!(error = %e, "Bitrate unavailable, using 0");
                0
            }
        };

        let sample_rate_hz = match prober.sample_rate_hz(path).await {
            Ok(rate) => rate,
            Err(e) => {
                debug!(error = %e, "Sample rate unavailable, using 0");
                0
            }
        };

        let channels = probe_channel_layout(prober, path).await;

        Ok(Self {
            path: path.to_path_buf(),
            format,
            duration_minutes,
            bitrate_kbps,
            sample_rate_hz,
            channels,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Filename without extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}
