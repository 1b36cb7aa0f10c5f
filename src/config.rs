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


//! Run configuration
//!
//! # Requirement Set (Audible/ACX)
//! - RMS between -23 dB and -18 dB
//! - Peak below -3 dB
//! - Noise floor below -60 dB RMS
//! - Room tone under 5 seconds at head and tail
//! - MP3 at 192 kbps CBR or higher, 44.1 kHz
//! - At most 120 minutes per file
//!
//! # Config File
//! Optional TOML file; every table may be omitted:
//!
//! ```toml
//! [requirements]
//! min_bitrate_kbps = 192
//!
//! [loudness]
//! integrated_lufs = -20.0
//!
//! [metadata]
//! author = "Jane Doe"
//! ```

use crate::audio::metadata::MetadataProfile;
use crate::error::{MasteringError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Submission thresholds, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementSet {
    /// Minimum RMS in dB
    pub min_rms_db: f64,
    /// Maximum RMS in dB
    pub max_rms_db: f64,
    /// Maximum peak level in dB
    pub max_peak_db: f64,
    /// Maximum noise floor in dB RMS
    pub max_noise_floor_db: f64,
    /// Maximum room tone at head/tail in seconds
    pub max_room_tone_seconds: f64,
    /// Minimum constant bitrate in kbps
    pub min_bitrate_kbps: u32,
    /// Required sample rate in Hz
    pub sample_rate_hz: u32,
    /// Maximum duration per file in minutes
    pub max_duration_minutes: f64,
}

impl Default for RequirementSet {
    fn default() -> Self {
        Self {
            min_rms_db: -23.0,
            max_rms_db: -18.0,
            max_peak_db: -3.0,
            max_noise_floor_db: -60.0,
            max_room_tone_seconds: 5.0,
            min_bitrate_kbps: 192,
            sample_rate_hz: 44_100,
            max_duration_minutes: 120.0,
        }
    }
}

impl RequirementSet {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_rms_db < self.max_rms_db) {
            return Err(MasteringError::InvalidConfiguration(format!(
                "min_rms_db ({}) must be lower than max_rms_db ({})",
                self.min_rms_db, self.max_rms_db
            )));
        }
        if self.min_bitrate_kbps == 0 {
            return Err(MasteringError::InvalidConfiguration(
                "min_bitrate_kbps must be positive".to_string(),
            ));
        }
        if self.sample_rate_hz == 0 {
            return Err(MasteringError::InvalidConfiguration(
                "sample_rate_hz must be positive".to_string(),
            ));
        }
        if self.max_duration_minutes <= 0.0 {
            return Err(MasteringError::InvalidConfiguration(
                "max_duration_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// EBU R128 normalization target handed to ffmpeg's `loudnorm` filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessTarget {
    /// Integrated loudness in LUFS
    pub integrated_lufs: f64,
    /// Loudness range in LU
    pub loudness_range: f64,
    /// True peak ceiling in dBTP
    pub true_peak_db: f64,
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            integrated_lufs: -20.0,
            loudness_range: 7.0,
            true_peak_db: -3.0,
        }
    }
}

impl LoudnessTarget {
    /// `loudnorm=I=-20:LRA=7:TP=-3`
    pub fn filter_spec(&self) -> String {
        format!(
            "loudnorm=I={}:LRA={}:TP={}",
            self.integrated_lufs, self.loudness_range, self.true_peak_db
        )
    }
}

/// Everything a run needs besides the input directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub requirements: RequirementSet,
    pub loudness: LoudnessTarget,
    pub metadata: MetadataProfile,
    /// Destination for remediated files; defaults to `<dirname>_master`
    pub output_dir: Option<PathBuf>,
    /// Render waveform and loudness images for every processed file
    pub visualize: bool,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.requirements.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MasteringError::file_io("read", path, e))?;
        Self::from_toml_str(&content)
    }
}
