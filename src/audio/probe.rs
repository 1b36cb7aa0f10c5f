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


//! Format detection and attribute probing
//!
//! # Supported Source Formats
//! - MP3: MPEG Audio Layer 3 (submission format)
//! - WAV: RIFF/WAVE PCM (always converted)
//!
//! # Probe Strategy
//! Every attribute is queried with its own ffprobe call so that one missing
//! field (for example a WAV without `bit_rate`) never hides the others:
//!
//! ```text
//! ffprobe -v error -show_entries format=duration -of json {path}
//! ffprobe -v error -select_streams a:0 -show_entries stream=bit_rate -of json {path}
//! ffprobe -v error -select_streams a:0 -show_entries stream=sample_rate -of json {path}
//! ffprobe -v error -select_streams a:0 -show_entries stream=channels -of json {path}
//! ```
//!
//! Channel count has a second source: the container header as parsed by
//! `lofty`, used when ffprobe cannot answer.

use crate::audio::tool_spawn_error;
use crate::error::{MasteringError, Result};
use async_trait::async_trait;
use lofty::file::AudioFile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// Source container formats accepted for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    /// MP3 - MPEG Audio Layer 3
    Mp3,
    /// WAV - uncompressed PCM in a RIFF container
    Wav,
}

impl AudioFormat {
    /// Detect format from file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get file extension for this format
    pub fn to_extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    /// Uncompressed sources must always be converted before submission
    pub fn is_uncompressed(&self) -> bool {
        matches!(self, Self::Wav)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mp3 => "MP3",
            Self::Wav => "WAV",
        })
    }
}

/// Channel layout of an audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    #[default]
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// Anything above one channel counts as stereo
    pub fn from_channel_count(channels: u32) -> Self {
        if channels > 1 {
            Self::Stereo
        } else {
            Self::Mono
        }
    }

    /// Value for ffmpeg's `-ac`
    pub fn channel_count(&self) -> u32 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mono => "mono",
            Self::Stereo => "stereo",
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media prober capability
///
/// Each attribute is an independent query and may fail on its own.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Container duration in seconds
    async fn duration_seconds(&self, path: &Path) -> Result<f64>;

    /// First audio stream bitrate in bits per second
    async fn bitrate_bps(&self, path: &Path) -> Result<u64>;

    /// First audio stream sample rate in Hz
    async fn sample_rate_hz(&self, path: &Path) -> Result<u32>;

    /// First audio stream channel count
    async fn channel_count(&self, path: &Path) -> Result<u32>;

    /// Secondary channel source, consulted when `channel_count` fails
    async fn fallback_channel_count(&self, path: &Path) -> Result<u32> {
        Err(MasteringError::probe_failed(
            path,
            "channels",
            "no fallback source available",
        ))
    }
}

/// Resolve a channel layout: primary probe, then fallback, then mono
pub async fn probe_channel_layout(prober: &dyn MediaProber, path: &Path) -> ChannelLayout {
    match prober.channel_count(path).await {
        Ok(channels) => ChannelLayout::from_channel_count(channels),
        Err(primary) => {
            debug!(error = %primary, "Primary channel probe failed, trying fallback");
            match prober.fallback_channel_count(path).await {
                Ok(channels) => ChannelLayout::from_channel_count(channels),
                Err(e) => {
                    warn!(
                        "Could not determine channel format for {}: {}",
                        path.display(),
                        e
                    );
                    ChannelLayout::Mono
                }
            }
        }
    }
}

/// FFprobe JSON output structures
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    bit_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

/// ffprobe-backed prober with lofty as the fallback channel source
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe: PathBuf,
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProber {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }

    /// Verify ffprobe can be executed (`ffprobe -version`)
    pub async fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.ffprobe)
            .arg("-version")
            .output()
            .await
            .map_err(|e| tool_spawn_error(e, "ffprobe"))?;

        if !output.status.success() {
            return Err(MasteringError::FfmpegError(format!(
                "ffprobe -version exited with status: {}",
                output.status
            )));
        }
        Ok(())
    }

    /// Execute one ffprobe query and decode its JSON output
    async fn query(
        &self,
        path: &Path,
        attribute: &'static str,
        entry: &str,
        audio_stream_only: bool,
    ) -> Result<FfprobeOutput> {
        let mut command = Command::new(&self.ffprobe);
        command.arg("-v").arg("error");
        if audio_stream_only {
            command.arg("-select_streams").arg("a:0");
        }
        let output = command
            .arg("-show_entries")
            .arg(entry)
            .arg("-of")
            .arg("json")
            .arg(path.as_os_str())
            .output()
            .await
            .map_err(|e| tool_spawn_error(e, "ffprobe"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MasteringError::probe_failed(path, attribute, stderr.trim()));
        }

        Self::parse_output(&output.stdout)
            .map_err(|e| MasteringError::probe_failed(path, attribute, e.to_string()))
    }

    fn parse_output(stdout: &[u8]) -> Result<FfprobeOutput> {
        Ok(serde_json::from_slice(stdout)?)
    }

    fn first_stream<'a>(
        probe: &'a FfprobeOutput,
        path: &Path,
        attribute: &'static str,
    ) -> Result<&'a FfprobeStream> {
        probe
            .streams
            .first()
            .ok_or_else(|| MasteringError::probe_failed(path, attribute, "no audio stream"))
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn duration_seconds(&self, path: &Path) -> Result<f64> {
        let probe = self.query(path, "duration", "format=duration", false).await?;
        probe
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.trim().parse::<f64>().ok())
            .ok_or_else(|| MasteringError::probe_failed(path, "duration", "no duration reported"))
    }

    async fn bitrate_bps(&self, path: &Path) -> Result<u64> {
        let probe = self.query(path, "bitrate", "stream=bit_rate", true).await?;
        Self::first_stream(&probe, path, "bitrate")?
            .bit_rate
            .as_deref()
            .and_then(|b| b.trim().parse::<u64>().ok())
            .ok_or_else(|| MasteringError::probe_failed(path, "bitrate", "no bit_rate reported"))
    }

    async fn sample_rate_hz(&self, path: &Path) -> Result<u32> {
        let probe = self
            .query(path, "sample rate", "stream=sample_rate", true)
            .await?;
        Self::first_stream(&probe, path, "sample rate")?
            .sample_rate
            .as_deref()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                MasteringError::probe_failed(path, "sample rate", "no sample_rate reported")
            })
    }

    async fn channel_count(&self, path: &Path) -> Result<u32> {
        let probe = self.query(path, "channels", "stream=channels", true).await?;
        Self::first_stream(&probe, path, "channels")?
            .channels
            .ok_or_else(|| MasteringError::probe_failed(path, "channels", "no channels reported"))
    }

    async fn fallback_channel_count(&self, path: &Path) -> Result<u32> {
        let owned = path.to_path_buf();
        let channels = tokio::task::spawn_blocking(move || {
            lofty::read_from_path(&owned).map(|tagged| tagged.properties().channels())
        })
        .await
        .map_err(|e| MasteringError::probe_failed(path, "channels", e.to_string()))?
        .map_err(|e| MasteringError::probe_failed(path, "channels", e.to_string()))?;

        channels
            .map(u32::from)
            .ok_or_else(|| MasteringError::probe_failed(path, "channels", "header has no channel count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("mp3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("wav"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_extension("Wav"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_extension("m4b"), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            AudioFormat::from_path(Path::new("/books/01_Chapter_1.WAV")),
            Some(AudioFormat::Wav)
        );
        assert_eq!(AudioFormat::from_path(Path::new("/books/cover.jpg")), None);
        assert_eq!(AudioFormat::from_path(Path::new("/books/README")), None);
    }

    #[test]
    fn test_channel_layout_from_count() {
        assert_eq!(ChannelLayout::from_channel_count(0), ChannelLayout::Mono);
        assert_eq!(ChannelLayout::from_channel_count(1), ChannelLayout::Mono);
        assert_eq!(ChannelLayout::from_channel_count(2), ChannelLayout::Stereo);
        assert_eq!(ChannelLayout::from_channel_count(6), ChannelLayout::Stereo);
        assert_eq!(ChannelLayout::Stereo.channel_count(), 2);
        assert_eq!(ChannelLayout::Mono.to_string(), "mono");
    }

    #[test]
    fn test_parse_stream_output() {
        let json = br#"{"programs": [], "streams": [{"bit_rate": "192000", "sample_rate": "44100", "channels": 2}]}"#;
        let probe = FfprobeProber::parse_output(json).unwrap();
        let stream = &probe.streams[0];
        assert_eq!(stream.bit_rate.as_deref(), Some("192000"));
        assert_eq!(stream.sample_rate.as_deref(), Some("44100"));
        assert_eq!(stream.channels, Some(2));
        assert!(probe.format.is_none());
    }

    #[test]
    fn test_parse_format_output() {
        let json = br#"{"format": {"duration": "612.480000"}}"#;
        let probe = FfprobeProber::parse_output(json).unwrap();
        assert_eq!(
            probe.format.and_then(|f| f.duration).as_deref(),
            Some("612.480000")
        );
        assert!(probe.streams.is_empty());
    }

    #[test]
    fn test_parse_garbage_output() {
        assert!(FfprobeProber::parse_output(b"N/A").is_err());
    }

    struct FailingPrimary {
        fallback: Option<u32>,
    }

    #[async_trait]
    impl MediaProber for FailingPrimary {
        async fn duration_seconds(&self, path: &Path) -> Result<f64> {
            Err(MasteringError::probe_failed(path, "duration", "unreadable"))
        }
        async fn bitrate_bps(&self, path: &Path) -> Result<u64> {
            Err(MasteringError::probe_failed(path, "bitrate", "unreadable"))
        }
        async fn sample_rate_hz(&self, path: &Path) -> Result<u32> {
            Err(MasteringError::probe_failed(path, "sample rate", "unreadable"))
        }
        async fn channel_count(&self, path: &Path) -> Result<u32> {
            Err(MasteringError::probe_failed(path, "channels", "unreadable"))
        }
        async fn fallback_channel_count(&self, path: &Path) -> Result<u32> {
            self.fallback
                .ok_or_else(|| MasteringError::probe_failed(path, "channels", "no header"))
        }
    }

    #[tokio::test]
    async fn test_channel_layout_uses_fallback() {
        let prober = FailingPrimary { fallback: Some(2) };
        let layout = probe_channel_layout(&prober, Path::new("a.mp3")).await;
        assert_eq!(layout, ChannelLayout::Stereo);
    }

    #[tokio::test]
    async fn test_channel_layout_defaults_to_mono() {
        let prober = FailingPrimary { fallback: None };
        let layout = probe_channel_layout(&prober, Path::new("a.mp3")).await;
        assert_eq!(layout, ChannelLayout::Mono);
    }
}
