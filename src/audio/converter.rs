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


//! Audio encoding for submission masters
//!
//! # Encode Strategy
//! Every file is re-encoded, whatever its source format:
//! - EBU R128 loudness normalization via ffmpeg's `loudnorm` filter
//! - Channel remap to the batch layout (`-ac 1` or `-ac 2`)
//! - LAME MP3 at constant bitrate (`-b:a 192k`)
//! - Resample to the required rate (`-ar 44100`)
//!
//! ```text
//! ffmpeg -y -i input.wav -af loudnorm=I=-20:LRA=7:TP=-3 -ac 2 \
//!     -codec:a libmp3lame -b:a 192k -ar 44100 -id3v2_version 3 -vn output.mp3
//! ```
//!
//! `-y` is always passed: outputs left behind by an interrupted run are
//! overwritten on the next one.

use crate::audio::probe::ChannelLayout;
use crate::audio::tool_spawn_error;
use crate::config::LoudnessTarget;
use crate::error::{MasteringError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

/// Conversion progress callback type (0.0 - 1.0)
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Stderr lines kept for the failure diagnostic
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Splits ffmpeg's stderr into lines
///
/// Stats lines (`size=... time=...`) end in `\r`, so both `\r` and `\n`
/// terminate a line. Tag values are echoed as raw bytes and are decoded
/// lossily.
#[derive(Debug, Default)]
struct StderrLines {
    pending: Vec<u8>,
}

impl StderrLines {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.flush_into(&mut lines);
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    fn finish(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        self.flush_into(&mut lines);
        lines
    }

    fn flush_into(&mut self, lines: &mut Vec<String>) {
        if !self.pending.is_empty() {
            lines.push(String::from_utf8_lossy(&self.pending).into_owned());
            self.pending.clear();
        }
    }
}

/// Everything the encoder needs to produce one submission file
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeDirective {
    pub loudness: LoudnessTarget,
    pub channels: ChannelLayout,
    /// Constant bitrate in kbps
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    /// Source duration, used only for progress reporting
    pub expected_duration_seconds: Option<f64>,
}

/// Media encoder capability
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Encode `input` into `output`; a non-zero exit is `ConversionFailed`
    async fn encode(&self, input: &Path, output: &Path, directive: &EncodeDirective) -> Result<()>;
}

/// ffmpeg/LAME backed encoder
#[derive(Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    progress: Option<ProgressCallback>,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            progress: None,
        }
    }

    /// Report per-file progress parsed from ffmpeg's stderr
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Verify ffmpeg can be executed (`ffmpeg -version`)
    pub async fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.ffmpeg)
            .arg("-version")
            .output()
            .await
            .map_err(|e| tool_spawn_error(e, "ffmpeg"))?;

        if !output.status.success() {
            return Err(MasteringError::FfmpegError(format!(
                "ffmpeg -version exited with status: {}",
                output.status
            )));
        }
        Ok(())
    }

    /// Build ffmpeg arguments for one encode
    fn build_ffmpeg_args(input: &Path, output: &Path, directive: &EncodeDirective) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-af".to_string(),
            directive.loudness.filter_spec(),
            "-ac".to_string(),
            directive.channels.channel_count().to_string(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            format!("{}k", directive.bitrate_kbps),
            "-ar".to_string(),
            directive.sample_rate_hz.to_string(),
            // ID3v2 version for better compatibility
            "-id3v2_version".to_string(),
            "3".to_string(),
            "-vn".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Run ffmpeg, streaming stderr for progress and keeping its tail
    async fn execute_conversion(
        &self,
        input: &Path,
        args: &[String],
        total_duration: Option<f64>,
    ) -> Result<()> {
        debug!(ffmpeg = %self.ffmpeg.display(), ?args, "Running encoder");

        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| tool_spawn_error(e, "ffmpeg"))?;

        let mut stderr = child.stderr.take().ok_or_else(|| {
            MasteringError::FfmpegError("Failed to capture ffmpeg stderr".to_string())
        })?;

        let mut splitter = StderrLines::default();
        let mut chunk = [0u8; 4096];
        let mut tail: Vec<String> = Vec::with_capacity(DIAGNOSTIC_TAIL_LINES);
        let mut last_progress = 0.0f32;

        let mut on_line = |line: String| {
            if let (Some(callback), Some(total)) = (&self.progress, total_duration) {
                if let Some(progress) = Self::parse_ffmpeg_progress(&line, total) {
                    // Update every 1%
                    if (progress - last_progress).abs() > 0.01 {
                        last_progress = progress;
                        callback(progress);
                    }
                }
            }
            if tail.len() == DIAGNOSTIC_TAIL_LINES {
                tail.remove(0);
            }
            tail.push(line);
        };

        let read_result = loop {
            match stderr.read(&mut chunk).await {
                Ok(0) => break Ok(()),
                Ok(n) => splitter.push(&chunk[..n]).into_iter().for_each(&mut on_line),
                Err(e) => break Err(e),
            }
        };
        splitter.finish().into_iter().for_each(&mut on_line);

        if let Err(e) = read_result {
            if let Err(kill_err) = child.kill().await {
                debug!("Could not stop ffmpeg: {}", kill_err);
            }
            return Err(MasteringError::conversion_failed(
                input,
                format!("Failed to read ffmpeg output: {}", e),
            ));
        }

        let status = child.wait().await.map_err(|e| {
            MasteringError::conversion_failed(input, format!("FFmpeg process failed: {}", e))
        })?;

        if !status.success() {
            return Err(MasteringError::conversion_failed(
                input,
                format!("FFmpeg exited with status: {}\n{}", status, tail.join("\n")),
            ));
        }

        if let Some(callback) = &self.progress {
            callback(1.0);
        }

        Ok(())
    }

    /// Parse FFmpeg progress from stderr line
    ///
    /// FFmpeg outputs: "time=00:01:23.45 bitrate=64.0kbits/s"
    fn parse_ffmpeg_progress(line: &str, total_duration: f64) -> Option<f32> {
        let time_start = line.find("time=")?;
        let time_str = &line[time_start + 5..];
        let time_end = time_str.find(' ').unwrap_or(time_str.len());
        let elapsed_seconds = Self::parse_timestamp(&time_str[..time_end])?;

        if total_duration > 0.0 {
            Some((elapsed_seconds / total_duration).min(1.0) as f32)
        } else {
            None
        }
    }

    /// Parse timestamp in format HH:MM:SS.ss to seconds
    fn parse_timestamp(timestamp: &str) -> Option<f64> {
        let parts: Vec<&str> = timestamp.split(':').collect();
        if parts.len() == 3 {
            let hours: f64 = parts[0].parse().ok()?;
            let minutes: f64 = parts[1].parse().ok()?;
            let seconds: f64 = parts[2].parse().ok()?;
            Some(hours * 3600.0 + minutes * 60.0 + seconds)
        } else {
            None
        }
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn encode(&self, input: &Path, output: &Path, directive: &EncodeDirective) -> Result<()> {
        if !input.exists() {
            return Err(MasteringError::conversion_failed(
                input,
                "Input file does not exist",
            ));
        }

        let args = Self::build_ffmpeg_args(input, output, directive);
        self.execute_conversion(input, &args, directive.expected_duration_seconds)
            .await?;

        if !output.exists() {
            return Err(MasteringError::conversion_failed(
                input,
                "Output file was not created",
            ));
        }

        Ok(())
    }
}
