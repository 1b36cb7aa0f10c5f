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


//! Waveform and loudness-meter images for processed files

use crate::audio::tool_spawn_error;
use crate::error::{MasteringError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Subfolder of the output directory holding the images
pub const VISUALIZATION_DIR: &str = "audio_visualizations";

/// Images produced for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visualization {
    pub waveform: PathBuf,
    pub loudness: PathBuf,
}

impl Visualization {
    /// `<dir>/<stem>_waveform.png` and `<dir>/<stem>_loudness.png`
    pub fn paths_for(file: &Path, dir: &Path) -> Self {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        Self {
            waveform: dir.join(format!("{}_waveform.png", stem)),
            loudness: dir.join(format!("{}_loudness.png", stem)),
        }
    }
}

#[async_trait]
pub trait Visualizer: Send + Sync {
    async fn visualize(&self, file: &Path, dir: &Path) -> Result<Visualization>;
}

#[derive(Debug, Clone)]
pub struct FfmpegVisualizer {
    ffmpeg: PathBuf,
    /// Reference level drawn on the loudness meter
    target_lufs: f64,
}

impl FfmpegVisualizer {
    pub fn new(ffmpeg: impl Into<PathBuf>, target_lufs: f64) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            target_lufs,
        }
    }

    fn waveform_args(file: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            file.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            "showwavespic=s=1000x400:colors=#3366FF".to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn loudness_args(&self, file: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            file.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            format!("ebur128=video=1:target={}:meter=18", self.target_lufs),
            "-frames:v".to_string(),
            "1".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    async fn render(&self, file: &Path, args: &[String]) -> Result<()> {
        let output = Command::new(&self.ffmpeg)
            .args(args)
            .output()
            .await
            .map_err(|e| tool_spawn_error(e, "ffmpeg"))?;

        if !output.status.success() {
            return Err(MasteringError::VisualizationFailed {
                path: file.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Visualizer for FfmpegVisualizer {
    async fn visualize(&self, file: &Path, dir: &Path) -> Result<Visualization> {
        if !file.exists() {
            return Err(MasteringError::InvalidPath(format!(
                "File {} does not exist",
                file.display()
            )));
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| MasteringError::file_io("create_dir", dir, e))?;

        let paths = Visualization::paths_for(file, dir);
        self.render(file, &Self::waveform_args(file, &paths.waveform))
            .await?;
        self.render(file, &self.loudness_args(file, &paths.loudness))
            .await?;
        Ok(paths)
    }
}
