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


//! Input directory scanner
//!
//! Lists the MP3 and WAV files directly inside a directory (no recursion),
//! matched by case-insensitive extension and sorted by file name.

use crate::audio::probe::AudioFormat;
use crate::error::{MasteringError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Scan results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Discovery {
    /// Audio files in processing order
    pub files: Vec<PathBuf>,
    pub mp3_count: usize,
    pub wav_count: usize,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Scan `directory` for audio files
///
/// An empty result is not an error here; see [`discover_required`].
pub async fn discover(directory: &Path) -> Result<Discovery> {
    let metadata = fs::metadata(directory)
        .await
        .map_err(|_| MasteringError::DirectoryNotFound(directory.to_path_buf()))?;
    if !metadata.is_dir() {
        return Err(MasteringError::DirectoryNotFound(directory.to_path_buf()));
    }

    let mut entries = fs::read_dir(directory).await.map_err(|e| {
        MasteringError::FileIoError(format!(
            "Failed to read directory {}: {}",
            directory.display(),
            e
        ))
    })?;

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        MasteringError::FileIoError(format!(
            "Failed to read directory entry in {}: {}",
            directory.display(),
            e
        ))
    })? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(format) = AudioFormat::from_path(&path) {
            found.push((path, format));
        } else {
            debug!("Skipping non-audio file: {}", path.display());
        }
    }

    found.sort_by(|(a, _), (b, _)| a.file_name().cmp(&b.file_name()));

    let mut discovery = Discovery::default();
    for (path, format) in found {
        match format {
            AudioFormat::Mp3 => discovery.mp3_count += 1,
            AudioFormat::Wav => discovery.wav_count += 1,
        }
        discovery.files.push(path);
    }
    Ok(discovery)
}

/// Like [`discover`], but an empty directory is `NoAudioFiles`
pub async fn discover_required(directory: &Path) -> Result<Discovery> {
    let discovery = discover(directory).await?;
    if discovery.is_empty() {
        return Err(MasteringError::NoAudioFiles(directory.to_path_buf()));
    }
    Ok(discovery)
}
