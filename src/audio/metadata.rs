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


//! Audiobook metadata tagging
//!
//! # Tag Mapping (ID3v2.3 via ffmpeg `-metadata`)
//! - author -> `artist`
//! - book title -> `album`
//! - track number (leading digits of the filename) -> `track`
//! - year -> `date`
//! - copyright year -> `copyright`
//! - genre -> `genre`
//! - narrator -> `album_artist`
//! - producer -> `producer` (TXXX frame)
//! - audio technician -> `composer`
//! - comment -> `comment`
//!
//! Blank profile fields are skipped. ffmpeg creates the ID3 tag when the
//! file has none.

use crate::audio::tool_spawn_error;
use crate::error::{MasteringError, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;

lazy_static! {
    static ref LEADING_DIGITS: Regex = Regex::new(r"^(\d+)").unwrap();
}

/// Metadata applied uniformly to every file of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataProfile {
    /// Author name
    pub author: Option<String>,
    pub book_title: Option<String>,
    /// Production year
    pub year: Option<String>,
    pub copyright: Option<String>,
    pub genre: Option<String>,
    pub narrator: Option<String>,
    /// Production company
    pub producer: Option<String>,
    pub audio_technician: Option<String>,
    /// Narrator and publisher notes
    pub comment: Option<String>,
}

impl MetadataProfile {
    /// Non-blank fields as (label, value), in display order
    pub fn labelled_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("Author", &self.author),
            ("Book Title", &self.book_title),
            ("Year", &self.year),
            ("Copyright", &self.copyright),
            ("Genre", &self.genre),
            ("Narrator", &self.narrator),
            ("Producer", &self.producer),
            ("Audio Technician", &self.audio_technician),
            ("Comment", &self.comment),
        ]
        .into_iter()
        .filter_map(|(label, value)| Self::present(value).map(|v| (label, v)))
        .collect()
    }

    /// ffmpeg `-metadata` pairs for this profile plus an optional track
    pub fn ffmpeg_tags(&self, track: Option<u32>) -> Vec<(&'static str, String)> {
        let mut tags = Vec::new();
        Self::push_tag(&mut tags, "artist", &self.author);
        Self::push_tag(&mut tags, "album", &self.book_title);
        if let Some(track) = track {
            tags.push(("track", track.to_string()));
        }
        Self::push_tag(&mut tags, "date", &self.year);
        Self::push_tag(&mut tags, "copyright", &self.copyright);
        Self::push_tag(&mut tags, "genre", &self.genre);
        Self::push_tag(&mut tags, "album_artist", &self.narrator);
        Self::push_tag(&mut tags, "producer", &self.producer);
        Self::push_tag(&mut tags, "composer", &self.audio_technician);
        Self::push_tag(&mut tags, "comment", &self.comment);
        tags
    }

    fn push_tag(tags: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
        if let Some(v) = Self::present(value) {
            tags.push((key, v.to_string()));
        }
    }

    /// Overlay every non-blank field of `other` onto this profile
    pub fn merge(&mut self, other: MetadataProfile) {
        let fields = [
            (&mut self.author, other.author),
            (&mut self.book_title, other.book_title),
            (&mut self.year, other.year),
            (&mut self.copyright, other.copyright),
            (&mut self.genre, other.genre),
            (&mut self.narrator, other.narrator),
            (&mut self.producer, other.producer),
            (&mut self.audio_technician, other.audio_technician),
            (&mut self.comment, other.comment),
        ];
        for (target, value) in fields {
            if Self::present(&value).is_some() {
                *target = value;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labelled_fields().is_empty()
    }

    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Track number from the leading digits of a filename ("01_Chapter_1.mp3" -> 1)
///
/// Zero and missing digits yield no track.
pub fn track_number_from_filename(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    LEADING_DIGITS
        .captures(name)
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Metadata tagger capability
#[async_trait]
pub trait MetadataTagger: Send + Sync {
    async fn write_tags(
        &self,
        file: &Path,
        profile: &MetadataProfile,
        track: Option<u32>,
    ) -> Result<()>;
}

/// Tagger that remuxes through ffmpeg with `-codec copy`
#[derive(Debug, Clone)]
pub struct FfmpegTagger {
    ffmpeg: PathBuf,
}

impl Default for FfmpegTagger {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTagger {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    fn build_args(file: &Path, temp_file: &Path, tags: &[(&'static str, String)]) -> Vec<String> {
        let mut cmd = vec![
            "-y".to_string(),
            "-i".to_string(),
            file.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:a".to_string(),
            "-codec".to_string(),
            "copy".to_string(),
            "-id3v2_version".to_string(),
            "3".to_string(),
        ];

        for (key, value) in tags {
            cmd.push("-metadata".to_string());
            cmd.push(format!("{}={}", key, value));
        }

        cmd.push(temp_file.to_string_lossy().to_string());
        cmd
    }
}

#[async_trait]
impl MetadataTagger for FfmpegTagger {
    async fn write_tags(
        &self,
        file: &Path,
        profile: &MetadataProfile,
        track: Option<u32>,
    ) -> Result<()> {
        let tags = profile.ffmpeg_tags(track);
        if tags.is_empty() {
            return Ok(());
        }

        let temp_file = file.with_extension("tagging.mp3");
        let args = Self::build_args(file, &temp_file, &tags);

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .output()
            .await
            .map_err(|e| tool_spawn_error(e, "ffmpeg"))?;

        if !output.status.success() {
            let _ = fs::remove_file(&temp_file).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MasteringError::TagWriteFailed {
                path: file.to_path_buf(),
                message: stderr.trim().to_string(),
            });
        }

        // Replace original with temp file
        fs::rename(&temp_file, file)
            .await
            .map_err(|e| MasteringError::TagWriteFailed {
                path: file.to_path_buf(),
                message: format!("rename: {} - {}", temp_file.display(), e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> MetadataProfile {
        MetadataProfile {
            author: Some("Jane Doe".to_string()),
            book_title: Some("The Long Road".to_string()),
            year: Some("2024".to_string()),
            copyright: None,
            genre: Some("  ".to_string()),
            narrator: Some("John Roe".to_string()),
            producer: Some("Roe Audio".to_string()),
            audio_technician: None,
            comment: Some("Narrated by John Roe".to_string()),
        }
    }

    #[test]
    fn test_track_number_from_filename() {
        assert_eq!(track_number_from_filename(Path::new("/b/01_Chapter_1.mp3")), Some(1));
        assert_eq!(track_number_from_filename(Path::new("12 - Epilogue.mp3")), Some(12));
        assert_eq!(track_number_from_filename(Path::new("Chapter 3.mp3")), None);
        assert_eq!(track_number_from_filename(Path::new("00_Credits.mp3")), None);
    }

    #[test]
    fn test_ffmpeg_tags_skip_blank_fields() {
        let tags = profile().ffmpeg_tags(Some(4));
        let keys: Vec<&str> = tags.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec!["artist", "album", "track", "date", "album_artist", "producer", "comment"]
        );
        assert!(tags.contains(&("track", "4".to_string())));
        assert!(tags.contains(&("album_artist", "John Roe".to_string())));
    }

    #[test]
    fn test_ffmpeg_tags_track_only() {
        let tags = MetadataProfile::default().ffmpeg_tags(Some(7));
        assert_eq!(tags, vec![("track", "7".to_string())]);
        assert!(MetadataProfile::default().ffmpeg_tags(None).is_empty());
    }

    #[test]
    fn test_labelled_fields() {
        let profile = profile();
        let fields = profile.labelled_fields();
        assert_eq!(fields[0], ("Author", "Jane Doe"));
        assert!(!fields.iter().any(|(label, _)| *label == "Genre"));
        assert_eq!(fields.len(), 6);
        assert!(MetadataProfile::default().is_empty());
    }

    #[test]
    fn test_merge_overrides_only_present_fields() {
        let mut base = profile();
        base.merge(MetadataProfile {
            author: Some("A. N. Other".to_string()),
            year: Some("".to_string()),
            ..Default::default()
        });
        assert_eq!(base.author.as_deref(), Some("A. N. Other"));
        assert_eq!(base.year.as_deref(), Some("2024"));
        assert_eq!(base.narrator.as_deref(), Some("John Roe"));
    }

    #[test]
    fn test_build_args() {
        let args = FfmpegTagger::build_args(
            Path::new("/out/01.mp3"),
            Path::new("/out/01.tagging.mp3"),
            &[("artist", "Jane Doe".to_string()), ("track", "1".to_string())],
        );
        assert!(args.windows(2).any(|w| w == ["-codec", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-metadata", "artist=Jane Doe"]));
        assert!(args.windows(2).any(|w| w == ["-metadata", "track=1"]));
        assert_eq!(args.last().unwrap(), "/out/01.tagging.mp3");
    }
}
