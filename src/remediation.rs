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


//! Remediation of one file into a submission master
//!
//! Every file is re-encoded, whether or not pass 1 found it compliant:
//! loudness normalization, channel remap to the batch policy, CBR MP3 and
//! resampling happen in a single encoder run. Tags are written afterwards.

use crate::audio::converter::{EncodeDirective, MediaEncoder};
use crate::audio::metadata::{track_number_from_filename, MetadataProfile, MetadataTagger};
use crate::compliance::{AudioFileRecord, ChannelPolicy};
use crate::config::{LoudnessTarget, RequirementSet};
use crate::error::{MasteringError, Result};
use crate::file::{output_path_for, same_path};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const WAV_FIX: &str = "Converted from WAV to MP3 format";
pub const NORMALIZE_FIX: &str = "Normalized audio levels to meet Audible requirements";

/// A successfully encoded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediatedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Human-readable fixes, in application order
    pub fixes_applied: Vec<String>,
    /// Tagging failure, if any; the encoded output is still valid
    pub tag_error: Option<String>,
}

/// A file skipped because its encode failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationFailure {
    pub source: PathBuf,
    pub message: String,
}

impl RemediationFailure {
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

pub struct Remediator {
    encoder: Arc<dyn MediaEncoder>,
    tagger: Arc<dyn MetadataTagger>,
    requirements: RequirementSet,
    loudness: LoudnessTarget,
    profile: MetadataProfile,
}

impl Remediator {
    pub fn new(
        encoder: Arc<dyn MediaEncoder>,
        tagger: Arc<dyn MetadataTagger>,
        requirements: RequirementSet,
        loudness: LoudnessTarget,
        profile: MetadataProfile,
    ) -> Self {
        Self {
            encoder,
            tagger,
            requirements,
            loudness,
            profile,
        }
    }

    pub fn directive_for(&self, record: &AudioFileRecord, policy: &ChannelPolicy) -> EncodeDirective {
        EncodeDirective {
            loudness: self.loudness,
            channels: policy.target(),
            bitrate_kbps: self.requirements.min_bitrate_kbps,
            sample_rate_hz: self.requirements.sample_rate_hz,
            expected_duration_seconds: record.duration_minutes.map(|m| m * 60.0),
        }
    }

    /// Encode `record` into `destination` and tag the result
    ///
    /// An encoder failure removes any partial output and is returned as-is;
    /// a tagging failure is kept on the result. An output that would land on
    /// the source file is refused before the encoder runs.
    pub async fn remediate(
        &self,
        record: &AudioFileRecord,
        policy: &ChannelPolicy,
        destination: &Path,
    ) -> Result<RemediatedFile> {
        let output = output_path_for(&record.path, destination);
        let directive = self.directive_for(record, policy);

        if same_path(&output, &record.path).await {
            return Err(MasteringError::conversion_failed(
                &record.path,
                "Output would overwrite the source file",
            ));
        }

        info!("Processing {}...", record.file_name());
        debug!(?directive, output = %output.display(), "Encoding");

        if let Err(e) = self.encoder.encode(&record.path, &output, &directive).await {
            if tokio::fs::remove_file(&output).await.is_ok() {
                debug!("Removed partial output {}", output.display());
            }
            return Err(e);
        }

        let mut fixes_applied = Vec::new();
        if record.format.is_uncompressed() {
            fixes_applied.push(WAV_FIX.to_string());
        }
        if policy.requires_conversion(record.channels) {
            fixes_applied.push(format!(
                "Converted from {} to {}",
                record.channels.as_str().to_uppercase(),
                policy.target().as_str().to_uppercase()
            ));
        }
        fixes_applied.push(NORMALIZE_FIX.to_string());

        let track = track_number_from_filename(&record.path);
        let tag_error = match self.tagger.write_tags(&output, &self.profile, track).await {
            Ok(()) => None,
            Err(e) => {
                warn!("{}", e);
                Some(e.to_string())
            }
        };

        Ok(RemediatedFile {
            source: record.path.clone(),
            output,
            fixes_applied,
            tag_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::probe::{AudioFormat, ChannelLayout};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingEncoder {
        directives: Mutex<Vec<EncodeDirective>>,
        fail: bool,
    }

    #[async_trait]
    impl MediaEncoder for RecordingEncoder {
        async fn encode(&self, input: &Path, output: &Path, directive: &EncodeDirective) -> Result<()> {
            self.directives.lock().unwrap().push(directive.clone());
            tokio::fs::write(output, b"partial").await?;
            if self.fail {
                return Err(MasteringError::conversion_failed(input, "Invalid data found"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTagger {
        tracks: Mutex<Vec<Option<u32>>>,
        fail: bool,
    }

    #[async_trait]
    impl MetadataTagger for RecordingTagger {
        async fn write_tags(&self, file: &Path, _profile: &MetadataProfile, track: Option<u32>) -> Result<()> {
            self.tracks.lock().unwrap().push(track);
            if self.fail {
                return Err(MasteringError::TagWriteFailed {
                    path: file.to_path_buf(),
                    message: "read-only".to_string(),
                });
            }
            Ok(())
        }
    }

    fn record(name: &str, format: AudioFormat, channels: ChannelLayout) -> AudioFileRecord {
        AudioFileRecord {
            path: PathBuf::from("/books").join(name),
            format,
            duration_minutes: Some(2.0),
            bitrate_kbps: 128,
            sample_rate_hz: 48_000,
            channels,
        }
    }

    fn remediator(encoder: Arc<RecordingEncoder>, tagger: Arc<RecordingTagger>) -> Remediator {
        Remediator::new(
            encoder,
            tagger,
            RequirementSet::default(),
            LoudnessTarget::default(),
            MetadataProfile::default(),
        )
    }

    #[tokio::test]
    async fn test_wav_to_stereo_fixes() {
        let out = TempDir::new().unwrap();
        let encoder = Arc::new(RecordingEncoder::default());
        let tagger = Arc::new(RecordingTagger::default());
        let remediator = remediator(encoder.clone(), tagger.clone());
        let policy = ChannelPolicy::new(ChannelLayout::Stereo, "/books/00.wav");

        let result = remediator
            .remediate(
                &record("01_Chapter_1.wav", AudioFormat::Wav, ChannelLayout::Mono),
                &policy,
                out.path(),
            )
            .await
            .unwrap();

        assert_eq!(result.output, out.path().join("01_Chapter_1.mp3"));
        assert_eq!(
            result.fixes_applied,
            vec![
                WAV_FIX.to_string(),
                "Converted from MONO to STEREO".to_string(),
                NORMALIZE_FIX.to_string(),
            ]
        );
        assert!(result.tag_error.is_none());

        let directives = encoder.directives.lock().unwrap();
        assert_eq!(directives[0].channels, ChannelLayout::Stereo);
        assert_eq!(directives[0].bitrate_kbps, 192);
        assert_eq!(directives[0].sample_rate_hz, 44_100);
        assert_eq!(directives[0].expected_duration_seconds, Some(120.0));
        assert_eq!(*tagger.tracks.lock().unwrap(), vec![Some(1)]);
    }

    #[tokio::test]
    async fn test_matching_mp3_still_normalized() {
        let out = TempDir::new().unwrap();
        let remediator = remediator(Arc::default(), Arc::default());
        let policy = ChannelPolicy::new(ChannelLayout::Mono, "/books/01.mp3");

        let result = remediator
            .remediate(
                &record("Prologue.mp3", AudioFormat::Mp3, ChannelLayout::Mono),
                &policy,
                out.path(),
            )
            .await
            .unwrap();
        assert_eq!(result.fixes_applied, vec![NORMALIZE_FIX.to_string()]);
    }

    #[tokio::test]
    async fn test_encode_failure_removes_partial_output() {
        let out = TempDir::new().unwrap();
        let encoder = Arc::new(RecordingEncoder {
            fail: true,
            ..Default::default()
        });
        let tagger = Arc::new(RecordingTagger::default());
        let remediator = remediator(encoder, tagger.clone());
        let policy = ChannelPolicy::new(ChannelLayout::Mono, "/books/01.mp3");

        let result = remediator
            .remediate(
                &record("02_Chapter_2.mp3", AudioFormat::Mp3, ChannelLayout::Mono),
                &policy,
                out.path(),
            )
            .await;

        assert!(matches!(result, Err(MasteringError::ConversionFailed { .. })));
        assert!(!out.path().join("02_Chapter_2.mp3").exists());
        assert!(tagger.tracks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tag_failure_keeps_encode() {
        let out = TempDir::new().unwrap();
        let tagger = Arc::new(RecordingTagger {
            fail: true,
            ..Default::default()
        });
        let remediator = remediator(Arc::default(), tagger);
        let policy = ChannelPolicy::new(ChannelLayout::Mono, "/books/01.mp3");

        let result = remediator
            .remediate(
                &record("03_Chapter_3.mp3", AudioFormat::Mp3, ChannelLayout::Stereo),
                &policy,
                out.path(),
            )
            .await
            .unwrap();

        assert!(out.path().join("03_Chapter_3.mp3").exists());
        assert!(result.tag_error.unwrap().contains("read-only"));
        assert!(result
            .fixes_applied
            .contains(&"Converted from STEREO to MONO".to_string()));
    }

    #[tokio::test]
    async fn test_output_onto_source_is_refused() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Prologue.mp3");
        tokio::fs::write(&source, b"original").await.unwrap();

        let encoder = Arc::new(RecordingEncoder {
            fail: true,
            ..Default::default()
        });
        let remediator = remediator(encoder.clone(), Arc::default());
        let policy = ChannelPolicy::new(ChannelLayout::Mono, "/books/01.mp3");
        let mut record = record("Prologue.mp3", AudioFormat::Mp3, ChannelLayout::Mono);
        record.path = source.clone();

        let result = remediator.remediate(&record, &policy, dir.path()).await;

        assert!(matches!(result, Err(MasteringError::ConversionFailed { .. })));
        assert!(encoder.directives.lock().unwrap().is_empty());
        assert_eq!(tokio::fs::read(&source).await.unwrap(), b"original");
    }
}
