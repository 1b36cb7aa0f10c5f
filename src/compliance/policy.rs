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


use crate::audio::probe::{probe_channel_layout, ChannelLayout, MediaProber};
use crate::compliance::record::AudioFileRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Channel layout every file of a batch must share
///
/// Taken from the first discovered file and fixed for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelPolicy {
    target: ChannelLayout,
    source: PathBuf,
}

impl ChannelPolicy {
    pub fn new(target: ChannelLayout, source: impl Into<PathBuf>) -> Self {
        Self {
            target,
            source: source.into(),
        }
    }

    /// Probe the first record's layout; `None` for an empty batch
    pub async fn establish(
        records: &[AudioFileRecord],
        prober: &dyn MediaProber,
    ) -> Option<Self> {
        let first = records.first()?;
        let target = probe_channel_layout(prober, &first.path).await;
        info!(
            "Using {} format based on first file: {}",
            target.as_str().to_uppercase(),
            first.file_name()
        );
        Some(Self::new(target, &first.path))
    }

    pub fn target(&self) -> ChannelLayout {
        self.target
    }

    /// File the layout was taken from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn requires_conversion(&self, layout: ChannelLayout) -> bool {
        layout != self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::probe::AudioFormat;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stereo for files whose name contains "stereo", mono otherwise
    #[derive(Default)]
    struct NameProber {
        channel_queries: AtomicUsize,
    }

    #[async_trait]
    impl MediaProber for NameProber {
        async fn duration_seconds(&self, _path: &Path) -> Result<f64> {
            Ok(60.0)
        }
        async fn bitrate_bps(&self, _path: &Path) -> Result<u64> {
            Ok(192_000)
        }
        async fn sample_rate_hz(&self, _path: &Path) -> Result<u32> {
            Ok(44_100)
        }
        async fn channel_count(&self, path: &Path) -> Result<u32> {
            self.channel_queries.fetch_add(1, Ordering::SeqCst);
            Ok(if path.to_string_lossy().contains("stereo") { 2 } else { 1 })
        }
    }

    fn record(name: &str, channels: ChannelLayout) -> AudioFileRecord {
        AudioFileRecord {
            path: PathBuf::from("/books").join(name),
            format: AudioFormat::Mp3,
            duration_minutes: Some(1.0),
            bitrate_kbps: 192,
            sample_rate_hz: 44_100,
            channels,
        }
    }

    #[tokio::test]
    async fn test_establish_uses_first_record_only() {
        let prober = NameProber::default();
        let records = vec![
            record("01_stereo.mp3", ChannelLayout::Stereo),
            record("02_mono.mp3", ChannelLayout::Mono),
            record("03_mono.mp3", ChannelLayout::Mono),
        ];

        let policy = ChannelPolicy::establish(&records, &prober).await.unwrap();
        assert_eq!(policy.target(), ChannelLayout::Stereo);
        assert_eq!(policy.source(), Path::new("/books/01_stereo.mp3"));
        assert_eq!(prober.channel_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_establish_empty_batch() {
        assert!(ChannelPolicy::establish(&[], &NameProber::default())
            .await
            .is_none());
    }

    #[test]
    fn test_requires_conversion() {
        let policy = ChannelPolicy::new(ChannelLayout::Mono, "/books/01.mp3");
        assert!(policy.requires_conversion(ChannelLayout::Stereo));
        assert!(!policy.requires_conversion(ChannelLayout::Mono));
    }
}
