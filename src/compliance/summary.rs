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


//! Batch summaries and issue categorization
//!
//! Issues are bucketed by keyword, first matching category wins:
//! audio level, peak, noise floor, room tone, format, duration, filename.
//! An issue matching nothing is not counted.

use crate::compliance::engine::FileAnalysis;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IssueCategory {
    AudioLevel,
    PeakLevel,
    NoiseFloor,
    RoomTone,
    Format,
    Duration,
    Filename,
}

impl IssueCategory {
    /// Classification order
    pub const ALL: [IssueCategory; 7] = [
        IssueCategory::AudioLevel,
        IssueCategory::PeakLevel,
        IssueCategory::NoiseFloor,
        IssueCategory::RoomTone,
        IssueCategory::Format,
        IssueCategory::Duration,
        IssueCategory::Filename,
    ];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            IssueCategory::AudioLevel => &["rms", "volume", "levels", "normalize"],
            IssueCategory::PeakLevel => &["peak"],
            IssueCategory::NoiseFloor => &["noise floor"],
            IssueCategory::RoomTone => &["room tone", "silence"],
            IssueCategory::Format => &["bitrate", "sample rate", "cbr", "channels", "wav"],
            IssueCategory::Duration => &["duration", "minutes"],
            IssueCategory::Filename => &["filename", "chapter"],
        }
    }

    pub fn classify(issue: &str) -> Option<Self> {
        let lower = issue.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.keywords().iter().any(|k| lower.contains(k)))
    }

    pub fn label(&self) -> &'static str {
        match self {
            IssueCategory::AudioLevel => "Audio Level",
            IssueCategory::PeakLevel => "Peak Level",
            IssueCategory::NoiseFloor => "Noise Floor",
            IssueCategory::RoomTone => "Room Tone",
            IssueCategory::Format => "Format",
            IssueCategory::Duration => "Duration",
            IssueCategory::Filename => "Filename",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Issue counts per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueHistogram {
    counts: [usize; 7],
}

impl IssueHistogram {
    pub fn record(&mut self, issue: &str) {
        if let Some(category) = IssueCategory::classify(issue) {
            self.counts[category.index()] += 1;
        }
    }

    pub fn count(&self, category: IssueCategory) -> usize {
        self.counts[category.index()]
    }

    /// Categories with at least one issue, in classification order
    pub fn non_zero(&self) -> Vec<(IssueCategory, usize)> {
        IssueCategory::ALL
            .into_iter()
            .map(|c| (c, self.count(c)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Totals for one analysis pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    /// Files whose remediation failed and were left out of the pass
    pub failed: Vec<String>,
    pub histogram: IssueHistogram,
}

impl BatchSummary {
    pub fn summarize(analyses: &[FileAnalysis]) -> Self {
        let mut summary = Self {
            total: analyses.len(),
            ..Default::default()
        };

        for analysis in analyses {
            if analysis.report.is_compliant() {
                summary.compliant += 1;
            } else {
                summary.non_compliant += 1;
                for issue in analysis.report.issues() {
                    summary.histogram.record(issue);
                }
            }
        }
        summary
    }

    pub fn with_failures(mut self, failed: Vec<String>) -> Self {
        self.failed = failed;
        self
    }
}
