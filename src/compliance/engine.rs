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


//! Compliance rule engine
//!
//! # Checks (in issue order)
//! 1. Filename uses only `A-Z a-z 0-9 _ - space`
//! 2. Filename names a chapter/section or carries a number
//! 3. Duration at most `max_duration_minutes`
//! 4. Bitrate at least `min_bitrate_kbps` (0 = unknown, always fails)
//! 5. Sample rate exactly `sample_rate_hz` (0 = unknown, always fails)
//! 6. WAV sources always need conversion
//! 7. Levels are always flagged for normalization
//! 8. Channel layout matches the batch policy
//!
//! Levels (RMS, peak, noise floor, room tone) are not measured here. Every
//! file is flagged and the encoder's `loudnorm` pass brings it into range.

use crate::compliance::policy::ChannelPolicy;
use crate::compliance::record::AudioFileRecord;
use crate::config::RequirementSet;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref STANDARD_FILENAME: Regex = Regex::new(r"^[A-Za-z0-9_\- ]+$").unwrap();
}

/// Words that mark a file as a chapter or section (matched as substrings)
pub const SECTION_MARKERS: [&str; 14] = [
    "chapter",
    "ch",
    "section",
    "part",
    "prologue",
    "epilogue",
    "introduction",
    "foreword",
    "afterword",
    "appendix",
    "credits",
    "acknowledgments",
    "title",
    "dedication",
];

pub const LEVELS_ISSUE: &str = "Audio levels need to be checked and normalized";
pub const WAV_ISSUE: &str = "WAV format needs conversion to MP3";

/// Outcome of evaluating one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    issues: Vec<String>,
}

impl ComplianceReport {
    pub fn from_issues(issues: Vec<String>) -> Self {
        Self { issues }
    }

    /// Issues in detection order
    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn is_compliant(&self) -> bool {
        self.issues.is_empty()
    }
}

/// A record together with its report for one pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAnalysis {
    pub record: AudioFileRecord,
    pub report: ComplianceReport,
}

#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    requirements: RequirementSet,
}

impl ComplianceEngine {
    /// Rejects requirement sets whose RMS window is empty or inverted
    pub fn new(requirements: RequirementSet) -> Result<Self> {
        requirements.validate()?;
        Ok(Self { requirements })
    }

    pub fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    pub fn evaluate(
        &self,
        record: &AudioFileRecord,
        policy: Option<&ChannelPolicy>,
    ) -> ComplianceReport {
        let req = &self.requirements;
        let stem = record.stem();
        let mut issues = Vec::new();

        if !STANDARD_FILENAME.is_match(&stem) {
            issues.push(
                "Filename contains special characters. Use only standard US alphabetical/numeric characters."
                    .to_string(),
            );
        }

        if !Self::has_section_marker(&stem) {
            issues.push(
                "Filename does not appear to include chapter or section information (e.g., 'Chapter 1', 'Prologue')"
                    .to_string(),
            );
        }

        match record.duration_minutes {
            Some(minutes) if minutes > req.max_duration_minutes => issues.push(format!(
                "File duration ({:.2} minutes) exceeds maximum allowed length ({} minutes). \
                 Split longer sections into separate files and include a secondary header for continuity.",
                minutes, req.max_duration_minutes
            )),
            Some(_) => {}
            None => issues.push(format!(
                "File duration could not be determined. Verify it is at most {} minutes.",
                req.max_duration_minutes
            )),
        }

        if record.bitrate_kbps < req.min_bitrate_kbps {
            issues.push(format!(
                "Bitrate is {}kbps, must be at least {}kbps CBR",
                record.bitrate_kbps, req.min_bitrate_kbps
            ));
        }

        if record.sample_rate_hz != req.sample_rate_hz {
            issues.push(format!(
                "Sample rate is {}Hz, must be {}Hz",
                record.sample_rate_hz, req.sample_rate_hz
            ));
        }

        if record.format.is_uncompressed() {
            issues.push(WAV_ISSUE.to_string());
        }

        issues.push(LEVELS_ISSUE.to_string());

        if let Some(policy) = policy {
            if policy.requires_conversion(record.channels) {
                issues.push(format!(
                    "Channel format is {}, channels need conversion to {}",
                    record.channels, policy.target()
                ));
            }
        }

        ComplianceReport::from_issues(issues)
    }

    fn has_section_marker(stem: &str) -> bool {
        let lower = stem.to_lowercase();
        SECTION_MARKERS.iter().any(|marker| lower.contains(marker))
            || stem.chars().any(|c| c.is_ascii_digit())
    }
}
