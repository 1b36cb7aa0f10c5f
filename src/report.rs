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


//! Text reports
//!
//! # Artifacts (written to the output directory)
//! - `audiobook_analysis_report.txt` - totals, metadata used, per-file
//!   properties and issues, failed remediations
//! - `audible_requirements.txt` - the eight submission rules, the run
//!   timestamp and the metadata applied
//!
//! The console pass summary uses the same data through [`PassSummary`].

use crate::audio::metadata::MetadataProfile;
use crate::compliance::{BatchSummary, FileAnalysis};
use crate::config::RequirementSet;
use crate::error::{MasteringError, Result};
use crate::remediation::RemediationFailure;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ANALYSIS_REPORT_FILE: &str = "audiobook_analysis_report.txt";
pub const REQUIREMENTS_FILE: &str = "audible_requirements.txt";

/// Paths of the written report artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPaths {
    pub analysis: PathBuf,
    pub requirements: PathBuf,
}

/// Detailed per-file report
pub struct AnalysisReport<'a> {
    pub analyses: &'a [FileAnalysis],
    pub failures: &'a [RemediationFailure],
    pub profile: &'a MetadataProfile,
    pub requirements: &'a RequirementSet,
}

impl fmt::Display for AnalysisReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let summary = BatchSummary::summarize(self.analyses);

        writeln!(f, "=== Audiobook Analysis Report ===")?;
        writeln!(f)?;
        writeln!(f, "Total files analyzed: {}", summary.total)?;
        writeln!(f, "Compliant files: {}", summary.compliant)?;
        writeln!(f, "Non-compliant files: {}", summary.non_compliant)?;
        if !self.failures.is_empty() {
            writeln!(f, "Failed remediation: {}", self.failures.len())?;
        }
        writeln!(f)?;

        writeln!(f, "=== Metadata Used ===")?;
        for (label, value) in self.profile.labelled_fields() {
            writeln!(f, "{}: {}", label, value)?;
        }

        writeln!(f)?;
        writeln!(f, "=== Individual File Analysis ===")?;
        for analysis in self.analyses {
            let record = &analysis.record;
            writeln!(f)?;
            writeln!(f, "File: {}", record.file_name())?;
            writeln!(
                f,
                "Status: {}",
                if analysis.report.is_compliant() {
                    "Compliant"
                } else {
                    "Non-compliant"
                }
            )?;
            writeln!(f, "Format: {}", record.format)?;
            writeln!(f, "Channels: {}", record.channels)?;
            writeln!(f, "Bitrate: {}kbps", record.bitrate_kbps)?;
            writeln!(f, "Sample Rate: {}Hz", record.sample_rate_hz)?;
            match record.duration_minutes {
                Some(minutes) => writeln!(
                    f,
                    "Duration: {:.2} minutes (max: {} minutes)",
                    minutes, self.requirements.max_duration_minutes
                )?,
                None => writeln!(
                    f,
                    "Duration: unknown (max: {} minutes)",
                    self.requirements.max_duration_minutes
                )?,
            }
            if !analysis.report.is_compliant() {
                writeln!(f, "Issues:")?;
                for issue in analysis.report.issues() {
                    writeln!(f, "  - {}", issue)?;
                }
            }
        }

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Failed Remediation ===")?;
            for failure in self.failures {
                writeln!(f)?;
                writeln!(f, "File: {}", failure.file_name())?;
                writeln!(f, "Reason: {}", failure.message.trim())?;
            }
        }
        Ok(())
    }
}

/// Static submission rules plus the metadata applied
pub struct RequirementsSheet<'a> {
    pub requirements: &'a RequirementSet,
    pub profile: &'a MetadataProfile,
    pub processed_at: NaiveDateTime,
}

impl fmt::Display for RequirementsSheet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let req = self.requirements;
        writeln!(f, "=== Audible Submission Requirements ===")?;
        writeln!(f)?;
        writeln!(
            f,
            "These are the technical requirements for submitting audiobooks to Audible/ACX:"
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "1. RMS Level: Between {}dB and {}dB",
            req.min_rms_db, req.max_rms_db
        )?;
        writeln!(f, "2. Peak Level: Below {}dB", req.max_peak_db)?;
        writeln!(f, "3. Noise Floor: Below {}dB RMS", req.max_noise_floor_db)?;
        writeln!(
            f,
            "4. Room Tone: Less than {} seconds at beginning and end",
            req.max_room_tone_seconds
        )?;
        writeln!(
            f,
            "5. File Format: MP3 at {} kbps or higher CBR, {}kHz",
            req.min_bitrate_kbps,
            f64::from(req.sample_rate_hz) / 1000.0
        )?;
        writeln!(
            f,
            "6. Channel Format: Consistent across all files (all mono or all stereo)"
        )?;
        writeln!(
            f,
            "7. File Duration: Maximum {} minutes per file",
            req.max_duration_minutes
        )?;
        writeln!(
            f,
            "8. File Naming: Include chapter/section information, use only standard characters"
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "Files processed on: {}",
            self.processed_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(f, "Metadata applied:")?;
        for (label, value) in self.profile.labelled_fields() {
            writeln!(f, "- {}: {}", label, value)?;
        }
        Ok(())
    }
}

/// Console summary printed after each analysis pass
pub struct PassSummary<'a> {
    pub analyses: &'a [FileAnalysis],
    pub summary: &'a BatchSummary,
}

impl fmt::Display for PassSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let summary = self.summary;
        writeln!(f, "=== Analysis Summary ===")?;
        writeln!(f, "Total files analyzed: {}", summary.total)?;
        writeln!(f, "Compliant files: {}", summary.compliant)?;
        writeln!(f, "Non-compliant files: {}", summary.non_compliant)?;
        if !summary.failed.is_empty() {
            writeln!(
                f,
                "Failed remediation ({}): {}",
                summary.failed.len(),
                summary.failed.join(", ")
            )?;
        }

        if summary.non_compliant == 0 {
            return Ok(());
        }

        writeln!(f)?;
        writeln!(f, "Common Issues Summary:")?;
        for (category, count) in summary.histogram.non_zero() {
            writeln!(f, "  - {} issues: {}", category, count)?;
        }

        writeln!(f)?;
        write!(f, "Files with issues:")?;
        for analysis in self.analyses.iter().filter(|a| !a.report.is_compliant()) {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "- {}:", analysis.record.file_name())?;
            for issue in analysis.report.issues() {
                writeln!(f)?;
                write!(f, "  * {}", issue)?;
            }
        }
        writeln!(f)
    }
}

pub fn render_analysis_report(
    analyses: &[FileAnalysis],
    failures: &[RemediationFailure],
    profile: &MetadataProfile,
    requirements: &RequirementSet,
) -> String {
    AnalysisReport {
        analyses,
        failures,
        profile,
        requirements,
    }
    .to_string()
}

pub fn render_requirements_sheet(
    requirements: &RequirementSet,
    profile: &MetadataProfile,
    processed_at: NaiveDateTime,
) -> String {
    RequirementsSheet {
        requirements,
        profile,
        processed_at,
    }
    .to_string()
}

pub fn render_pass_summary(analyses: &[FileAnalysis], summary: &BatchSummary) -> String {
    PassSummary { analyses, summary }.to_string()
}

/// Write both report artifacts into `dir`
pub async fn write_reports(
    dir: &Path,
    analyses: &[FileAnalysis],
    failures: &[RemediationFailure],
    profile: &MetadataProfile,
    requirements: &RequirementSet,
    processed_at: NaiveDateTime,
) -> Result<ReportPaths> {
    let paths = ReportPaths {
        analysis: dir.join(ANALYSIS_REPORT_FILE),
        requirements: dir.join(REQUIREMENTS_FILE),
    };

    let analysis = render_analysis_report(analyses, failures, profile, requirements);
    tokio::fs::write(&paths.analysis, analysis)
        .await
        .map_err(|e| MasteringError::file_io("write", &paths.analysis, e))?;
    info!("Detailed analysis report saved to {}", paths.analysis.display());

    let sheet = render_requirements_sheet(requirements, profile, processed_at);
    tokio::fs::write(&paths.requirements, sheet)
        .await
        .map_err(|e| MasteringError::file_io("write", &paths.requirements, e))?;
    info!(
        "Audible requirements guide saved to {}",
        paths.requirements.display()
    );

    Ok(paths)
}
