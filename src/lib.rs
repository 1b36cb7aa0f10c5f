//! Audiobook Master
//!
//! Checks a directory of audiobook chapter files against the Audible/ACX
//! submission rules, re-encodes every file into a compliant master and
//! checks the masters again.

pub mod audio;
pub mod compliance;
pub mod config;
pub mod error;
pub mod file;
pub mod pipeline;
pub mod prompt;
pub mod remediation;
pub mod report;

pub use audio::{
    ChannelLayout, FfmpegEncoder, FfmpegTagger, FfmpegVisualizer, FfprobeProber, MediaEncoder,
    MediaProber, MetadataProfile, MetadataTagger, Visualizer,
};
pub use compliance::{
    AudioFileRecord, BatchSummary, ChannelPolicy, ComplianceEngine, ComplianceReport,
    FileAnalysis, IssueCategory,
};
pub use config::{Config, LoudnessTarget, RequirementSet};
pub use error::{MasteringError, Result};
pub use pipeline::{Pipeline, PipelineEvent, PipelineOutcome, PipelineState};
pub use remediation::{RemediatedFile, RemediationFailure, Remediator};

/// Crate version, shown in the CLI banner title
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
