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


//! Compliance evaluation
//!
//! Pure decision logic over probed records. Nothing here touches ffmpeg
//! except through the `MediaProber` trait.
//!
//! - `record` - `AudioFileRecord`, the probed view of one file
//! - `engine` - `ComplianceEngine` and its ordered checks
//! - `policy` - batch-wide `ChannelPolicy`
//! - `summary` - `BatchSummary` and `IssueCategory` histogram

pub mod engine;
pub mod policy;
pub mod record;
pub mod summary;

pub use engine::{ComplianceEngine, ComplianceReport, FileAnalysis};
pub use policy::ChannelPolicy;
pub use record::AudioFileRecord;
pub use summary::{BatchSummary, IssueCategory, IssueHistogram};
