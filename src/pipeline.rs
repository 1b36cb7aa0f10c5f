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


//! Analyze, remediate, re-analyze
//!
//! # States
//! ```text
//! Discover -> AnalyzePass1 -> EstablishChannelPolicy -> RemediateAll
//!          -> AnalyzePass2 -> Report -> Done
//! ```
//!
//! - `AnalyzePass1` probes every discovered file.
//! - `EstablishChannelPolicy` fixes the layout from the first record and
//!   evaluates the pass-1 records against it.
//! - `RemediateAll` encodes every non-compliant file; an encode failure skips
//!   that file only.
//! - `AnalyzePass2` probes and evaluates the remediated outputs with the same
//!   policy. Files compliant in pass 1 carry their pass-1 analysis over.
//!
//! An empty directory goes straight to `Done` without error. An output
//! directory that resolves to the input directory is rejected before any
//! file is touched. Two sources with the same stem (`01.mp3`, `01.wav`)
//! would share one output; the later one is skipped as a failure.

use crate::audio::converter::MediaEncoder;
use crate::audio::metadata::{MetadataProfile, MetadataTagger};
use crate::audio::probe::MediaProber;
use crate::compliance::{
    AudioFileRecord, BatchSummary, ChannelPolicy, ComplianceEngine, FileAnalysis,
};
use crate::config::Config;
use crate::error::{MasteringError, Result};
use crate::file::{discover, output_path_for, same_path, Discovery};
use crate::remediation::{RemediatedFile, RemediationFailure, Remediator};
use crate::report::{write_reports, ReportPaths};
use chrono::Local;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Discover,
    AnalyzePass1,
    EstablishChannelPolicy,
    RemediateAll,
    AnalyzePass2,
    Report,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PipelineState::Discover => "discover",
            PipelineState::AnalyzePass1 => "analyze (pass 1)",
            PipelineState::EstablishChannelPolicy => "establish channel policy",
            PipelineState::RemediateAll => "remediate",
            PipelineState::AnalyzePass2 => "analyze (pass 2)",
            PipelineState::Report => "report",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Which analysis pass an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisPass {
    Initial,
    Final,
}

/// Progress notifications for front ends
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StateChanged(PipelineState),
    Discovered(Discovery),
    NoAudioFiles(PathBuf),
    /// A file is about to be probed (`index` is zero-based)
    Probing {
        pass: AnalysisPass,
        index: usize,
        total: usize,
        file: String,
    },
    PolicyEstablished(ChannelPolicy),
    /// A file is about to be remediated (`index` is zero-based)
    Remediating {
        index: usize,
        total: usize,
        file: String,
    },
    Remediated(RemediatedFile),
    RemediationFailed(RemediationFailure),
    PassCompleted {
        pass: AnalysisPass,
        summary: BatchSummary,
        analyses: Vec<FileAnalysis>,
    },
    ReportsWritten(ReportPaths),
}

/// Event callback type
pub type EventCallback = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Everything one run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutcome {
    pub output_dir: PathBuf,
    pub discovery: Discovery,
    pub policy: Option<ChannelPolicy>,
    pub initial: Vec<FileAnalysis>,
    pub remediated: Vec<RemediatedFile>,
    pub failures: Vec<RemediationFailure>,
    pub final_analyses: Vec<FileAnalysis>,
    pub reports: Option<ReportPaths>,
}

impl PipelineOutcome {
    pub fn is_empty(&self) -> bool {
        self.discovery.is_empty()
    }

    pub fn initial_summary(&self) -> BatchSummary {
        BatchSummary::summarize(&self.initial)
    }

    /// Pass-2 summary, with failed remediations in `failed`
    pub fn final_summary(&self) -> BatchSummary {
        BatchSummary::summarize(&self.final_analyses).with_failures(self.failed_names())
    }

    fn failed_names(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.file_name()).collect()
    }
}

pub struct Pipeline {
    prober: Arc<dyn MediaProber>,
    engine: ComplianceEngine,
    remediator: Remediator,
    profile: MetadataProfile,
    events: Option<EventCallback>,
}

impl Pipeline {
    /// Build a pipeline; fails if the requirement set is invalid
    pub fn new(
        config: &Config,
        prober: Arc<dyn MediaProber>,
        encoder: Arc<dyn MediaEncoder>,
        tagger: Arc<dyn MetadataTagger>,
    ) -> Result<Self> {
        let engine = ComplianceEngine::new(config.requirements.clone())?;
        let remediator = Remediator::new(
            encoder,
            tagger,
            config.requirements.clone(),
            config.loudness,
            config.metadata.clone(),
        );
        Ok(Self {
            prober,
            engine,
            remediator,
            profile: config.metadata.clone(),
            events: None,
        })
    }

    pub fn with_events(mut self, callback: EventCallback) -> Self {
        self.events = Some(callback);
        self
    }

    pub fn engine(&self) -> &ComplianceEngine {
        &self.engine
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(callback) = &self.events {
            callback(&event);
        }
    }

    fn enter(&self, state: PipelineState) {
        debug!("Pipeline state: {}", state);
        self.emit(PipelineEvent::StateChanged(state));
    }

    /// Run every stage against `input_dir`, writing masters to `output_dir`
    pub async fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<PipelineOutcome> {
        let mut outcome = PipelineOutcome {
            output_dir: output_dir.to_path_buf(),
            ..Default::default()
        };

        self.enter(PipelineState::Discover);
        outcome.discovery = discover(input_dir).await?;
        if outcome.discovery.is_empty() {
            info!("No MP3 or WAV files found in {}", input_dir.display());
            self.emit(PipelineEvent::NoAudioFiles(input_dir.to_path_buf()));
            self.enter(PipelineState::Done);
            return Ok(outcome);
        }
        info!(
            "Found {} MP3 files and {} WAV files",
            outcome.discovery.mp3_count, outcome.discovery.wav_count
        );
        self.emit(PipelineEvent::Discovered(outcome.discovery.clone()));

        if same_path(input_dir, output_dir).await {
            return Err(MasteringError::OutputIsInput(output_dir.to_path_buf()));
        }

        self.enter(PipelineState::AnalyzePass1);
        let records = self
            .probe_all(&outcome.discovery.files, AnalysisPass::Initial)
            .await?;

        self.enter(PipelineState::EstablishChannelPolicy);
        let policy = match ChannelPolicy::establish(&records, self.prober.as_ref()).await {
            Some(policy) => policy,
            None => {
                self.enter(PipelineState::Done);
                return Ok(outcome);
            }
        };
        self.emit(PipelineEvent::PolicyEstablished(policy.clone()));
        outcome.initial = self.evaluate_all(records, &policy);
        outcome.policy = Some(policy.clone());
        self.emit(PipelineEvent::PassCompleted {
            pass: AnalysisPass::Initial,
            summary: outcome.initial_summary(),
            analyses: outcome.initial.clone(),
        });

        self.enter(PipelineState::RemediateAll);
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| MasteringError::file_io("create_dir", output_dir, e))?;
        info!("Output directory: {}", output_dir.display());

        let pending: Vec<&FileAnalysis> = outcome
            .initial
            .iter()
            .filter(|a| !a.report.is_compliant())
            .collect();
        let total = pending.len();
        let mut remediated = Vec::new();
        let mut failures = Vec::new();
        // output path -> source that produced it
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
        for (index, analysis) in pending.into_iter().enumerate() {
            self.emit(PipelineEvent::Remediating {
                index,
                total,
                file: analysis.record.file_name(),
            });

            let output = output_path_for(&analysis.record.path, output_dir);
            if let Some(owner) = claimed.get(&output) {
                let owner_name = owner
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                warn!(
                    "Skipping {}: {} was already written from {}",
                    analysis.record.file_name(),
                    output.display(),
                    owner_name
                );
                let failure = RemediationFailure {
                    source: analysis.record.path.clone(),
                    message: format!(
                        "Output name is already used by {}. Rename one of the files and run again.",
                        owner_name
                    ),
                };
                self.emit(PipelineEvent::RemediationFailed(failure.clone()));
                failures.push(failure);
                continue;
            }

            match self
                .remediator
                .remediate(&analysis.record, &policy, output_dir)
                .await
            {
                Ok(file) => {
                    claimed.insert(file.output.clone(), file.source.clone());
                    self.emit(PipelineEvent::Remediated(file.clone()));
                    remediated.push(file);
                }
                Err(e) if e.is_file_scoped() => {
                    warn!("{}", e);
                    let failure = RemediationFailure {
                        source: analysis.record.path.clone(),
                        message: e.user_message(),
                    };
                    self.emit(PipelineEvent::RemediationFailed(failure.clone()));
                    failures.push(failure);
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            "Processed {} files to: {}",
            remediated.len(),
            output_dir.display()
        );
        outcome.remediated = remediated;
        outcome.failures = failures;

        self.enter(PipelineState::AnalyzePass2);
        outcome.final_analyses = self.reanalyze(&outcome, &policy).await?;
        self.emit(PipelineEvent::PassCompleted {
            pass: AnalysisPass::Final,
            summary: outcome.final_summary(),
            analyses: outcome.final_analyses.clone(),
        });

        self.enter(PipelineState::Report);
        let reports = write_reports(
            output_dir,
            &outcome.final_analyses,
            &outcome.failures,
            &self.profile,
            self.engine.requirements(),
            Local::now().naive_local(),
        )
        .await?;
        self.emit(PipelineEvent::ReportsWritten(reports.clone()));
        outcome.reports = Some(reports);

        self.enter(PipelineState::Done);
        Ok(outcome)
    }

    async fn probe_all(&self, files: &[PathBuf], pass: AnalysisPass) -> Result<Vec<AudioFileRecord>> {
        let total = files.len();
        let mut records = Vec::with_capacity(total);
        for (index, path) in files.iter().enumerate() {
            self.emit(PipelineEvent::Probing {
                pass,
                index,
                total,
                file: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            });
            records.push(AudioFileRecord::probe(path, self.prober.as_ref()).await?);
        }
        Ok(records)
    }

    fn evaluate_all(&self, records: Vec<AudioFileRecord>, policy: &ChannelPolicy) -> Vec<FileAnalysis> {
        records
            .into_iter()
            .map(|record| {
                let report = self.engine.evaluate(&record, Some(policy));
                FileAnalysis { record, report }
            })
            .collect()
    }

    /// Pass 2 in discovery order: fresh records for remediated outputs,
    /// pass-1 analyses for files that needed nothing
    async fn reanalyze(
        &self,
        outcome: &PipelineOutcome,
        policy: &ChannelPolicy,
    ) -> Result<Vec<FileAnalysis>> {
        let outputs: Vec<PathBuf> = outcome.remediated.iter().map(|r| r.output.clone()).collect();
        let mut fresh = self
            .evaluate_all(self.probe_all(&outputs, AnalysisPass::Final).await?, policy)
            .into_iter();

        let mut analyses = Vec::with_capacity(outcome.initial.len());
        for initial in &outcome.initial {
            if initial.report.is_compliant() {
                analyses.push(initial.clone());
                continue;
            }
            let was_remediated = outcome
                .remediated
                .iter()
                .any(|r| r.source == initial.record.path);
            if was_remediated {
                if let Some(analysis) = fresh.next() {
                    analyses.push(analysis);
                }
            }
        }
        Ok(analyses)
    }
}
