//! Integration tests for the analyze -> remediate -> re-analyze pipeline
//!
//! ffprobe/ffmpeg are replaced by in-memory fakes: the fake encoder writes a
//! placeholder file and registers the attributes a real encode would give it
//! with the fake prober, so pass 2 sees "encoded" media.

use async_trait::async_trait;
use audiobook_master::audio::converter::EncodeDirective;
use audiobook_master::compliance::engine::{LEVELS_ISSUE, WAV_ISSUE};
use audiobook_master::compliance::IssueCategory;
use audiobook_master::pipeline::AnalysisPass;
use audiobook_master::report::{ANALYSIS_REPORT_FILE, REQUIREMENTS_FILE};
use audiobook_master::{
    ChannelLayout, Config, MasteringError, MediaEncoder, MediaProber, MetadataProfile,
    MetadataTagger, Pipeline, PipelineEvent, PipelineState, Result,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, Default)]
struct Attrs {
    duration_seconds: Option<f64>,
    bitrate_bps: Option<u64>,
    sample_rate_hz: Option<u32>,
    channels: Option<u32>,
}

impl Attrs {
    fn new(duration_minutes: f64, bitrate_kbps: u64, sample_rate_hz: u32, channels: u32) -> Self {
        Self {
            duration_seconds: Some(duration_minutes * 60.0),
            bitrate_bps: Some(bitrate_kbps * 1000),
            sample_rate_hz: Some(sample_rate_hz),
            channels: Some(channels),
        }
    }
}

#[derive(Default)]
struct FakeProber {
    files: Mutex<HashMap<PathBuf, Attrs>>,
}

impl FakeProber {
    fn insert(&self, path: &Path, attrs: Attrs) {
        self.files.lock().unwrap().insert(path.to_path_buf(), attrs);
    }

    fn get(&self, path: &Path) -> Attrs {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or_default()
    }
}

fn missing(path: &Path, attribute: &'static str) -> MasteringError {
    MasteringError::probe_failed(path, attribute, "N/A")
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn duration_seconds(&self, path: &Path) -> Result<f64> {
        self.get(path)
            .duration_seconds
            .ok_or_else(|| missing(path, "duration"))
    }

    async fn bitrate_bps(&self, path: &Path) -> Result<u64> {
        self.get(path)
            .bitrate_bps
            .ok_or_else(|| missing(path, "bitrate"))
    }

    async fn sample_rate_hz(&self, path: &Path) -> Result<u32> {
        self.get(path)
            .sample_rate_hz
            .ok_or_else(|| missing(path, "sample rate"))
    }

    async fn channel_count(&self, path: &Path) -> Result<u32> {
        self.get(path)
            .channels
            .ok_or_else(|| missing(path, "channels"))
    }
}

struct FakeEncoder {
    prober: Arc<FakeProber>,
    fail_stems: Vec<String>,
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    async fn encode(&self, input: &Path, output: &Path, directive: &EncodeDirective) -> Result<()> {
        tokio::fs::write(output, b"ID3").await?;

        let stem = input.file_stem().unwrap().to_string_lossy().to_string();
        if self.fail_stems.contains(&stem) {
            return Err(MasteringError::conversion_failed(
                input,
                "Invalid data found when processing input",
            ));
        }

        let source = self.prober.get(input);
        self.prober.insert(
            output,
            Attrs {
                duration_seconds: source.duration_seconds,
                bitrate_bps: Some(u64::from(directive.bitrate_kbps) * 1000),
                sample_rate_hz: Some(directive.sample_rate_hz),
                channels: Some(directive.channels.channel_count()),
            },
        );
        Ok(())
    }
}

#[derive(Default)]
struct FakeTagger {
    calls: Mutex<Vec<(PathBuf, Option<u32>)>>,
}

#[async_trait]
impl MetadataTagger for FakeTagger {
    async fn write_tags(&self, file: &Path, _profile: &MetadataProfile, track: Option<u32>) -> Result<()> {
        self.calls.lock().unwrap().push((file.to_path_buf(), track));
        Ok(())
    }
}

struct Harness {
    _temp: TempDir,
    input: PathBuf,
    output: PathBuf,
    prober: Arc<FakeProber>,
    tagger: Arc<FakeTagger>,
}

impl Harness {
    async fn new(files: &[(&str, Attrs)]) -> Self {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("long_road");
        tokio::fs::create_dir(&input).await.unwrap();

        let prober = Arc::new(FakeProber::default());
        for (name, attrs) in files {
            let path = input.join(name);
            tokio::fs::write(&path, b"").await.unwrap();
            prober.insert(&path, *attrs);
        }

        Self {
            output: temp.path().join("long_road_master"),
            _temp: temp,
            input,
            prober,
            tagger: Arc::new(FakeTagger::default()),
        }
    }

    fn pipeline(&self, fail_stems: &[&str]) -> Pipeline {
        let encoder = Arc::new(FakeEncoder {
            prober: self.prober.clone(),
            fail_stems: fail_stems.iter().map(|s| s.to_string()).collect(),
        });
        Pipeline::new(
            &Config::default(),
            self.prober.clone(),
            encoder,
            self.tagger.clone(),
        )
        .unwrap()
    }
}

fn has_issue(issues: &[String], needle: &str) -> bool {
    issues.iter().any(|i| i.contains(needle))
}

#[tokio::test]
async fn test_wav_and_mono_mp3_scenario() {
    let harness = Harness::new(&[
        ("01_Chapter_1.wav", Attrs::new(10.0, 128, 48_000, 2)),
        ("02_Chapter_2.mp3", Attrs::new(15.0, 256, 44_100, 1)),
    ])
    .await;

    let outcome = harness
        .pipeline(&[])
        .run(&harness.input, &harness.output)
        .await
        .unwrap();

    let policy = outcome.policy.as_ref().unwrap();
    assert_eq!(policy.target(), ChannelLayout::Stereo);
    assert_eq!(policy.source(), harness.input.join("01_Chapter_1.wav"));

    // Pass 1
    assert_eq!(outcome.initial.len(), 2);
    let first = outcome.initial[0].report.issues();
    assert!(first.contains(&WAV_ISSUE.to_string()));
    assert!(first.contains(&LEVELS_ISSUE.to_string()));
    assert!(!has_issue(first, "Filename"));
    assert!(!has_issue(first, "duration"));
    assert!(!has_issue(first, "Channel format"));

    let second = outcome.initial[1].report.issues();
    assert!(second.contains(&"Channel format is mono, channels need conversion to stereo".to_string()));
    assert!(second.contains(&LEVELS_ISSUE.to_string()));
    assert!(!has_issue(second, "Bitrate"));
    assert!(!has_issue(second, "Sample rate"));
    assert!(outcome.initial.iter().all(|a| !a.report.is_compliant()));

    // Remediation
    assert_eq!(outcome.remediated.len(), 2);
    assert!(outcome.failures.is_empty());
    assert!(harness.output.join("01_Chapter_1.mp3").exists());
    assert!(harness.output.join("02_Chapter_2.mp3").exists());
    assert_eq!(
        outcome.remediated[1].fixes_applied[0],
        "Converted from MONO to STEREO"
    );
    let tracks: Vec<Option<u32>> = harness
        .tagger
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|(_, t)| *t)
        .collect();
    assert_eq!(tracks, vec![Some(1), Some(2)]);

    // Pass 2: only the unconditional normalization flag remains
    assert_eq!(outcome.final_analyses.len(), 2);
    for analysis in &outcome.final_analyses {
        assert_eq!(analysis.record.channels, ChannelLayout::Stereo);
        assert_eq!(analysis.record.bitrate_kbps, 192);
        assert_eq!(analysis.record.sample_rate_hz, 44_100);
        assert_eq!(analysis.report.issues(), [LEVELS_ISSUE.to_string()]);
    }
    let summary = outcome.final_summary();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.non_compliant, 2);
    assert_eq!(summary.histogram.count(IssueCategory::AudioLevel), 2);
    assert_eq!(summary.histogram.total(), 2);

    let reports = outcome.reports.as_ref().unwrap();
    assert_eq!(reports.analysis, harness.output.join(ANALYSIS_REPORT_FILE));
    assert!(harness.output.join(REQUIREMENTS_FILE).exists());
}

#[tokio::test]
async fn test_failed_encode_is_excluded_from_pass_two() {
    let harness = Harness::new(&[
        ("01_Chapter_1.mp3", Attrs::new(5.0, 192, 44_100, 1)),
        ("02_Chapter_2.mp3", Attrs::new(5.0, 192, 44_100, 1)),
        ("03_Chapter_3.mp3", Attrs::new(5.0, 192, 44_100, 1)),
    ])
    .await;

    let outcome = harness
        .pipeline(&["02_Chapter_2"])
        .run(&harness.input, &harness.output)
        .await
        .unwrap();

    assert_eq!(outcome.remediated.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].file_name(), "02_Chapter_2.mp3");
    assert!(outcome.failures[0].message.contains("Invalid data found"));

    assert!(!harness.output.join("02_Chapter_2.mp3").exists());
    let final_names: Vec<String> = outcome
        .final_analyses
        .iter()
        .map(|a| a.record.file_name())
        .collect();
    assert_eq!(final_names, vec!["01_Chapter_1.mp3", "03_Chapter_3.mp3"]);

    let summary = outcome.final_summary();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, vec!["02_Chapter_2.mp3".to_string()]);

    let report = tokio::fs::read_to_string(harness.output.join(ANALYSIS_REPORT_FILE))
        .await
        .unwrap();
    assert!(report.contains("=== Failed Remediation ===\n\nFile: 02_Chapter_2.mp3\n"));
    assert!(!report.contains("File: 02_Chapter_2.mp3\nStatus:"));
}

#[tokio::test]
async fn test_unprobeable_file_degrades_to_sentinels() {
    let harness = Harness::new(&[("track.mp3", Attrs::default())]).await;

    let outcome = harness
        .pipeline(&[])
        .run(&harness.input, &harness.output)
        .await
        .unwrap();

    let analysis = &outcome.initial[0];
    assert_eq!(analysis.record.duration_minutes, None);
    assert_eq!(analysis.record.bitrate_kbps, 0);
    assert_eq!(analysis.record.sample_rate_hz, 0);
    assert_eq!(analysis.record.channels, ChannelLayout::Mono);

    let issues = analysis.report.issues();
    assert!(has_issue(issues, "does not appear to include chapter"));
    assert!(has_issue(issues, "duration could not be determined"));
    assert!(has_issue(issues, "Bitrate is 0kbps"));
    assert!(has_issue(issues, "Sample rate is 0Hz"));
    assert_eq!(outcome.policy.unwrap().target(), ChannelLayout::Mono);
}

#[tokio::test]
async fn test_empty_directory_ends_early() {
    let harness = Harness::new(&[]).await;
    tokio::fs::write(harness.input.join("cover.jpg"), b"")
        .await
        .unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let outcome = harness
        .pipeline(&[])
        .with_events(Arc::new(move |event: &PipelineEvent| {
            sink.lock().unwrap().push(format!("{:?}", event));
        }))
        .run(&harness.input, &harness.output)
        .await
        .unwrap();

    assert!(outcome.is_empty());
    assert!(outcome.reports.is_none());
    assert!(!harness.output.exists());
    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| e.starts_with("NoAudioFiles")));
    assert_eq!(events.last().unwrap(), "StateChanged(Done)");
}

#[tokio::test]
async fn test_missing_directory_is_discovery_error() {
    let harness = Harness::new(&[]).await;
    let result = harness
        .pipeline(&[])
        .run(&harness.input.join("nope"), &harness.output)
        .await;

    match result {
        Err(e) => assert!(e.is_discovery_error()),
        Ok(_) => panic!("expected a discovery error"),
    }
}

#[tokio::test]
async fn test_state_sequence_and_progress_events() {
    let harness = Harness::new(&[
        ("01_Chapter_1.mp3", Attrs::new(5.0, 192, 44_100, 2)),
        ("02_Chapter_2.mp3", Attrs::new(5.0, 192, 44_100, 2)),
    ])
    .await;

    let states = Arc::new(Mutex::new(Vec::new()));
    let probes = Arc::new(Mutex::new(Vec::new()));
    let (state_sink, probe_sink) = (states.clone(), probes.clone());

    harness
        .pipeline(&[])
        .with_events(Arc::new(move |event: &PipelineEvent| match event {
            PipelineEvent::StateChanged(state) => state_sink.lock().unwrap().push(*state),
            PipelineEvent::Probing { pass, index, total, .. } => {
                probe_sink.lock().unwrap().push((*pass, *index, *total))
            }
            _ => {}
        }))
        .run(&harness.input, &harness.output)
        .await
        .unwrap();

    assert_eq!(
        *states.lock().unwrap(),
        vec![
            PipelineState::Discover,
            PipelineState::AnalyzePass1,
            PipelineState::EstablishChannelPolicy,
            PipelineState::RemediateAll,
            PipelineState::AnalyzePass2,
            PipelineState::Report,
            PipelineState::Done,
        ]
    );
    assert_eq!(
        *probes.lock().unwrap(),
        vec![
            (AnalysisPass::Initial, 0, 2),
            (AnalysisPass::Initial, 1, 2),
            (AnalysisPass::Final, 0, 2),
            (AnalysisPass::Final, 1, 2),
        ]
    );
}

#[tokio::test]
async fn test_policy_is_not_recomputed_after_remediation() {
    // First file mono, the rest stereo: every output must be mono
    let harness = Harness::new(&[
        ("01_Chapter_1.mp3", Attrs::new(5.0, 192, 44_100, 1)),
        ("02_Chapter_2.mp3", Attrs::new(5.0, 192, 44_100, 2)),
        ("03_Chapter_3.mp3", Attrs::new(5.0, 192, 44_100, 2)),
    ])
    .await;

    let outcome = harness
        .pipeline(&[])
        .run(&harness.input, &harness.output)
        .await
        .unwrap();

    assert_eq!(outcome.policy.as_ref().unwrap().target(), ChannelLayout::Mono);
    assert!(has_issue(outcome.initial[1].report.issues(), "conversion to mono"));
    assert!(outcome
        .final_analyses
        .iter()
        .all(|a| a.record.channels == ChannelLayout::Mono
            && !has_issue(a.report.issues(), "Channel format")));
}

#[tokio::test]
async fn test_output_directory_equal_to_input_is_rejected() {
    let harness = Harness::new(&[("01_Chapter_1.mp3", Attrs::new(5.0, 192, 44_100, 1))]).await;
    let source = harness.input.join("01_Chapter_1.mp3");
    tokio::fs::write(&source, b"original").await.unwrap();

    let same = harness.input.join("..").join("long_road");
    for output in [harness.input.clone(), same] {
        let result = harness.pipeline(&["01_Chapter_1"]).run(&harness.input, &output).await;
        match result {
            Err(MasteringError::OutputIsInput(dir)) => assert_eq!(dir, output),
            other => panic!("expected OutputIsInput, got {:?}", other.map(|o| o.remediated)),
        }
        assert_eq!(tokio::fs::read(&source).await.unwrap(), b"original");
    }
    assert!(harness.tagger.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_shared_output_name_skips_later_file() {
    let harness = Harness::new(&[
        ("01_Chapter_1.mp3", Attrs::new(5.0, 192, 44_100, 1)),
        ("01_Chapter_1.wav", Attrs::new(5.0, 1411, 44_100, 1)),
        ("02_Chapter_2.mp3", Attrs::new(5.0, 192, 44_100, 1)),
    ])
    .await;

    let outcome = harness
        .pipeline(&[])
        .run(&harness.input, &harness.output)
        .await
        .unwrap();

    assert_eq!(outcome.remediated.len(), 2);
    assert_eq!(outcome.remediated[0].source, harness.input.join("01_Chapter_1.mp3"));
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].file_name(), "01_Chapter_1.wav");
    assert!(outcome.failures[0].message.contains("already used by 01_Chapter_1.mp3"));

    let tagged: Vec<PathBuf> = harness
        .tagger
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|(p, _)| p.clone())
        .collect();
    assert_eq!(
        tagged,
        vec![
            harness.output.join("01_Chapter_1.mp3"),
            harness.output.join("02_Chapter_2.mp3"),
        ]
    );

    let final_names: Vec<String> = outcome
        .final_analyses
        .iter()
        .map(|a| a.record.file_name())
        .collect();
    assert_eq!(final_names, vec!["01_Chapter_1.mp3", "02_Chapter_2.mp3"]);
    assert_eq!(outcome.final_summary().failed, vec!["01_Chapter_1.wav".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_raw_bytes_on_encoder_stderr_do_not_stop_the_batch() {
    use audiobook_master::FfmpegEncoder;
    use std::os::unix::fs::PermissionsExt;

    let harness = Harness::new(&[
        ("01_Chapter_1.mp3", Attrs::new(5.0, 192, 44_100, 1)),
        ("02_Chapter_2.mp3", Attrs::new(5.0, 192, 44_100, 1)),
    ])
    .await;

    let script = harness.input.parent().unwrap().join("ffmpeg");
    std::fs::write(
        &script,
        r#"#!/bin/sh
for arg in "$@"; do out="$arg"; done
printf '    title           : Pr\351face \251 2024\n' >&2
printf 'size=4kB time=00:00:10.00 bitrate=192.0kbits/s\r' >&2
printf 'ID3' > "$out"
exit 0
"#,
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let pipeline = Pipeline::new(
        &Config::default(),
        harness.prober.clone(),
        Arc::new(FfmpegEncoder::new(&script)),
        harness.tagger.clone(),
    )
    .unwrap();
    let outcome = pipeline.run(&harness.input, &harness.output).await.unwrap();

    assert_eq!(outcome.remediated.len(), 2);
    assert!(outcome.failures.is_empty());
    assert!(harness.output.join("01_Chapter_1.mp3").exists());
    assert!(harness.output.join("02_Chapter_2.mp3").exists());
    assert_eq!(outcome.final_analyses.len(), 2);
}
