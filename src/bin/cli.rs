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


use std::io::{self, StdinLock, Stdout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use audiobook_master::audio::ProgressCallback;
use audiobook_master::file::{default_output_dir, discover_required, visualization_dir, Discovery};
use audiobook_master::pipeline::AnalysisPass;
use audiobook_master::prompt::Prompter;
use audiobook_master::report::render_pass_summary;
use audiobook_master::{
    Config, FfmpegEncoder, FfmpegTagger, FfmpegVisualizer, FfprobeProber, MasteringError,
    MetadataProfile, Pipeline, PipelineEvent, Visualizer,
};
use clap::{Args, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for audiobook-master
#[derive(Parser, Debug)]
#[command(name = "audiobook-master")]
#[command(about = "Prepare audiobook chapter files for Audible/ACX submission")]
#[command(version)]
struct Cli {
    /// Directory with the MP3/WAV chapter files (prompted when omitted)
    input: Option<PathBuf>,

    /// Output directory (default: sibling `<dirname>_master`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    metadata: MetadataArgs,

    /// Ask for metadata interactively
    #[arg(long)]
    prompt_metadata: bool,

    /// Render waveform and loudness images for every processed file
    #[arg(long)]
    visualize: bool,

    /// ffmpeg binary
    #[arg(long, env = "AUDIOBOOK_MASTER_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffprobe binary
    #[arg(long, env = "AUDIOBOOK_MASTER_FFPROBE", default_value = "ffprobe")]
    ffprobe: PathBuf,
}

/// Tags applied to every output file
#[derive(Args, Debug)]
struct MetadataArgs {
    /// Author name (artist tag)
    #[arg(long)]
    author: Option<String>,
    /// Book title (album tag)
    #[arg(long)]
    book_title: Option<String>,
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    copyright: Option<String>,
    #[arg(long)]
    genre: Option<String>,
    /// Narrator name (album artist tag)
    #[arg(long)]
    narrator: Option<String>,
    /// Production company
    #[arg(long)]
    producer: Option<String>,
    /// Audio technician (composer tag)
    #[arg(long)]
    audio_technician: Option<String>,
    #[arg(long)]
    comment: Option<String>,
}

impl From<MetadataArgs> for MetadataProfile {
    fn from(args: MetadataArgs) -> Self {
        MetadataProfile {
            author: args.author,
            book_title: args.book_title,
            year: args.year,
            copyright: args.copyright,
            genre: args.genre,
            narrator: args.narrator,
            producer: args.producer,
            audio_technician: args.audio_technician,
            comment: args.comment,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audiobook_master=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) if is_interrupted(&e) => {
                println!("\nProgram interrupted by user. Exiting...");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{:#}", e);
                eprintln!("\nAn unexpected error occurred: {}", describe(&e));
                ExitCode::FAILURE
            }
        },
        _ = signal::ctrl_c() => {
            println!("\nProgram interrupted by user. Exiting...");
            // A pending stdin prompt would otherwise hold the runtime open
            std::process::exit(0);
        }
    }
}

fn is_interrupted(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<MasteringError>(),
        Some(MasteringError::Interrupted)
    )
}

fn describe(e: &anyhow::Error) -> String {
    match e.downcast_ref::<MasteringError>() {
        Some(mastering) => mastering.user_message(),
        None => format!("{:#}", e),
    }
}

fn banner_title() -> String {
    format!(
        "Audiobook Processor for Audible Submission v{}",
        audiobook_master::version()
    )
}

fn print_banner() {
    println!("{}", "=".repeat(80));
    println!("{:^80}", banner_title());
    println!("{}", "=".repeat(80));
    println!("\nThis tool helps prepare your audiobook files for submission to Audible/ACX.");
    println!("It processes your files to meet Audible's technical requirements automatically.");
    println!("\nKey requirements checked and fixed by this tool:");
    println!(" - Audio consistency (RMS levels between -23dB and -18dB)");
    println!(" - Peak levels (less than -3dB)");
    println!(" - Noise floor (less than -60dB RMS)");
    println!(" - Room tone (less than 5 seconds at beginning and end)");
    println!(" - File format (192 kbps or higher CBR, 44.1kHz MP3)");
    println!(" - Channel consistency (all files will be converted to match the first file's format)");
    println!(" - File duration (maximum 120 minutes per file)");
    println!(" - Filename requirements (proper chapter/section labeling, no special characters)");
    println!("\nNote: Files will be processed and exported to a '_master' directory");
}

/// Run a prompt on the blocking pool so Ctrl-C stays responsive
async fn prompt<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Prompter<StdinLock<'static>, Stdout>) -> audiobook_master::Result<T>
        + Send
        + 'static,
{
    let value = tokio::task::spawn_blocking(move || {
        let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
        f(&mut prompter)
    })
    .await
    .context("Prompt task failed")??;
    Ok(value)
}

/// Ask until the directory exists and holds audio files
async fn ask_input_directory() -> Result<(PathBuf, Discovery)> {
    loop {
        let dir = prompt(|p| p.ask_directory()).await?;
        match discover_required(&dir).await {
            Ok(discovery) => return Ok((dir, discovery)),
            Err(e) if e.is_discovery_error() => println!("{}", e.user_message()),
            Err(e) => return Err(e.into()),
        }
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Console rendering of pipeline events
fn event_printer(pb: ProgressBar) -> Arc<dyn Fn(&PipelineEvent) + Send + Sync> {
    Arc::new(move |event| match event {
        PipelineEvent::Probing {
            pass,
            index,
            total,
            file,
        } => {
            pb.set_length(*total as u64);
            pb.set_position(*index as u64);
            let verb = match pass {
                AnalysisPass::Initial => "Analyzing",
                AnalysisPass::Final => "Re-analyzing",
            };
            pb.set_message(format!("{} {}", verb, file));
        }
        PipelineEvent::PolicyEstablished(policy) => {
            let layout = policy.target().as_str().to_uppercase();
            pb.println(format!("\nTarget channel format determined: {}", layout));
            pb.println(format!(
                "All files will be converted to {} format for consistency.",
                layout
            ));
        }
        PipelineEvent::PassCompleted {
            pass,
            summary,
            analyses,
        } => {
            pb.set_position(pb.length().unwrap_or(0));
            if *pass == AnalysisPass::Final {
                pb.println("\nRe-analyzing processed files to verify compliance...");
            }
            pb.println(format!("\n{}", render_pass_summary(analyses, summary)));
        }
        PipelineEvent::Remediating { index, total, file } => {
            pb.set_length(*total as u64);
            pb.set_position(*index as u64);
            pb.set_message(format!("Processing {}", file));
        }
        PipelineEvent::Remediated(file) => {
            let name = file
                .source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            pb.println(format!("\n{}: ✓ {}", name, file.fixes_applied.join(", ")));
            if let Some(tag_error) = &file.tag_error {
                pb.println(format!("  {}", tag_error));
            }
        }
        PipelineEvent::RemediationFailed(failure) => {
            pb.println(format!("\n{}: ✗ {}", failure.file_name(), failure.message));
        }
        PipelineEvent::ReportsWritten(paths) => {
            pb.println(format!(
                "\nDetailed analysis report saved to {}",
                paths.analysis.display()
            ));
            pb.println(format!(
                "Audible requirements guide saved to {}",
                paths.requirements.display()
            ));
        }
        PipelineEvent::StateChanged(_)
        | PipelineEvent::Discovered(_)
        | PipelineEvent::NoAudioFiles(_) => {}
    })
}

async fn visualize(visualizer: &FfmpegVisualizer, file: &Path, dir: &Path) {
    match visualizer.visualize(file, dir).await {
        Ok(images) => {
            println!("\nAudio visualizations saved to:");
            println!("  - Waveform: {}", images.waveform.display());
            println!("  - Loudness: {}", images.loudness.display());
        }
        Err(e) => println!("{}", e),
    }
}

async fn run(cli: Cli) -> Result<()> {
    print_banner();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let encoder = FfmpegEncoder::new(&cli.ffmpeg);
    let prober = FfprobeProber::new(&cli.ffprobe);
    if let Err(e) = encoder.check_available().await {
        eprintln!("ERROR: {}", e.user_message());
        return Err(e.into());
    }
    if let Err(e) = prober.check_available().await {
        eprintln!("ERROR: {}", e.user_message());
        return Err(e.into());
    }

    let interactive = cli.input.is_none();
    let (input_dir, discovery) = match cli.input {
        Some(dir) => match discover_required(&dir).await {
            Ok(discovery) => (dir, discovery),
            Err(e) if e.is_discovery_error() => {
                println!("{}", e.user_message());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        },
        None => ask_input_directory().await?,
    };
    Prompter::new(io::empty(), io::stdout()).report_discovery(&discovery)?;

    if cli.prompt_metadata || (interactive && config.metadata.is_empty()) {
        let prompted = prompt(|p| p.collect_metadata()).await?;
        config.metadata.merge(prompted);
    }
    config.metadata.merge(cli.metadata.into());

    let output_dir = cli
        .output
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| default_output_dir(&input_dir));
    info!(input = %input_dir.display(), output = %output_dir.display(), "Starting run");

    let pb = progress_bar();
    let file_progress = pb.clone();
    let on_progress: ProgressCallback = Arc::new(move |fraction| {
        file_progress.set_prefix(format!("{:>3.0}%", fraction * 100.0));
    });

    let pipeline = Pipeline::new(
        &config,
        Arc::new(prober),
        Arc::new(encoder.with_progress(on_progress)),
        Arc::new(FfmpegTagger::new(&cli.ffmpeg)),
    )?
    .with_events(event_printer(pb.clone()));

    println!("\nProcessing {} audio files...", discovery.len());
    let outcome = pipeline.run(&input_dir, &output_dir).await?;
    pb.finish_and_clear();

    if outcome.is_empty() {
        println!("No audio files to process.");
        return Ok(());
    }
    println!(
        "\nProcessed {} files to: {}",
        outcome.remediated.len(),
        outcome.output_dir.display()
    );

    let outputs: Vec<PathBuf> = outcome.remediated.iter().map(|r| r.output.clone()).collect();
    let visualizer = FfmpegVisualizer::new(&cli.ffmpeg, config.loudness.integrated_lufs);
    let viz_dir = visualization_dir(&outcome.output_dir);
    if cli.visualize || config.visualize {
        for file in &outputs {
            visualize(&visualizer, file, &viz_dir).await;
        }
    } else if interactive && !outputs.is_empty() {
        let wanted = prompt(|p| p.confirm("\nDo you want to visualize a specific processed audio file?")).await?;
        if wanted {
            let menu = outputs.clone();
            if let Some(index) = prompt(move |p| p.choose_file(&menu)).await? {
                visualize(&visualizer, &outputs[index], &viz_dir).await;
            }
        }
    }

    println!("\nProcessing complete!");
    println!(
        "All processed files have been saved to: {}",
        outcome.output_dir.display()
    );
    println!("Analysis reports have been saved to the output directory");
    println!("\nThank you for using the Audiobook Processor!");
    Ok(())
}
