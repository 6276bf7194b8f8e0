//! Seqmix assembler & player (seqmix-ap) - Main entry point
//!
//! Command-line front end:
//! - `templates`: list the built-in templates
//! - `show`: print a template as pretty JSON
//! - `validate`: check a template document and upload readiness
//! - `render`: merge a template offline into a WAV file
//! - `play`: play a template live, controlled from stdin
//! - `devices`: list output devices (`device-output` builds)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use seqmix_ap::audio::wav::{encode_wav, write_wav};
use seqmix_ap::audio::{FsLoader, SymphoniaDecoder};
use seqmix_ap::live::pump::spawn_pump;
use seqmix_ap::live::{
    spawn_scheduler, AudioGraph, LiveScheduler, RecordingGraph, SchedulerHandle, SharedGraph,
    SoftwareGraph,
};
use seqmix_ap::mix::pipeline::render_template;
use seqmix_ap::mix::AssetFetcher;
use seqmix_ap::{MergeOptions, DEFAULT_OUTPUT_NAME};
use seqmix_common::catalog;
use seqmix_common::events::{EventBus, SchedulerState, SeqmixEvent};
use seqmix_common::{SeqmixConfig, Template, UploadBinding, UploadSet};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for seqmix-ap
#[derive(Parser, Debug)]
#[command(name = "seqmix-ap")]
#[command(about = "Assemble and play sequenced audio programs")]
#[command(version)]
struct Args {
    /// Config file (overrides SEQMIX_CONFIG and the platform default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base directory for relative source paths
    #[arg(long, global = true, env = "SEQMIX_ASSET_ROOT")]
    asset_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List built-in templates
    Templates,

    /// Print a template as JSON
    Show {
        /// Template file or built-in template id
        template: String,
    },

    /// Validate a template and report missing uploads
    Validate {
        /// Template file or built-in template id
        template: String,

        /// Upload binding `placeholderKey=path` (repeatable, last wins)
        #[arg(short, long = "upload", value_parser = parse_upload)]
        uploads: Vec<UploadBinding>,
    },

    /// Merge a template into one WAV file
    Render {
        /// Template file or built-in template id
        template: String,

        /// Upload binding `placeholderKey=path` (repeatable, last wins)
        #[arg(short, long = "upload", value_parser = parse_upload)]
        uploads: Vec<UploadBinding>,

        /// Output file
        #[arg(short, long, default_value = DEFAULT_OUTPUT_NAME)]
        output: PathBuf,

        /// Print the mix plan as JSON
        #[arg(long)]
        print_plan: bool,
    },

    /// Play a template live
    ///
    /// Reads commands from stdin: play, skip, stop, answer <text>, status,
    /// log, quit.
    Play {
        /// Template file or built-in template id
        template: String,

        /// Upload binding `placeholderKey=path` (repeatable, last wins)
        #[arg(short, long = "upload", value_parser = parse_upload)]
        uploads: Vec<UploadBinding>,

        /// Drive a recording graph instead of producing audio
        #[arg(long)]
        dry_run: bool,

        /// Capture the live output to a WAV file (headless output)
        #[arg(long, conflicts_with = "dry_run")]
        capture: Option<PathBuf>,

        /// Wait for a `play` command instead of starting immediately
        #[arg(long)]
        paused: bool,

        /// Output device name
        #[cfg(feature = "device-output")]
        #[arg(long, env = "SEQMIX_DEVICE")]
        device: Option<String>,
    },

    /// List audio output devices
    #[cfg(feature = "device-output")]
    Devices,
}

fn parse_upload(text: &str) -> std::result::Result<UploadBinding, String> {
    UploadBinding::parse_pair(text)
        .ok_or_else(|| format!("expected placeholderKey=path, got '{}'", text))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seqmix_ap=info,seqmix_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config =
        SeqmixConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(root) = args.asset_root {
        config.sources.asset_root = root;
    }

    match args.command {
        Commands::Templates => list_templates(),
        Commands::Show { template } => {
            let template = load_template(&template)?;
            println!("{}", template.to_pretty_json()?);
            Ok(())
        }
        Commands::Validate { template, uploads } => validate(&template, uploads),
        Commands::Render {
            template,
            uploads,
            output,
            print_plan,
        } => render(&config, &template, uploads, &output, print_plan).await,
        #[cfg(feature = "device-output")]
        Commands::Play {
            template,
            uploads,
            dry_run,
            capture,
            paused,
            device,
        } => {
            let options = PlayOptions {
                dry_run,
                capture,
                paused,
                device,
            };
            play(&config, &template, uploads, options).await
        }
        #[cfg(not(feature = "device-output"))]
        Commands::Play {
            template,
            uploads,
            dry_run,
            capture,
            paused,
        } => {
            let options = PlayOptions {
                dry_run,
                capture,
                paused,
            };
            play(&config, &template, uploads, options).await
        }
        #[cfg(feature = "device-output")]
        Commands::Devices => list_devices(),
    }
}

/// Load a template from a file, or look it up in the catalog by id
fn load_template(arg: &str) -> Result<Template> {
    let path = Path::new(arg);
    if path.exists() {
        return Template::load(path)
            .with_context(|| format!("Failed to load template {}", path.display()));
    }
    catalog::find(arg).with_context(|| format!("'{}' is neither a file nor a built-in template", arg))
}

fn list_templates() -> Result<()> {
    for template in catalog::builtin_templates() {
        let uploads = template.required_placeholders();
        println!(
            "{:<18} {:<18} {} segments, fades {}s/{}s, uploads: {}",
            template.id,
            template.name,
            template.segments.len(),
            template.fade_in,
            template.fade_out,
            if uploads.is_empty() {
                "none".to_string()
            } else {
                uploads.join(", ")
            }
        );
    }
    Ok(())
}

#[cfg(feature = "device-output")]
fn list_devices() -> Result<()> {
    use seqmix_ap::audio::output::DeviceOutput;

    let devices = DeviceOutput::list_devices().context("Failed to list output devices")?;
    if devices.is_empty() {
        println!("No output devices found");
    }
    for name in devices {
        println!("{}", name);
    }
    Ok(())
}

fn validate(arg: &str, uploads: Vec<UploadBinding>) -> Result<()> {
    let template = load_template(arg)?;
    let uploads: UploadSet = uploads.into_iter().collect();

    println!(
        "'{}' is valid: {} segments{}",
        template.name,
        template.segments.len(),
        template
            .survey
            .as_ref()
            .map(|s| format!(", survey after segment {}", s.after_index))
            .unwrap_or_default()
    );

    let missing = uploads.missing_for(&template);
    if missing.is_empty() {
        println!("All uploads bound; ready to render");
        Ok(())
    } else {
        bail!("missing uploads: {}", missing.join(", "))
    }
}

fn fetcher(config: &SeqmixConfig) -> AssetFetcher {
    AssetFetcher::new(
        Arc::new(FsLoader::new(config.sources.asset_root.clone())),
        Arc::new(SymphoniaDecoder::new()),
    )
}

async fn render(
    config: &SeqmixConfig,
    arg: &str,
    uploads: Vec<UploadBinding>,
    output: &Path,
    print_plan: bool,
) -> Result<()> {
    let template = load_template(arg)?;
    let uploads: UploadSet = uploads.into_iter().collect();

    let program = render_template(
        &template,
        &uploads,
        &fetcher(config),
        MergeOptions::from(&config.mix),
    )
    .await
    .with_context(|| format!("Failed to merge '{}'", template.id))?;

    if print_plan {
        println!("{}", serde_json::to_string_pretty(&program.plan)?);
    }

    let duration = program.buffer.duration_secs();
    let bytes = encode_wav(program.buffer).context("Failed to encode WAV")?;
    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Wrote {} ({:.3}s, {} bytes)",
        output.display(),
        duration,
        bytes.len()
    );
    Ok(())
}

struct PlayOptions {
    dry_run: bool,
    capture: Option<PathBuf>,
    paused: bool,
    #[cfg(feature = "device-output")]
    device: Option<String>,
}

async fn play(
    config: &SeqmixConfig,
    arg: &str,
    uploads: Vec<UploadBinding>,
    options: PlayOptions,
) -> Result<()> {
    let template = Arc::new(load_template(arg)?);
    let events = Arc::new(EventBus::new(config.live.event_capacity));
    let fetcher = fetcher(config);

    if options.dry_run {
        let scheduler = LiveScheduler::new(
            template,
            RecordingGraph::with_tokio_clock(),
            config,
            events,
        );
        let scheduler = run_session(scheduler, fetcher, uploads, options.paused).await?;
        info!(
            "Dry run issued {} graph calls",
            scheduler.graph().calls().len()
        );
        return Ok(());
    }

    #[cfg(feature = "device-output")]
    if options.capture.is_none() {
        use seqmix_ap::audio::output::DeviceOutput;

        // Output initialization failure ends the session before it starts
        let mut device = DeviceOutput::open(options.device.as_deref(), config.live.output_sample_rate)
            .context("Failed to open audio device")?;
        let graph = SharedGraph::new(SoftwareGraph::new(device.sample_rate()));
        device
            .start(graph.clone())
            .context("Failed to start audio stream")?;

        let scheduler = LiveScheduler::new(template, graph, config, events);
        run_session(scheduler, fetcher, uploads, options.paused).await?;
        if device.has_error() {
            warn!("Audio device reported errors during playback");
        }
        device.stop();
        return Ok(());
    }

    let graph = SharedGraph::new(SoftwareGraph::new(config.live.output_sample_rate));
    let pump = spawn_pump(graph.clone(), options.capture.is_some());

    let scheduler = LiveScheduler::new(template, graph, config, events);
    run_session(scheduler, fetcher, uploads, options.paused).await?;

    if let (Some(buffer), Some(path)) = (pump.finish().await?, options.capture) {
        let duration = buffer.duration_secs();
        write_wav(&path, buffer).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Captured {:.3}s to {}", duration, path.display());
    }
    Ok(())
}

/// Drive one live session from stdin until `quit`, end of input with the
/// program finished, or Ctrl+C
async fn run_session<G: AudioGraph + 'static>(
    scheduler: LiveScheduler<G>,
    fetcher: AssetFetcher,
    uploads: Vec<UploadBinding>,
    paused: bool,
) -> Result<LiveScheduler<G>> {
    let (handle, task) = spawn_scheduler(scheduler, fetcher);
    let printer = tokio::spawn(print_events(handle.subscribe()));

    for binding in uploads {
        handle.bind_upload(binding).await?;
    }
    handle.load().await.context("Failed to load template sources")?;
    if !paused {
        handle.play().await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut status = handle.watch_status();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if !apply_line(&handle, line.trim()).await {
                            break;
                        }
                    }
                    None => {
                        stdin_open = false;
                        if !handle.status().playing {
                            break;
                        }
                    }
                }
            }
            changed = status.changed(), if !stdin_open => {
                if changed.is_err() || !status.borrow().playing {
                    break;
                }
            }
            _ = shutdown_signal() => break,
        }
    }

    handle.shutdown().await;
    let scheduler = task.await.context("Scheduler task failed")?;
    printer.abort();
    Ok(scheduler)
}

/// Apply one stdin command; returns false to quit
async fn apply_line(handle: &SchedulerHandle, line: &str) -> bool {
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let result = match word {
        "" => Ok(()),
        "play" => handle.play().await,
        "skip" => handle.skip().await,
        "stop" => handle.stop().await,
        "answer" => handle.answer_survey(rest.trim()).await.map(|_| ()),
        "status" => {
            let status = handle.status();
            println!(
                "state={} segment={} session={}",
                status.state,
                status
                    .current_index
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                status.session
            );
            Ok(())
        }
        "log" => handle.diagnostics().await.map(|lines| {
            for line in lines {
                println!("{}", line);
            }
        }),
        "quit" | "exit" => return false,
        other => {
            println!("unknown command '{}'", other);
            Ok(())
        }
    };
    if let Err(e) = result {
        println!("error: {}", e);
    }
    true
}

async fn print_events(mut rx: tokio::sync::broadcast::Receiver<SeqmixEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match rx.recv().await {
            Ok(SeqmixEvent::SegmentStarted {
                index,
                label,
                crossfade,
                ..
            }) => println!(
                "> segment {}: {}{}",
                index,
                label,
                if crossfade { " (crossfade)" } else { "" }
            ),
            Ok(SeqmixEvent::SurveyPending {
                question, options, ..
            }) => println!("? {} [{}]  (answer <text>)", question, options.join(" / ")),
            Ok(SeqmixEvent::SurveyAnswered { response }) => {
                println!("survey: '{}' -> '{}'", response.question, response.answer)
            }
            Ok(SeqmixEvent::StateChanged {
                new_state: SchedulerState::Stopped,
                ..
            }) => println!("stopped"),
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => warn!("Event printer lagged, {} events dropped", n),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}
