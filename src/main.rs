//! Nibble OCR
//!
//! Strips the existing text layer from a PDF and writes a copy with a fresh,
//! invisible OCR layer aligned over the page images.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nibble_ocr::ocr::{validate_language, TimeoutPolicy, TokenGranularity};
use nibble_ocr::strip::{MAX_DPI, MIN_DPI};
use nibble_ocr::config::ConfigError;
use nibble_ocr::{Config, Error, ProgressEvent, RunReport};

mod settings;

use settings::{Settings, DEFAULT_SETTINGS_FILE};

#[derive(Parser)]
#[command(name = "nibble-ocr")]
#[command(version)]
#[command(about = "Replace a PDF's text layer with fresh OCR", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output folder (remembered for next time)
    #[arg(short = 'd', long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Output file (overrides the output folder)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// OCR language, e.g. "eng" or "eng+deu"
    #[arg(short, long)]
    lang: Option<String>,

    /// Render resolution (72-600)
    #[arg(long)]
    dpi: Option<f32>,

    /// Pages recognized in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Per-page OCR timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// On a page timeout: "abort" the run or leave the page "empty"
    #[arg(long, value_name = "POLICY")]
    on_timeout: Option<TimeoutPolicy>,

    /// Text layer unit: "word" or "line"
    #[arg(long)]
    granularity: Option<TokenGranularity>,

    /// Read the written text layer back and report what it contains
    #[arg(long)]
    verify: bool,

    /// Settings file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nibble_ocr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    }
}

/// Distinct exit status per failure class
fn exit_code(err: &anyhow::Error) -> ExitCode {
    let code = match err.downcast_ref::<Error>() {
        Some(Error::Input(_)) => 2,
        Some(Error::PageRender { .. }) => 3,
        Some(Error::EngineUnavailable(_)) => 4,
        Some(Error::EngineTimeout { .. }) => 5,
        Some(Error::Recognition { .. }) => 6,
        Some(Error::OutputWrite { .. }) => 7,
        Some(Error::ShapeMismatch { .. }) => 70,
        Some(Error::Cancelled) => 130,
        None => 1,
    };
    ExitCode::from(code)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(Config::from_env(), &cli)?;

    let output = resolve_output(&cli)?;
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output folder {}", dir.display()))?;
    }

    tracing::info!("Starting Nibble OCR v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        dpi = config.render.dpi,
        language = %config.ocr.language,
        jobs = config.ocr.jobs,
        on_timeout = %config.ocr.on_timeout,
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")?
            .progress_chars("#>-"),
    );
    let sink = |event: ProgressEvent| {
        bar.set_position((event.fraction() * 100.0).round() as u64);
        bar.set_message(event.message());
    };

    let pipeline = config.pipeline();
    let result = pipeline
        .run_path(&cli.input, &output, &sink, &cancel)
        .await;
    bar.finish_and_clear();

    let report = result?;
    print_report(&report);

    if cli.verify {
        verify(&report).await?;
    }
    Ok(())
}

/// Environment first, then command-line flags on top
///
/// A bad environment value fails the run; silently falling back would also
/// discard every valid setting next to it.
fn resolve_config(from_env: Result<Config, ConfigError>, cli: &Cli) -> anyhow::Result<Config> {
    let mut config = from_env.context("Invalid configuration in environment")?;
    apply_overrides(&mut config, cli)?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(lang) = &cli.lang {
        validate_language(lang)?;
        config.ocr.language = lang.clone();
    }
    if let Some(dpi) = cli.dpi {
        config.render.dpi = dpi.clamp(MIN_DPI, MAX_DPI);
    }
    if let Some(jobs) = cli.jobs {
        config.ocr.jobs = jobs.max(1);
    }
    if let Some(timeout) = cli.timeout {
        config.ocr.timeout_secs = timeout.max(1);
    }
    if let Some(policy) = cli.on_timeout {
        config.ocr.on_timeout = policy;
    }
    if let Some(granularity) = cli.granularity {
        config.ocr.granularity = granularity;
    }
    Ok(())
}

/// Explicit `--output`, else `<folder>/<stem>_ocr.pdf`
fn resolve_output(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(output) = &cli.output {
        return Ok(output.clone());
    }

    let mut settings = Settings::load(&cli.settings);
    if let Some(dir) = &cli.output_dir {
        if settings.remember_output_folder(dir, &cli.settings)? {
            tracing::debug!("Saved output folder {}", dir.display());
        }
    }

    Ok(settings.output_folder.join(output_file_name(&cli.input)?))
}

fn output_file_name(input: &Path) -> anyhow::Result<String> {
    let Some(stem) = input.file_stem() else {
        bail!("Input path {} has no file name", input.display());
    };
    Ok(format!("{}_ocr.pdf", stem.to_string_lossy()))
}

fn print_report(report: &RunReport) {
    println!(
        "Saved {} ({} pages, {} tokens)",
        report.output.display(),
        report.pages,
        report.tokens
    );
    if !report.timed_out_pages.is_empty() {
        let pages: Vec<String> = report
            .timed_out_pages
            .iter()
            .map(|p| (p + 1).to_string())
            .collect();
        println!(
            "Warning: OCR timed out on page(s) {}; they have no text layer",
            pages.join(", ")
        );
    }
}

/// Read the written file back and check its text layer
async fn verify(report: &RunReport) -> anyhow::Result<()> {
    let data = tokio::fs::read(&report.output)
        .await
        .with_context(|| format!("Failed to read back {}", report.output.display()))?;
    let layers = tokio::task::spawn_blocking(move || nibble_ocr::mupdf::read_text_layer(&data))
        .await?
        .context("Failed to read text layer")?;

    if layers.len() != report.pages {
        bail!(
            "Output has {} pages, expected {}",
            layers.len(),
            report.pages
        );
    }

    for layer in &layers {
        println!("  page {}: {} words", layer.page_index + 1, layer.spans.len());
    }
    println!("Verified {} pages", layers.len());
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, cancelling run...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, cancelling run...");
        },
    }
}
