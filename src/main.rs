use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use url::Url;

use radiopod::{
    DEFAULT_SITE_URL, NoopReporter, ProgressEvent, ProgressReporter, RadiocutCatalog,
    ReqwestClient, SharedProgressReporter, SyncOptions, SyncReport, load_config, run_sync,
};

// Emoji with fallback for terminals without Unicode support
static RADIO: Emoji<'_, '_> = Emoji("📻 ", "");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CLOCK: Emoji<'_, '_> = Emoji("⏳ ", "[~] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Turn scheduled radio shows into a local podcast directory
#[derive(Parser, Debug)]
#[command(name = "radiopod")]
#[command(about = "Download recorded radio shows into a podcast directory")]
#[command(version)]
struct Args {
    /// Output directory for audio and metadata files
    output_dir: PathBuf,

    /// File holding the point up to which shows were fetched
    history_file: PathBuf,

    /// YAML file describing the shows to fetch
    config_file: PathBuf,

    /// First day to fetch (YYYY-MM-DD, midnight in each show's timezone); only
    /// allowed while there is no history file
    #[arg(long, value_parser = parse_since)]
    since: Option<NaiveDate>,

    /// Quiet mode - only warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Base URL of the recording service
    #[arg(long, default_value = DEFAULT_SITE_URL)]
    site_url: Url,
}

fn parse_since(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl IndicatifReporter {
    fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{pos}}/{{len}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }

    fn with_bar(&self, episode_id: &str, f: impl FnOnce(&ProgressBar)) {
        let Ok(bars) = self.bars.lock() else {
            return;
        };
        if let Some(bar) = bars.get(episode_id) {
            f(bar);
        }
    }

    fn take_bar(&self, episode_id: &str) -> Option<ProgressBar> {
        self.bars.lock().ok()?.remove(episode_id)
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::DownloadStarting {
                episode_id,
                total_segments,
            } => {
                let bar = self.multi.add(ProgressBar::new(total_segments as u64));
                bar.set_style(Self::bar_style());
                bar.set_message(episode_id.cyan().to_string());
                if let Ok(mut bars) = self.bars.lock() {
                    bars.insert(episode_id, bar);
                }
            }

            ProgressEvent::DownloadProgress {
                episode_id,
                segment_index,
                bytes_downloaded,
                ..
            } => {
                self.with_bar(&episode_id, |bar| {
                    bar.set_position(segment_index as u64);
                    bar.set_message(format!(
                        "{} {}",
                        episode_id.cyan(),
                        HumanBytes(bytes_downloaded).to_string().dimmed()
                    ));
                });
            }

            ProgressEvent::Finalizing { episode_id } => {
                self.with_bar(&episode_id, |bar| {
                    if let Some(len) = bar.length() {
                        bar.set_position(len);
                    }
                    bar.set_message(format!("{CLOCK}{}", episode_id.cyan()));
                });
            }

            ProgressEvent::DownloadCompleted {
                episode_id,
                bytes_downloaded,
            } => {
                if let Some(bar) = self.take_bar(&episode_id) {
                    bar.finish_with_message(format!(
                        "{SUCCESS}{} {}",
                        episode_id.green(),
                        HumanBytes(bytes_downloaded).to_string().dimmed()
                    ));
                }
            }

            ProgressEvent::DownloadFailed { episode_id, error } => {
                if let Some(bar) = self.take_bar(&episode_id) {
                    bar.abandon_with_message(format!(
                        "{FAILURE}{} - {}",
                        episode_id.red(),
                        error.red()
                    ));
                }
            }
        }
    }
}

/// Log writer that hides the progress bars while a line is printed
struct ProgressAwareWriter<W> {
    multi: MultiProgress,
    inner: W,
}

impl<W: Write> Write for ProgressAwareWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = &mut self.inner;
        self.multi.suspend(|| inner.write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let inner = &mut self.inner;
        self.multi.suspend(|| inner.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn init_logging(quiet: bool, multi: &MultiProgress) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("radiopod={default_level}")));
    let multi = multi.clone();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(move || ProgressAwareWriter {
            multi: multi.clone(),
            inner: io::stderr(),
        })
        .with_target(false)
        .init();
}

fn print_summary(report: &SyncReport, args: &Args) {
    println!(
        "\n{PARTY}{} {} downloaded, {} already present, {} deferred, {} failed",
        "Sync complete:".bold().green(),
        report.downloaded.to_string().green().bold(),
        report.existing.to_string().yellow(),
        report.deferred.to_string().cyan(),
        {
            let failed = report.failed_shows.len() + report.failed_episodes.len();
            if failed > 0 {
                failed.to_string().red().bold()
            } else {
                failed.to_string().green()
            }
        }
    );

    if !report.failed_shows.is_empty() {
        println!("\n{}", "Failed shows:".red().bold());
        for (show, error) in &report.failed_shows {
            println!("  {}{} - {}", CROSS, show.yellow(), error.dimmed());
        }
    }

    if !report.failed_episodes.is_empty() {
        println!("\n{}", "Failed episodes:".red().bold());
        for (episode, error) in &report.failed_episodes {
            println!("  {}{} - {}", CROSS, episode.yellow(), error.dimmed());
        }
    }

    let history = if report.checkpoint_advanced() {
        format!("advanced to {}", report.checkpoint).green()
    } else {
        format!("kept at {}", report.checkpoint).yellow()
    };

    println!(
        "\n{FOLDER}Output: {}\n   History {}\n",
        args.output_dir.display().to_string().cyan(),
        history
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let multi = MultiProgress::new();
    init_logging(args.quiet, &multi);

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            RADIO,
            "radiopod".bold().magenta(),
            "- Radio Show Podcaster".dimmed()
        );
    }

    let run_started = Utc::now();

    let shows = load_config(&args.config_file).with_context(|| {
        format!(
            "Failed to load show configuration from {}",
            args.config_file.display()
        )
    })?;

    let client = ReqwestClient::new();
    let catalog = RadiocutCatalog::new(client.clone(), args.site_url.clone());

    let options = SyncOptions {
        output_dir: args.output_dir.clone(),
        history_path: args.history_file.clone(),
        since: args.since,
        run_started,
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new(multi))
    };

    let report = run_sync(&client, &catalog, &shows, &options, reporter)
        .await
        .context("Failed to sync shows")?;

    if !args.quiet {
        print_summary(&report, &args);
    }

    Ok(())
}
