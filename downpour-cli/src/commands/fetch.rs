//! The `fetch` subcommand: download one file with a progress bar.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use downpour::{DownloadConfig, DownloadObserver, DownloadTask};

#[derive(Args)]
pub struct FetchArgs {
    /// URL to download.
    pub url: String,

    /// Destination directory or file path. Defaults to the configured
    /// download directory.
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Explicit file name instead of deriving one from the URL.
    #[arg(long)]
    pub file_name: Option<String>,

    /// Configuration file (INI).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Connect timeout in seconds.
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Read timeout in seconds.
    #[arg(long)]
    pub read_timeout: Option<u64>,
}

/// Terminal outcome forwarded from the observer to the command.
enum Outcome {
    Success(PathBuf),
    Failure(Option<String>),
}

/// Observer driving the progress bar and reporting the outcome.
struct ConsoleObserver {
    bar: ProgressBar,
    outcome: Mutex<Sender<Outcome>>,
}

impl ConsoleObserver {
    fn new(bar: ProgressBar) -> (Self, Receiver<Outcome>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                bar,
                outcome: Mutex::new(tx),
            },
            rx,
        )
    }

    fn report(&self, outcome: Outcome) {
        if let Ok(tx) = self.outcome.lock() {
            let _ = tx.send(outcome);
        }
    }
}

impl DownloadObserver for ConsoleObserver {
    fn on_progress(&self, total_bytes: u64, current_bytes: u64) {
        self.bar.set_length(total_bytes);
        self.bar.set_position(current_bytes);
    }

    fn on_success(&self, file_path: &Path) {
        self.bar.finish_and_clear();
        self.report(Outcome::Success(file_path.to_path_buf()));
    }

    fn on_error(&self, message: Option<&str>) {
        self.bar.finish_and_clear();
        self.report(Outcome::Failure(message.map(str::to_string)));
    }
}

pub fn run(args: FetchArgs) -> ExitCode {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", style("error:").red().bold(), err);
            return ExitCode::FAILURE;
        }
    };

    let mut request = config.request_for(args.url.as_str());
    if let Some(dest) = args.dest {
        request.destination = dest;
    }
    if let Some(name) = args.file_name {
        request = request.with_file_name(name);
    }
    if let Some(secs) = args.connect_timeout {
        request = request.with_connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = args.read_timeout {
        request = request.with_read_timeout(Duration::from_secs(secs));
    }
    debug!(url = %request.url, dest = %request.destination.display(), "fetch requested");

    let bar = ProgressBar::new(0).with_style(
        ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .expect("valid progress template"),
    );
    let (observer, outcome) = ConsoleObserver::new(bar);
    let task = Arc::new(DownloadTask::new(request, Arc::new(observer)));

    // Ctrl-C requests cooperative cancellation; the loop exits at the next
    // chunk boundary and the partial file stays resumable.
    let handler_task = Arc::clone(&task);
    ctrlc::set_handler(move || {
        eprintln!("\ncancelling...");
        handler_task.stop();
    })
    .expect("failed to install Ctrl-C handler");

    task.start();
    task.join();

    match outcome.try_recv() {
        Ok(Outcome::Success(path)) => {
            println!("{} {}", style("downloaded").green().bold(), path.display());
            ExitCode::SUCCESS
        }
        Ok(Outcome::Failure(message)) => {
            eprintln!(
                "{} {}",
                style("download failed:").red().bold(),
                message.as_deref().unwrap_or("unknown error")
            );
            ExitCode::FAILURE
        }
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
            // Cancelled: no terminal event was emitted, by contract.
            eprintln!("{}", style("download cancelled; partial file kept").yellow());
            ExitCode::from(130)
        }
    }
}

fn load_config(path: Option<&Path>) -> downpour::DownloadResult<DownloadConfig> {
    match path {
        Some(path) => DownloadConfig::from_ini(path),
        None => {
            // Fall back to the user's config file when one exists.
            let default_path = dirs::config_dir().map(|d| d.join("downpour").join("downpour.ini"));
            match default_path {
                Some(path) if path.exists() => DownloadConfig::from_ini(&path),
                _ => Ok(DownloadConfig::default()),
            }
        }
    }
}
