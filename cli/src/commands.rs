/// Command handlers for the terminal front end.
///
/// Handles the one-shot `info` and `download` commands and the interactive
/// shell (url, info, type, quality, theme, download, cancel, status, quit).
use std::io::Write;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tracing::{info, warn};

use socialdl_downloader::{FetchError, FileFetcher, SavedFile};
use socialdl_shared::backend::HttpBackend;
use socialdl_shared::config::ClientConfig;
use socialdl_shared::models::{Activity, PreviewInfo, TargetType};
use socialdl_shared::orchestrator::{Notice, Orchestrator, OrchestratorEvent};

use crate::render::{notice_line, preview_card, progress_line};
use crate::selection::SelectionState;

/// Commands accepted by the interactive shell.
#[derive(Parser, Debug)]
#[command(multicall = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug)]
pub enum ShellCommand {
    /// Set the media URL
    Url { url: String },
    /// Preview title, duration and qualities
    Info { url: Option<String> },
    /// Choose the output type (video or audio)
    Type { target: TargetType },
    /// Choose the video quality, e.g. 720
    Quality { quality: String },
    /// Toggle light/dark progress bar
    Theme,
    /// Start downloading the current URL
    Download { url: Option<String> },
    /// Stop following the current download
    Cancel,
    /// Show the current state
    Status,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

/// How a followed download ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEnd {
    Completed,
    Failed,
}

/// One front-end session: orchestrator, event stream, file saving and selection.
pub struct Session {
    orchestrator: Orchestrator<HttpBackend>,
    events: UnboundedReceiver<OrchestratorEvent>,
    fetcher: Option<FileFetcher>,
    fetches: JoinSet<Result<SavedFile, FetchError>>,
    selection: SelectionState,
    url: String,
    last_rendered: Option<u32>,
}

impl Session {
    pub fn new(config: &ClientConfig, save_files: bool) -> Result<Self> {
        let backend = HttpBackend::new(config.endpoints()?, config.request_timeout)?;
        let fetcher = save_files.then(|| FileFetcher::from_backend(&backend, config.download_dir.clone()));
        let (orchestrator, events) = Orchestrator::new(backend, config.progress.clone());
        Ok(Self {
            orchestrator,
            events,
            fetcher,
            fetches: JoinSet::new(),
            selection: SelectionState::default(),
            url: String::new(),
            last_rendered: None,
        })
    }

    pub fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    /// Render one orchestrator event. Returns how the job ended, if it did.
    fn on_event(&mut self, event: OrchestratorEvent) -> Option<JobEnd> {
        match event {
            OrchestratorEvent::PreviewReady(_) => None,
            OrchestratorEvent::Progress { value, .. } => {
                let rounded = value.min(100.0).round() as u32;
                if self.last_rendered != Some(rounded) {
                    self.last_rendered = Some(rounded);
                    match progress_line(value, self.selection.theme) {
                        Some(line) => print!("\r{}", line),
                        None => print!("\r{}\r", " ".repeat(40)),
                    }
                    let _ = std::io::stdout().flush();
                }
                None
            }
            OrchestratorEvent::FileReady { task_id, url } => {
                match &self.fetcher {
                    Some(fetcher) => {
                        let fetcher = fetcher.clone();
                        self.fetches.spawn(async move { fetcher.fetch(&task_id, url).await });
                    }
                    None => println!("\nFile: {}", url),
                }
                None
            }
            OrchestratorEvent::Notice(notice) => {
                println!("\n{}", notice_line(&notice));
                match notice {
                    Notice::DownloadFailed { .. } | Notice::PollAbandoned { .. } => Some(JobEnd::Failed),
                    _ => None,
                }
            }
            OrchestratorEvent::Settled { task_id } => {
                info!("Download {} complete", task_id);
                None
            }
            OrchestratorEvent::Idle => {
                println!();
                Some(JobEnd::Completed)
            }
        }
    }

    fn on_fetch(&mut self, result: Result<Result<SavedFile, FetchError>, tokio::task::JoinError>) -> bool {
        match result {
            Ok(Ok(saved)) => {
                println!("\nSaved {} ({} bytes)", saved.path.display(), saved.bytes);
                true
            }
            Ok(Err(e)) => {
                warn!("File retrieval failed: {}", e);
                println!("\nتعذّر حفظ الملف ({})", e);
                false
            }
            Err(e) => {
                warn!("File retrieval task failed: {}", e);
                false
            }
        }
    }

    /// Drain buffered events without blocking.
    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.on_event(event);
        }
    }

    /// `info`: fetch and print the preview, updating the default quality.
    pub async fn info(&mut self, url: Option<String>) -> Result<PreviewInfo> {
        if let Some(url) = url {
            self.url = url;
        }
        let result = self.orchestrator.fetch_info(&self.url).await;
        self.drain_events();
        let preview = result?;
        self.selection.apply_preview(&preview);
        print!("{}", preview_card(&preview, &self.selection));
        Ok(preview)
    }

    /// Start a download with the current selection. Returns the task id.
    async fn start(&mut self, url: Option<String>) -> Result<String> {
        if let Some(url) = url {
            self.url = url;
        }
        self.last_rendered = None;
        let result = self
            .orchestrator
            .start_download(&self.url, self.selection.target, &self.selection.quality)
            .await;
        self.drain_events();
        Ok(result?)
    }

    /// One-shot `download`: start, follow until the job ends and the file is saved.
    pub async fn download(&mut self, url: String, quality: Option<String>) -> Result<()> {
        self.url = url;
        match quality {
            Some(q) => {
                if let Err(e) = self.selection.set_quality(&q) {
                    bail!(e);
                }
            }
            None if self.selection.target == TargetType::Video => {
                // Same flow as the page: preview first, which picks the best quality.
                if let Err(e) = self.info(None).await {
                    warn!("Preview unavailable, keeping quality {}: {}", self.selection.quality, e);
                }
            }
            None => {}
        }

        let task_id = self.start(None).await?;
        info!("Following task {}", task_id);

        let mut ended = None;
        let mut saved_ok = true;
        while ended.is_none() || !self.fetches.is_empty() {
            tokio::select! {
                event = self.events.recv(), if ended.is_none() => {
                    match event {
                        Some(event) => ended = self.on_event(event).or(ended),
                        None => ended = Some(JobEnd::Failed),
                    }
                }
                Some(result) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    saved_ok &= self.on_fetch(result);
                }
            }
        }

        match ended {
            Some(JobEnd::Completed) if saved_ok => Ok(()),
            Some(JobEnd::Completed) => bail!("download finished but the file could not be saved"),
            _ => bail!("download failed"),
        }
    }

    async fn print_status(&self) {
        let snap = self.orchestrator.snapshot().await;
        println!(
            "URL: {}\nType: {}  Quality: {}  Theme: {}",
            if self.url.is_empty() { "-" } else { &self.url },
            self.selection.target,
            self.selection.quality,
            self.selection.theme.as_str(),
        );
        let activity = match snap.activity {
            Activity::Idle => "idle",
            Activity::FetchingInfo => "fetching info",
            Activity::Downloading => "downloading",
            Activity::Completed => "completed",
            Activity::Error => "error",
        };
        println!(
            "State: {} ({}, {:.1}%){}",
            activity,
            snap.phase,
            snap.displayed,
            snap.active_task.map(|t| format!(" task {}", t)).unwrap_or_default()
        );
        if let Some(preview) = &snap.preview {
            print!("{}", preview_card(preview, &self.selection));
        }
    }

    /// Handle one shell line. Returns false when the shell should exit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return true;
        }
        let command = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                println!("{}", e.render());
                return true;
            }
        };

        match command {
            ShellCommand::Url { url } => self.url = url,
            ShellCommand::Info { url } => {
                if let Err(e) = self.info(url).await {
                    info!("Preview failed: {}", e);
                }
            }
            ShellCommand::Type { target } => {
                self.selection.target = target;
                println!("Type: {}", target);
            }
            ShellCommand::Quality { quality } => match self.selection.set_quality(&quality) {
                Ok(()) => println!("Quality: {}", self.selection.quality),
                Err(e) => println!("{}", e),
            },
            ShellCommand::Theme => {
                let theme = self.selection.toggle_theme();
                println!("Theme: {}", theme.as_str());
            }
            ShellCommand::Download { url } => match self.start(url).await {
                Ok(task_id) => println!("Task {}", task_id),
                Err(e) => info!("Download not started: {}", e),
            },
            ShellCommand::Cancel => {
                self.orchestrator.abandon().await;
                println!("Stopped following the download");
            }
            ShellCommand::Status => self.print_status().await,
            ShellCommand::Quit => return false,
        }
        true
    }

    /// Interactive shell: reads commands while rendering events as they arrive.
    pub async fn run_shell(&mut self) -> Result<()> {
        println!("Social Downloader - type `help` for commands");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(&line).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                Some(event) = self.events.recv() => {
                    self.on_event(event);
                }
                Some(result) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    self.on_fetch(result);
                }
            }
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        self.orchestrator.shutdown().await;
        self.fetches.abort_all();
    }
}
