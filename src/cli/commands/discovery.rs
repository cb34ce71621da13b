//! Discovery CLI commands: start, watch, status, cancel, forget.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::output::{output, CommandOutput, DiscoveryProgress, TableFormatter};
use crate::domain::models::{
    Config, CoordinatorState, DiscoveryPhase, DiscoveryView, Progress, StartOptions,
};
use crate::domain::ports::{DiscoveryService, SessionStore};
use crate::infrastructure::discovery::HttpDiscoveryClient;
use crate::infrastructure::store::FileSessionStore;
use crate::services::{CoordinatorSettings, DiscoveryCoordinator, StatusPoller};

#[derive(Args, Debug)]
pub struct DiscoveryArgs {
    #[command(subcommand)]
    pub command: DiscoveryCommands,
}

#[derive(Subcommand, Debug)]
pub enum DiscoveryCommands {
    /// Start a strategy search for a domain or URL
    Start(StartArgs),
    /// Follow the stored session until it finishes
    Watch,
    /// Print one snapshot of the stored session
    Status {
        /// Also list every trial, grouped by phase
        #[arg(long)]
        trials: bool,
    },
    /// Cancel the stored session
    Cancel,
    /// Drop the stored session id without contacting the daemon
    Forget,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Domain (youtube.com) or URL (https://youtube.com/watch)
    pub target: String,

    /// Per-check timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u32>,

    /// Maximum checks run in parallel
    #[arg(long)]
    pub max_concurrent: Option<u32>,

    /// Phase to skip (repeatable)
    #[arg(long, value_parser = parse_phase)]
    pub skip_phase: Vec<DiscoveryPhase>,

    /// Restrict the search to this preset (repeatable)
    #[arg(long)]
    pub preset: Vec<String>,

    /// Keep following the session after it starts
    #[arg(long)]
    pub watch: bool,
}

impl StartArgs {
    fn options(&self) -> StartOptions {
        StartOptions {
            timeout_secs: self.timeout_secs,
            max_concurrent: self.max_concurrent,
            skip_phases: self.skip_phase.clone(),
            presets: self.preset.clone(),
            ..StartOptions::default()
        }
    }
}

fn parse_phase(value: &str) -> Result<DiscoveryPhase, String> {
    DiscoveryPhase::ALL
        .into_iter()
        .filter(|phase| *phase != DiscoveryPhase::Unknown)
        .find(|phase| phase.as_str() == value)
        .ok_or_else(|| {
            let known: Vec<&str> = DiscoveryPhase::ALL
                .iter()
                .filter(|phase| **phase != DiscoveryPhase::Unknown)
                .map(|phase| phase.as_str())
                .collect();
            format!("unknown phase '{value}' (expected one of: {})", known.join(", "))
        })
}

/// Snapshot of the coordinator view
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ViewOutput {
    view: DiscoveryView,
    #[serde(skip)]
    show_trials: bool,
}

impl ViewOutput {
    fn new(view: &DiscoveryView) -> Self {
        Self {
            view: view.clone(),
            show_trials: false,
        }
    }

    fn with_trials(mut self, show_trials: bool) -> Self {
        self.show_trials = show_trials;
        self
    }
}

impl CommandOutput for ViewOutput {
    fn to_human(&self) -> String {
        let view = &self.view;
        let mut lines = Vec::new();

        let state = match view.state {
            CoordinatorState::Complete => style(view.state.as_str()).green().bold(),
            CoordinatorState::Failed => style(view.state.as_str()).red().bold(),
            CoordinatorState::Canceled => style(view.state.as_str()).dim(),
            _ => style(view.state.as_str()).yellow(),
        };
        let progress = match view.progress {
            Progress::Percent(percent) => format!("{percent:.0}%"),
            Progress::Indeterminate => "in progress".to_string(),
        };
        match &view.session_id {
            Some(id) => lines.push(format!("Discovery {id}: {state} ({progress})")),
            None => lines.push(format!("Discovery: {state}")),
        }

        if let Some(session) = &view.session {
            if let Some(phase) = session.current_phase {
                lines.push(format!("  Phase:   {phase}"));
            }
            lines.push(format!(
                "  Checks:  {}/{}",
                session.completed_checks, session.total_checks
            ));
        } else if view.state.is_active() {
            lines.push("  Waiting for the first status update".to_string());
        }

        if let Some(error) = &view.last_error {
            lines.push(format!("  {} {error}", style("Error:").red().bold()));
        }
        if let Some(warning) = &view.warning {
            lines.push(format!("  {} {warning}", style("Warning:").yellow()));
        }

        if !view.ranked_domains.is_empty() {
            let formatter = TableFormatter::new();
            lines.push(String::new());
            lines.push(formatter.format_ranked_domains(&view.ranked_domains));

            if self.show_trials {
                for (domain, groups) in &view.grouped_results {
                    lines.push(String::new());
                    lines.push(style(domain).bold().to_string());
                    lines.push(formatter.format_phase_groups(groups));
                }
            }
        }

        lines.join("\n")
    }
}

/// Result of `discovery forget`
#[derive(Debug, Serialize)]
pub struct ForgetOutput {
    pub session_id: Option<String>,
}

impl CommandOutput for ForgetOutput {
    fn to_human(&self) -> String {
        match &self.session_id {
            Some(id) => format!("Forgot discovery session {id}"),
            None => "No discovery session stored".to_string(),
        }
    }
}

pub async fn execute(args: DiscoveryArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        DiscoveryCommands::Start(start) => start_discovery(start, config, json_mode).await,
        DiscoveryCommands::Watch => watch_discovery(config, json_mode).await,
        DiscoveryCommands::Status { trials } => show_status(config, trials, json_mode).await,
        DiscoveryCommands::Cancel => cancel_discovery(config, json_mode).await,
        DiscoveryCommands::Forget => forget_discovery(config, json_mode),
    }
}

async fn start_discovery(args: StartArgs, config: &Config, json_mode: bool) -> Result<()> {
    let coordinator = mount(config).await?;
    if coordinator.state().is_active() {
        coordinator.shutdown().await;
        anyhow::bail!(
            "A discovery session is already tracked; use `discovery watch`, `discovery cancel` or `discovery forget`"
        );
    }

    let view = coordinator.start(&args.target, args.options()).await?;

    let view = if args.watch {
        follow(&coordinator, json_mode).await?
    } else {
        coordinator.shutdown().await;
        view
    };

    output(&ViewOutput::new(&view), json_mode);
    Ok(())
}

async fn watch_discovery(config: &Config, json_mode: bool) -> Result<()> {
    let coordinator = mount_tracked(config).await?;
    let view = follow(&coordinator, json_mode).await?;
    output(&ViewOutput::new(&view).with_trials(false), json_mode);
    Ok(())
}

async fn show_status(config: &Config, trials: bool, json_mode: bool) -> Result<()> {
    let coordinator = mount_tracked(config).await?;

    let wait = Duration::from_millis(config.polling.interval_ms)
        + Duration::from_secs(config.service.timeout_secs);
    let mut views = coordinator.subscribe();
    let first_delivery = async {
        loop {
            let view = views.borrow_and_update().clone();
            if view.session.is_some() || !view.state.is_active() {
                return;
            }
            if views.changed().await.is_err() {
                return;
            }
        }
    };
    if tokio::time::timeout(wait, first_delivery).await.is_err() {
        tracing::debug!("no status delivered before timeout");
    }

    coordinator.shutdown().await;
    output(
        &ViewOutput::new(&coordinator.view()).with_trials(trials),
        json_mode,
    );
    Ok(())
}

async fn cancel_discovery(config: &Config, json_mode: bool) -> Result<()> {
    let coordinator = mount_tracked(config).await?;
    let view = coordinator.cancel().await?;
    output(&ViewOutput::new(&view), json_mode);
    Ok(())
}

fn forget_discovery(config: &Config, json_mode: bool) -> Result<()> {
    let store = FileSessionStore::new(&config.store.path);
    let session_id = store.load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "stored session unreadable, clearing it");
        None
    });
    store
        .clear()
        .with_context(|| format!("Failed to clear {}", store.path().display()))?;

    output(&ForgetOutput { session_id }, json_mode);
    Ok(())
}

/// Build a coordinator from config and resume the stored session, if any.
async fn mount(config: &Config) -> Result<DiscoveryCoordinator> {
    let service: Arc<dyn DiscoveryService> = Arc::new(
        HttpDiscoveryClient::from_config(&config.service)
            .context("Failed to create Discovery Service client")?,
    );
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&config.store.path));
    let poller = StatusPoller::with_config(
        Arc::clone(&service),
        Duration::from_millis(config.polling.interval_ms),
        config.service.delivery,
    );
    let settings = CoordinatorSettings {
        resume_failure_threshold: config.polling.resume_failure_threshold,
    };

    Ok(DiscoveryCoordinator::mount(service, store, poller, settings).await)
}

/// Like [`mount`], but fails when nothing is stored.
async fn mount_tracked(config: &Config) -> Result<DiscoveryCoordinator> {
    let coordinator = mount(config).await?;
    if coordinator.state() == CoordinatorState::Idle {
        anyhow::bail!("No discovery session stored; start one with `discovery start <domain>`");
    }
    Ok(coordinator)
}

/// Render views until the session ends or the operator presses Ctrl-C.
///
/// Ctrl-C only detaches: the stored id is kept so `discovery watch` can pick
/// the session up again.
async fn follow(coordinator: &DiscoveryCoordinator, json_mode: bool) -> Result<Arc<DiscoveryView>> {
    let mut views = coordinator.subscribe();
    let mut progress = (!json_mode).then(DiscoveryProgress::new);

    loop {
        let view = views.borrow_and_update().clone();
        if let Some(progress) = progress.as_mut() {
            progress.update(&view);
        }

        if !view.state.is_active() {
            if let Some(progress) = &progress {
                progress.finish(&view);
            }
            coordinator.shutdown().await;
            return Ok(view);
        }

        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    coordinator.shutdown().await;
                    return Ok(coordinator.view());
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                coordinator.shutdown().await;
                if let Some(progress) = &progress {
                    progress.detach("detached, run `dpi-console discovery watch` to reattach");
                }
                return Ok(coordinator.view());
            }
        }
    }
}
