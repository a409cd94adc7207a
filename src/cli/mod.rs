//! CLI argument parsing and command dispatch

mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use campaign_core::{
    CampaignBounds, CampaignConfig, CampaignError, ChannelProgressSink, FanoutProgressSink,
    Orchestrator, OrchestratorBuilder, OrchestratorConfig, ProgressSink, ProgressUpdate,
    ToolRegistry, TracingProgressSink, TrialRate,
};
use campaign_samplers::{BuiltinRegistry, WORDLIST_TOOL};
use campaign_storage::JsonFileStore;
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;

/// Default location of the persisted history log
const DEFAULT_HISTORY_PATH: &str = "campaign-history.json";

#[derive(Parser, Debug)]
#[command(name = "campaign-engine")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to an orchestrator configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the history log
    #[arg(long, global = true, default_value = DEFAULT_HISTORY_PATH)]
    pub history: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one campaign to completion
    Run(RunArgs),
    /// Show the history log, most recent first
    History {
        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show statistics aggregated over the history log
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List available tools and outcome models
    Tools,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Tool to run (see `tools`)
    #[arg(short, long)]
    pub tool: String,

    /// Campaign configuration file (JSON). Rate and bound flags are ignored when set.
    #[arg(long)]
    pub campaign: Option<PathBuf>,

    /// Trials per second
    #[arg(short, long, default_value = "10")]
    pub rate: f64,

    /// Spacing between trials in milliseconds, instead of --rate
    #[arg(long, conflicts_with = "rate")]
    pub interval_ms: Option<u64>,

    /// Maximum number of trials
    #[arg(short = 'n', long)]
    pub attempts: Option<u64>,

    /// Maximum duration in seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Run without bounds, up to the orchestrator's ceiling
    #[arg(long, conflicts_with_all = ["attempts", "duration"])]
    pub unbounded: bool,

    /// End the campaign on the first success (default for the wordlist tool)
    #[arg(long)]
    pub stop_on_success: bool,

    /// Keep going after a success, even for the wordlist tool
    #[arg(long, conflicts_with = "stop_on_success")]
    pub keep_going: bool,

    /// Named outcome model replacing the tool's own
    #[arg(long)]
    pub outcome_model: Option<String>,

    /// Rate jitter as a fraction of the interval (0.0 - 1.0)
    #[arg(long, default_value = "0")]
    pub jitter: f64,

    /// Tool parameter as key=value; values are parsed as JSON when possible
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, serde_json::Value)>,

    /// Accept the terms of use for this run
    #[arg(long)]
    pub accept_terms: bool,
}

impl Cli {
    /// Execute the selected command
    pub async fn run(&self) -> Result<()> {
        let config = self.orchestrator_config()?;

        match &self.command {
            Commands::Run(args) => self.run_campaign(config, args).await,
            Commands::History { limit, json } => {
                let orchestrator = self.orchestrator(config, Arc::new(TracingProgressSink))?;
                let mut entries = orchestrator.history();
                if let Some(limit) = limit {
                    entries.truncate(*limit);
                }
                if *json {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else {
                    output::print_history(&entries);
                }
                Ok(())
            }
            Commands::Stats { json } => {
                let orchestrator = self.orchestrator(config, Arc::new(TracingProgressSink))?;
                let stats = orchestrator.statistics();
                if *json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    output::print_statistics(&stats);
                }
                Ok(())
            }
            Commands::Tools => {
                let registry = BuiltinRegistry::with_defaults();
                output::print_tools(&registry.tool_ids(), &registry.model_names());
                Ok(())
            }
        }
    }

    fn orchestrator_config(&self) -> Result<OrchestratorConfig> {
        match &self.config {
            Some(path) => OrchestratorConfig::from_file(path)
                .with_context(|| format!("Failed to load config from: {}", path.display())),
            None => Ok(OrchestratorConfig::default()),
        }
    }

    fn orchestrator(
        &self,
        config: OrchestratorConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Orchestrator> {
        let orchestrator = OrchestratorBuilder::new()
            .config(config)
            .registry(Arc::new(BuiltinRegistry::with_defaults()))
            .store(Arc::new(JsonFileStore::new(&self.history)))
            .sink(sink)
            .build()?;
        Ok(orchestrator)
    }

    async fn run_campaign(&self, config: OrchestratorConfig, args: &RunArgs) -> Result<()> {
        let campaign = args.campaign_config()?;

        let (channel_sink, mut updates) = ChannelProgressSink::channel(config.progress_buffer);
        let sink = FanoutProgressSink::new()
            .with(Arc::new(TracingProgressSink))
            .with(Arc::new(channel_sink));
        let orchestrator = self.orchestrator(config, Arc::new(sink))?;

        if args.accept_terms {
            orchestrator.accept_terms();
        }

        output::print_banner(&args.tool, &campaign);

        let handle = match orchestrator.start_campaign(&args.tool, campaign.clone()) {
            Ok(handle) => handle,
            Err(CampaignError::PolicyNotAccepted) => {
                bail!("Terms of use not accepted. Re-run with --accept-terms.")
            }
            Err(e) => return Err(e.into()),
        };
        let campaign_id = handle.campaign_id().to_string();
        tracing::info!(campaign_id = %campaign_id, "Campaign started");

        let progress = output::progress_bar(campaign.estimated_max_attempts());
        let finished = handle.executor().wait();
        tokio::pin!(finished);
        let mut interrupted = false;

        let summary = loop {
            tokio::select! {
                summary = &mut finished => break summary,
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    progress.set_message("stopping...");
                    for (id, result) in orchestrator.stop_all().await {
                        if let Err(e) = result {
                            tracing::warn!(campaign_id = %id, error = %e, "Stop failed");
                        }
                    }
                }
                Some(update) = updates.recv() => render_update(&progress, update),
            }
        };
        drain_updates(&progress, &mut updates);
        progress.finish_with_message(summary.status.to_string());

        // Record the stop entry before exiting
        match orchestrator.wait(&campaign_id).await {
            Ok(_) | Err(CampaignError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        println!();
        output::print_summary(&summary);
        Ok(())
    }
}

impl RunArgs {
    fn campaign_config(&self) -> Result<CampaignConfig> {
        let mut config = match &self.campaign {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read campaign file: {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Invalid campaign file: {}", path.display()))?
            }
            None => CampaignConfig::new(self.trial_rate(), self.bounds()?)
                .with_success_terminal(self.tool == WORDLIST_TOOL)
                .with_jitter(self.jitter),
        };

        if self.stop_on_success {
            config.success_terminal = true;
        }
        if self.keep_going {
            config.success_terminal = false;
        }
        if let Some(model) = &self.outcome_model {
            config.outcome_model = model.clone();
        }
        for (key, value) in &self.params {
            config.params.insert(key.clone(), value.clone());
        }

        config.validate()?;
        Ok(config)
    }

    fn trial_rate(&self) -> TrialRate {
        match self.interval_ms {
            Some(ms) => TrialRate::Interval(Duration::from_millis(ms)),
            None => TrialRate::PerSecond(self.rate),
        }
    }

    fn bounds(&self) -> Result<CampaignBounds> {
        if self.unbounded {
            return Ok(CampaignBounds::unbounded());
        }

        let mut bounds = CampaignBounds::default();
        if let Some(n) = self.attempts {
            bounds = bounds.with_max_attempts(n);
        }
        if let Some(secs) = self.duration {
            let duration = Duration::try_from_secs_f64(secs)
                .with_context(|| format!("Invalid duration: {secs}"))?;
            bounds = bounds.with_max_duration(duration);
        }
        if bounds.max_attempts.is_none() && bounds.max_duration.is_none() {
            bail!("Specify --attempts, --duration or --unbounded");
        }
        Ok(bounds)
    }
}

fn render_update(progress: &indicatif::ProgressBar, update: ProgressUpdate) {
    match update {
        ProgressUpdate::Progress(event) => {
            progress.set_position(event.attempts);
            progress.set_message(event.last_outcome.to_string());
        }
        ProgressUpdate::Terminal(summary) => {
            progress.set_position(summary.counts.attempts);
        }
    }
}

fn drain_updates(
    progress: &indicatif::ProgressBar,
    updates: &mut mpsc::Receiver<ProgressUpdate>,
) {
    while let Ok(update) = updates.try_recv() {
        render_update(progress, update);
    }
}

fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["campaign-engine", "run"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Run(args) => args,
            other => panic!("Expected run command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("target=router").unwrap(),
            ("target".to_string(), json!("router"))
        );
        assert_eq!(
            parse_param("wordlist=[\"a\",\"b\"]").unwrap(),
            ("wordlist".to_string(), json!(["a", "b"]))
        );
        assert_eq!(parse_param("n=3").unwrap().1, json!(3));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_run_args_build_config() {
        let args = run_args(&["--tool", "flood", "--rate", "20", "--attempts", "100"]);
        let config = args.campaign_config().unwrap();

        assert_eq!(config.rate, TrialRate::PerSecond(20.0));
        assert_eq!(config.bounds.max_attempts, Some(100));
        assert!(!config.success_terminal);
    }

    #[test]
    fn test_wordlist_defaults_to_stop_on_success() {
        let args = run_args(&["--tool", "wordlist", "--duration", "2", "-p", "target=x"]);
        let config = args.campaign_config().unwrap();

        assert!(config.success_terminal);
        assert_eq!(config.bounds.max_duration, Some(Duration::from_secs(2)));
        assert_eq!(config.param("target"), Some(&json!("x")));

        let args = run_args(&["--tool", "wordlist", "--attempts", "5", "--keep-going"]);
        assert!(!args.campaign_config().unwrap().success_terminal);
    }

    #[test]
    fn test_run_requires_a_bound() {
        let args = run_args(&["--tool", "flood"]);
        assert!(args.campaign_config().is_err());

        let args = run_args(&["--tool", "flood", "--unbounded"]);
        assert!(args.campaign_config().unwrap().bounds.unbounded);
    }
}
