//! Terminal rendering for campaign runs, history and statistics

use campaign_core::{
    CampaignConfig, CampaignSummary, HistoryAction, HistoryEntry, OrchestratorStatistics,
    TrialRate,
};
use indicatif::{ProgressBar, ProgressStyle};

const RULE_WIDTH: usize = 70;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn print_banner(tool: &str, config: &CampaignConfig) {
    println!("\n{}", rule());
    println!("   Campaign Engine");
    println!("{}", rule());
    println!();
    println!("Configuration:");
    println!("  Tool:           {tool}");
    match config.rate {
        TrialRate::PerSecond(rps) => println!("  Rate:           {rps}/s"),
        TrialRate::Interval(d) => println!("  Interval:       {d:?}"),
    }
    if let Some(n) = config.bounds.max_attempts {
        println!("  Max attempts:   {n}");
    }
    if let Some(d) = config.bounds.max_duration {
        println!("  Max duration:   {d:?}");
    }
    if config.bounds.unbounded {
        println!("  Bounds:         none (orchestrator ceiling applies)");
    }
    println!(
        "  On success:     {}",
        if config.success_terminal {
            "stop"
        } else {
            "continue"
        }
    );
    if !config.outcome_model.is_empty() {
        println!("  Outcome model:  {}", config.outcome_model);
    }
    println!("{}", rule());
    println!();
}

/// Bar when the total is known, spinner otherwise
pub fn progress_bar(total: Option<u64>) -> ProgressBar {
    let (bar, template) = match total {
        Some(total) => (
            ProgressBar::new(total),
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ),
        None => (
            ProgressBar::new_spinner(),
            "{spinner:.green} [{elapsed_precise}] {pos} trials {msg}",
        ),
    };

    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}

pub fn print_summary(summary: &CampaignSummary) {
    let counts = &summary.counts;
    let elapsed = summary.duration().as_secs_f64();

    println!("{}", rule());
    println!("   Result: {}", summary.status.to_string().to_uppercase());
    println!("{}", rule());
    println!("  Campaign:       {}", summary.campaign_id);
    println!("  Duration:       {elapsed:.2}s");
    println!("  Attempts:       {}", counts.attempts);
    println!("  Successes:      {}", counts.successes);
    println!("  Misses:         {}", counts.misses);
    println!("  Rejected:       {}", counts.rejects);
    println!("  Errors:         {}", counts.errors);
    if elapsed > 0.0 {
        println!(
            "  Throughput:     {:.2} trials/s",
            counts.attempts as f64 / elapsed
        );
    }
    if let Some(input) = &summary.winning_input {
        println!("  Winning input:  {input}");
    }
    if let Some(reason) = &summary.reason {
        println!("  Reason:         {reason}");
    }
    println!("{}", rule());
}

pub fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No history recorded.");
        return;
    }

    println!(
        "{:<20} {:<6} {:<34} {:<10} {:>9} {:>10}",
        "TIME", "EVENT", "CAMPAIGN", "STATUS", "ATTEMPTS", "DURATION"
    );
    for entry in entries {
        let time = entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        match (&entry.action, &entry.outcome) {
            (HistoryAction::Stop, Some(outcome)) => println!(
                "{:<20} {:<6} {:<34} {:<10} {:>9} {:>9.1}s",
                time,
                "stop",
                entry.campaign_id,
                outcome.status.to_string(),
                outcome.counts.attempts,
                outcome.duration_ms as f64 / 1000.0
            ),
            _ => println!(
                "{:<20} {:<6} {:<34} {:<10}",
                time, "start", entry.campaign_id, ""
            ),
        }
        if let Some(error) = &entry.error {
            println!("{:<20} {:<6} {error}", "", "");
        }
    }
}

pub fn print_statistics(stats: &OrchestratorStatistics) {
    println!("{}", rule());
    println!("   Campaign Statistics");
    println!("{}", rule());
    println!("  Started:        {}", stats.total_campaigns);
    println!("  Finished:       {}", stats.finished_campaigns);
    println!("  Successful:     {}", stats.successful_campaigns);
    println!("  Success rate:   {:.1}%", stats.success_rate * 100.0);
    println!(
        "  Avg duration:   {:.2}s",
        stats.average_duration().as_secs_f64()
    );
    if let Some(tool) = stats.most_used_tool() {
        println!("  Most used tool: {tool}");
    }

    if !stats.tool_usage.is_empty() {
        println!();
        println!("  By tool:");
        for (tool, count) in &stats.tool_usage {
            println!("    {tool:<14} {count}");
        }
    }
    if !stats.status_counts.is_empty() {
        println!();
        println!("  By status:");
        for (status, count) in &stats.status_counts {
            println!("    {status:<14} {count}");
        }
    }
    println!("{}", rule());
}

pub fn print_tools(tools: &[String], models: &[String]) {
    println!("Tools:");
    for tool in tools {
        println!("  {tool}");
    }
    println!();
    println!("Outcome models (--outcome-model):");
    for model in models {
        println!("  {model}");
    }
}
