use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::info;

use prioritydesk_lib::commands::{self, ScoringScope};
use prioritydesk_lib::config::load_config;
use prioritydesk_lib::error::CommandError;
use prioritydesk_lib::jobs::run_job_reaper;
use prioritydesk_lib::linear::sync::SyncOptions;
use prioritydesk_lib::services::dashboard::FeatureFilter;
use prioritydesk_lib::state::AppState;

const USAGE: &str = "usage: prioritydesk <refresh|list [--all]|score [--stale]|status|sync [--sort-order] [--comment]|usage>";

/// Reap finished jobs this often.
const REAPER_INTERVAL: Duration = Duration::from_secs(300);

fn command_failed(err: CommandError) -> anyhow::Error {
    anyhow!("{} ({})", err.message, err.recovery_suggestion)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    prioritydesk_lib::init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        bail!(USAGE);
    };
    if !matches!(command, "refresh" | "list" | "score" | "status" | "sync" | "usage") {
        bail!("unknown command '{}'\n{}", command, USAGE);
    }
    let has_flag = |flag: &str| args.iter().skip(1).any(|a| a == flag);

    let config = load_config().context("Failed to load configuration")?;
    let state = Arc::new(AppState::from_config(&config).context("Failed to open data store")?);
    let reaper = tokio::spawn(run_job_reaper(state.jobs.clone(), REAPER_INTERVAL));

    // Everything except `usage` works on a fresh snapshot.
    if command != "usage" {
        let summary = commands::refresh_data(&state).await.map_err(command_failed)?;
        info!(
            "Refreshed {} features ({} duplicates, {} matched posts)",
            summary.features, summary.duplicates, summary.matched_posts
        );
    }

    match command {
        "refresh" => {}
        "list" => {
            let filter = FeatureFilter {
                include_duplicates: has_flag("--all"),
                ..Default::default()
            };
            let features = commands::list_features(&state, filter).map_err(command_failed)?;
            for (rank, f) in features.iter().enumerate() {
                println!(
                    "{:>3}. {:>5.2}  {:<10} {}{}",
                    rank + 1,
                    f.final_score,
                    f.feature.identifier,
                    f.feature.title,
                    if f.flags.is_empty() {
                        String::new()
                    } else {
                        format!("  [{}]", f.flags.join(", "))
                    }
                );
            }
        }
        "score" => {
            let scope = if has_flag("--stale") {
                ScoringScope::PendingOrStale
            } else {
                ScoringScope::All
            };
            let job = commands::start_scoring(&state, None, scope).map_err(command_failed)?;
            info!("Scoring job {} started ({} features)", job.id, job.total);

            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let job = commands::get_job(&state, &job.id).map_err(command_failed)?;
                if job.status.is_terminal() {
                    print_json(&job)?;
                    break;
                }
                info!("Scoring: {}/{}", job.progress, job.total);
            }
        }
        "status" => print_json(&commands::get_score_status(&state).map_err(command_failed)?)?,
        "sync" => {
            let options = SyncOptions {
                set_sort_order: has_flag("--sort-order"),
                add_comment: has_flag("--comment"),
            };
            let results = commands::sync_to_linear(&state, None, options)
                .await
                .map_err(command_failed)?;
            print_json(&results)?;
        }
        "usage" => {
            let (summary, _) = commands::get_usage(&state).map_err(command_failed)?;
            print_json(&summary)?;
        }
        _ => unreachable!("command validated above"),
    }

    state.jobs.stop_reaper();
    let _ = reaper.await;
    Ok(())
}
