//! Publish command - fan one ad out to its target platforms

use ad_publisher_adapters::{outbox::OutboxWriter, store::SqliteAdStore};
use ad_publisher_domain::{
    AdSubmission, AdType, PublishSummary, StateUpdate, SystemClock,
    usecases::{AdStateUpdater, PublishAdUseCase, PublishOrchestrator},
};
use anyhow::{Context, Result, bail};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::args::PublishArgs;
use crate::config::AppConfig;
use crate::wiring;

pub async fn execute(args: PublishArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let submission = build_submission(&args)?;

    if args.outbox.is_some() && !args.require_approval {
        tracing::warn!("--outbox is ignored without --require-approval");
    }

    let outbox = if args.require_approval {
        let path = args.outbox.clone().unwrap_or_else(default_outbox_path);
        let writer = OutboxWriter::new(path)
            .await
            .context("Failed to initialize outbox writer")?;
        tracing::info!(outbox = %writer.path().display(), "Writing posts to outbox for approval");
        Some(writer)
    } else {
        None
    };

    let registry = wiring::build_registry(&config, outbox.as_ref())?;
    let orchestrator = PublishOrchestrator::new(
        Arc::new(registry),
        Arc::new(wiring::credential_store(&config)),
        Arc::new(SystemClock),
        config.publish.to_publish_config(),
    );

    let record = config.general.record_state && !args.no_record;
    let updater = if record {
        let store = SqliteAdStore::new(&config.general.state_db_path)
            .await
            .context("Failed to initialize SQLite ad store")?;
        let updater = AdStateUpdater::new(Arc::new(store));
        // Queued posts are not live yet
        Some(if args.require_approval {
            updater.queue_only()
        } else {
            updater
        })
    } else {
        None
    };

    tracing::info!(
        ad_id = %submission.ad_id,
        platforms = ?submission.platforms,
        require_approval = args.require_approval,
        record_state = record,
        "Starting publish"
    );

    let use_case = PublishAdUseCase::new(orchestrator, updater);
    let summary = match use_case.execute(submission).await {
        Ok(summary) => summary,
        Err(call_error) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&call_error)?);
            }
            bail!("{}", call_error);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if !summary.report.any_succeeded() {
        bail!("No platform accepted the ad");
    }

    Ok(())
}

fn default_outbox_path() -> PathBuf {
    PathBuf::from("./outbox.jsonl")
}

fn build_submission(args: &PublishArgs) -> Result<AdSubmission> {
    if let Some(path) = &args.request {
        return read_request(path);
    }

    let image_url = args.image_url.clone();
    let video_url = args.video_url.clone();
    let ad_type = args.ad_type.unwrap_or(if video_url.is_some() {
        AdType::Video
    } else if image_url.is_some() {
        AdType::Image
    } else {
        AdType::Text
    });

    Ok(AdSubmission {
        creative_content: args.content.clone().unwrap_or_default(),
        image_url,
        video_url,
        ad_type,
        owner_id: args.owner_id.clone().unwrap_or_default(),
        campaign_id: args.campaign_id.clone().unwrap_or_default(),
        ad_id: args.ad_id.clone().unwrap_or_default(),
        platforms: args.platform.clone(),
    })
}

fn read_request(path: &Path) -> Result<AdSubmission> {
    let raw = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read request from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?
    };

    serde_json::from_str(&raw).context("Request is not a valid ad submission")
}

fn print_summary(summary: &PublishSummary) {
    let report = &summary.report;

    println!(
        "Ad {} (campaign {}), report {}",
        report.ad_id(),
        report.campaign_id(),
        report.report_id()
    );
    println!();

    for outcome in report.outcomes() {
        let latency = outcome.latency().as_millis();
        if outcome.is_success() {
            println!(
                "  {:<10} ok      {} [{} attempt(s), {}ms]",
                outcome.platform().as_str(),
                outcome
                    .post_url()
                    .or(outcome.external_post_id())
                    .unwrap_or_default(),
                outcome.attempts(),
                latency
            );
        } else {
            println!(
                "  {:<10} failed  {}: {} [{} attempt(s), {}ms]",
                outcome.platform().as_str(),
                outcome
                    .error_kind()
                    .map(|kind| kind.as_str())
                    .unwrap_or("unknown"),
                outcome.error_message().unwrap_or_default(),
                outcome.attempts(),
                latency
            );
        }
    }

    println!();
    match &summary.state_update {
        StateUpdate::Published { .. } => println!("Ad status: published"),
        StateUpdate::Unchanged => println!("Ad status: unchanged (no platform succeeded)"),
        StateUpdate::Queued => println!("Ad status: unchanged (queued for approval)"),
        StateUpdate::Skipped => println!("Ad status: not recorded"),
        StateUpdate::Failed { error } => println!("Ad status: update failed ({})", error),
    }

    let failed = report.failed_platforms();
    if report.any_succeeded() && !failed.is_empty() {
        let flags: Vec<String> = failed
            .iter()
            .map(|platform| format!("--platform {}", platform))
            .collect();
        println!("Retry the failed platforms with: {}", flags.join(" "));
    }
}
