//! Ads command - inspect stored ad state

use ad_publisher_adapters::store::SqliteAdStore;
use ad_publisher_domain::AdStore;
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;

use crate::args::{AdsArgs, AdsCommands};
use crate::config::AppConfig;

pub async fn execute(args: AdsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    match args.command {
        AdsCommands::Show { ad_id, json } => show(&config, &ad_id, json).await,
    }
}

async fn show(config: &AppConfig, ad_id: &str, json: bool) -> Result<()> {
    let db_path = &config.general.state_db_path;
    if !db_path.exists() {
        bail!("No state database at {}", db_path.display());
    }

    let store = SqliteAdStore::new(db_path)
        .await
        .context("Failed to open SQLite ad store")?;

    let ad = store.get_ad(ad_id).await.context("Failed to load ad")?;
    let history = store
        .history(ad_id)
        .await
        .context("Failed to load publish history")?;

    if ad.is_none() && history.is_empty() {
        bail!("Unknown ad: {}", ad_id);
    }

    if json {
        let output = serde_json::json!({
            "ad": ad,
            "history": history,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match &ad {
        Some(ad) => {
            println!("Ad {} (campaign {})", ad.ad_id, ad.campaign_id);
            println!("  status:       {}", ad.status.as_str());
            if let Some(published_at) = ad.published_at {
                println!("  published at: {}", published_at.format(&Rfc3339)?);
            }
        }
        None => println!("Ad {}: never published", ad_id),
    }

    println!();
    println!("Publish history ({} report(s)):", history.len());
    for entry in &history {
        let result = if entry.all_succeeded {
            "all succeeded"
        } else if entry.any_succeeded {
            "partial"
        } else {
            "all failed"
        };
        println!(
            "  {}  {}  {}",
            entry.completed_at.format(&Rfc3339)?,
            entry.report_id,
            result
        );
    }

    Ok(())
}
