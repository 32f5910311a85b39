//! Platforms command - list configured platforms

use anyhow::Result;
use std::path::PathBuf;

use crate::args::PlatformsArgs;
use crate::config::AppConfig;
use crate::wiring;

pub async fn execute(args: PlatformsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let statuses = wiring::platform_statuses(&config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!(
        "{:<10} {:<8} {:<6} {:<13} {:<18} max chars",
        "platform", "enabled", "mode", "shared token", "ad types"
    );
    for status in &statuses {
        let ad_types: Vec<&str> = status.ad_types.iter().map(|t| t.as_str()).collect();
        println!(
            "{:<10} {:<8} {:<6} {:<13} {:<18} {}",
            status.platform.as_str(),
            if status.enabled { "yes" } else { "no" },
            status.mode,
            if status.shared_token { "set" } else { "-" },
            if ad_types.is_empty() {
                "-".to_string()
            } else {
                ad_types.join(",")
            },
            status
                .max_text_chars
                .map_or_else(|| "-".to_string(), |max| max.to_string())
        );
    }

    Ok(())
}
