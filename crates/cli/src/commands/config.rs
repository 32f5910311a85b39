//! Config command - write the example file or print the effective settings

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs, config_path: Option<PathBuf>) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => init_config(&path, force).await,
        ConfigCommands::Show { json } => show_config(config_path.as_deref(), json),
    }
}

async fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    tokio::fs::write(path, AppConfig::example_toml())
        .await
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    println!("Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Choose api or stub mode for each platform");
    println!("  2. Export tokens, e.g. AD_PUBLISHER_X_TOKEN and AD_PUBLISHER_FACEBOOK_ACCOUNT_ID");
    println!("  3. Run 'ad-publisher doctor' to validate your setup");
    println!("  4. Run 'ad-publisher publish --require-approval ...' to test");

    Ok(())
}

/// Print the settings after file and `AD_PUBLISHER__*` overrides are merged
fn show_config(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        print!("{}", rendered);
    }

    Ok(())
}
