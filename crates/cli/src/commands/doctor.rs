//! Doctor command - validate configuration and show status

use ad_publisher_adapters::{credentials::EnvCredentialStore, stub::StubBehavior};
use ad_publisher_domain::{PlatformId, parse_http_url};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::{AppConfig, PlatformConfig, PlatformMode};
use crate::wiring;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    state: CheckResult,
    publish: CheckResult,
    platforms: BTreeMap<String, CheckResult>,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        state: CheckResult::error("Not checked"),
        publish: CheckResult::error("Not checked"),
        platforms: BTreeMap::new(),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.state = check_state(config);
        report.publish = check_publish(config);

        let credentials = wiring::credential_store(config);
        for (platform, settings) in wiring::known_platforms(config) {
            let result = check_platform(&platform, settings, &credentials);
            report.platforms.insert(platform.to_string(), result);
        }
    }

    // Determine overall status
    let checks: Vec<&CheckResult> = [&report.config, &report.state, &report.publish]
        .into_iter()
        .chain(report.platforms.values())
        .collect();

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_state(config: &AppConfig) -> CheckResult {
    if !config.general.record_state {
        return CheckResult::ok("State recording disabled");
    }

    let path = &config.general.state_db_path;
    if path.exists() {
        return CheckResult::ok(format!("State database: {}", path.display()));
    }

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    match parent {
        Some(dir) if !dir.exists() => CheckResult::warn(format!(
            "State database {} does not exist yet; directory {} will be created",
            path.display(),
            dir.display()
        )),
        _ => CheckResult::ok(format!(
            "State database {} will be created on first publish",
            path.display()
        )),
    }
}

fn check_publish(config: &AppConfig) -> CheckResult {
    let settings = &config.publish;
    if settings.platform_timeout_secs == 0 {
        return CheckResult::error("platform_timeout_secs must be greater than zero");
    }

    let publish_config = settings.to_publish_config();
    let deadline = publish_config.overall_deadline();
    let details = serde_json::json!({
        "platform_timeout_secs": settings.platform_timeout_secs,
        "max_retries": settings.max_retries,
        "retry_backoff_ms": settings.retry_backoff_ms,
        "overall_deadline_ms": deadline.as_millis() as u64,
    });

    let worst_case = publish_config
        .platform_timeout
        .saturating_mul(settings.max_retries.saturating_add(1));
    if deadline < worst_case {
        return CheckResult::warn(format!(
            "overall timeout ({}s) is below timeout x attempts ({}s); retries may be cut off",
            deadline.as_secs(),
            worst_case.as_secs()
        ))
        .with_details(details);
    }

    CheckResult::ok(format!(
        "Timeout {}s per attempt, {} retr{}",
        settings.platform_timeout_secs,
        settings.max_retries,
        if settings.max_retries == 1 { "y" } else { "ies" }
    ))
    .with_details(details)
}

fn check_platform(
    platform: &PlatformId,
    settings: &PlatformConfig,
    credentials: &EnvCredentialStore,
) -> CheckResult {
    if !settings.enabled {
        return CheckResult::ok("Disabled");
    }

    match settings.mode {
        PlatformMode::Stub => match settings.stub_outcome.parse::<StubBehavior>() {
            Ok(behavior) => CheckResult::ok(format!(
                "Stub mode, answers {} after {}ms",
                behavior, settings.stub_delay_ms
            )),
            Err(e) => CheckResult::error(format!("Invalid stub_outcome: {}", e)),
        },
        PlatformMode::Api => {
            if let Some(base_url) = &settings.base_url {
                if parse_http_url(base_url.trim()).is_none() {
                    return CheckResult::error(format!(
                        "base_url is not an http(s) URL: {}",
                        base_url
                    ));
                }
            }

            let shared_token_var = credentials.platform_token_var(platform);
            if credentials.has_platform_token(platform) {
                CheckResult::ok(format!("API mode, {} (set)", shared_token_var))
            } else {
                CheckResult::warn(format!(
                    "API mode, {} (not set); owners need their own tokens",
                    shared_token_var
                ))
            }
        }
    }
}

fn print_report(report: &DoctorReport) {
    println!("ad-publisher Doctor Report");
    println!("==========================");
    println!();

    print_check("Config", &report.config);
    print_check("State", &report.state);
    print_check("Publish", &report.publish);
    for (platform, result) in &report.platforms {
        print_check(&format!("Platform {}", platform), result);
    }

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall != "error" {
        println!();
        println!("Ready to publish! Try: ad-publisher publish --require-approval --platform x ...");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
