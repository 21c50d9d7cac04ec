//! `timegap doctor`: diagnose configuration and service reachability.

use timegap_config::AppConfig;
use timegap_core::activity::ActivitySource;
use timegap_providers::ActivityWatchClient;
use timegap_session::ClipboardAdapter;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("timegap doctor");
    println!("==============\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ok    Config file: {}", config_path.display());
    } else {
        println!("  info  No config file, using defaults (run `timegap onboard` to create one)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ok    Config valid");
            config
        }
        Err(e) => {
            println!("  FAIL  Config invalid: {e}");
            println!("\n  1 issue found. Fix the config and re-run.");
            return Ok(());
        }
    };

    match ActivityWatchClient::from_config(&config) {
        Ok(client) => match client.health_check().await {
            Ok(()) => match client.buckets().await {
                Ok(buckets) => println!(
                    "  ok    ActivityWatch reachable at {} ({} buckets)",
                    client.base_url(),
                    buckets.len()
                ),
                Err(e) => {
                    println!("  FAIL  ActivityWatch bucket listing failed: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  FAIL  {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  FAIL  {e}");
            issues += 1;
        }
    }

    if config.tracking.api_token.is_some() {
        println!("  ok    Toggl token configured");
    } else {
        println!("  warn  No Toggl token (TOGGL_API_TOKEN); every minute will look untracked");
        issues += 1;
    }

    if config.consolidation.api_key.is_some() {
        println!("  ok    Consolidation key configured ({})", config.model);
    } else {
        println!("  warn  No consolidation key (OPENAI_API_KEY); only --skip-llm and copy will work");
        issues += 1;
    }

    println!("  ok    Clipboard: {}", ClipboardAdapter::detect().backend_name());

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
