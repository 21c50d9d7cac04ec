//! `timegap run`: detect gaps and consolidate them one by one.

use std::path::PathBuf;
use std::sync::Arc;

use timegap_config::AppConfig;
use timegap_core::event::EventBus;
use timegap_providers::OpenAiCompatProvider;
use timegap_reconcile::{PayloadAssembler, PricingTable, PromptTemplate};
use timegap_session::keyboard::spawn_ctrl_c;
use timegap_session::{ClipboardAdapter, ControlLoop, KeyboardListener, RawModeGuard};
use tokio::sync::mpsc;

use super::WindowArgs;
use super::gaps::fetch_timeline;
use crate::{export, render};

pub struct RunOptions {
    pub window: WindowArgs,
    pub output: Option<PathBuf>,
    pub skip_llm: bool,
    pub model: Option<String>,
    pub min_duration: Option<u32>,
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(model) = options.model {
        config.model = model;
    }
    if let Some(minutes) = options.min_duration {
        config.min_activity_duration_minutes = minutes;
    }
    config.validate()?;

    let Some(timeline) = fetch_timeline(&config, &options.window).await? else {
        eprintln!("Interrupted.");
        return Ok(());
    };

    if options.skip_llm {
        return Ok(());
    }
    if timeline.gaps.is_empty() {
        println!("Nothing to consolidate.");
        return Ok(());
    }

    let template = PromptTemplate::load(config.consolidation.prompt_file.as_deref())?;
    let provider = OpenAiCompatProvider::from_config(&config, template.clone())?;
    if !provider.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No consolidation API key configured!");
        eprintln!();
        eprintln!("  Set OPENAI_API_KEY (or TIMEGAP_API_KEY), or add consolidation.api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        eprintln!("  Use --skip-llm to list gaps without consolidating.");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let mut assembler = PayloadAssembler::new(config.min_activity_duration());
    if let Some(path) = &config.consolidation.context_file {
        let standing = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read context file {}: {e}", path.display()))?;
        assembler = assembler.with_standing_context(standing);
    }

    let event_bus = Arc::new(EventBus::default());
    let renderer = render::spawn(event_bus.subscribe());
    let session = ControlLoop::new(
        Arc::new(provider),
        Arc::new(ClipboardAdapter::detect()),
        assembler,
        config.min_activity_duration(),
        config.dispatch_timeout(),
    )
    .with_template(template)
    .with_pricing(PricingTable::with_overrides(&config.custom_pricing))
    .with_event_bus(event_bus);

    let (tx, mut rx) = mpsc::channel(64);
    let report = {
        let _raw = RawModeGuard::enable()?;
        let keyboard = KeyboardListener::spawn(tx.clone());
        let ctrl_c = spawn_ctrl_c(tx);

        let report = session.run(&timeline.gaps, &mut rx).await;

        keyboard.stop().await;
        ctrl_c.abort();
        drop(session);
        let _ = renderer.await;
        report
    };

    println!();
    for line in render::report_lines(&report) {
        println!("{line}");
    }

    if let Some(path) = options.output {
        let written = export::write_blocks(&path, report.validated_blocks())?;
        println!("Wrote {written} blocks to {}", path.display());
    }

    Ok(())
}
