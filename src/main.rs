use std::sync::Arc;

use clap::Parser;
use futures_util::StreamExt;

use llamacpp_engine::config::{self, Config, EngineConfig};
use llamacpp_engine::coordinator::{CompletionContext, CompletionCoordinator};
use llamacpp_engine::endpoint::{EndpointRegistry, ModelKind};
use llamacpp_engine::provision::DiskProvisioner;

/// Marker splitting the stdin document into before/after cursor halves.
const CURSOR_MARKER: &str = "<CURSOR>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::parse();

    setup_logging(&cfg.log_level)?;
    config::validate_config(&cfg)?;

    let kind = ModelKind::parse(&cfg.model).ok_or_else(|| format!("unknown model: {}", cfg.model))?;
    let engine_config = EngineConfig::from(&cfg);

    let provisioner = DiskProvisioner::single_model(cfg.server_bin.clone(), cfg.model_path.clone());
    let registry = Arc::new(EndpointRegistry::new(provisioner, engine_config.clone()));
    let coordinator = CompletionCoordinator::new(Arc::clone(&registry), engine_config);

    registry.start(kind).await?;

    let document = std::io::read_to_string(std::io::stdin())?;
    let (text_before, text_after) = match document.split_once(CURSOR_MARKER) {
        Some((before, after)) => (before.to_string(), after.to_string()),
        None => (document, String::new()),
    };

    let context = CompletionContext {
        context_id: "stdin".to_string(),
        document_name: "stdin".to_string(),
        text_before,
        text_after,
        context_documents: Vec::new(),
        kind,
        overrides: serde_json::Map::new(),
    };

    if let Some(mut deltas) = coordinator.request_completion(context).await? {
        while let Some(delta) = deltas.next().await {
            print!("{}", delta);
        }
        println!();
    }

    registry.stop_all().await;
    Ok(())
}

fn setup_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = log_level
        .to_lowercase()
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);

    fern::Dispatch::new()
        .format(|out, message, record| {
            let level_str = match record.level() {
                log::Level::Error => "\x1b[1;31merror:\x1b[0m",
                log::Level::Warn => "\x1b[1;33mwarn:\x1b[0m",
                log::Level::Info => "\x1b[1;32minfo:\x1b[0m",
                log::Level::Debug => "\x1b[1;34mdebug:\x1b[0m",
                log::Level::Trace => "\x1b[1;35mtrace:\x1b[0m",
            };
            out.finish(format_args!("{} {}", level_str, message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;

    Ok(())
}
