use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use trendhound::ai::engine::AnalysisEngine;
use trendhound::apis::llm::{CompletionBackend, CortensorClient};
use trendhound::config::{self, Settings};
use trendhound::logger::{self, LogTag};
use trendhound::market::{start_market_data_sync, MarketDataSync};
use trendhound::pipeline::PipelineOrchestrator;
use trendhound::shutdown::{install_shutdown_handlers, SHUTDOWN_MANAGER};
use trendhound::store::AnalysisStore;

/// Memecoin trend analyzer over a local Cortensor node
#[derive(Parser)]
#[command(name = "trendhound", version, about)]
struct Args {
    /// Directory holding the scraper feeds and the results file
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Run a single analysis session and exit
    #[arg(long)]
    once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    logger::init();
    if args.verbose {
        logger::set_verbose(true);
    }

    logger::info(LogTag::System, "🚀 TrendHound starting up...");

    let mut settings = Settings::load();
    if let Some(dir) = args.data_dir {
        settings.data_dir = dir;
    }
    if args.once {
        settings.run_once = true;
    }
    config::init(settings);

    let (base_url, use_sse, run_once) =
        config::with_settings(|s| (s.base_url.clone(), s.use_sse, s.run_once));
    logger::info(
        LogTag::Config,
        &format!(
            "Cortensor endpoint: {} (streaming: {})",
            base_url,
            if use_sse { "SSE" } else { "off" }
        ),
    );

    if let Err(e) = install_shutdown_handlers() {
        logger::error(LogTag::System, &format!("❌ {}", e));
        std::process::exit(1);
    }

    let client = match CortensorClient::from_settings() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            logger::error(
                LogTag::System,
                &format!("❌ Failed to create Cortensor client: {}", e),
            );
            std::process::exit(1);
        }
    };

    if client.health_check().await {
        logger::info(LogTag::System, "✅ Cortensor node reachable");
    } else {
        logger::warning(
            LogTag::System,
            "⚠️ Cortensor node not reachable, continuing anyway",
        );
    }

    let output_file = config::with_settings(|s| s.output_file());
    let store = Arc::new(AnalysisStore::new(output_file));

    let tokens_file = config::with_settings(|s| s.tokens_file());
    let market_sync = Arc::new(MarketDataSync::new(store.clone(), tokens_file));
    let market_handle = match start_market_data_sync(market_sync) {
        Ok(handle) => handle,
        Err(e) => {
            logger::error(
                LogTag::System,
                &format!("❌ Failed to start market data sync: {}", e),
            );
            std::process::exit(1);
        }
    };

    let backend: Arc<dyn CompletionBackend> = client;
    let engine = AnalysisEngine::from_settings(backend);
    let orchestrator = PipelineOrchestrator::from_settings(engine, store);

    tokio::select! {
        _ = SHUTDOWN_MANAGER.wait_for_shutdown() => {}
        _ = orchestrator.run(run_once) => {
            SHUTDOWN_MANAGER.initiate_shutdown();
        }
    }

    let _ = market_handle.await;
    logger::info(LogTag::System, "TrendHound stopped");
}
