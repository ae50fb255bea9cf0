//! Main application entry point for the craftguard replay harness
//!
//! Loads configuration, the recipe table and recorded event batches, then
//! replays the batches through the crafting ledger engine and reports the
//! resulting awards, diagnostics and statistics.

mod cli;
mod config;
mod replay;
mod signals;

use anyhow::Context;
use cli::CliArgs;
use config::{AppConfig, LoggingSettings};
use craft_ledger::{CraftLedgerEngine, RecipeTable, ScaledAwardSink};
use replay::{TallyProgression, TickBatch};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// Logging Setup
// ============================================================================

/// Initialize logging system
fn setup_logging(config: &LoggingSettings) -> anyhow::Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

// ============================================================================
// Application
// ============================================================================

pub struct Application {
    config: AppConfig,
    engine: CraftLedgerEngine,
    awards: Arc<ScaledAwardSink<TallyProgression>>,
    batches: Vec<TickBatch>,
}

impl Application {
    pub async fn new(args: CliArgs) -> anyhow::Result<Self> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path)
            .await
            .with_context(|| format!("loading {}", args.config_path.display()))?;

        // Apply CLI overrides
        if let Some(path) = args.recipes_path {
            config.replay.recipes_path = path.to_string_lossy().to_string();
        }
        if let Some(path) = args.events_path {
            config.replay.events_path = path.to_string_lossy().to_string();
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(tick_interval_ms) = args.tick_interval_ms {
            config.replay.tick_interval_ms = tick_interval_ms;
        }

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

        setup_logging(&config.logging)?;

        let recipes_path = config.recipes_path();
        let recipes = tokio::fs::read_to_string(&recipes_path)
            .await
            .with_context(|| format!("reading recipe table {}", recipes_path.display()))?;
        let registry = RecipeTable::from_json_str(&recipes)
            .with_context(|| format!("loading recipe table {}", recipes_path.display()))?;

        let events_path = config.events_path();
        let events = tokio::fs::read_to_string(&events_path)
            .await
            .with_context(|| format!("reading event batches {}", events_path.display()))?;
        let batches = replay::parse_batches(&events)?;

        let world = config.world.build();
        let awards = Arc::new(ScaledAwardSink::from_config(&config.engine, TallyProgression::default()));
        let engine = CraftLedgerEngine::new(
            Arc::new(registry),
            Arc::new(config.engine.clone()),
            Arc::new(world),
            awards.clone(),
        );

        info!(
            "📂 Config: {} | Recipes: {} | Events: {} ({} ticks)",
            args.config_path.display(),
            recipes_path.display(),
            events_path.display(),
            batches.len()
        );

        Ok(Self {
            config,
            engine,
            awards,
            batches,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        if !self.engine.is_enabled() {
            warn!("Crafting ledger engine is disabled; batches will be ignored");
        }

        info!("🌟 Replaying {} ticks", self.batches.len());
        let summary = replay::replay(
            &self.engine,
            self.batches,
            self.config.replay.tick_interval_ms,
            signals::until_shutdown(),
        )
        .await;

        info!(
            "✅ Replay finished | {} ticks | {} applied | {} dropped",
            summary.ticks, summary.applied, summary.dropped
        );
        info!(
            "📊 Credits validated {} | retracted {} | awards {}",
            summary.credits_validated, summary.credits_retracted, summary.awards_dispatched
        );

        for total in self.awards.progression().totals() {
            info!(
                "  ⚒️ {} {}: {:.1} from {} awards",
                total.player, total.profession, total.value, total.grants
            );
        }
        for quest in self.awards.progression().quest_totals() {
            info!("  📜 {} craft quest item {}: +{}", quest.player, quest.target, quest.progress);
        }

        let outstanding = self.engine.ledger().snapshot();
        if !outstanding.is_empty() {
            warn!("{} ledger entries still outstanding", outstanding.len());
            for (key, entry) in &outstanding {
                info!("  {} | pending {} validated {}", key, entry.pending, entry.validated);
            }
        }

        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
