//! Application entry point — persona preview orchestrator.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run) and
//!    validate it.
//! 3. Build the three stage adapters from config.
//! 4. Create the shared [`TaskStore`] and the [`PipelineCoordinator`].
//! 5. Spawn the eviction sweeper.
//! 6. Bind and serve the axum router — blocks until shutdown.

use std::sync::Arc;

use persona_preview::{
    api::{build_router, AppState},
    config::{AppConfig, AppPaths},
    pipeline::PipelineCoordinator,
    stage::{
        ApiSpeechSynthesizer, ApiTextGenerator, ApiVideoRenderer, SpeechSynthesizer,
        TextGenerator, VideoRenderer,
    },
    task::TaskStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("persona-preview starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.validate()?;

    let paths = AppPaths::new();

    // 3. Stage adapters
    let text: Arc<dyn TextGenerator> = Arc::new(ApiTextGenerator::from_config(&config.text));
    let speech: Arc<dyn SpeechSynthesizer> =
        Arc::new(ApiSpeechSynthesizer::from_config(&config.speech));
    let video: Arc<dyn VideoRenderer> = Arc::new(ApiVideoRenderer::from_config(&config.video));

    // 4. Store + coordinator
    let store = TaskStore::new();
    let coordinator = Arc::new(PipelineCoordinator::new(
        store.clone(),
        text,
        speech,
        video,
        &config,
        paths.artifacts_dir.clone(),
        paths.outputs_dir.clone(),
    ));

    // 5. Eviction sweeper
    let _sweeper = store.spawn_sweeper(
        chrono::Duration::seconds(config.store.retain_finished_secs as i64),
        std::time::Duration::from_secs(config.store.sweep_interval_secs),
    );

    // 6. HTTP server
    let state = AppState {
        store,
        coordinator,
        max_active_tasks: config.store.max_active_tasks,
    };
    let router = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");

    axum::serve(listener, router).await?;
    Ok(())
}
