//! Autonomous Content Pipeline daemon.
//!
//! A long-running process that schedules discovery, creation, publishing,
//! metrics collection, and skill feedback on independent intervals, backing
//! off automatically as the day's LLM spend approaches its cap.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use content_orchestrator::{Orchestrator, OrchestratorConfig, ProviderCredentials};
use content_providers::{LocalEchoLlm, LocalPlaceholderImage, LocalPlaceholderVideo};
use content_publish::PublisherRegistry;
use content_skills::SkillLibrary;
use content_sources::default_sources;
use content_store::Store;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[content-daemon] .env not loaded: {e} (using system environment)");
    }

    let config = OrchestratorConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let credentials = ProviderCredentials::load();
    if credentials.llm_provider.is_some() {
        tracing::info!(
            provider = credentials.llm_provider.as_deref().unwrap_or("unknown"),
            "provider credentials found, but only the local stand-in providers are wired up in this build"
        );
    }

    let storage_path = std::path::Path::new(&config.storage_path);
    let store = Store::open(storage_path.join("content_store")).expect("open content store");
    let skills_store = Store::open(storage_path.join("skill_metrics")).expect("open skill metrics store");
    let skills = SkillLibrary::new(config.skill_library_path.clone(), skills_store);

    tracing::info!(
        storage_path = %config.storage_path,
        skill_library_path = %config.skill_library_path,
        daily_cost_limit = config.daily_cost_limit,
        demo_mode = config.demo_mode,
        "content daemon starting"
    );

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        default_sources(),
        skills,
        Box::new(LocalEchoLlm::new("local-echo")),
        Box::new(LocalPlaceholderImage),
        Box::new(LocalPlaceholderVideo),
        PublisherRegistry::default_registry(),
        config,
    ));

    orchestrator.start().await;

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("CTRL-C received; shutting down content daemon");

    orchestrator.stop().await;
}
