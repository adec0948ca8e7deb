use std::sync::Arc;
use std::time::Duration;

use soldy_agent::llm::{generator_from_config, LlmError, TextGenerator};
use soldy_agent::{AgentError, AgentRuntime};
use soldy_core::config::{AppConfig, ConfigError, LoadOptions};
use soldy_core::Catalog;
use thiserror::Error;
use tracing::info;

use crate::sessions::SessionStore;

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<Catalog>,
    pub agent_runtime: Arc<AgentRuntime>,
    pub sessions: Arc<SessionStore>,
    pub llm_provider: &'static str,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("text generation client could not be built: {0}")]
    Llm(#[from] LlmError),
    #[error("assistant runtime could not be built: {0}")]
    Agent(#[from] AgentError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

/// Wires the catalog, text generator and session store. A missing or broken
/// catalog does not stop startup; the service runs degraded instead.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let catalog = Arc::new(Catalog::load_or_empty(&config.catalog.path));

    let generator = generator_from_config(&config.llm)?;
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        provider = generator.name(),
        model = %config.llm.model,
        "text generation client configured"
    );

    let llm_provider = generator.name();
    let agent_runtime = AgentRuntime::new(generator, &config.assistant)?
        .with_timeout(Duration::from_secs(config.llm.timeout_secs))
        .with_max_retries(config.llm.max_retries);
    let sessions = SessionStore::new(config.assistant.history_cap).with_limits(
        Duration::from_secs(config.server.session_idle_secs),
        config.server.max_sessions,
    );

    Ok(Application {
        config,
        catalog,
        agent_runtime: Arc::new(agent_runtime),
        sessions: Arc::new(sessions),
        llm_provider,
    })
}
