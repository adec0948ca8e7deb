mod bootstrap;
mod health;
mod routes;
mod sessions;

use std::time::Duration;

use anyhow::Result;
use soldy_core::config::{AppConfig, LoadOptions};
use tokio::net::TcpListener;

fn init_logging(config: &AppConfig) {
    use soldy_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let router = routes::router(routes::AppState {
        catalog: app.catalog.clone(),
        runtime: app.agent_runtime.clone(),
        sessions: app.sessions.clone(),
    })
    .merge(health::router(health::HealthState { catalog: app.catalog.clone(), llm_provider: app.llm_provider }));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        products = app.catalog.len(),
        "soldy-server listening"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "soldy-server stopping"
    );
    let _ = shutdown_tx.send(());

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not finish before the grace period"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use soldy_agent::llm::{GenerationRequest, GenerationResponse, LlmError};
    use soldy_agent::TextGenerator;
    use soldy_core::Catalog;

    pub fn catalog() -> Catalog {
        Catalog::from_json(
            std::path::Path::new("data/catalog.json"),
            include_str!("../../../data/catalog.json"),
        )
        .expect("bundled catalog parses")
    }

    /// Replays canned replies; once exhausted every call fails.
    pub struct ScriptedGenerator {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedGenerator {
        pub fn replying(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|reply| (*reply).to_owned()).collect()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            let next = self.replies.lock().expect("lock").pop_front();
            next.map(|text| GenerationResponse { text })
                .ok_or_else(|| LlmError::Status { status: 503, body: "no scripted reply".to_owned() })
        }
    }
}
