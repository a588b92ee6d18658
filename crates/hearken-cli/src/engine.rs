//! Wiring of store, compiler, registry and runner for one CLI invocation

use anyhow::{Context, Result};
use hearken_config::HearkenConfig;
use hearken_core::{
    BootstrapReport, ExecutionRunner, ListenerRegistry, ListenerRepository, Requestor,
};
use hearken_lua::LuaCompiler;
use hearken_sqlite::{SqliteConfig, SqliteListenerStore};
use std::sync::Arc;
use tracing::warn;

/// Everything a command needs, built from configuration
pub struct Engine {
    pub repository: ListenerRepository,
    pub runner: ExecutionRunner,
    pub requestor: Requestor,
    pub compiler: LuaCompiler,
}

impl Engine {
    /// Open the configured database and load active listeners into the registry
    pub async fn open(config: &HearkenConfig, user: &str) -> Result<Self> {
        let store = SqliteListenerStore::open(SqliteConfig::from(&config.storage))
            .with_context(|| format!("opening {}", config.storage.path.display()))?;

        let compiler = LuaCompiler::from_config(&config.runner);
        let registry = Arc::new(ListenerRegistry::from_config(&config.registry));
        let runner = ExecutionRunner::new(registry.clone(), &config.runner);
        let repository =
            ListenerRepository::new(Arc::new(store), Arc::new(compiler.clone()), registry)
                .with_history(runner.history().clone());

        let engine = Self {
            repository,
            runner,
            // the local operator owns the database file
            requestor: Requestor::admin(user),
            compiler,
        };
        let report = engine.load().await?;
        for (id, diagnostic) in &report.skipped {
            warn!(listener_id = %id, %diagnostic, "Stored listener no longer compiles");
        }
        for (id, error) in &report.rejected {
            warn!(listener_id = %id, %error, "Stored listener could not be activated");
        }
        Ok(engine)
    }

    async fn load(&self) -> Result<BootstrapReport> {
        self.repository
            .bootstrap()
            .await
            .context("loading listeners from the store")
    }
}
