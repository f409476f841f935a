use std::{path::PathBuf, sync::Arc};

use redis::aio::ConnectionManager;
use roster::{
    Collision, NamingStrategy, Overrides, PositionalNaming, RosterError, SharedResolver,
    compile_to,
};
use serde::Serialize;
use tokio::{
    sync::{Mutex, MutexGuard},
    task::spawn_blocking,
};
use tracing::info;

use super::{config::Config, database::init_redis, error::AppError};

pub struct AppState {
    pub config: Config,
    pub naming: Arc<dyn NamingStrategy>,
    pub resolver: SharedResolver,
    pub redis_connection: ConnectionManager,
    compile_guard: CompileGuard,
}

/// Admits one in-process compile at a time. Later callers are turned away
/// rather than queued.
pub struct CompileGuard {
    lock: Mutex<()>,
    path: PathBuf,
}

impl CompileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            lock: Mutex::new(()),
            path: path.into(),
        }
    }

    pub fn enter(&self) -> Result<MutexGuard<'_, ()>, AppError> {
        self.lock
            .try_lock()
            .map_err(|_| RosterError::Busy(self.path.clone()).into())
    }
}

/// Name normalization used by both the compiler and the resolver.
pub fn naming(config: &Config) -> Arc<dyn NamingStrategy> {
    Arc::new(PositionalNaming::new(&config.email_domain))
}

#[derive(Debug, Serialize)]
pub struct CompileSummary {
    pub keys: usize,
    pub collisions: Vec<Collision>,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>, AppError> {
        let config = Config::load()?;
        let naming = naming(&config);

        let overrides = match &config.roster_overrides_path {
            Some(path) => Overrides::load(path)?,
            None => Overrides::new(),
        };

        let resolver = SharedResolver::open(&config.roster_map_path, overrides, naming.clone())?;
        let redis_connection = init_redis(&config.redis_url).await?;

        Ok(Arc::new(Self {
            compile_guard: CompileGuard::new(&config.roster_map_path),
            config,
            naming,
            resolver,
            redis_connection,
        }))
    }

    pub fn redis(&self) -> ConnectionManager {
        self.redis_connection.clone()
    }

    /// Recompiles the configured roster and publishes the result.
    pub async fn compile_roster(self: &Arc<Self>) -> Result<CompileSummary, AppError> {
        let _guard = self.compile_guard.enter()?;

        let compiled = compile_roster(&self.config, self.naming.as_ref()).await?;
        let keys = self.reload_roster().await?;

        Ok(CompileSummary {
            keys,
            collisions: compiled.collisions,
        })
    }

    pub async fn reload_roster(self: &Arc<Self>) -> Result<usize, AppError> {
        let state = self.clone();

        let keys = spawn_blocking(move || state.resolver.reload())
            .await
            .map_err(|e| AppError::InternalError(Box::new(e)))??;

        Ok(keys)
    }
}

pub async fn compile_roster(
    config: &Config,
    naming: &dyn NamingStrategy,
) -> Result<roster::Compiled, AppError> {
    info!("Compiling roster from {}", config.roster_source);

    Ok(compile_to(
        &config.roster_source,
        &config.roster_map_path,
        &config.leaders,
        naming,
        config.strict_compile,
        config.fetch_timeout,
    )
    .await?)
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use axum::http::StatusCode;
    use roster::{CompileLock, DEFAULT_EMAIL_DOMAIN, HouseLeaders};
    use tempfile::TempDir;

    use super::*;

    fn config(dir: &TempDir) -> Config {
        Config {
            port: 8080,
            redis_url: "redis://localhost:6379".to_string(),
            roster_source: dir.path().join("rosters.csv").display().to_string(),
            roster_map_path: dir.path().join("roster.json"),
            roster_overrides_path: None,
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            fetch_timeout: Duration::from_secs(1),
            strict_compile: false,
            leaders: HouseLeaders::default(),
        }
    }

    #[test]
    fn test_second_compile_is_turned_away() {
        let guard = CompileGuard::new("roster.json");

        let first = guard.enter().unwrap();
        match guard.enter() {
            Err(e) => assert_eq!(e.status(), StatusCode::SERVICE_UNAVAILABLE),
            Ok(_) => panic!("second compile was admitted"),
        }

        drop(first);
        assert!(guard.enter().is_ok());
    }

    #[tokio::test]
    async fn test_compile_while_locked_elsewhere() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        fs::write(
            &config.roster_source,
            "AlbemarleGrade,Albemarle,LambertGrade,Lambert,HoblerGrade,Hobler,EttlGrade,Ettl\n\
             12,Wei Chen,,,,,,\n",
        )
        .unwrap();

        let held = CompileLock::acquire(&config.roster_map_path).unwrap();
        let result = compile_roster(&config, naming(&config).as_ref()).await;

        match result {
            Err(e) => assert_eq!(e.status(), StatusCode::SERVICE_UNAVAILABLE),
            Ok(_) => panic!("compile ran under a held lock"),
        }

        drop(held);
        let compiled = compile_roster(&config, naming(&config).as_ref()).await.unwrap();
        assert_eq!(compiled.mapping.len(), 1);
        assert_eq!(
            compiled.mapping.get("wei.chen@prismsus.org").map(|d| d.house),
            Some(roster::House::Albemarle)
        );
    }
}
