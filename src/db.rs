pub mod helpers;

use crate::config::AppConfig;
use crate::errors::{AppError, ServiceError};
use futures::future::BoxFuture;
use metrics::{counter, gauge, histogram};
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use helpers::{
    delete_by_id, filter_by_organization, find_by_id_query, get_by_external_id, get_by_name,
    next_code, next_id, save_objects_commit, HasCode, HasExternalId, HasName, ScopedEntity,
};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool with default tuning.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, AppError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
///
/// # Errors
/// Returns an `AppError` if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, AppError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("psi_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        AppError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, AppError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Database access wrapper with built-in metrics and error handling
#[derive(Debug, Clone)]
pub struct DatabaseAccess {
    pool: Arc<DbPool>,
}

impl DatabaseAccess {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &DbPool {
        &self.pool
    }

    /// Runs `f` inside one database transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise.
    pub async fn transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, E>> + Send,
        T: Send + 'static,
        E: From<DbErr> + Send + 'static + std::error::Error,
    {
        let db = &*self.pool;
        let transaction_id = Uuid::new_v4();
        let start = std::time::Instant::now();

        debug!(transaction_id = %transaction_id, "Starting database transaction");
        counter!("psi_db.transaction.started", 1);

        let result = db
            .transaction(move |txn| {
                let future = f(txn);
                Box::pin(async move {
                    let result = future.await;
                    debug!(transaction_id = %transaction_id, "Transaction body finished");
                    result
                })
            })
            .await;

        let elapsed = start.elapsed();
        histogram!("psi_db.transaction.duration", elapsed);

        match &result {
            Ok(_) => {
                counter!("psi_db.transaction.committed", 1);
                debug!(transaction_id = %transaction_id, "Transaction committed in {:?}", elapsed);
            }
            Err(_) => {
                counter!("psi_db.transaction.rolled_back", 1);
                warn!(transaction_id = %transaction_id, "Transaction rolled back after {:?}", elapsed);
            }
        }

        result.map_err(|e| match e {
            sea_orm::TransactionError::Connection(e) => E::from(e),
            sea_orm::TransactionError::Transaction(e) => e,
        })
    }

    /// Execute query with metrics and logging
    pub async fn execute<'a, F, Fut, T>(&'a self, operation: &str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&'a DbPool) -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        let db: &'a DbPool = &self.pool;
        let start = std::time::Instant::now();

        debug!(operation = %operation, "Starting database operation");

        let result = f(db).await.map_err(|e| {
            error!(operation = %operation, error = %e, "Database operation failed");
            counter!("psi_db.operation.error", 1, "operation" => operation.to_string());
            ServiceError::db_error(e)
        });

        let elapsed = start.elapsed();
        histogram!("psi_db.operation.duration", elapsed, "operation" => operation.to_string());

        if result.is_ok() {
            debug!(operation = %operation, duration = ?elapsed, "Database operation completed");
        }

        result
    }
}

/// Runs database migrations
///
/// # Errors
/// Returns an `AppError` if migrations fail to execute
pub async fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(AppError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!("Database migrations completed successfully in {:?}", elapsed),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), AppError> {
    debug!("Checking database connection");
    let start = std::time::Instant::now();

    let result = pool.ping().await.map_err(AppError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            gauge!("psi_db.connection_latency", elapsed.as_millis() as f64);
        }
        Err(e) => {
            error!("Database connection check failed after {:?}: {}", elapsed, e);
            counter!("psi_db.connection_failures", 1);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};

    use crate::entities::supplier;

    async fn memory_pool() -> DbPool {
        let config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = establish_connection_with_config(&config)
            .await
            .expect("connect to in-memory sqlite");
        run_migrations(&pool).await.expect("migrate");
        pool
    }

    fn supplier_row(code: &str) -> supplier::ActiveModel {
        supplier::ActiveModel {
            code: Set(code.to_string()),
            name: Set(format!("supplier {code}")),
            organization_id: Set(Some(1)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn connection_check_passes_on_fresh_pool() {
        let pool = memory_pool().await;
        assert!(check_connection(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn transaction_commits_on_success() {
        let access = DatabaseAccess::new(Arc::new(memory_pool().await));

        let inserted = access
            .transaction::<_, _, ServiceError>(|txn| {
                Box::pin(async move {
                    let row = supplier_row("000001").insert(txn).await?;
                    Ok(row.id)
                })
            })
            .await
            .expect("transaction");

        let found = supplier::Entity::find_by_id(inserted)
            .one(access.get_pool())
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let access = DatabaseAccess::new(Arc::new(memory_pool().await));

        let result = access
            .transaction::<_, (), ServiceError>(|txn| {
                Box::pin(async move {
                    supplier_row("000001").insert(txn).await?;
                    Err(ServiceError::InvalidOperation("abort".into()))
                })
            })
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidOperation(_))));
        let count = supplier::Entity::find()
            .count(access.get_pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn execute_maps_database_errors() {
        let access = DatabaseAccess::new(Arc::new(memory_pool().await));

        let result: Result<(), ServiceError> = access
            .execute("always_fails", |_db| async {
                Err(DbErr::Custom("boom".into()))
            })
            .await;

        assert!(matches!(result, Err(ServiceError::DatabaseError(_))));
    }
}
