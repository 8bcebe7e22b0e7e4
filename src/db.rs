use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::metrics::METRICS;
use futures::future::BoxFuture;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
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

/// Establishes a connection pool to the database
///
/// # Errors
/// Returns a `ServiceError` if the connection cannot be established
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
///
/// # Errors
/// Returns a `ServiceError` if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    METRICS
        .gauge("materials_db_max_connections")
        .set(f64::from(config.max_connections));

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        ServiceError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Database access wrapper with built-in metrics and error handling
///
/// Every statement issued by the services goes through [`DatabaseAccess::execute`],
/// which runs one parameterized statement on the shared pool. No transaction
/// spans two calls.
#[derive(Debug, Clone)]
pub struct DatabaseAccess {
    pool: Arc<DbPool>,
}

impl DatabaseAccess {
    /// Create a new database access instance
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Execute a statement with metrics and logging
    pub async fn execute<F, T>(&self, operation: &str, f: F) -> Result<T, ServiceError>
    where
        F: for<'c> FnOnce(&'c DbPool) -> BoxFuture<'c, Result<T, DbErr>> + Send,
        T: Send,
    {
        let start = Instant::now();

        debug!(operation = %operation, "Starting database operation");
        METRICS.counter("materials_db_operations_total").inc();

        let result = f(&self.pool).await.map_err(|e| {
            error!(operation = %operation, error = %e, "Database operation failed");
            METRICS.counter("materials_db_errors_total").inc();
            ServiceError::db_error(e)
        });

        let elapsed = start.elapsed();
        METRICS
            .histogram("materials_db_operation_duration_ms")
            .observe(elapsed.as_secs_f64() * 1000.0);

        if result.is_ok() {
            debug!(operation = %operation, duration = ?elapsed, "Database operation completed successfully");
        }

        result
    }
}

/// Runs database migrations
///
/// # Errors
/// Returns a `ServiceError` if migrations fail to execute
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    debug!("Checking database connection");
    let start = Instant::now();

    let result = pool.ping().await.map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            METRICS
                .gauge("materials_db_connection_latency_ms")
                .set(elapsed.as_secs_f64() * 1000.0);
        }
        Err(e) => {
            error!(
                "Database connection check failed after {:?}: {}",
                elapsed, e
            );
            METRICS.counter("materials_db_connection_failures_total").inc();
        }
    }

    result
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    info!("Closing database connection pool");

    pool.close().await.map_err(ServiceError::DatabaseError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, DbBackend, Statement};
    use tempfile::TempDir;

    async fn setup_test_pool(dir: &TempDir) -> DbPool {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("db.sqlite").display());
        establish_connection(&url)
            .await
            .expect("Failed to establish connection")
    }

    #[tokio::test]
    async fn establishes_and_pings_connection() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_pool(&dir).await;
        assert!(check_connection(&pool).await.is_ok());
        assert!(close_pool(pool).await.is_ok());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_pool(&dir).await;
        assert!(run_migrations(&pool).await.is_ok());
        assert!(run_migrations(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn execute_returns_statement_result() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_pool(&dir).await;
        let access = DatabaseAccess::new(Arc::new(pool));

        let rows = access
            .execute("create_table", |db| {
                Box::pin(async move {
                    db.execute(Statement::from_string(
                        DbBackend::Sqlite,
                        "CREATE TABLE scratch (id INTEGER PRIMARY KEY)".to_string(),
                    ))
                    .await
                    .map(|res| res.rows_affected())
                })
            })
            .await;

        assert_eq!(rows.unwrap(), 0);
    }

    #[tokio::test]
    async fn execute_maps_store_failures_to_database_error() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_pool(&dir).await;
        let access = DatabaseAccess::new(Arc::new(pool));

        let result = access
            .execute("broken", |db| {
                Box::pin(async move {
                    db.execute(Statement::from_string(
                        DbBackend::Sqlite,
                        "SELECT * FROM missing_table".to_string(),
                    ))
                    .await
                    .map(|_| ())
                })
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, ServiceError::DatabaseError(_)));
        assert!(err.response_message().contains("missing_table"));
    }
}
