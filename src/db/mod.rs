use diesel::connection::SimpleConnection;
use diesel::r2d2::{self as diesel_r2d2, ConnectionManager, CustomizeConnection};
use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use error_chain::error_chain;
use tokio::task;
use tracing::{error, info};

use crate::config::Config;
use crate::types::ApiError;

pub mod schema;

// An alias to the type for a pool of Diesel SQLite connections.
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

error_chain! {
    foreign_links {
        R2D2(r2d2::Error);
        Diesel(DieselError);
    }
}

/// Applied to every connection the pool hands out.
#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel_r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, connection: &mut SqliteConnection) -> ::std::result::Result<(), diesel_r2d2::Error> {
        connection
            .batch_execute("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
            .map_err(diesel_r2d2::Error::QueryError)
    }
}

/// Opens the pool and makes sure every table and unique index exists.
pub fn init_pool(config: &Config) -> Result<Pool> {
    let manager = ConnectionManager::<SqliteConnection>::new(config.database_url.as_str());
    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)?;

    let mut connection = pool.get()?;
    connection.batch_execute("PRAGMA journal_mode = WAL;")?;
    connection.batch_execute(schema::CREATE_TABLES)?;
    info!(database = %config.database_url, "database schema ready");
    Ok(pool)
}

/// Process-wide handle to the store. Cloning is cheap, every clone shares
/// the same pool.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    pub fn new(pool: Pool) -> Self {
        Store { pool }
    }

    /// Runs `f` on the blocking thread pool with a connection of its own, so
    /// independent lookups issued together really run side by side.
    pub async fn run<F, T>(&self, f: F) -> ::std::result::Result<T, ApiError>
    where
        F: FnOnce(&mut SqliteConnection) -> ::std::result::Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut connection = pool.get()?;
            f(&mut connection)
        })
        .await
        .map_err(|e| {
            error!(error = %e, "store task did not complete");
            ApiError::Internal
        })?
    }

    pub fn state(&self) -> r2d2::State {
        self.pool.state()
    }
}

#[cfg(test)]
pub(crate) fn test_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = Config {
        database_url: dir.path().join("test.sqlite").to_string_lossy().into_owned(),
        ..Config::default()
    };
    let pool = init_pool(&config).expect("test pool");
    (Store::new(pool), dir)
}
