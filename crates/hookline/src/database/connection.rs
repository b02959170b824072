/*
 *  Copyright 2026 Hookline Developers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Connection pooling over PostgreSQL or SQLite.
//!
//! The backend is chosen at runtime from the connection URL. Pools are
//! `deadpool-diesel` pools; every query runs inside `interact` so diesel's
//! blocking calls stay off the async executor.
//!
//! ```rust,ignore
//! use hookline::database::Database;
//!
//! let db = Database::try_new("postgres://hookline@localhost/hookline", 10)?;
//! db.run_migrations().await?;
//!
//! let local = Database::try_new("sqlite://hookline.db", 1)?;
//! ```

use tracing::info;

#[cfg(feature = "postgres")]
use deadpool_diesel::postgres::{Manager as PgManager, Pool as PgPool, Runtime as PgRuntime};
#[cfg(feature = "sqlite")]
use deadpool_diesel::sqlite::{
    Manager as SqliteManager, Pool as SqlitePool, Runtime as SqliteRuntime,
};

use crate::error::{DatabaseError, StorageError};

/// Database backend, detected from the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    #[cfg(feature = "postgres")]
    Postgres,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl BackendType {
    /// Detects the backend for `url`.
    ///
    /// PostgreSQL: `postgres://` and `postgresql://`. SQLite: `sqlite://`,
    /// `file:` URIs, relative or absolute paths, `:memory:`, and names ending
    /// in `.db`, `.sqlite` or `.sqlite3`.
    pub fn from_url(url: &str) -> Result<Self, DatabaseError> {
        #[cfg(feature = "postgres")]
        {
            if url.starts_with("postgres://") || url.starts_with("postgresql://") {
                return Ok(BackendType::Postgres);
            }
        }

        #[cfg(feature = "sqlite")]
        {
            if url.starts_with("sqlite://")
                || url.starts_with("file:")
                || url.starts_with('/')
                || url.starts_with("./")
                || url.starts_with("../")
                || url == ":memory:"
                || url.ends_with(".db")
                || url.ends_with(".sqlite")
                || url.ends_with(".sqlite3")
            {
                return Ok(BackendType::Sqlite);
            }
        }

        Err(DatabaseError::UnsupportedUrl(url.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => "postgres",
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => "sqlite",
        }
    }
}

/// Pool for whichever backend the URL selected.
#[derive(Clone)]
pub enum AnyPool {
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

impl std::fmt::Debug for AnyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(_) => write!(f, "AnyPool::Postgres(...)"),
            #[cfg(feature = "sqlite")]
            AnyPool::Sqlite(_) => write!(f, "AnyPool::Sqlite(...)"),
        }
    }
}

/// Shared handle to the connection pool.
///
/// Cloning is cheap; clones share the pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: AnyPool,
    backend: BackendType,
}

impl Database {
    /// Builds a pool for `connection_string`.
    ///
    /// `max_size` applies to PostgreSQL. SQLite pools always hold a single
    /// connection: concurrent writers on one file produce "database is
    /// locked" errors even in WAL mode, and a shared-cache in-memory
    /// database lives only as long as its connection.
    pub fn try_new(connection_string: &str, max_size: u32) -> Result<Self, DatabaseError> {
        let backend = BackendType::from_url(connection_string)?;

        match backend {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => {
                let connection_url = Self::build_postgres_url(connection_string)?;
                let manager = PgManager::new(connection_url, PgRuntime::Tokio1);
                let pool = PgPool::builder(manager)
                    .max_size(max_size.max(1) as usize)
                    .build()
                    .map_err(|e| DatabaseError::Pool(e.to_string()))?;

                info!(max_size, "PostgreSQL connection pool initialized");

                Ok(Self {
                    pool: AnyPool::Postgres(pool),
                    backend,
                })
            }
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => {
                let connection_url = Self::build_sqlite_url(connection_string);
                let manager = SqliteManager::new(connection_url, SqliteRuntime::Tokio1);
                let sqlite_pool_size = 1;
                let pool = SqlitePool::builder(manager)
                    .max_size(sqlite_pool_size)
                    .build()
                    .map_err(|e| DatabaseError::Pool(e.to_string()))?;

                info!(
                    size = sqlite_pool_size,
                    requested = max_size,
                    "SQLite connection pool initialized"
                );

                Ok(Self {
                    pool: AnyPool::Sqlite(pool),
                    backend,
                })
            }
        }
    }

    pub fn backend(&self) -> BackendType {
        self.backend
    }

    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    #[cfg(feature = "postgres")]
    fn build_postgres_url(base_url: &str) -> Result<String, DatabaseError> {
        url::Url::parse(base_url)
            .map(|url| url.to_string())
            .map_err(|e| DatabaseError::InvalidUrl(e.to_string()))
    }

    #[cfg(feature = "sqlite")]
    fn build_sqlite_url(connection_string: &str) -> String {
        match connection_string.strip_prefix("sqlite://") {
            Some(path) => path.to_string(),
            None => connection_string.to_string(),
        }
    }

    /// Applies pending embedded migrations for the active backend.
    ///
    /// On SQLite the connection is first switched to WAL journaling with a
    /// 30 second busy timeout.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        use diesel_migrations::MigrationHarness;

        match &self.pool {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(pool) => {
                let conn = pool
                    .get()
                    .await
                    .map_err(|e| DatabaseError::Pool(e.to_string()))?;
                conn.interact(|conn| {
                    conn.run_pending_migrations(crate::database::POSTGRES_MIGRATIONS)
                        .map(|applied| applied.len())
                        .map_err(|e| e.to_string())
                })
                .await
                .map_err(|e| DatabaseError::Migration(e.to_string()))?
                .map(|applied| info!(applied, "PostgreSQL migrations complete"))
                .map_err(DatabaseError::Migration)?;
            }
            #[cfg(feature = "sqlite")]
            AnyPool::Sqlite(pool) => {
                let conn = pool
                    .get()
                    .await
                    .map_err(|e| DatabaseError::Pool(e.to_string()))?;
                conn.interact(|conn| {
                    use diesel::prelude::*;

                    diesel::sql_query("PRAGMA journal_mode=WAL;")
                        .execute(conn)
                        .map_err(|e| e.to_string())?;
                    diesel::sql_query("PRAGMA busy_timeout=30000;")
                        .execute(conn)
                        .map_err(|e| e.to_string())?;

                    conn.run_pending_migrations(crate::database::SQLITE_MIGRATIONS)
                        .map(|applied| applied.len())
                        .map_err(|e| e.to_string())
                })
                .await
                .map_err(|e| DatabaseError::Migration(e.to_string()))?
                .map(|applied| info!(applied, "SQLite migrations complete"))
                .map_err(DatabaseError::Migration)?;
            }
        }
        Ok(())
    }

    /// Checks out a PostgreSQL connection.
    #[cfg(feature = "postgres")]
    pub async fn get_postgres_connection(
        &self,
    ) -> Result<deadpool::managed::Object<PgManager>, StorageError> {
        #[allow(unreachable_patterns)]
        let pool = match &self.pool {
            AnyPool::Postgres(pool) => pool,
            _ => {
                return Err(StorageError::ConnectionPool(
                    "PostgreSQL connection requested from a non-PostgreSQL pool".to_string(),
                ))
            }
        };

        pool.get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))
    }

    /// Checks out the SQLite connection.
    #[cfg(feature = "sqlite")]
    pub async fn get_sqlite_connection(
        &self,
    ) -> Result<deadpool::managed::Object<SqliteManager>, StorageError> {
        #[allow(unreachable_patterns)]
        let pool = match &self.pool {
            AnyPool::Sqlite(pool) => pool,
            _ => {
                return Err(StorageError::ConnectionPool(
                    "SQLite connection requested from a non-SQLite pool".to_string(),
                ))
            }
        };

        pool.get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))
    }
}
