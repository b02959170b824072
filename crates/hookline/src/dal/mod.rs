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

//! Data access layer with runtime backend selection.
//!
//! Each operation has a PostgreSQL and a SQLite implementation; the public
//! method dispatches on the backend the [`Database`] was opened with.
//!
//! ```rust,ignore
//! use hookline::dal::DAL;
//! use hookline::database::Database;
//!
//! let dal = DAL::new(Database::try_new("sqlite://hookline.db", 1)?);
//! let task = dal.delivery_task().enqueue(new_task).await?;
//! ```

use crate::database::{AnyPool, BackendType, Database};

pub mod delivery_task;
pub mod usage_record;

#[cfg(feature = "postgres")]
pub mod postgres_dal;
#[cfg(feature = "sqlite")]
pub mod sqlite_dal;

pub use delivery_task::DeliveryTaskDAL;
pub use usage_record::UsageRecordDAL;

/// Dispatches to the expression matching `$backend`.
///
/// ```rust,ignore
/// crate::dispatch_backend!(
///     self.dal.backend(),
///     self.claim_due_postgres(limit, now).await,
///     self.claim_due_sqlite(limit, now).await
/// )
/// ```
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $pg:expr, $sqlite:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $pg,
            #[cfg(feature = "sqlite")]
            $crate::database::BackendType::Sqlite => $sqlite,
        }
    };
}

/// Entry point for all queue storage operations.
///
/// `DAL` is `Clone`; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn pool(&self) -> AnyPool {
        self.database.pool()
    }

    pub fn delivery_task(&self) -> DeliveryTaskDAL<'_> {
        DeliveryTaskDAL::new(self)
    }

    pub fn usage_record(&self) -> UsageRecordDAL<'_> {
        UsageRecordDAL::new(self)
    }
}
