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

//! Delivery task storage.
//!
//! Enqueueing and read access live here; claiming and outcome recording are
//! in the `claiming` and `outcome` submodules.

mod claiming;
mod outcome;

use diesel::prelude::*;

use super::DAL;
use crate::audit;
use crate::crypto::canonical_json;
use crate::database::universal_types::{current_timestamp, UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::{DeliveryStatus, DeliveryTask, NewDeliveryTask, StatusSummary};

/// Per-status aggregate row for [`DeliveryTaskDAL::status_summary`].
#[derive(Debug, QueryableByName)]
struct StatusCountRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    status: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    task_count: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    latency_sum: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    latency_samples: i64,
}

const STATUS_SUMMARY_SQL: &str = "\
    SELECT status, \
           COUNT(*) AS task_count, \
           CAST(COALESCE(SUM(last_response_time_ms), 0) AS BIGINT) AS latency_sum, \
           COUNT(last_response_time_ms) AS latency_samples \
    FROM delivery_tasks \
    GROUP BY status";

/// Data access for the `delivery_tasks` table.
#[derive(Clone)]
pub struct DeliveryTaskDAL<'a> {
    dal: &'a DAL,
}

impl<'a> DeliveryTaskDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Queues a delivery that is due immediately.
    ///
    /// The payload is canonicalized once here and stored as text, so every
    /// attempt sends the same bytes.
    pub async fn enqueue(&self, new_task: NewDeliveryTask) -> Result<DeliveryTask, StorageError> {
        self.enqueue_at(new_task, current_timestamp()).await
    }

    /// Queues a delivery with an explicit creation time.
    pub async fn enqueue_at(
        &self,
        new_task: NewDeliveryTask,
        now: UniversalTimestamp,
    ) -> Result<DeliveryTask, StorageError> {
        if new_task.partner_id.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "partner_id must not be empty".to_string(),
            ));
        }
        if new_task.max_attempts < 1 {
            return Err(StorageError::InvalidInput(format!(
                "max_attempts must be at least 1, got {}",
                new_task.max_attempts
            )));
        }

        let payload = canonical_json(&new_task.payload);
        let task = crate::dispatch_backend!(
            self.dal.backend(),
            self.enqueue_postgres(&new_task, payload, now).await,
            self.enqueue_sqlite(&new_task, payload, now).await
        )?;

        audit::log_task_enqueued(task.id, &task.partner_id, task.max_attempts);
        Ok(task)
    }

    #[cfg(feature = "postgres")]
    async fn enqueue_postgres(
        &self,
        new_task: &NewDeliveryTask,
        payload: String,
        now: UniversalTimestamp,
    ) -> Result<DeliveryTask, StorageError> {
        use crate::dal::postgres_dal::models::{NewPgDeliveryTask, PgDeliveryTask};
        use crate::database::schema::postgres::delivery_tasks;

        let conn = self.dal.database.get_postgres_connection().await?;

        let row = NewPgDeliveryTask {
            id: UniversalUuid::new_v4().0,
            partner_id: new_task.partner_id.clone(),
            payload,
            status: DeliveryStatus::Pending.as_str().to_string(),
            attempts: 0,
            max_attempts: new_task.max_attempts,
            next_retry_at: Some(now.to_naive()),
            created_at: now.to_naive(),
            updated_at: now.to_naive(),
        };

        let inserted: PgDeliveryTask = conn
            .interact(move |conn| {
                diesel::insert_into(delivery_tasks::table)
                    .values(&row)
                    .returning(PgDeliveryTask::as_returning())
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        DeliveryTask::try_from(inserted)
    }

    #[cfg(feature = "sqlite")]
    async fn enqueue_sqlite(
        &self,
        new_task: &NewDeliveryTask,
        payload: String,
        now: UniversalTimestamp,
    ) -> Result<DeliveryTask, StorageError> {
        use crate::dal::sqlite_dal::models::{
            uuid_to_blob, NewSqliteDeliveryTask, SqliteDeliveryTask,
        };
        use crate::database::schema::sqlite::delivery_tasks;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let now_text = now.to_sqlite_string();
        let row = NewSqliteDeliveryTask {
            id: uuid_to_blob(&UniversalUuid::new_v4()),
            partner_id: new_task.partner_id.clone(),
            payload,
            status: DeliveryStatus::Pending.as_str().to_string(),
            attempts: 0,
            max_attempts: new_task.max_attempts,
            next_retry_at: Some(now_text.clone()),
            created_at: now_text.clone(),
            updated_at: now_text,
        };

        let inserted: SqliteDeliveryTask = conn
            .interact(move |conn| {
                diesel::insert_into(delivery_tasks::table)
                    .values(&row)
                    .returning(SqliteDeliveryTask::as_returning())
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        DeliveryTask::try_from(inserted)
    }

    /// Fetches a task by id.
    pub async fn get(&self, id: UniversalUuid) -> Result<Option<DeliveryTask>, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.get_postgres(id).await,
            self.get_sqlite(id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_postgres(&self, id: UniversalUuid) -> Result<Option<DeliveryTask>, StorageError> {
        use crate::dal::postgres_dal::models::PgDeliveryTask;
        use crate::database::schema::postgres::delivery_tasks;

        let conn = self.dal.database.get_postgres_connection().await?;
        let row: Option<PgDeliveryTask> = conn
            .interact(move |conn| {
                delivery_tasks::table
                    .find(id.0)
                    .select(PgDeliveryTask::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(DeliveryTask::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn get_sqlite(&self, id: UniversalUuid) -> Result<Option<DeliveryTask>, StorageError> {
        use crate::dal::sqlite_dal::models::{uuid_to_blob, SqliteDeliveryTask};
        use crate::database::schema::sqlite::delivery_tasks;

        let conn = self.dal.database.get_sqlite_connection().await?;
        let id_blob = uuid_to_blob(&id);
        let row: Option<SqliteDeliveryTask> = conn
            .interact(move |conn| {
                delivery_tasks::table
                    .find(id_blob)
                    .select(SqliteDeliveryTask::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(DeliveryTask::try_from).transpose()
    }

    /// Lists the most recently created tasks, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<DeliveryStatus>,
        limit: i64,
    ) -> Result<Vec<DeliveryTask>, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.list_postgres(status, limit).await,
            self.list_sqlite(status, limit).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn list_postgres(
        &self,
        status: Option<DeliveryStatus>,
        limit: i64,
    ) -> Result<Vec<DeliveryTask>, StorageError> {
        use crate::dal::postgres_dal::models::PgDeliveryTask;
        use crate::database::schema::postgres::delivery_tasks;

        let conn = self.dal.database.get_postgres_connection().await?;
        let rows: Vec<PgDeliveryTask> = conn
            .interact(move |conn| {
                let mut query = delivery_tasks::table
                    .select(PgDeliveryTask::as_select())
                    .order(delivery_tasks::created_at.desc())
                    .limit(limit)
                    .into_boxed();
                if let Some(status) = status {
                    query = query.filter(delivery_tasks::status.eq(status.as_str()));
                }
                query.load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(DeliveryTask::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn list_sqlite(
        &self,
        status: Option<DeliveryStatus>,
        limit: i64,
    ) -> Result<Vec<DeliveryTask>, StorageError> {
        use crate::dal::sqlite_dal::models::SqliteDeliveryTask;
        use crate::database::schema::sqlite::delivery_tasks;

        let conn = self.dal.database.get_sqlite_connection().await?;
        let rows: Vec<SqliteDeliveryTask> = conn
            .interact(move |conn| {
                let mut query = delivery_tasks::table
                    .select(SqliteDeliveryTask::as_select())
                    .order(delivery_tasks::created_at.desc())
                    .limit(limit)
                    .into_boxed();
                if let Some(status) = status {
                    query = query.filter(delivery_tasks::status.eq(status.as_str()));
                }
                query.load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(DeliveryTask::try_from).collect()
    }

    /// Counts by status, success rate and mean response time.
    pub async fn status_summary(&self) -> Result<StatusSummary, StorageError> {
        let rows: Vec<StatusCountRow> = crate::dispatch_backend!(
            self.dal.backend(),
            {
                let conn = self.dal.database.get_postgres_connection().await?;
                conn.interact(|conn| diesel::sql_query(STATUS_SUMMARY_SQL).load::<StatusCountRow>(conn))
                    .await
                    .map_err(|e| StorageError::ConnectionPool(e.to_string()))??
            },
            {
                let conn = self.dal.database.get_sqlite_connection().await?;
                conn.interact(|conn| diesel::sql_query(STATUS_SUMMARY_SQL).load::<StatusCountRow>(conn))
                    .await
                    .map_err(|e| StorageError::ConnectionPool(e.to_string()))??
            }
        );

        Ok(StatusSummary::from_rows(rows.into_iter().map(|row| {
            (
                row.status,
                row.task_count,
                row.latency_sum,
                row.latency_samples,
            )
        })))
    }
}
