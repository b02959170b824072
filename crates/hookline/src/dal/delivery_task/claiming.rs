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

//! Claiming due tasks and releasing claims.
//!
//! A claim sets `status = 'retrying'`, a lease (`locked_until`) and a fresh
//! `claim_token` in the same transaction that selects the rows, so two
//! workers never receive the same task. A task whose lease has not expired
//! is invisible to `claim_due`; a crashed worker's tasks become claimable
//! again once the lease runs out.

use chrono::Duration;
use diesel::prelude::*;

use super::DeliveryTaskDAL;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::{DeliveryStatus, DeliveryTask};

fn claimable_statuses() -> Vec<&'static str> {
    DeliveryStatus::claimable()
        .iter()
        .map(|s| s.as_str())
        .collect()
}

impl<'a> DeliveryTaskDAL<'a> {
    /// Atomically claims up to `limit` due tasks, oldest first.
    ///
    /// Due means `status` is `pending` or `retrying`, `next_retry_at <= now`,
    /// and no unexpired lease is held. Returned tasks carry the claim token
    /// that [`record_outcome`](Self::record_outcome) and
    /// [`release`](Self::release) require.
    pub async fn claim_due(
        &self,
        limit: i64,
        now: UniversalTimestamp,
        lease: Duration,
        worker_id: &str,
    ) -> Result<Vec<DeliveryTask>, StorageError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let token = UniversalUuid::new_v4();
        let locked_until = now.plus(lease);
        let worker_id = worker_id.to_string();

        let mut tasks = crate::dispatch_backend!(
            self.dal.backend(),
            self.claim_due_postgres(limit, now, locked_until, token, worker_id)
                .await,
            self.claim_due_sqlite(limit, now, locked_until, token, worker_id)
                .await
        )?;

        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    #[cfg(feature = "postgres")]
    async fn claim_due_postgres(
        &self,
        limit: i64,
        now: UniversalTimestamp,
        locked_until: UniversalTimestamp,
        token: UniversalUuid,
        worker_id: String,
    ) -> Result<Vec<DeliveryTask>, StorageError> {
        use crate::dal::postgres_dal::models::PgDeliveryTask;
        use crate::database::schema::postgres::delivery_tasks;
        use diesel::connection::Connection;

        let conn = self.dal.database.get_postgres_connection().await?;
        let now = now.to_naive();
        let locked_until = locked_until.to_naive();

        let rows: Vec<PgDeliveryTask> = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    // Rows locked by a concurrent claim are skipped rather
                    // than waited on.
                    let ids: Vec<uuid::Uuid> = delivery_tasks::table
                        .select(delivery_tasks::id)
                        .filter(delivery_tasks::status.eq_any(claimable_statuses()))
                        .filter(delivery_tasks::next_retry_at.le(now))
                        .filter(
                            delivery_tasks::locked_until
                                .is_null()
                                .or(delivery_tasks::locked_until.le(now)),
                        )
                        .order(delivery_tasks::created_at.asc())
                        .limit(limit)
                        .for_update()
                        .skip_locked()
                        .load(conn)?;

                    if ids.is_empty() {
                        return Ok(Vec::new());
                    }

                    diesel::update(delivery_tasks::table.filter(delivery_tasks::id.eq_any(ids)))
                        .set((
                            delivery_tasks::status.eq(DeliveryStatus::Retrying.as_str()),
                            delivery_tasks::locked_until.eq(Some(locked_until)),
                            delivery_tasks::claim_token.eq(Some(token.0)),
                            delivery_tasks::claimed_by.eq(Some(worker_id)),
                            delivery_tasks::updated_at.eq(now),
                        ))
                        .returning(PgDeliveryTask::as_returning())
                        .get_results(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(DeliveryTask::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn claim_due_sqlite(
        &self,
        limit: i64,
        now: UniversalTimestamp,
        locked_until: UniversalTimestamp,
        token: UniversalUuid,
        worker_id: String,
    ) -> Result<Vec<DeliveryTask>, StorageError> {
        use crate::dal::sqlite_dal::models::{uuid_to_blob, SqliteDeliveryTask};
        use crate::database::schema::sqlite::delivery_tasks;

        let conn = self.dal.database.get_sqlite_connection().await?;
        let now = now.to_sqlite_string();
        let locked_until = locked_until.to_sqlite_string();
        let token = uuid_to_blob(&token);

        // SQLite has no SKIP LOCKED; an IMMEDIATE transaction takes the write
        // lock before the SELECT so concurrent claimers serialize.
        let rows: Vec<SqliteDeliveryTask> = conn
            .interact(move |conn| {
                conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                    let ids: Vec<Vec<u8>> = delivery_tasks::table
                        .select(delivery_tasks::id)
                        .filter(delivery_tasks::status.eq_any(claimable_statuses()))
                        .filter(delivery_tasks::next_retry_at.le(&now))
                        .filter(
                            delivery_tasks::locked_until
                                .is_null()
                                .or(delivery_tasks::locked_until.le(&now)),
                        )
                        .order(delivery_tasks::created_at.asc())
                        .limit(limit)
                        .load(conn)?;

                    if ids.is_empty() {
                        return Ok(Vec::new());
                    }

                    diesel::update(
                        delivery_tasks::table.filter(delivery_tasks::id.eq_any(ids.clone())),
                    )
                    .set((
                        delivery_tasks::status.eq(DeliveryStatus::Retrying.as_str()),
                        delivery_tasks::locked_until.eq(Some(locked_until.clone())),
                        delivery_tasks::claim_token.eq(Some(token.clone())),
                        delivery_tasks::claimed_by.eq(Some(worker_id.clone())),
                        delivery_tasks::updated_at.eq(&now),
                    ))
                    .execute(conn)?;

                    delivery_tasks::table
                        .filter(delivery_tasks::id.eq_any(ids))
                        .select(SqliteDeliveryTask::as_select())
                        .order(delivery_tasks::created_at.asc())
                        .load(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(DeliveryTask::try_from).collect()
    }

    /// Drops the claim on a task without recording an attempt.
    ///
    /// `attempts` and `next_retry_at` are left alone, so the task is due
    /// again as soon as its existing retry time allows. Returns `false` if
    /// `claim_token` no longer holds the task.
    pub async fn release(
        &self,
        id: UniversalUuid,
        claim_token: UniversalUuid,
        now: UniversalTimestamp,
    ) -> Result<bool, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.release_postgres(id, claim_token, now).await,
            self.release_sqlite(id, claim_token, now).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn release_postgres(
        &self,
        id: UniversalUuid,
        claim_token: UniversalUuid,
        now: UniversalTimestamp,
    ) -> Result<bool, StorageError> {
        use crate::database::schema::postgres::delivery_tasks;

        let conn = self.dal.database.get_postgres_connection().await?;
        let now = now.to_naive();

        let updated = conn
            .interact(move |conn| {
                diesel::update(
                    delivery_tasks::table
                        .filter(delivery_tasks::id.eq(id.0))
                        .filter(delivery_tasks::claim_token.eq(claim_token.0)),
                )
                .set((
                    delivery_tasks::locked_until.eq(None::<chrono::NaiveDateTime>),
                    delivery_tasks::claim_token.eq(None::<uuid::Uuid>),
                    delivery_tasks::updated_at.eq(now),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(updated == 1)
    }

    #[cfg(feature = "sqlite")]
    async fn release_sqlite(
        &self,
        id: UniversalUuid,
        claim_token: UniversalUuid,
        now: UniversalTimestamp,
    ) -> Result<bool, StorageError> {
        use crate::dal::sqlite_dal::models::uuid_to_blob;
        use crate::database::schema::sqlite::delivery_tasks;

        let conn = self.dal.database.get_sqlite_connection().await?;
        let id = uuid_to_blob(&id);
        let token = uuid_to_blob(&claim_token);
        let now = now.to_sqlite_string();

        let updated = conn
            .interact(move |conn| {
                diesel::update(
                    delivery_tasks::table
                        .filter(delivery_tasks::id.eq(id))
                        .filter(delivery_tasks::claim_token.eq(token)),
                )
                .set((
                    delivery_tasks::locked_until.eq(None::<String>),
                    delivery_tasks::claim_token.eq(None::<Vec<u8>>),
                    delivery_tasks::updated_at.eq(now),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(updated == 1)
    }
}
