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

//! Recording the result of a delivery attempt.

use diesel::prelude::*;

use super::DeliveryTaskDAL;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::{DeliveryOutcome, DeliveryStatus, DeliveryTask};

impl<'a> DeliveryTaskDAL<'a> {
    /// Writes `outcome` if `claim_token` still holds the task and the task is
    /// not terminal, clearing the claim in the same statement.
    ///
    /// Returns the updated task, or `None` when the guard did not match:
    /// the claim was released, superseded after lease expiry, or the task was
    /// already settled. Recording the same outcome twice therefore changes
    /// the row once, and only the writer that gets `Some` may act on a
    /// terminal transition (escalation, usage).
    pub async fn record_outcome(
        &self,
        id: UniversalUuid,
        claim_token: UniversalUuid,
        outcome: &DeliveryOutcome,
        now: UniversalTimestamp,
    ) -> Result<Option<DeliveryTask>, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.record_outcome_postgres(id, claim_token, outcome, now)
                .await,
            self.record_outcome_sqlite(id, claim_token, outcome, now)
                .await
        )
    }

    #[cfg(feature = "postgres")]
    async fn record_outcome_postgres(
        &self,
        id: UniversalUuid,
        claim_token: UniversalUuid,
        outcome: &DeliveryOutcome,
        now: UniversalTimestamp,
    ) -> Result<Option<DeliveryTask>, StorageError> {
        use crate::dal::postgres_dal::models::{PgDeliveryTask, PgOutcomeChangeset};
        use crate::database::schema::postgres::delivery_tasks;

        let conn = self.dal.database.get_postgres_connection().await?;
        let changes = PgOutcomeChangeset::new(outcome, now);
        let open_statuses = vec![
            DeliveryStatus::Pending.as_str(),
            DeliveryStatus::Retrying.as_str(),
        ];

        let rows: Vec<PgDeliveryTask> = conn
            .interact(move |conn| {
                diesel::update(
                    delivery_tasks::table
                        .filter(delivery_tasks::id.eq(id.0))
                        .filter(delivery_tasks::claim_token.eq(claim_token.0))
                        .filter(delivery_tasks::status.eq_any(open_statuses)),
                )
                .set(&changes)
                .returning(PgDeliveryTask::as_returning())
                .get_results(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().next().map(DeliveryTask::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn record_outcome_sqlite(
        &self,
        id: UniversalUuid,
        claim_token: UniversalUuid,
        outcome: &DeliveryOutcome,
        now: UniversalTimestamp,
    ) -> Result<Option<DeliveryTask>, StorageError> {
        use crate::dal::sqlite_dal::models::{
            uuid_to_blob, SqliteDeliveryTask, SqliteOutcomeChangeset,
        };
        use crate::database::schema::sqlite::delivery_tasks;

        let conn = self.dal.database.get_sqlite_connection().await?;
        let changes = SqliteOutcomeChangeset::new(outcome, now);
        let id = uuid_to_blob(&id);
        let token = uuid_to_blob(&claim_token);
        let open_statuses = vec![
            DeliveryStatus::Pending.as_str(),
            DeliveryStatus::Retrying.as_str(),
        ];

        let rows: Vec<SqliteDeliveryTask> = conn
            .interact(move |conn| {
                diesel::update(
                    delivery_tasks::table
                        .filter(delivery_tasks::id.eq(id))
                        .filter(delivery_tasks::claim_token.eq(token))
                        .filter(delivery_tasks::status.eq_any(open_statuses)),
                )
                .set(&changes)
                .returning(SqliteDeliveryTask::as_returning())
                .get_results(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().next().map(DeliveryTask::try_from).transpose()
    }
}
