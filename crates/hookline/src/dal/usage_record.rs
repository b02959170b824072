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

//! Usage record storage. Append-only.

use diesel::prelude::*;

use super::DAL;
use crate::database::universal_types::{current_timestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::{NewUsageRecord, UsageRecord};

#[derive(Clone)]
pub struct UsageRecordDAL<'a> {
    dal: &'a DAL,
}

impl<'a> UsageRecordDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub async fn create(&self, new_record: NewUsageRecord) -> Result<UsageRecord, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.create_postgres(new_record).await,
            self.create_sqlite(new_record).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn create_postgres(&self, new_record: NewUsageRecord) -> Result<UsageRecord, StorageError> {
        use crate::dal::postgres_dal::models::{NewPgUsageRecord, PgUsageRecord};
        use crate::database::schema::postgres::usage_records;

        let conn = self.dal.database.get_postgres_connection().await?;
        let row = NewPgUsageRecord {
            id: UniversalUuid::new_v4().0,
            delivery_task_id: new_record.delivery_task_id.0,
            partner_id: new_record.partner_id,
            endpoint_url: new_record.endpoint_url,
            status_code: new_record.status_code,
            response_time_ms: new_record.response_time_ms,
            created_at: current_timestamp().to_naive(),
        };

        let inserted: PgUsageRecord = conn
            .interact(move |conn| {
                diesel::insert_into(usage_records::table)
                    .values(&row)
                    .returning(PgUsageRecord::as_returning())
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(inserted.into())
    }

    #[cfg(feature = "sqlite")]
    async fn create_sqlite(&self, new_record: NewUsageRecord) -> Result<UsageRecord, StorageError> {
        use crate::dal::sqlite_dal::models::{uuid_to_blob, NewSqliteUsageRecord, SqliteUsageRecord};
        use crate::database::schema::sqlite::usage_records;

        let conn = self.dal.database.get_sqlite_connection().await?;
        let row = NewSqliteUsageRecord {
            id: uuid_to_blob(&UniversalUuid::new_v4()),
            delivery_task_id: uuid_to_blob(&new_record.delivery_task_id),
            partner_id: new_record.partner_id,
            endpoint_url: new_record.endpoint_url,
            status_code: new_record.status_code,
            response_time_ms: new_record.response_time_ms,
            created_at: current_timestamp().to_sqlite_string(),
        };

        let inserted: SqliteUsageRecord = conn
            .interact(move |conn| {
                diesel::insert_into(usage_records::table)
                    .values(&row)
                    .returning(SqliteUsageRecord::as_returning())
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        UsageRecord::try_from(inserted)
    }

    /// Records written for one delivery task (at most one in practice).
    pub async fn list_for_task(
        &self,
        delivery_task_id: UniversalUuid,
    ) -> Result<Vec<UsageRecord>, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            {
                use crate::dal::postgres_dal::models::PgUsageRecord;
                use crate::database::schema::postgres::usage_records;

                let conn = self.dal.database.get_postgres_connection().await?;
                let rows: Vec<PgUsageRecord> = conn
                    .interact(move |conn| {
                        usage_records::table
                            .filter(usage_records::delivery_task_id.eq(delivery_task_id.0))
                            .order(usage_records::created_at.asc())
                            .select(PgUsageRecord::as_select())
                            .load(conn)
                    })
                    .await
                    .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
                Ok(rows.into_iter().map(UsageRecord::from).collect())
            },
            {
                use crate::dal::sqlite_dal::models::{uuid_to_blob, SqliteUsageRecord};
                use crate::database::schema::sqlite::usage_records;

                let conn = self.dal.database.get_sqlite_connection().await?;
                let task_blob = uuid_to_blob(&delivery_task_id);
                let rows: Vec<SqliteUsageRecord> = conn
                    .interact(move |conn| {
                        usage_records::table
                            .filter(usage_records::delivery_task_id.eq(task_blob))
                            .order(usage_records::created_at.asc())
                            .select(SqliteUsageRecord::as_select())
                            .load(conn)
                    })
                    .await
                    .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
                rows.into_iter().map(UsageRecord::try_from).collect()
            }
        )
    }

    /// Number of successful deliveries recorded for `partner_id`.
    pub async fn count_for_partner(&self, partner_id: &str) -> Result<i64, StorageError> {
        let partner_id = partner_id.to_string();
        crate::dispatch_backend!(
            self.dal.backend(),
            {
                use crate::database::schema::postgres::usage_records;

                let conn = self.dal.database.get_postgres_connection().await?;
                let count: i64 = conn
                    .interact(move |conn| {
                        usage_records::table
                            .filter(usage_records::partner_id.eq(partner_id))
                            .count()
                            .get_result(conn)
                    })
                    .await
                    .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
                Ok(count)
            },
            {
                use crate::database::schema::sqlite::usage_records;

                let conn = self.dal.database.get_sqlite_connection().await?;
                let count: i64 = conn
                    .interact(move |conn| {
                        usage_records::table
                            .filter(usage_records::partner_id.eq(partner_id))
                            .count()
                            .get_result(conn)
                    })
                    .await
                    .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
                Ok(count)
            }
        )
    }
}
