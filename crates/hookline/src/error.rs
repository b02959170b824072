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

//! Error types for the delivery subsystem.
//!
//! Each concern owns a small error enum. Storage errors carry the diesel and
//! pool failures, while errors raised by collaborators (partner directory,
//! escalation channels) are kept separate so the worker can decide how each
//! one affects a task.

use thiserror::Error;

use crate::database::universal_types::UniversalUuid;

/// Errors raised while constructing a [`Database`](crate::database::Database)
/// or running its migrations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The connection URL does not name a compiled-in backend.
    #[error(
        "Unable to detect database backend from URL '{0}'. \
         Expected postgres://, postgresql://, sqlite://, or a file path"
    )]
    UnsupportedUrl(String),

    /// The connection URL could not be parsed.
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    /// The pool could not be built.
    #[error("Failed to create connection pool: {0}")]
    Pool(String),

    /// Applying embedded migrations failed.
    #[error("Failed to run migrations: {0}")]
    Migration(String),
}

/// Errors returned by the data access layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Delivery task not found: {0}")]
    NotFound(UniversalUuid),

    /// A stored row could not be converted into its domain type.
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    /// Caller supplied data that violates a table invariant.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure to consult the partner directory.
///
/// A missing or inactive partner is not an error; it is reported as
/// `Ok(None)` or through [`Partner::active`](crate::partner::Partner::active).
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Partner directory unavailable: {0}")]
    Unavailable(String),
}

/// Failure to hand an escalation to a channel.
#[derive(Debug, Error)]
pub enum EscalationError {
    #[error("Escalation channel '{channel}' failed: {message}")]
    Channel { channel: String, message: String },

    #[error("Operator directory unavailable: {0}")]
    Directory(String),
}

/// Errors that abort a whole worker cycle.
///
/// Per-task failures never surface here; they become task state.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Invalid worker configuration: {0}")]
    Config(String),
}
