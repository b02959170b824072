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

//! Partner directory.
//!
//! The worker looks up each task's partner right before delivering so
//! endpoint or secret rotations take effect on the next attempt. The
//! directory is read-only from the worker's side.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// Receiving side of webhook deliveries.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    /// Display name used in escalations. Falls back to `id` when empty.
    #[serde(default)]
    pub name: String,
    pub endpoint_url: String,
    pub secret: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Partner {
    pub fn new(
        id: impl Into<String>,
        endpoint_url: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            endpoint_url: endpoint_url.into(),
            secret: secret.into(),
            active: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Partner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partner")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("endpoint_url", &self.endpoint_url)
            .field("secret", &"<redacted>")
            .field("active", &self.active)
            .finish()
    }
}

/// Source of partner endpoint and secret configuration.
#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    /// Returns the partner, or `None` if no such partner exists.
    ///
    /// An `Err` means the directory itself could not be consulted; the
    /// worker then releases the task without charging an attempt.
    async fn get_partner(&self, partner_id: &str) -> Result<Option<Partner>, DirectoryError>;
}

/// In-memory directory, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPartnerDirectory {
    partners: HashMap<String, Partner>,
}

impl StaticPartnerDirectory {
    pub fn new(partners: impl IntoIterator<Item = Partner>) -> Self {
        Self {
            partners: partners.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Adds or replaces a partner.
    pub fn insert(&mut self, partner: Partner) {
        self.partners.insert(partner.id.clone(), partner);
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}

#[async_trait]
impl PartnerDirectory for StaticPartnerDirectory {
    async fn get_partner(&self, partner_id: &str) -> Result<Option<Partner>, DirectoryError> {
        Ok(self.partners.get(partner_id).cloned())
    }
}
