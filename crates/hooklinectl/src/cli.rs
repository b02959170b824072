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


use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hooklinectl",
    version,
    about = "Operate the hookline webhook delivery worker",
    long_about = "Run the delivery worker, queue webhooks, inspect queue health and sign or verify payloads"
)]
pub struct Cli {
    /// Configuration file (default: $HOOKLINE_CONFIG, ./hookline.toml, ~/.config/hookline/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, overriding the configuration file
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run delivery cycles until interrupted
    Run,

    /// Run a single delivery cycle and exit
    RunOnce {
        #[arg(long)]
        json: bool,
    },

    /// Queue a webhook for a partner
    Enqueue {
        /// Partner id
        #[arg(short, long)]
        partner: String,

        /// JSON payload
        #[arg(long, conflicts_with = "payload_file", required_unless_present = "payload_file")]
        payload: Option<String>,

        /// Read the JSON payload from a file ("-" for stdin)
        #[arg(long)]
        payload_file: Option<PathBuf>,

        /// Attempts before the task fails (default from [retry] max_attempts)
        #[arg(long)]
        max_attempts: Option<i32>,
    },

    /// Show queue counts, success rate and average latency
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// List recent delivery tasks
    List {
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,

        #[arg(long, default_value_t = 20)]
        limit: i64,

        #[arg(long)]
        json: bool,
    },

    /// Show one delivery task
    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Apply pending database migrations
    Migrate,

    /// Sign a JSON payload the way the worker does
    Sign {
        #[arg(long, env = "HOOKLINE_SIGNING_SECRET")]
        secret: String,

        #[arg(long)]
        payload: String,

        /// Unix timestamp to sign with (default: now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Check a signature header against a payload
    Verify {
        #[arg(long, env = "HOOKLINE_SIGNING_SECRET")]
        secret: String,

        #[arg(long)]
        payload: String,

        /// Value of the X-Webhook-Signature header
        #[arg(long)]
        header: String,

        /// Accepted clock skew in seconds (default from [signature])
        #[arg(long)]
        tolerance: Option<i64>,
    },

    /// Configuration file helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a commented default configuration file
    Init {
        #[arg(short, long, default_value = "hookline.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load and validate the configuration
    Validate,

    /// Print the resolved configuration with secrets redacted
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    Pending,
    Retrying,
    Success,
    Failed,
}

impl From<StatusFilter> for hookline::DeliveryStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Pending => hookline::DeliveryStatus::Pending,
            StatusFilter::Retrying => hookline::DeliveryStatus::Retrying,
            StatusFilter::Success => hookline::DeliveryStatus::Success,
            StatusFilter::Failed => hookline::DeliveryStatus::Failed,
        }
    }
}
