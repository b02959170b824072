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


//! `hooklinectl`: run and operate the hookline delivery worker.

mod cli;
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};
use config::{ConfigLoader, HooklineConfig, Validate};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config(ConfigCommands::Init { output, force }) = &cli.command {
        return commands::config::init(output, *force);
    }

    let config = load_config(&cli)?;
    init_logging(&cli, &config);

    match cli.command {
        Commands::Run => {
            config.validate()?;
            commands::run::run(&config).await?;
        }
        Commands::RunOnce { json } => {
            config.validate()?;
            commands::run::run_once(&config, json).await?;
        }
        Commands::Enqueue {
            ref partner,
            ref payload,
            ref payload_file,
            max_attempts,
        } => {
            commands::enqueue::run(
                &config,
                partner,
                payload.as_deref(),
                payload_file.as_deref(),
                max_attempts,
            )
            .await?;
        }
        Commands::Stats { json } => commands::inspect::stats(&config, json).await?,
        Commands::List {
            status,
            limit,
            json,
        } => commands::inspect::list(&config, status.map(Into::into), limit, json).await?,
        Commands::Show { ref id, json } => commands::inspect::show(&config, id, json).await?,
        Commands::Migrate => commands::migrate::run(&config).await?,
        Commands::Sign {
            ref secret,
            ref payload,
            timestamp,
        } => commands::sign::sign(secret, payload, timestamp)?,
        Commands::Verify {
            ref secret,
            ref payload,
            ref header,
            tolerance,
        } => commands::sign::verify(
            secret,
            payload,
            header,
            tolerance.unwrap_or(config.signature.tolerance_secs),
        )?,
        Commands::Config(ConfigCommands::Validate) => commands::config::validate(&config)?,
        Commands::Config(ConfigCommands::Show) => commands::config::show(&config)?,
        Commands::Config(ConfigCommands::Init { .. }) => {}
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<HooklineConfig> {
    let loader = ConfigLoader::new();
    let mut config = match &cli.config {
        Some(path) => loader
            .load_config(Some(path))
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => loader.load_or_default(None)?,
    };
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }
    Ok(config)
}

fn init_logging(cli: &Cli, config: &HooklineConfig) {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    hookline::init_logging(level, cli.log_json || config.logging.json);
}
