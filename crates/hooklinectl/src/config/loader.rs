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


use crate::config::{ConfigError, HooklineConfig};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming a config file to use instead of searching.
pub const CONFIG_ENV_VAR: &str = "HOOKLINE_CONFIG";

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Searches `./hookline.toml`, then the user config directory, then
    /// `/etc/hookline/config.toml`.
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from("./hookline.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("hookline").join("config.toml"));
        }

        search_paths.push(PathBuf::from("/etc/hookline/config.toml"));

        Self { search_paths }
    }

    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Loads `config_file`, the file named by `HOOKLINE_CONFIG`, or the first
    /// file found on the search path, in that order.
    pub fn load_config(&self, config_file: Option<&Path>) -> Result<HooklineConfig, ConfigError> {
        let config_path = if let Some(path) = config_file {
            path.to_path_buf()
        } else if let Ok(env_config) = env::var(CONFIG_ENV_VAR) {
            PathBuf::from(env_config)
        } else {
            self.find_config_file().ok_or(ConfigError::ConfigNotFound)?
        };

        self.load_config_from_file(&config_path)
    }

    /// Like [`load_config`](Self::load_config), but falls back to built-in
    /// defaults when nothing was requested and nothing was found.
    pub fn load_or_default(&self, config_file: Option<&Path>) -> Result<HooklineConfig, ConfigError> {
        match self.load_config(config_file) {
            Err(ConfigError::ConfigNotFound) => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(HooklineConfig::default())
            }
            other => other,
        }
    }

    pub fn load_config_from_file(&self, path: &Path) -> Result<HooklineConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") | None => self.parse(&content),
            Some(ext) => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }

    /// Substitutes environment variables into `content` and parses it.
    pub fn parse(&self, content: &str) -> Result<HooklineConfig, ConfigError> {
        let substituted = substitute_env_vars(content)?;
        Ok(toml::from_str::<HooklineConfig>(&substituted)?)
    }

    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .find(|path| path.is_file())
            .cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands `${VAR}`, `${VAR:-default}` and `${VAR:?message}`.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::EnvSubstitutionError(e.to_string()))?;

    let mut result = String::with_capacity(content.len());
    let mut last = 0;
    for cap in re.captures_iter(content) {
        let (Some(whole), Some(expr)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        result.push_str(&content[last..whole.start()]);
        result.push_str(&process_var_expression(expr.as_str())?);
        last = whole.end();
    }
    result.push_str(&content[last..]);
    Ok(result)
}

fn process_var_expression(expr: &str) -> Result<String, ConfigError> {
    if let Some((name, default)) = expr.split_once(":-") {
        Ok(env::var(name).unwrap_or_else(|_| default.to_string()))
    } else if let Some((name, message)) = expr.split_once(":?") {
        env::var(name).map_err(|_| {
            ConfigError::EnvSubstitutionError(format!(
                "Required environment variable '{}' is not set: {}",
                name, message
            ))
        })
    } else {
        env::var(expr).map_err(|_| {
            ConfigError::EnvSubstitutionError(format!(
                "Required environment variable '{}' is not set",
                expr
            ))
        })
    }
}
