// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration for gctl
//!
//! All persistent gctl data that is not bound to a shell session lives under
//! the garden home directory (`$GCTL_HOME` or `~/.garden/`):
//! - `<home>/gardenctl-v2.yaml` - declarative list of gardens
//! - `<home>/history` - targeting history
//! - `<home>/log/` - rotated log files

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::access::AccessRestriction;
use crate::error::{Error, Result};
use crate::kubeconfig::ClientConfig;

pub const ENV_HOME: &str = "GCTL_HOME";
pub const ENV_CONFIG_NAME: &str = "GCTL_CONFIG_NAME";
pub const ENV_LINK_KUBECONFIG: &str = "GCTL_LINK_KUBECONFIG";

const DEFAULT_CONFIG_NAME: &str = "gardenctl-v2";
const HOME_FOLDER: &str = ".garden";

static GARDEN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9_-]*[a-zA-Z0-9])?$").expect("valid garden name regex")
});

/// Get the garden home directory (`$GCTL_HOME` or `~/.garden/`)
pub fn base_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(ENV_HOME)
        && !home.is_empty()
    {
        return Ok(expand_home(&home));
    }
    dirs::home_dir()
        .map(|p| p.join(HOME_FOLDER))
        .ok_or_else(|| Error::config("could not determine home directory"))
}

/// Default configuration file, honouring `GCTL_CONFIG_NAME`
pub fn default_config_path() -> Result<PathBuf> {
    let name = std::env::var(ENV_CONFIG_NAME)
        .ok()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());
    Ok(base_dir()?.join(format!("{name}.yaml")))
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// One garden the user can target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Garden {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Path to the kubeconfig of the garden cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
    /// Context to select from the kubeconfig
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_restrictions: Vec<AccessRestriction>,
}

/// gctl configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub gardens: Vec<Garden>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_kubeconfig: Option<bool>,
}

impl Config {
    /// Load and validate the configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to read configuration file {}: {e}",
                path.display()
            ))
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        tracing::debug!(path = %path.display(), gardens = config.gardens.len(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate a configuration document
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| Error::config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for garden in &self.gardens {
            if !GARDEN_NAME.is_match(&garden.name) {
                return Err(Error::config(format!(
                    "garden name {:?} must start and end with an alphanumeric character and contain only alphanumerics, '-' or '_'",
                    garden.name
                )));
            }
            if let Some(alias) = &garden.alias
                && !GARDEN_NAME.is_match(alias)
            {
                return Err(Error::config(format!(
                    "alias {alias:?} of garden {:?} is not a valid name",
                    garden.name
                )));
            }
            if !seen.insert(garden.name.as_str()) {
                return Err(Error::config(format!(
                    "garden {:?} is defined more than once",
                    garden.name
                )));
            }
            if garden.kubeconfig.is_none() && garden.context.is_none() {
                return Err(Error::config(format!(
                    "garden {:?} must reference a kubeconfig or a context",
                    garden.name
                )));
            }
            for pattern in &garden.patterns {
                Regex::new(pattern).map_err(|e| {
                    Error::config(format!(
                        "invalid pattern {pattern:?} of garden {:?}: {e}",
                        garden.name
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Apply `GCTL_LINK_KUBECONFIG`, when set, on top of the file value
    pub fn apply_link_override(&mut self, value: Option<&str>) -> Result<()> {
        if let Some(value) = value {
            let link = value.parse::<bool>().map_err(|_| {
                Error::config(format!(
                    "{ENV_LINK_KUBECONFIG} must be \"true\" or \"false\", got {value:?}"
                ))
            })?;
            self.link_kubeconfig = Some(link);
        }
        Ok(())
    }

    /// Whether the stable `kubeconfig.yaml` symlink is maintained
    pub fn symlink_target_kubeconfig(&self) -> bool {
        self.link_kubeconfig.unwrap_or(true)
    }

    /// Find a garden by name, then by alias
    pub fn find_garden(&self, name: &str) -> Result<&Garden> {
        self.gardens
            .iter()
            .find(|g| g.name == name)
            .or_else(|| {
                self.gardens
                    .iter()
                    .find(|g| g.alias.as_deref() == Some(name))
            })
            .ok_or_else(|| Error::UnknownGarden(name.to_string()))
    }

    pub fn garden_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.gardens.iter().map(|g| g.name.clone()).collect();
        names.sort();
        names
    }

    /// Base client config for a garden, reduced to its selected context
    pub fn client_config(&self, garden_name: &str) -> Result<ClientConfig> {
        let garden = self.find_garden(garden_name)?;
        let base = match &garden.kubeconfig {
            Some(path) => ClientConfig::from_file(&expand_home(path))?,
            None => ClientConfig::from_default_location()?,
        };
        base.minify(garden.context.as_deref())
    }
}
