// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// The scope a shell session operates on
///
/// Targets are values: every `with_*` and `unset_*` method returns a new
/// target and keeps the nesting rules intact (a deeper level never outlives
/// the level it hangs off).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    garden: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    project: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    seed: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    shoot: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    control_plane: bool,
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

impl Target {
    /// Build a target from its parts, rejecting invalid combinations
    pub fn new(
        garden: impl Into<String>,
        project: impl Into<String>,
        seed: impl Into<String>,
        shoot: impl Into<String>,
        control_plane: bool,
    ) -> Result<Self> {
        let target = Self {
            garden: garden.into(),
            project: project.into(),
            seed: seed.into(),
            shoot: shoot.into(),
            control_plane,
        };
        target.validate()?;
        Ok(target)
    }

    pub fn garden(&self) -> Option<&str> {
        non_empty(&self.garden)
    }

    pub fn project(&self) -> Option<&str> {
        non_empty(&self.project)
    }

    pub fn seed(&self) -> Option<&str> {
        non_empty(&self.seed)
    }

    pub fn shoot(&self) -> Option<&str> {
        non_empty(&self.shoot)
    }

    pub fn control_plane(&self) -> bool {
        self.control_plane
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.project.is_empty() && !self.seed.is_empty() {
            return Err(Error::InvalidTarget(
                "project and seed must not be targeted at the same time".into(),
            ));
        }
        if !self.shoot.is_empty() && self.garden.is_empty() {
            return Err(Error::InvalidTarget(
                "a shoot can only be targeted within a garden".into(),
            ));
        }
        if self.control_plane && self.shoot.is_empty() {
            return Err(Error::InvalidTarget(
                "the control plane can only be targeted for a shoot".into(),
            ));
        }
        Ok(())
    }

    /// Target a garden, dropping everything below it
    pub fn with_garden(&self, name: impl Into<String>) -> Self {
        Self {
            garden: name.into(),
            ..Self::default()
        }
    }

    /// Target a project in the current garden
    pub fn with_project(&self, name: impl Into<String>) -> Self {
        Self {
            garden: self.garden.clone(),
            project: name.into(),
            ..Self::default()
        }
    }

    /// Target a seed in the current garden
    pub fn with_seed(&self, name: impl Into<String>) -> Self {
        Self {
            garden: self.garden.clone(),
            seed: name.into(),
            ..Self::default()
        }
    }

    /// Target a shoot, keeping the project or seed it was resolved in
    pub fn with_shoot(&self, name: impl Into<String>) -> Self {
        Self {
            shoot: name.into(),
            control_plane: false,
            ..self.clone()
        }
    }

    pub fn with_control_plane(&self, control_plane: bool) -> Self {
        Self {
            control_plane,
            ..self.clone()
        }
    }

    pub fn unset_garden(&self) -> Self {
        Self::default()
    }

    pub fn unset_project(&self) -> Self {
        Self {
            garden: self.garden.clone(),
            seed: self.seed.clone(),
            ..Self::default()
        }
    }

    pub fn unset_seed(&self) -> Self {
        Self {
            garden: self.garden.clone(),
            project: self.project.clone(),
            ..Self::default()
        }
    }

    pub fn unset_shoot(&self) -> Self {
        Self {
            shoot: String::new(),
            control_plane: false,
            ..self.clone()
        }
    }

    pub fn unset_control_plane(&self) -> Self {
        self.with_control_plane(false)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(garden) = self.garden() {
            parts.push(format!("garden:{garden:?}"));
        }
        if let Some(project) = self.project() {
            parts.push(format!("project:{project:?}"));
        }
        if let Some(seed) = self.seed() {
            parts.push(format!("seed:{seed:?}"));
        }
        if let Some(shoot) = self.shoot() {
            parts.push(format!("shoot:{shoot:?}"));
        }
        if self.control_plane {
            parts.push("control-plane".to_string());
        }
        if parts.is_empty() {
            return f.write_str("<empty>");
        }
        f.write_str(&parts.join(", "))
    }
}
