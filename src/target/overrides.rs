// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use super::Target;
use crate::error::{Error, Result};

/// Per-invocation target overrides taken from the global flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOverrides {
    pub garden: Option<String>,
    pub project: Option<String>,
    pub seed: Option<String>,
    pub shoot: Option<String>,
    pub control_plane: bool,
}

impl TargetOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overrides mirroring every level of `target`
    pub fn from_target(target: &Target) -> Self {
        Self {
            garden: target.garden().map(str::to_string),
            project: target.project().map(str::to_string),
            seed: target.seed().map(str::to_string),
            shoot: target.shoot().map(str::to_string),
            control_plane: target.control_plane(),
        }
    }

    /// Apply the overrides on top of `base`
    ///
    /// A shallower level replaces everything below it. The merged target is
    /// validated before it is returned.
    pub fn merge(&self, base: &Target) -> Result<Target> {
        if self.project.is_some() && self.seed.is_some() {
            return Err(Error::InvalidTarget(
                "the project and seed flags are mutually exclusive".into(),
            ));
        }

        let mut target = base.clone();
        if let Some(garden) = &self.garden {
            target = target.with_garden(garden);
        }
        if let Some(project) = &self.project {
            target = target.with_project(project);
        }
        if let Some(seed) = &self.seed {
            target = target.with_seed(seed);
        }
        if let Some(shoot) = &self.shoot {
            target = target.with_shoot(shoot);
        }
        if self.control_plane {
            target = target.with_control_plane(true);
        }

        target.validate()?;
        Ok(target)
    }
}
