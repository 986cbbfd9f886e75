// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Writes client configs into the session directory
//!
//! Each distinct config lands in `kubeconfig-<sha256>.yaml`, so identical
//! content reuses one file. When linking is enabled, `kubeconfig.yaml` is a
//! symlink to the most recently written config and is swapped atomically.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::ClientConfig;
use crate::error::{Error, Result};
use crate::session::{atomic_write, ensure_private_dir};

pub const STABLE_KUBECONFIG: &str = "kubeconfig.yaml";

#[derive(Debug, Clone)]
pub struct KubeconfigMaterializer {
    dir: PathBuf,
    link: bool,
}

impl KubeconfigMaterializer {
    pub fn new(dir: impl Into<PathBuf>, link: bool) -> Self {
        Self {
            dir: dir.into(),
            link,
        }
    }

    pub fn stable_path(&self) -> PathBuf {
        self.dir.join(STABLE_KUBECONFIG)
    }

    /// Persist a client config and return the path of the written file
    pub fn write(&self, config: &ClientConfig) -> Result<PathBuf> {
        ensure_private_dir(&self.dir)?;

        let content = config.to_yaml()?;
        let fingerprint = format!("{:x}", Sha256::digest(content.as_bytes()));
        let path = self.dir.join(format!("kubeconfig-{fingerprint}.yaml"));

        if path.exists() {
            tracing::debug!(path = %path.display(), "reusing materialized kubeconfig");
        } else {
            atomic_write(&path, content.as_bytes(), 0o600)?;
            tracing::debug!(path = %path.display(), "materialized kubeconfig");
        }

        if self.link {
            self.link_to(&path)?;
        }
        Ok(path)
    }

    /// Point the stable symlink at `path`, or do nothing when linking is off
    pub fn link_to(&self, path: &Path) -> Result<()> {
        if !self.link {
            return Ok(());
        }
        let stable = self.stable_path();
        let temp = self
            .dir
            .join(format!(".{STABLE_KUBECONFIG}.{}", std::process::id()));

        if fs::symlink_metadata(&temp).is_ok() {
            fs::remove_file(&temp)
                .map_err(|e| Error::io("failed to remove stale symlink", &temp, e))?;
        }
        std::os::unix::fs::symlink(path, &temp)
            .map_err(|e| Error::io("failed to create symlink", &temp, e))?;
        fs::rename(&temp, &stable).map_err(|e| {
            let _ = fs::remove_file(&temp);
            Error::io("failed to swap kubeconfig symlink", &stable, e)
        })
    }

    /// Remove the stable symlink, if present
    pub fn unlink(&self) -> Result<()> {
        let stable = self.stable_path();
        match fs::remove_file(&stable) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io("failed to remove kubeconfig symlink", &stable, e)),
        }
    }
}
