// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-session persisted target
//!
//! The target lives in `<sessionDir>/target.yaml`. Writes go through a
//! temp file that is fsynced and renamed over the original, so readers see
//! either the old or the new target. Mutations are serialized by an advisory
//! exclusive lock on the sibling `target.yaml.lock`.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::Target;
use crate::context::OpContext;
use crate::error::{Error, Result};
use crate::session::{atomic_write, ensure_private_dir};

pub const TARGET_FILE: &str = "target.yaml";

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct SessionTargetStore {
    path: PathBuf,
}

impl SessionTargetStore {
    pub fn new(session_dir: &Path) -> Self {
        Self {
            path: session_dir.join(TARGET_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("yaml.lock")
    }

    /// Read the persisted target; an absent file is the empty target
    pub fn read(&self) -> Result<Target> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Target::default()),
            Err(e) => return Err(Error::io("failed to read target", &self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Target::default());
        }
        let target: Target = serde_yaml::from_str(&content).map_err(|e| {
            Error::io(
                "failed to parse target",
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        target.validate()?;
        Ok(target)
    }

    /// Persist a target atomically
    pub fn write(&self, target: &Target) -> Result<()> {
        target.validate()?;
        if let Some(dir) = self.path.parent() {
            ensure_private_dir(dir)?;
        }
        let content = serde_yaml::to_string(target).map_err(|e| {
            Error::io(
                "failed to serialize target",
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        atomic_write(&self.path, content.as_bytes(), 0o600)?;
        tracing::debug!(path = %self.path.display(), %target, "wrote target");
        Ok(())
    }

    /// Acquire the session lock, waiting until it is free or `ctx` is cancelled
    pub async fn lock(&self, ctx: &OpContext) -> Result<TargetLock> {
        let lock_path = self.lock_path();
        if let Some(dir) = lock_path.parent() {
            ensure_private_dir(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| Error::io("failed to open lock file", &lock_path, e))?;

        loop {
            ctx.ensure_active()?;
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    tracing::trace!(path = %lock_path.display(), "acquired session lock");
                    return Ok(TargetLock {
                        file,
                        path: lock_path,
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    tokio::select! {
                        _ = ctx.cancellation_token().cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(LOCK_POLL_INTERVAL) => {}
                    }
                }
                Err(e) => return Err(Error::io("failed to lock session", &lock_path, e)),
            }
        }
    }
}

/// Exclusive session lock, released on drop
#[derive(Debug)]
pub struct TargetLock {
    file: File,
    path: PathBuf,
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release session lock");
        }
    }
}
