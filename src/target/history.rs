// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::Target;
use crate::error::{Error, Result};

pub const HISTORY_FILE: &str = "history";

/// Append-only log of targeting commands, replayable in a shell
#[derive(Debug, Clone)]
pub struct TargetHistory {
    path: PathBuf,
    command: String,
}

impl TargetHistory {
    pub fn new(garden_home: &Path, command: impl Into<String>) -> Self {
        Self {
            path: garden_home.join(HISTORY_FILE),
            command: command.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `target` command line that reproduces `target`
    pub fn command_line(&self, target: &Target) -> String {
        let mut line = format!("{} target", self.command);
        let flags = [
            ("--garden", target.garden()),
            ("--project", target.project()),
            ("--seed", target.seed()),
            ("--shoot", target.shoot()),
        ];
        for (flag, value) in flags {
            if let Some(value) = value {
                line.push_str(&format!(" {flag} {value}"));
            }
        }
        if target.control_plane() {
            line.push_str(" --control-plane");
        }
        line
    }

    pub fn append(&self, target: &Target) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::io("failed to create history directory", dir, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io("failed to open history", &self.path, e))?;
        writeln!(file, "{}", self.command_line(target))
            .map_err(|e| Error::io("failed to append history", &self.path, e))
    }

    /// The full history; empty when nothing was recorded yet
    pub fn read(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(Error::io("failed to read history", &self.path, e)),
        }
    }
}
