// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Shell session identity and the private session directory
//!
//! Every shell gets its own directory under `<tmp>/garden/sessions/<id>/`
//! holding the persisted target and the materialized kubeconfigs. The id is
//! read from `GCTL_SESSION_ID`, or extracted from the terminal-provided
//! `TERM_SESSION_ID` when the former is not set.

use regex::Regex;
use std::fs;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{Error, Result};

pub const ENV_SESSION_ID: &str = "GCTL_SESSION_ID";
pub const ENV_TERM_SESSION_ID: &str = "TERM_SESSION_ID";

static SESSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid session id regex"));

static TERM_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-f0-9]{8}-[a-f0-9]{4}-4[a-f0-9]{3}-[89ab][a-f0-9]{3}-[a-f0-9]{12})")
        .expect("valid uuid regex")
});

/// Resolve the session id from the primary and the terminal variable
pub fn session_id_from(primary: Option<&str>, terminal: Option<&str>) -> Result<String> {
    if let Some(id) = primary {
        if !SESSION_ID.is_match(id) {
            return Err(Error::config(format!(
                "{ENV_SESSION_ID} must be 1 to 128 characters long and contain only alphanumerics, '-' or '_'"
            )));
        }
        return Ok(id.to_string());
    }

    if let Some(term) = terminal {
        let term = term.to_lowercase();
        if let Some(m) = TERM_UUID.find(&term) {
            return Ok(m.as_str().to_string());
        }
    }

    Err(Error::config(format!(
        "neither {ENV_SESSION_ID} nor {ENV_TERM_SESSION_ID} is set, export {ENV_SESSION_ID}=$(uuidgen) in your shell profile"
    )))
}

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    dir: PathBuf,
}

impl Session {
    /// Session bound to the current shell, rooted in the system temp directory
    pub fn from_env() -> Result<Self> {
        let primary = std::env::var(ENV_SESSION_ID).ok();
        let terminal = std::env::var(ENV_TERM_SESSION_ID).ok();
        let id = session_id_from(primary.as_deref(), terminal.as_deref())?;
        Ok(Self::new(id, &std::env::temp_dir()))
    }

    pub fn new(id: impl Into<String>, tmp_dir: &Path) -> Self {
        let id = id.into();
        let dir = tmp_dir.join("garden").join("sessions").join(&id);
        Self { id, dir }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the session directory (mode 0700) if needed
    pub fn ensure_dir(&self) -> Result<&Path> {
        ensure_private_dir(&self.dir)?;
        Ok(&self.dir)
    }
}

pub(crate) fn ensure_private_dir(dir: &Path) -> Result<()> {
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|e| Error::io("failed to create session directory", dir, e))?;
    // An existing directory keeps whatever mode it was created with
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
        .map_err(|e| Error::io("failed to restrict session directory", dir, e))
}

/// Write a file atomically: temp file in the same directory, fsync, rename
pub(crate) fn atomic_write(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    use tempfile::NamedTempFile;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| Error::io("failed to create temp file", parent, e))?;

    temp_file
        .as_file()
        .set_permissions(fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io("failed to set permissions", temp_file.path(), e))?;
    temp_file
        .write_all(content)
        .map_err(|e| Error::io("failed to write temp file", temp_file.path(), e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| Error::io("failed to sync temp file", temp_file.path(), e))?;

    temp_file
        .persist(path)
        .map_err(|e| Error::io("failed to persist file", path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case::single_char("a")]
    #[case::uuid("0c5a9d2e-7f4b-4a1c-9b2e-1d3f5a7c9e0b")]
    #[case::underscore("my_shell-1")]
    fn test_session_id_accepted(#[case] id: &str) {
        assert_eq!(session_id_from(Some(id), None).unwrap(), id);
    }

    #[test]
    fn test_session_id_length_boundary() {
        let max = "a".repeat(128);
        assert_eq!(session_id_from(Some(&max), None).unwrap(), max);

        let too_long = "a".repeat(129);
        assert_matches!(session_id_from(Some(&too_long), None), Err(Error::Config(_)));
    }

    #[rstest]
    #[case::empty("")]
    #[case::dot("a.b")]
    #[case::slash("a/b")]
    #[case::space("a b")]
    #[case::unicode("söt")]
    fn test_session_id_rejected(#[case] id: &str) {
        assert_matches!(session_id_from(Some(id), None), Err(Error::Config(_)));
    }

    #[test]
    fn test_invalid_primary_does_not_fall_back() {
        let term = "w0t0p0:0C5A9D2E-7F4B-4A1C-9B2E-1D3F5A7C9E0B";
        assert_matches!(session_id_from(Some("a b"), Some(term)), Err(Error::Config(_)));
    }

    #[test]
    fn test_terminal_session_id() {
        let term = "w0t0p0:0C5A9D2E-7F4B-4A1C-9B2E-1D3F5A7C9E0B";
        assert_eq!(
            session_id_from(None, Some(term)).unwrap(),
            "0c5a9d2e-7f4b-4a1c-9b2e-1d3f5a7c9e0b"
        );
    }

    #[test]
    fn test_terminal_session_id_without_uuid() {
        assert_matches!(session_id_from(None, Some("not-a-uuid")), Err(Error::Config(_)));
        assert_matches!(session_id_from(None, None), Err(Error::Config(_)));
    }

    #[test]
    fn test_session_dir_is_private() {
        let temp_dir = TempDir::new().unwrap();
        let session = Session::new("abc", temp_dir.path());
        assert_eq!(
            session.dir(),
            temp_dir.path().join("garden").join("sessions").join("abc")
        );

        let dir = session.ensure_dir().unwrap();
        let mode = fs::metadata(dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_atomic_write_mode() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.yaml");

        atomic_write(&path, b"first", 0o600).unwrap();
        atomic_write(&path, b"second", 0o600).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
