// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error kinds surfaced by the targeting core
//!
//! Every failure carries one of the kinds below. `Aborted` and `Cancelled`
//! are control signals: the command layer reports them as success without a
//! state change. All other kinds abort the transition.

use std::path::PathBuf;

/// Boxed upstream cause, kept verbatim for `Remote` errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("garden {0:?} is not defined in the configuration")]
    UnknownGarden(String),

    #[error("project {0:?} does not exist")]
    UnknownProject(String),

    #[error("seed {0:?} does not exist")]
    UnknownSeed(String),

    #[error("shoot {0:?} does not exist")]
    UnknownShoot(String),

    #[error(
        "there are multiple shoots named {0:?} on this garden, please target a project or seed to make your choice unambiguous"
    )]
    AmbiguousShoot(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Incomplete(String),

    #[error("{0}")]
    NotReady(String),

    #[error("the provided value {0:?} does not match any pattern")]
    PatternNoMatch(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("{0}: credentials were rejected")]
    Unauthorized(String),

    #[error("{context} ({path}): {source}")]
    Io {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operation aborted")]
    Aborted,

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn incomplete(msg: impl Into<String>) -> Self {
        Self::Incomplete(msg.into())
    }

    pub fn remote(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Remote {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn io(context: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path: path.into(),
            source,
        }
    }

    /// `Aborted` and `Cancelled` end a command successfully without changing state
    pub fn is_control_signal(&self) -> bool {
        matches!(self, Self::Aborted | Self::Cancelled)
    }
}

/// Shorthand for the most common precondition failures
pub(crate) mod missing {
    use super::Error;

    pub fn garden() -> Error {
        Error::incomplete("no garden cluster targeted")
    }

    pub fn project() -> Error {
        Error::incomplete("no project targeted")
    }

    pub fn seed() -> Error {
        Error::incomplete("no seed cluster targeted")
    }

    pub fn shoot() -> Error {
        Error::incomplete("no shoot targeted")
    }

    pub fn control_plane() -> Error {
        Error::incomplete("no control plane targeted")
    }
}
