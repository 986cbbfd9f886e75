// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-operation scope carrier
//!
//! An `OpContext` is created once per command and threaded through every
//! targeting operation. It holds the cancellation token inherited from the
//! top-level command and, optionally, the access-restriction handler that
//! should be consulted before a shoot is targeted.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::access::AccessRestrictionHandler;
use crate::error::{Error, Result};

#[derive(Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    handler: Option<Arc<dyn AccessRestrictionHandler>>,
}

impl OpContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            handler: None,
        }
    }

    /// Returns a copy of this context carrying the given handler
    pub fn with_access_restriction_handler(
        &self,
        handler: Arc<dyn AccessRestrictionHandler>,
    ) -> Self {
        Self {
            cancel: self.cancel.clone(),
            handler: Some(handler),
        }
    }

    pub fn access_restriction_handler(&self) -> Option<Arc<dyn AccessRestrictionHandler>> {
        self.handler.clone()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails with `Cancelled` once the token has fired
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Run a future, giving up with `Cancelled` as soon as the token fires
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        cancellable(&self.cancel, fut).await
    }
}

/// Race a fallible future against a cancellation token
pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
