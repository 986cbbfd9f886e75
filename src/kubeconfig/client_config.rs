// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::path::Path;

use kube::config::Kubeconfig;

use crate::error::{Error, Result};

/// A kubeconfig selecting exactly the cluster a target points at
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    kubeconfig: Kubeconfig,
}

impl ClientConfig {
    pub fn new(kubeconfig: Kubeconfig) -> Self {
        Self { kubeconfig }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
            Error::config(format!("failed to load kubeconfig {}: {e}", path.display()))
        })?;
        Ok(Self::new(kubeconfig))
    }

    /// `$KUBECONFIG` or `~/.kube/config`
    pub fn from_default_location() -> Result<Self> {
        let kubeconfig = Kubeconfig::read()
            .map_err(|e| Error::config(format!("failed to load default kubeconfig: {e}")))?;
        Ok(Self::new(kubeconfig))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let kubeconfig = Kubeconfig::from_yaml(text)
            .map_err(|e| Error::config(format!("invalid kubeconfig: {e}")))?;
        Ok(Self::new(kubeconfig))
    }

    pub fn kubeconfig(&self) -> &Kubeconfig {
        &self.kubeconfig
    }

    pub fn into_kubeconfig(self) -> Kubeconfig {
        self.kubeconfig
    }

    pub fn current_context(&self) -> Option<&str> {
        self.kubeconfig.current_context.as_deref()
    }

    /// Namespace of the current context, if any
    pub fn namespace(&self) -> Option<&str> {
        let current = self.current_context()?;
        self.kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == current)
            .and_then(|c| c.context.as_ref())
            .and_then(|c| c.namespace.as_deref())
    }

    /// Keep only the given context (or the current one) with its cluster and user
    pub fn minify(mut self, context: Option<&str>) -> Result<Self> {
        let name = context
            .map(str::to_string)
            .or_else(|| self.kubeconfig.current_context.clone())
            .ok_or_else(|| Error::config("kubeconfig has no current context"))?;

        let named = self
            .kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| Error::config(format!("context {name:?} not found in kubeconfig")))?;

        let cluster = named.context.as_ref().map(|c| c.cluster.clone());
        let user = named.context.as_ref().and_then(|c| c.user.clone());

        self.kubeconfig
            .clusters
            .retain(|c| Some(&c.name) == cluster.as_ref());
        self.kubeconfig
            .auth_infos
            .retain(|a| Some(&a.name) == user.as_ref());
        self.kubeconfig.contexts = vec![named];
        self.kubeconfig.current_context = Some(name);
        Ok(self)
    }

    /// Set the namespace of the current context
    pub fn with_namespace(mut self, namespace: &str) -> Result<Self> {
        let current = self
            .kubeconfig
            .current_context
            .clone()
            .ok_or_else(|| Error::config("kubeconfig has no current context"))?;
        let context = self
            .kubeconfig
            .contexts
            .iter_mut()
            .find(|c| c.name == current)
            .and_then(|c| c.context.as_mut())
            .ok_or_else(|| Error::config(format!("context {current:?} not found in kubeconfig")))?;
        context.namespace = Some(namespace.to_string());
        Ok(self)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.kubeconfig)
            .map_err(|e| Error::config(format!("failed to serialize kubeconfig: {e}")))
    }
}
