// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Object-fetch surface over a garden cluster
//!
//! `GardenClient` is the narrow interface the targeting code talks to. The
//! required methods are plain gets and lists; shoot lookup, project lookup by
//! namespace and seed credential resolution are built on top of them so every
//! implementation shares the same resolution rules.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::models::{CloudProfile, GARDEN_NAMESPACE, Project, SecretBinding, Seed, Shoot};
use crate::error::{Error, Result, missing};
use crate::kubeconfig::ClientConfig;
use crate::target::Target;

/// Data key carrying the kubeconfig in seed credential secrets
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// Narrows shoot lookups to a project, a seed and/or a name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShootFilter {
    pub project: Option<String>,
    pub seed: Option<String>,
    pub name: Option<String>,
}

impl ShootFilter {
    pub fn from_target(target: &Target) -> Self {
        Self {
            project: target.project().map(str::to_string),
            seed: target.seed().map(str::to_string),
            name: target.shoot().map(str::to_string),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether `shoot` passes the seed and name constraints
    pub fn matches(&self, shoot: &Shoot) -> bool {
        if let Some(name) = &self.name
            && shoot.name() != name
        {
            return false;
        }
        if let Some(seed) = &self.seed
            && shoot.seed_name() != Some(seed.as_str())
        {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait GardenClient: Send + Sync {
    /// Shoots in `namespace` (all namespaces when `None`) passing `filter`,
    /// returning at most `limit` items when a limit is given
    async fn list_shoots_in(
        &self,
        cancel: &CancellationToken,
        namespace: Option<&str>,
        filter: &ShootFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Shoot>>;

    async fn list_seeds(&self, cancel: &CancellationToken) -> Result<Vec<Seed>>;

    async fn list_projects(&self, cancel: &CancellationToken) -> Result<Vec<Project>>;

    async fn get_seed(&self, cancel: &CancellationToken, name: &str) -> Result<Seed>;

    async fn get_project(&self, cancel: &CancellationToken, name: &str) -> Result<Project>;

    async fn get_shoot(&self, cancel: &CancellationToken, namespace: &str, name: &str)
    -> Result<Shoot>;

    async fn get_secret_binding(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<SecretBinding>;

    async fn get_secret(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Secret>;

    async fn get_cloud_profile(&self, cancel: &CancellationToken, name: &str)
    -> Result<CloudProfile>;

    /// Short-lived admin kubeconfig for a shoot
    async fn shoot_client_config(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<ClientConfig>;

    /// Namespace of a ready project
    async fn project_namespace(&self, cancel: &CancellationToken, name: &str) -> Result<String> {
        let project = self.get_project(cancel, name).await?;
        project.namespace().map(str::to_string).ok_or_else(|| {
            Error::NotReady(format!(
                "project {name:?} has not yet been assigned to a namespace"
            ))
        })
    }

    /// Shoots passing `filter`, scoped to the project namespace when a project is set
    async fn list_shoots(
        &self,
        cancel: &CancellationToken,
        filter: &ShootFilter,
    ) -> Result<Vec<Shoot>> {
        let namespace = match &filter.project {
            Some(project) => Some(self.project_namespace(cancel, project).await?),
            None => None,
        };
        self.list_shoots_in(cancel, namespace.as_deref(), filter, None)
            .await
    }

    /// Resolve exactly one shoot from a partial target
    async fn find_shoot(&self, cancel: &CancellationToken, filter: &ShootFilter) -> Result<Shoot> {
        let name = filter.name.as_deref().ok_or_else(missing::shoot)?;

        if let Some(project) = &filter.project {
            let namespace = self.project_namespace(cancel, project).await?;
            debug!(%namespace, shoot = %name, "looking up shoot in project");
            return self.get_shoot(cancel, &namespace, name).await;
        }

        debug!(seed = ?filter.seed, shoot = %name, "searching shoot across projects");
        let mut shoots = self.list_shoots_in(cancel, None, filter, Some(2)).await?;
        match shoots.len() {
            0 => Err(Error::UnknownShoot(name.to_string())),
            1 => Ok(shoots.remove(0)),
            _ => Err(Error::AmbiguousShoot(name.to_string())),
        }
    }

    /// The project owning `namespace`
    async fn project_by_namespace(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
    ) -> Result<Project> {
        self.list_projects(cancel)
            .await?
            .into_iter()
            .find(|p| p.namespace() == Some(namespace))
            .ok_or_else(|| Error::NotFound(format!("project for namespace {namespace:?}")))
    }

    /// Admin client config for a seed
    ///
    /// Uses the seed's secret reference when present, otherwise the
    /// `garden/<seed>.login` secret and finally `garden/<seed>.oidc`.
    async fn seed_client_config(&self, cancel: &CancellationToken, name: &str) -> Result<ClientConfig> {
        let seed = self.get_seed(cancel, name).await?;

        let secret = match &seed.spec.secret_ref {
            Some(secret_ref) if !secret_ref.name.is_empty() => {
                let namespace = if secret_ref.namespace.is_empty() {
                    GARDEN_NAMESPACE
                } else {
                    secret_ref.namespace.as_str()
                };
                self.get_secret(cancel, namespace, &secret_ref.name).await?
            }
            _ => {
                let login = format!("{name}.login");
                match self.get_secret(cancel, GARDEN_NAMESPACE, &login).await {
                    Ok(secret) => secret,
                    Err(Error::NotFound(_)) => {
                        debug!(seed = %name, "no login secret, falling back to oidc secret");
                        self.get_secret(cancel, GARDEN_NAMESPACE, &format!("{name}.oidc"))
                            .await?
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let secret_name = secret.metadata.name.clone().unwrap_or_default();
        let kubeconfig = secret
            .data
            .as_ref()
            .and_then(|data| data.get(KUBECONFIG_KEY))
            .ok_or_else(|| {
                Error::NotReady(format!(
                    "secret {secret_name:?} of seed {name:?} does not contain a kubeconfig"
                ))
            })?;
        let text = std::str::from_utf8(&kubeconfig.0).map_err(|e| {
            Error::config(format!("kubeconfig of seed {name:?} is not valid UTF-8: {e}"))
        })?;
        ClientConfig::from_yaml(text)?.minify(None)
    }
}

/// Hands out garden clients by garden name
#[async_trait]
pub trait GardenClientProvider: Send + Sync {
    async fn garden_client(&self, garden: &str) -> Result<Arc<dyn GardenClient>>;
}
