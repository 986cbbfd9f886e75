// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory garden for tests

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::client::{GardenClient, GardenClientProvider, KUBECONFIG_KEY, ShootFilter};
use super::models::{
    AccessRestrictionWithOptions, CloudProfile, Project, SecretBinding, SecretReference, Seed,
    Shoot,
};
use crate::error::{Error, Result};
use crate::kubeconfig::ClientConfig;

/// Single-context kubeconfig whose context, cluster and user share `name`
pub fn kubeconfig_yaml(name: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Config
current-context: {name}
clusters:
- name: {name}
  cluster:
    server: https://{name}.example.com
contexts:
- name: {name}
  context:
    cluster: {name}
    user: {name}
users:
- name: {name}
  user:
    token: {name}-token
"#
    )
}

fn meta(namespace: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeGarden {
    projects: Vec<Project>,
    seeds: Vec<Seed>,
    shoots: Vec<Shoot>,
    secrets: Vec<Secret>,
    secret_bindings: Vec<SecretBinding>,
    cloud_profiles: Vec<CloudProfile>,
    failure: Option<String>,
}

impl FakeGarden {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, name: &str) -> Self {
        let mut project = Project {
            metadata: meta(None, name),
            ..Default::default()
        };
        project.spec.namespace = Some(format!("garden-{name}"));
        self.projects.push(project);
        self
    }

    pub fn with_unready_project(mut self, name: &str) -> Self {
        self.projects.push(Project {
            metadata: meta(None, name),
            ..Default::default()
        });
        self
    }

    pub fn with_seed(mut self, name: &str) -> Self {
        self.seeds.push(Seed {
            metadata: meta(None, name),
            ..Default::default()
        });
        self
    }

    /// Seed whose credentials are referenced from its spec
    pub fn with_referenced_seed(mut self, name: &str, namespace: &str, secret: &str) -> Self {
        let mut seed = Seed {
            metadata: meta(None, name),
            ..Default::default()
        };
        seed.spec.secret_ref = Some(SecretReference {
            name: secret.to_string(),
            namespace: namespace.to_string(),
        });
        self.seeds.push(seed);
        self
    }

    /// Shoot in the namespace of `project`, scheduled onto `seed` (empty for none)
    pub fn with_shoot(mut self, project: &str, name: &str, seed: &str) -> Self {
        let mut shoot = Shoot {
            metadata: meta(Some(&format!("garden-{project}")), name),
            ..Default::default()
        };
        if !seed.is_empty() {
            shoot.spec.seed_name = Some(seed.to_string());
            shoot.status.technical_id = Some(format!("shoot--{project}--{name}"));
        }
        self.shoots.push(shoot);
        self
    }

    /// Declare an access restriction on an existing shoot
    pub fn with_access_restriction(
        mut self,
        project: &str,
        shoot: &str,
        key: &str,
        options: &[(&str, &str)],
    ) -> Self {
        let namespace = format!("garden-{project}");
        if let Some(s) = self
            .shoots
            .iter_mut()
            .find(|s| s.name() == shoot && s.namespace() == namespace)
        {
            s.spec
                .access_restrictions
                .push(AccessRestrictionWithOptions {
                    name: key.to_string(),
                    options: options
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                });
        }
        self
    }

    /// Secret carrying a kubeconfig with a single context named `context`
    pub fn with_seed_secret(mut self, namespace: &str, name: &str, context: &str) -> Self {
        let data = BTreeMap::from([(
            KUBECONFIG_KEY.to_string(),
            ByteString(kubeconfig_yaml(context).into_bytes()),
        )]);
        self.secrets.push(Secret {
            metadata: meta(Some(namespace), name),
            data: Some(data),
            ..Default::default()
        });
        self
    }

    pub fn with_secret_binding(mut self, namespace: &str, name: &str, secret: &str) -> Self {
        self.secret_bindings.push(SecretBinding {
            metadata: meta(Some(namespace), name),
            secret_ref: SecretReference {
                name: secret.to_string(),
                namespace: namespace.to_string(),
            },
            provider: None,
        });
        self
    }

    pub fn with_cloud_profile(mut self, name: &str, provider: &str) -> Self {
        let mut profile = CloudProfile {
            metadata: meta(None, name),
            ..Default::default()
        };
        profile.spec.type_ = provider.to_string();
        self.cloud_profiles.push(profile);
        self
    }

    /// Every remote call fails with `message`
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    fn check(&self, cancel: &CancellationToken, what: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match &self.failure {
            Some(message) => Err(Error::remote(what.to_string(), message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GardenClient for FakeGarden {
    async fn list_shoots_in(
        &self,
        cancel: &CancellationToken,
        namespace: Option<&str>,
        filter: &ShootFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Shoot>> {
        self.check(cancel, "failed to list shoots")?;
        let limit = limit.map_or(usize::MAX, |l| l as usize);
        Ok(self
            .shoots
            .iter()
            .filter(|s| namespace.is_none_or(|ns| s.namespace() == ns))
            .filter(|s| filter.matches(s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_seeds(&self, cancel: &CancellationToken) -> Result<Vec<Seed>> {
        self.check(cancel, "failed to list seeds")?;
        Ok(self.seeds.clone())
    }

    async fn list_projects(&self, cancel: &CancellationToken) -> Result<Vec<Project>> {
        self.check(cancel, "failed to list projects")?;
        Ok(self.projects.clone())
    }

    async fn get_seed(&self, cancel: &CancellationToken, name: &str) -> Result<Seed> {
        self.check(cancel, &format!("failed to get seed {name:?}"))?;
        self.seeds
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| Error::UnknownSeed(name.to_string()))
    }

    async fn get_project(&self, cancel: &CancellationToken, name: &str) -> Result<Project> {
        self.check(cancel, &format!("failed to get project {name:?}"))?;
        self.projects
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| Error::UnknownProject(name.to_string()))
    }

    async fn get_shoot(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Shoot> {
        self.check(cancel, &format!("failed to get shoot {namespace}/{name}"))?;
        self.shoots
            .iter()
            .find(|s| s.namespace() == namespace && s.name() == name)
            .cloned()
            .ok_or_else(|| Error::UnknownShoot(name.to_string()))
    }

    async fn get_secret_binding(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<SecretBinding> {
        self.check(cancel, &format!("failed to get secret binding {namespace}/{name}"))?;
        self.secret_bindings
            .iter()
            .find(|b| {
                b.metadata.namespace.as_deref() == Some(namespace)
                    && b.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("secret binding {namespace}/{name}")))
    }

    async fn get_secret(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Secret> {
        self.check(cancel, &format!("failed to get secret {namespace}/{name}"))?;
        self.secrets
            .iter()
            .find(|s| {
                s.metadata.namespace.as_deref() == Some(namespace)
                    && s.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("secret {namespace}/{name}")))
    }

    async fn get_cloud_profile(
        &self,
        cancel: &CancellationToken,
        name: &str,
    ) -> Result<CloudProfile> {
        self.check(cancel, &format!("failed to get cloud profile {name:?}"))?;
        self.cloud_profiles
            .iter()
            .find(|p| p.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("cloud profile {name:?}")))
    }

    async fn shoot_client_config(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<ClientConfig> {
        let shoot = self.get_shoot(cancel, namespace, name).await?;
        ClientConfig::from_yaml(&kubeconfig_yaml(&format!(
            "{}--{}",
            shoot.namespace(),
            shoot.name()
        )))
    }
}

/// Provider handing out fakes by garden name
#[derive(Default)]
pub struct FakeProvider {
    gardens: HashMap<String, Arc<FakeGarden>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_garden(mut self, name: &str, garden: FakeGarden) -> Self {
        self.gardens.insert(name.to_string(), Arc::new(garden));
        self
    }
}

#[async_trait]
impl GardenClientProvider for FakeProvider {
    async fn garden_client(&self, garden: &str) -> Result<Arc<dyn GardenClient>> {
        self.gardens
            .get(garden)
            .map(|g| Arc::clone(g) as Arc<dyn GardenClient>)
            .ok_or_else(|| Error::UnknownGarden(garden.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_lookups_for_collaborators() {
        let cancel = CancellationToken::new();
        let garden = FakeGarden::new()
            .with_secret_binding("garden-p", "aws", "aws-secret")
            .with_cloud_profile("aws", "aws");

        let binding = garden
            .get_secret_binding(&cancel, "garden-p", "aws")
            .await
            .unwrap();
        assert_eq!(binding.secret_ref.name, "aws-secret");

        let profile = garden.get_cloud_profile(&cancel, "aws").await.unwrap();
        assert_eq!(profile.spec.type_, "aws");

        assert_matches!(
            garden.get_cloud_profile(&cancel, "gcp").await,
            Err(Error::NotFound(_))
        );
    }

    #[tokio::test]
    async fn test_failure_and_cancellation() {
        let cancel = CancellationToken::new();
        let garden = FakeGarden::new().with_seed("s").failing("connection refused");
        let err = garden.get_seed(&cancel, "s").await.unwrap_err();
        assert_eq!(err.to_string(), "failed to get seed \"s\": connection refused");

        cancel.cancel();
        assert_matches!(garden.list_seeds(&cancel).await, Err(Error::Cancelled));
    }
}
