// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kubernetes-backed garden clients
//!
//! One `kube::Client` per garden is created lazily from the garden's base
//! client config and cached for the lifetime of the process. Gardener
//! resources are fetched as `DynamicObject`s and decoded into the models in
//! [`super::models`].

use async_trait::async_trait;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{
    Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, ObjectList, PostParams,
};
use kube::config::KubeConfigOptions;
use kube::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::{GardenClient, GardenClientProvider, ShootFilter};
use super::models::{CloudProfile, GROUP, Project, SecretBinding, Seed, Shoot, VERSION};
use crate::config::Config;
use crate::context::cancellable;
use crate::error::{BoxError, Error, Result};
use crate::kubeconfig::ClientConfig;

/// Timeout for connecting to the garden API server
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for transient list failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Lifetime requested for shoot admin kubeconfigs
const ADMIN_KUBECONFIG_EXPIRATION_SECONDS: u64 = 3600;

const ADMIN_KUBECONFIG_SUBRESOURCE: &str = "adminkubeconfig";

fn gardener_resource(kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(GROUP, VERSION, kind), plural)
}

/// Decode a dynamic object into one of the typed models
fn decode<T: DeserializeOwned>(obj: DynamicObject, what: &str) -> Result<T> {
    serde_json::to_value(obj)
        .and_then(serde_json::from_value)
        .map_err(|e| Error::remote(format!("failed to decode {what}"), e))
}

/// Map an API failure onto the crate's error kinds
fn map_kube_error(err: kube::Error, context: String, not_found: impl FnOnce() -> Error) -> Error {
    match &err {
        kube::Error::Api(status) if status.code == 404 => not_found(),
        kube::Error::Api(status) if matches!(status.code, 401 | 403) => {
            Error::Unauthorized(context)
        }
        _ => Error::remote(context, err),
    }
}

/// Check if an error is retryable (transient failures)
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::HyperError(_) => true,
        kube::Error::Api(status) => matches!(status.code, 429 | 503 | 504),
        _ => false,
    }
}

/// List with exponential backoff on transient failures
async fn list_with_retry(
    api: &Api<DynamicObject>,
    params: &ListParams,
    what: &str,
) -> std::result::Result<ObjectList<DynamicObject>, kube::Error> {
    let mut attempt = 0;
    loop {
        match api.list(params).await {
            Ok(list) => return Ok(list),
            Err(e) if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) => {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                warn!(
                    resource = %what,
                    attempt = attempt + 1,
                    max_attempts = MAX_RETRIES,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Retryable error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Body of an `AdminKubeconfigRequest`
fn admin_kubeconfig_request() -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "authentication.gardener.cloud/v1alpha1",
        "kind": "AdminKubeconfigRequest",
        "spec": { "expirationSeconds": ADMIN_KUBECONFIG_EXPIRATION_SECONDS },
    })
}

/// Decode the base64 `status.kubeconfig` of an admin kubeconfig response
fn admin_kubeconfig_from_response(response: &serde_json::Value) -> Result<ClientConfig, BoxError> {
    let encoded = response
        .pointer("/status/kubeconfig")
        .and_then(|v| v.as_str())
        .ok_or("response has no kubeconfig")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    let text = String::from_utf8(decoded)?;
    Ok(ClientConfig::from_yaml(&text)?)
}

/// Garden client talking to a real garden cluster
#[derive(Clone)]
pub struct KubeGardenClient {
    garden: String,
    client: Client,
    projects: ApiResource,
    seeds: ApiResource,
    shoots: ApiResource,
    secret_bindings: ApiResource,
    cloud_profiles: ApiResource,
}

impl KubeGardenClient {
    pub fn new(garden: impl Into<String>, client: Client) -> Self {
        Self {
            garden: garden.into(),
            client,
            projects: gardener_resource("Project", "projects"),
            seeds: gardener_resource("Seed", "seeds"),
            shoots: gardener_resource("Shoot", "shoots"),
            secret_bindings: gardener_resource("SecretBinding", "secretbindings"),
            cloud_profiles: gardener_resource("CloudProfile", "cloudprofiles"),
        }
    }

    /// Create a client from a garden's base client config
    pub async fn connect(garden: &str, config: ClientConfig) -> Result<Self> {
        let mut kube_config =
            kube::Config::from_custom_kubeconfig(config.into_kubeconfig(), &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::config(format!("failed to load client config for garden {garden:?}: {e}"))
                })?;

        kube_config.connect_timeout = Some(CONNECT_TIMEOUT);
        kube_config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(kube_config).map_err(|e| {
            Error::remote(format!("failed to create client for garden {:?}", garden), e)
        })?;
        Ok(Self::new(garden, client))
    }

    fn cluster_api(&self, resource: &ApiResource) -> Api<DynamicObject> {
        Api::all_with(self.client.clone(), resource)
    }

    fn namespaced_api(&self, resource: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, resource)
    }

    async fn get_dynamic<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        api: Api<DynamicObject>,
        name: &str,
        what: String,
        not_found: impl FnOnce() -> Error + Send,
    ) -> Result<T> {
        debug!(garden = %self.garden, %what, "get");
        let obj = cancellable(cancel, async {
            api.get(name)
                .await
                .map_err(|e| map_kube_error(e, format!("failed to get {what}"), not_found))
        })
        .await?;
        decode(obj, &what)
    }

    async fn list_dynamic<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        api: Api<DynamicObject>,
        params: ListParams,
        what: &str,
    ) -> Result<Vec<T>> {
        debug!(garden = %self.garden, %what, "list");
        let list = cancellable(cancel, async {
            list_with_retry(&api, &params, what)
                .await
                .map_err(|e| {
                    map_kube_error(e, format!("failed to list {what}"), || {
                        Error::NotFound(what.to_string())
                    })
                })
        })
        .await?;
        list.items.into_iter().map(|obj| decode(obj, what)).collect()
    }
}

#[async_trait]
impl GardenClient for KubeGardenClient {
    async fn list_shoots_in(
        &self,
        cancel: &CancellationToken,
        namespace: Option<&str>,
        filter: &ShootFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Shoot>> {
        let api = match namespace {
            Some(ns) => self.namespaced_api(&self.shoots, ns),
            None => self.cluster_api(&self.shoots),
        };

        let mut fields = Vec::new();
        if let Some(name) = &filter.name {
            fields.push(format!("metadata.name={name}"));
        }
        if let Some(seed) = &filter.seed {
            fields.push(format!("spec.seedName={seed}"));
        }
        let mut params = ListParams::default();
        if !fields.is_empty() {
            params = params.fields(&fields.join(","));
        }
        if let Some(limit) = limit {
            params = params.limit(limit);
        }

        let shoots: Vec<Shoot> = self.list_dynamic(cancel, api, params, "shoots").await?;
        Ok(shoots.into_iter().filter(|s| filter.matches(s)).collect())
    }

    async fn list_seeds(&self, cancel: &CancellationToken) -> Result<Vec<Seed>> {
        let api = self.cluster_api(&self.seeds);
        self.list_dynamic(cancel, api, ListParams::default(), "seeds")
            .await
    }

    async fn list_projects(&self, cancel: &CancellationToken) -> Result<Vec<Project>> {
        let api = self.cluster_api(&self.projects);
        self.list_dynamic(cancel, api, ListParams::default(), "projects")
            .await
    }

    async fn get_seed(&self, cancel: &CancellationToken, name: &str) -> Result<Seed> {
        let api = self.cluster_api(&self.seeds);
        self.get_dynamic(cancel, api, name, format!("seed {name:?}"), || {
            Error::UnknownSeed(name.to_string())
        })
        .await
    }

    async fn get_project(&self, cancel: &CancellationToken, name: &str) -> Result<Project> {
        let api = self.cluster_api(&self.projects);
        self.get_dynamic(cancel, api, name, format!("project {name:?}"), || {
            Error::UnknownProject(name.to_string())
        })
        .await
    }

    async fn get_shoot(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Shoot> {
        let api = self.namespaced_api(&self.shoots, namespace);
        self.get_dynamic(cancel, api, name, format!("shoot {namespace}/{name}"), || {
            Error::UnknownShoot(name.to_string())
        })
        .await
    }

    async fn get_secret_binding(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<SecretBinding> {
        let api = self.namespaced_api(&self.secret_bindings, namespace);
        let what = format!("secret binding {namespace}/{name}");
        let not_found = what.clone();
        self.get_dynamic(cancel, api, name, what, move || Error::NotFound(not_found))
            .await
    }

    async fn get_secret(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Secret> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let what = format!("secret {namespace}/{name}");
        debug!(garden = %self.garden, %what, "get");
        cancellable(cancel, async {
            api.get(name).await.map_err(|e| {
                map_kube_error(e, format!("failed to get {what}"), || {
                    Error::NotFound(what.clone())
                })
            })
        })
        .await
    }

    async fn get_cloud_profile(
        &self,
        cancel: &CancellationToken,
        name: &str,
    ) -> Result<CloudProfile> {
        let api = self.cluster_api(&self.cloud_profiles);
        let what = format!("cloud profile {name:?}");
        let not_found = what.clone();
        self.get_dynamic(cancel, api, name, what, move || Error::NotFound(not_found))
            .await
    }

    async fn shoot_client_config(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<ClientConfig> {
        let api = self.namespaced_api(&self.shoots, namespace);
        let request = admin_kubeconfig_request();

        debug!(garden = %self.garden, %namespace, shoot = %name, "requesting admin kubeconfig");
        let response: serde_json::Value = cancellable(cancel, async {
            api.create_subresource(ADMIN_KUBECONFIG_SUBRESOURCE, name, &PostParams::default(), &request)
                .await
                .map_err(|e| {
                    map_kube_error(
                        e,
                        format!("failed to create admin kubeconfig for shoot {namespace}/{name}"),
                        || Error::UnknownShoot(name.to_string()),
                    )
                })
        })
        .await?;

        admin_kubeconfig_from_response(&response)
            .map_err(|e| Error::remote(format!("admin kubeconfig of shoot {namespace}/{name}"), e))
    }
}

/// Lazily connected garden clients, one per garden
pub struct GardenClientPool {
    config: Arc<Config>,
    clients: RwLock<HashMap<String, Arc<KubeGardenClient>>>,
}

impl GardenClientPool {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the client for a garden
    async fn get_or_create_client(&self, garden: &str) -> Result<Arc<KubeGardenClient>> {
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(garden) {
                return Ok(Arc::clone(client));
            }
        }

        let name = self.config.find_garden(garden)?.name.clone();
        let base = self.config.client_config(&name)?;
        let client = Arc::new(KubeGardenClient::connect(&name, base).await?);
        debug!(garden = %name, "connected garden client");

        let mut clients = self.clients.write().await;
        let client = clients.entry(garden.to_string()).or_insert(client);
        Ok(Arc::clone(client))
    }
}

#[async_trait]
impl GardenClientProvider for GardenClientPool {
    async fn garden_client(&self, garden: &str) -> Result<Arc<dyn GardenClient>> {
        let client = self.get_or_create_client(garden).await?;
        Ok(client as Arc<dyn GardenClient>)
    }
}
