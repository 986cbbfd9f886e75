// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Target transitions and client config assembly
//!
//! Every transition follows the same sequence: take the session lock, read
//! the effective target (persisted target plus per-invocation overrides),
//! resolve and validate the requested change against the garden, consult the
//! access-restriction handler when a shoot is newly named, then persist. A
//! transition that fails at any step leaves the persisted target untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::history::TargetHistory;
use super::overrides::TargetOverrides;
use super::pattern::match_pattern;
use super::store::SessionTargetStore;
use super::Target;
use crate::access::check_access_restrictions;
use crate::config::{Config, Garden};
use crate::context::OpContext;
use crate::error::{Error, Result, missing};
use crate::garden::{GardenClient, GardenClientProvider, Shoot, ShootFilter};
use crate::kubeconfig::{ClientConfig, KubeconfigMaterializer};

pub struct TargetManager {
    config: Arc<Config>,
    store: SessionTargetStore,
    materializer: KubeconfigMaterializer,
    clients: Arc<dyn GardenClientProvider>,
    overrides: TargetOverrides,
    history: Option<TargetHistory>,
}

/// A shoot resolved within a garden, with the target that names it
struct ResolvedShoot {
    shoot: Shoot,
    target: Target,
}

impl TargetManager {
    pub fn new(
        config: Arc<Config>,
        session_dir: &Path,
        clients: Arc<dyn GardenClientProvider>,
    ) -> Self {
        let materializer =
            KubeconfigMaterializer::new(session_dir, config.symlink_target_kubeconfig());
        Self {
            store: SessionTargetStore::new(session_dir),
            materializer,
            config,
            clients,
            overrides: TargetOverrides::default(),
            history: None,
        }
    }

    pub fn with_overrides(mut self, overrides: TargetOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_history(mut self, history: TargetHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn history(&self) -> Option<&TargetHistory> {
        self.history.as_ref()
    }

    /// The persisted target with the per-invocation overrides applied
    pub fn current_target(&self) -> Result<Target> {
        let stored = self.store.read()?;
        self.overrides.merge(&stored)
    }

    pub async fn target_garden(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let _lock = self.store.lock(ctx).await?;
        let (stored, current) = self.read_locked()?;

        let garden = self.config.find_garden(name)?;
        let next = current.with_garden(&garden.name);
        self.commit(ctx, &stored, next, None).await
    }

    pub async fn target_project(
        &self,
        ctx: &OpContext,
        name: &str,
        allow_unready: bool,
    ) -> Result<()> {
        let _lock = self.store.lock(ctx).await?;
        let (stored, current) = self.read_locked()?;

        let (_, client) = self.garden_client(ctx, &current).await?;
        let project = client.get_project(ctx.cancellation_token(), name).await?;
        if !allow_unready && !project.is_ready() {
            return Err(Error::NotReady(format!(
                "project {name:?} does not have a namespace yet, most likely it has not been fully created"
            )));
        }

        let next = current.with_project(project.name());
        self.commit(ctx, &stored, next, None).await
    }

    pub async fn target_seed(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let _lock = self.store.lock(ctx).await?;
        let (stored, current) = self.read_locked()?;

        let (_, client) = self.garden_client(ctx, &current).await?;
        let seed = client.get_seed(ctx.cancellation_token(), name).await?;

        let next = current.with_seed(seed.name());
        self.commit(ctx, &stored, next, None).await
    }

    pub async fn target_shoot(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let _lock = self.store.lock(ctx).await?;
        let (stored, current) = self.read_locked()?;

        let (garden, client) = self.garden_client(ctx, &current).await?;
        let resolved = resolve_shoot(ctx, client.as_ref(), &current, name).await?;
        self.commit(ctx, &stored, resolved.target, Some((garden, &resolved.shoot)))
            .await
    }

    pub async fn target_control_plane(&self, ctx: &OpContext) -> Result<()> {
        let _lock = self.store.lock(ctx).await?;
        let (stored, current) = self.read_locked()?;

        let shoot = current.shoot().ok_or_else(missing::shoot)?.to_string();
        let (garden, client) = self.garden_client(ctx, &current).await?;
        let resolved = resolve_shoot(ctx, client.as_ref(), &current, &shoot).await?;

        let next = resolved.target.with_control_plane(true);
        self.commit(ctx, &stored, next, Some((garden, &resolved.shoot)))
            .await
    }

    /// Target whatever the first matching garden pattern describes
    pub async fn target_match_pattern(&self, ctx: &OpContext, value: &str) -> Result<()> {
        let _lock = self.store.lock(ctx).await?;
        let (stored, current) = self.read_locked()?;

        let found = match_pattern(&self.config, value)?;
        let mut next = current.with_garden(&found.garden);
        let (garden, client) = self.garden_client(ctx, &next).await?;

        if let Some(project) = &found.project {
            let namespace = client
                .project_namespace(ctx.cancellation_token(), project)
                .await?;
            debug!(%project, %namespace, "pattern resolved project");
            next = next.with_project(project);
        }

        let shoot = match &found.shoot {
            Some(name) => {
                let resolved = resolve_shoot(ctx, client.as_ref(), &next, name).await?;
                next = resolved.target;
                Some(resolved.shoot)
            }
            None => None,
        };

        if self.overrides.control_plane {
            next = next.with_control_plane(true);
        }

        let restriction = shoot.as_ref().map(|s| (garden, s));
        self.commit(ctx, &stored, next, restriction).await
    }

    pub async fn unset_garden(&self, ctx: &OpContext) -> Result<String> {
        self.unset(ctx, |t| t.garden().map(str::to_string), missing::garden, Target::unset_garden)
            .await
    }

    pub async fn unset_project(&self, ctx: &OpContext) -> Result<String> {
        self.unset(ctx, |t| t.project().map(str::to_string), missing::project, Target::unset_project)
            .await
    }

    pub async fn unset_seed(&self, ctx: &OpContext) -> Result<String> {
        self.unset(ctx, |t| t.seed().map(str::to_string), missing::seed, Target::unset_seed)
            .await
    }

    pub async fn unset_shoot(&self, ctx: &OpContext) -> Result<String> {
        self.unset(ctx, |t| t.shoot().map(str::to_string), missing::shoot, Target::unset_shoot)
            .await
    }

    pub async fn unset_control_plane(&self, ctx: &OpContext) -> Result<()> {
        self.unset(
            ctx,
            |t| t.control_plane().then(String::new),
            missing::control_plane,
            Target::unset_control_plane,
        )
        .await
        .map(|_| ())
    }

    async fn unset(
        &self,
        ctx: &OpContext,
        field: impl Fn(&Target) -> Option<String>,
        absent: fn() -> Error,
        clear: fn(&Target) -> Target,
    ) -> Result<String> {
        let _lock = self.store.lock(ctx).await?;
        let (stored, current) = self.read_locked()?;

        let previous = field(&current).ok_or_else(absent)?;
        self.commit(ctx, &stored, clear(&current), None).await?;
        Ok(previous)
    }

    /// Client config for a target
    ///
    /// Garden, project and seed targets use the garden's base config, a shoot
    /// target an admin kubeconfig of the shoot, and a control-plane target the
    /// seed's credentials scoped to the shoot's control-plane namespace.
    pub async fn client_config(&self, ctx: &OpContext, target: &Target) -> Result<ClientConfig> {
        let garden = target.garden().ok_or_else(missing::garden)?;
        let Some(shoot_name) = target.shoot() else {
            return self.config.client_config(garden);
        };

        let (_, client) = self.garden_client(ctx, target).await?;
        let cancel = ctx.cancellation_token();

        if target.control_plane() {
            let filter = ShootFilter::from_target(target);
            let shoot = client.find_shoot(cancel, &filter).await?;
            let seed = shoot.seed_name().ok_or_else(|| {
                Error::NotReady(format!(
                    "shoot {shoot_name:?} has not yet been assigned to a seed"
                ))
            })?;
            let namespace = match (shoot.technical_id(), target.project()) {
                (Some(id), _) => id.to_string(),
                (None, Some(project)) => shoot.control_plane_namespace(project),
                (None, None) => {
                    let project = client.project_by_namespace(cancel, shoot.namespace()).await?;
                    shoot.control_plane_namespace(project.name())
                }
            };
            debug!(%seed, %namespace, "assembling control plane client config");
            return client
                .seed_client_config(cancel, seed)
                .await?
                .with_namespace(&namespace);
        }

        let namespace = match target.project() {
            Some(project) => client.project_namespace(cancel, project).await?,
            None => {
                let filter = ShootFilter::from_target(target);
                client.find_shoot(cancel, &filter).await?.namespace().to_string()
            }
        };
        client.shoot_client_config(cancel, &namespace, shoot_name).await
    }

    /// Materialize a client config in the session directory
    pub fn write_client_config(&self, config: &ClientConfig) -> Result<PathBuf> {
        self.materializer.write(config)
    }

    pub fn garden_names(&self) -> Vec<String> {
        self.config.garden_names()
    }

    pub async fn project_names(&self, ctx: &OpContext) -> Result<Vec<String>> {
        let current = self.current_target()?;
        let (_, client) = self.garden_client(ctx, &current).await?;
        let projects = client.list_projects(ctx.cancellation_token()).await?;
        Ok(sorted(projects.iter().map(|p| p.name())))
    }

    pub async fn seed_names(&self, ctx: &OpContext) -> Result<Vec<String>> {
        let current = self.current_target()?;
        let (_, client) = self.garden_client(ctx, &current).await?;
        let seeds = client.list_seeds(ctx.cancellation_token()).await?;
        Ok(sorted(seeds.iter().map(|s| s.name())))
    }

    /// Shoots in the targeted project or seed, or in the whole garden
    pub async fn shoot_names(&self, ctx: &OpContext) -> Result<Vec<String>> {
        let current = self.current_target()?;
        let (_, client) = self.garden_client(ctx, &current).await?;
        let filter = ShootFilter {
            name: None,
            ..ShootFilter::from_target(&current)
        };
        let shoots = client.list_shoots(ctx.cancellation_token(), &filter).await?;
        Ok(sorted(shoots.iter().map(|s| s.name())))
    }

    fn read_locked(&self) -> Result<(Target, Target)> {
        let stored = self.store.read()?;
        let current = self.overrides.merge(&stored)?;
        Ok((stored, current))
    }

    async fn garden_client(
        &self,
        ctx: &OpContext,
        target: &Target,
    ) -> Result<(&Garden, Arc<dyn GardenClient>)> {
        let name = target.garden().ok_or_else(missing::garden)?;
        let garden = self.config.find_garden(name)?;
        let client = ctx.run(self.clients.garden_client(&garden.name)).await?;
        Ok((garden, client))
    }

    /// Persist `next` unless it equals the stored target
    async fn commit(
        &self,
        ctx: &OpContext,
        stored: &Target,
        next: Target,
        restriction: Option<(&Garden, &Shoot)>,
    ) -> Result<()> {
        next.validate()?;
        if next == *stored {
            debug!(target = %next, "target unchanged");
            return Ok(());
        }

        if let Some((garden, shoot)) = restriction {
            confirm_access(ctx, garden, shoot).await?;
        }

        ctx.ensure_active()?;
        self.store.write(&next)?;
        info!(target = %next, "updated target");

        if let Some(history) = &self.history
            && let Err(e) = history.append(&next)
        {
            warn!(error = %e, "failed to record target history");
        }
        if let Err(e) = self.refresh_kubeconfig_link(ctx, &next).await {
            warn!(error = %e, "failed to update the kubeconfig symlink");
        }
        Ok(())
    }

    async fn refresh_kubeconfig_link(&self, ctx: &OpContext, target: &Target) -> Result<()> {
        if !self.config.symlink_target_kubeconfig() {
            return Ok(());
        }
        if target.garden().is_none() {
            return self.materializer.unlink();
        }
        let config = self.client_config(ctx, target).await?;
        self.materializer.write(&config).map(|_| ())
    }
}

/// Find `name` within the scope of `current` and name it in the target
///
/// A project or seed already in scope is kept; otherwise the project owning
/// the shoot's namespace is filled in.
async fn resolve_shoot(
    ctx: &OpContext,
    client: &dyn GardenClient,
    current: &Target,
    name: &str,
) -> Result<ResolvedShoot> {
    let cancel = ctx.cancellation_token();
    let filter = ShootFilter::from_target(current).with_name(name);
    let shoot = client.find_shoot(cancel, &filter).await?;

    let target = if current.project().is_some() || current.seed().is_some() {
        current.with_shoot(shoot.name())
    } else {
        let project = client.project_by_namespace(cancel, shoot.namespace()).await?;
        current.with_project(project.name()).with_shoot(shoot.name())
    };
    Ok(ResolvedShoot { shoot, target })
}

/// Run the access-restriction handler for `shoot`, failing with `Aborted` on refusal
async fn confirm_access(ctx: &OpContext, garden: &Garden, shoot: &Shoot) -> Result<()> {
    let Some(handler) = ctx.access_restriction_handler() else {
        return Ok(());
    };
    let messages = check_access_restrictions(&garden.access_restrictions, shoot);
    if messages.is_empty() {
        return Ok(());
    }

    let task = tokio::task::spawn_blocking(move || handler.handle(&messages));
    let proceed = tokio::select! {
        biased;
        _ = ctx.cancellation_token().cancelled() => return Err(Error::Cancelled),
        joined = task => joined.unwrap_or_else(|e| {
            warn!(error = %e, "access restriction handler failed");
            false
        }),
    };

    if proceed {
        Ok(())
    } else {
        info!(shoot = %shoot.name(), "operation aborted at access restriction prompt");
        Err(Error::Aborted)
    }
}

fn sorted<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = names.map(str::to_string).collect();
    names.sort();
    names.dedup();
    names
}
