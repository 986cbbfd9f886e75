// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Command dispatch over the target manager

use anyhow::Result;
use std::io::{self, BufReader, IsTerminal, Stderr, Stdin, Write};
use std::sync::Arc;

use gctl::access::StreamHandler;
use gctl::context::OpContext;
use gctl::target::TargetManager;

use super::args::{Command, NameKind, TargetArgs, TargetCommand, UnsetKind};
use crate::output::format_target;

/// Run a parsed command, writing user-facing output to `out`
pub async fn run(
    command: &Command,
    manager: &TargetManager,
    ctx: &OpContext,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Target(args) => run_target(args, manager, ctx, out).await,
        Command::Kubeconfig { write } => {
            let target = manager.current_target()?;
            let config = manager.client_config(ctx, &target).await?;
            if *write {
                let path = manager.write_client_config(&config)?;
                writeln!(out, "{}", path.display())?;
            } else {
                write!(out, "{}", config.to_yaml()?)?;
            }
            Ok(())
        }
        Command::CompletionNames { kind } => {
            let names = match kind {
                NameKind::Garden => manager.garden_names(),
                NameKind::Project => manager.project_names(ctx).await?,
                NameKind::Seed => manager.seed_names(ctx).await?,
                NameKind::Shoot => manager.shoot_names(ctx).await?,
            };
            for name in names {
                writeln!(out, "{name}")?;
            }
            Ok(())
        }
    }
}

async fn run_target(
    args: &TargetArgs,
    manager: &TargetManager,
    ctx: &OpContext,
    out: &mut dyn Write,
) -> Result<()> {
    let Some(command) = &args.command else {
        let Some(pattern) = &args.pattern else {
            return view(manager, out, Default::default());
        };
        manager
            .target_match_pattern(&with_prompt(ctx), pattern)
            .await?;
        writeln!(out, "{}", targeted("pattern", pattern))?;
        return Ok(());
    };

    match command {
        TargetCommand::Garden { name } => {
            manager.target_garden(ctx, name).await?;
            writeln!(out, "{}", targeted("garden", name))?;
        }
        TargetCommand::Project {
            name,
            allow_unready,
        } => {
            manager.target_project(ctx, name, *allow_unready).await?;
            writeln!(out, "{}", targeted("project", name))?;
        }
        TargetCommand::Seed { name } => {
            manager.target_seed(ctx, name).await?;
            writeln!(out, "{}", targeted("seed", name))?;
        }
        TargetCommand::Shoot { name } => {
            manager.target_shoot(&with_prompt(ctx), name).await?;
            writeln!(out, "{}", targeted("shoot", name))?;
        }
        TargetCommand::ControlPlane => {
            manager.target_control_plane(&with_prompt(ctx)).await?;
            let target = manager.current_target()?;
            let shoot = target.shoot().unwrap_or_default();
            writeln!(out, "Successfully targeted control plane of shoot {shoot:?}")?;
        }
        TargetCommand::Unset { kind } => {
            let line = match kind {
                UnsetKind::Garden => unset("garden", &manager.unset_garden(ctx).await?),
                UnsetKind::Project => unset("project", &manager.unset_project(ctx).await?),
                UnsetKind::Seed => unset("seed", &manager.unset_seed(ctx).await?),
                UnsetKind::Shoot => unset("shoot", &manager.unset_shoot(ctx).await?),
                UnsetKind::ControlPlane => {
                    manager.unset_control_plane(ctx).await?;
                    "Successfully unset targeted control plane".to_string()
                }
            };
            writeln!(out, "{line}")?;
        }
        TargetCommand::View { output } => view(manager, out, *output)?,
        TargetCommand::History => {
            if let Some(history) = manager.history() {
                write!(out, "{}", history.read()?)?;
            }
        }
    }
    Ok(())
}

fn view(manager: &TargetManager, out: &mut dyn Write, format: super::OutputFormat) -> Result<()> {
    let target = manager.current_target()?;
    write!(out, "{}", format_target(&target, format)?)?;
    Ok(())
}

/// Derive a context that shows access restrictions before a transition
fn with_prompt(ctx: &OpContext) -> OpContext {
    ctx.with_access_restriction_handler(Arc::new(restriction_handler()))
}

/// Banner and question go to stderr so stdout stays machine readable.
/// Confirmation is only asked for when stdin is interactive.
fn restriction_handler() -> StreamHandler<BufReader<Stdin>, Stderr> {
    let stdin = io::stdin();
    let ask = stdin.is_terminal();
    StreamHandler::new(BufReader::new(stdin), io::stderr(), ask)
}

fn targeted(kind: &str, name: &str) -> String {
    format!("Successfully targeted {kind} {name:?}")
}

fn unset(kind: &str, name: &str) -> String {
    format!("Successfully unset targeted {kind} {name:?}")
}
