// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use gctl::target::TargetOverrides;

#[derive(Parser, Debug)]
#[command(name = "gctl")]
#[command(author, version, about = "Target gardens, projects, seeds and shoots of a Gardener landscape")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Garden to use for this invocation only
    #[arg(long, global = true)]
    pub garden: Option<String>,

    /// Project to use for this invocation only
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Seed to use for this invocation only
    #[arg(long, global = true)]
    pub seed: Option<String>,

    /// Shoot to use for this invocation only
    #[arg(long, global = true)]
    pub shoot: Option<String>,

    /// Use the control plane of the shoot for this invocation only
    #[arg(long, global = true)]
    pub control_plane: bool,

    /// Configuration file (defaults to <gardenHome>/gardenctl-v2.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Args {
    pub fn overrides(&self) -> TargetOverrides {
        TargetOverrides {
            garden: self.garden.clone(),
            project: self.project.clone(),
            seed: self.seed.clone(),
            shoot: self.shoot.clone(),
            control_plane: self.control_plane,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Set, unset or show the target of this session
    Target(TargetArgs),

    /// Print the client config of the effective target as YAML
    Kubeconfig {
        /// Write the config into the session directory and print its path instead
        #[arg(long)]
        write: bool,
    },

    /// Print names available for targeting, one per line
    CompletionNames {
        #[arg(value_enum)]
        kind: NameKind,
    },
}

#[derive(ClapArgs, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct TargetArgs {
    #[command(subcommand)]
    pub command: Option<TargetCommand>,

    /// Free-form value resolved through the garden patterns
    pub pattern: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// Target a garden by name or alias
    Garden { name: String },

    /// Target a project of the targeted garden
    Project {
        name: String,

        /// Target the project even if it has no namespace yet
        #[arg(long)]
        allow_unready: bool,
    },

    /// Target a seed of the targeted garden
    Seed { name: String },

    /// Target a shoot within the targeted project, seed or garden
    Shoot { name: String },

    /// Target the control plane of the targeted shoot
    ControlPlane,

    /// Unset a level of the target and everything below it
    Unset {
        #[arg(value_enum)]
        kind: UnsetKind,
    },

    /// Show the effective target
    View {
        #[arg(short, long, value_enum, default_value = "yaml")]
        output: OutputFormat,
    },

    /// Show previously targeted values
    History,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsetKind {
    Garden,
    Project,
    Seed,
    Shoot,
    ControlPlane,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameKind {
    Garden,
    Project,
    Seed,
    Shoot,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("gctl").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_target_subcommands() {
        let args = parse(&["target", "project", "p1", "--allow-unready"]);
        assert_matches!(
            args.command,
            Command::Target(TargetArgs {
                command: Some(TargetCommand::Project { name, allow_unready: true }),
                pattern: None,
            }) if name == "p1"
        );

        let args = parse(&["target", "unset", "control-plane"]);
        assert_matches!(
            args.command,
            Command::Target(TargetArgs {
                command: Some(TargetCommand::Unset { kind: UnsetKind::ControlPlane }),
                ..
            })
        );
    }

    #[test]
    fn test_target_pattern() {
        let args = parse(&["target", "shoot--p1--s1"]);
        assert_matches!(
            args.command,
            Command::Target(TargetArgs { command: None, pattern: Some(p) }) if p == "shoot--p1--s1"
        );
    }

    #[test]
    fn test_global_overrides() {
        let args = parse(&["kubeconfig", "--garden", "g", "--shoot", "s", "--control-plane"]);
        let overrides = args.overrides();
        assert_eq!(overrides.garden.as_deref(), Some("g"));
        assert_eq!(overrides.shoot.as_deref(), Some("s"));
        assert!(overrides.control_plane);
        assert!(overrides.project.is_none());
    }

    #[test]
    fn test_view_output_format() {
        let args = parse(&["target", "view", "-o", "json"]);
        assert_matches!(
            args.command,
            Command::Target(TargetArgs {
                command: Some(TargetCommand::View { output: OutputFormat::Json }),
                ..
            })
        );
    }
}
