// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
mod output;

use anyhow::Result;
use clap::Parser;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

use cli::Args;
use gctl::config::{self, Config, ENV_LINK_KUBECONFIG};
use gctl::context::OpContext;
use gctl::garden::GardenClientPool;
use gctl::session::Session;
use gctl::target::{TargetHistory, TargetManager};

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate daily or at 10MB, keeping 5 files
    let log_path = log_dir.join("gctl.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let filter = if verbose { "gctl=debug" } else { "gctl=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    // Synchronous writer: the process exits without unwinding the runtime
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file_appender))
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run(args));
    // A confirmation prompt may still be blocked on stdin after Ctrl-C
    runtime.shutdown_background();
    std::process::exit(exit_code(result));
}

async fn run(args: Args) -> Result<()> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let mut config = Config::load(&config_path)?;
    config.apply_link_override(std::env::var(ENV_LINK_KUBECONFIG).ok().as_deref())?;
    let config = Arc::new(config);

    let session = Session::from_env()?;
    session.ensure_dir()?;
    tracing::debug!(session = %session.id(), dir = %session.dir().display(), "using session");

    let clients = Arc::new(GardenClientPool::new(Arc::clone(&config)));
    let history = TargetHistory::new(&config::base_dir()?, "gctl");
    let manager = TargetManager::new(Arc::clone(&config), session.dir(), clients)
        .with_overrides(args.overrides())
        .with_history(history);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupted");
                cancel.cancel();
            }
        }
    });

    let ctx = OpContext::new(cancel);
    let mut stdout = std::io::stdout();
    cli::run(&args.command, &manager, &ctx, &mut stdout)
        .await
        .or_else(ignore_control_signal)
}

/// Aborted and cancelled operations end quietly
fn ignore_control_signal(e: anyhow::Error) -> Result<()> {
    match e.downcast_ref::<gctl::Error>() {
        Some(err) if err.is_control_signal() => {
            tracing::info!(reason = %err, "operation stopped");
            Ok(())
        }
        _ => Err(e),
    }
}

fn exit_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}
