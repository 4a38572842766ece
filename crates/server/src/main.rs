use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use list_core::{Controller, ShutdownHandle};
use server::{
    config::load_settings,
    netsrv::{serve, ShutdownReason},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "listd", about = "Serves a shared playout list over TCP")]
struct Args {
    /// TOML settings file; defaults to ./listd.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address to listen on, overriding the settings file.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    let filter = EnvFilter::try_new(&settings.log_filter)
        .with_context(|| format!("invalid log filter '{}'", settings.log_filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let list = settings.build_list();
    info!(items = list.len(), auto_mode = %list.auto_mode(), "starting list controller");
    let (controller, root) = Controller::new(list, settings.controller_config());
    let controller = tokio::spawn(controller.run());
    tokio::spawn(watch_ctrl_c(root.shutdown_handle()));

    let report = serve(&settings.bind_addr, root, settings.server_options())
        .await
        .with_context(|| format!("failed to serve on {}", settings.bind_addr))?;

    let list = controller.await.context("controller task failed")?;
    info!(
        connections_hung_up = report.connections_hung_up,
        live_tasks = report.live_tasks,
        selection = ?list.selection(),
        "shut down"
    );
    match report.reason {
        ShutdownReason::ControllerShutdown => Ok(()),
        ShutdownReason::AcceptFailed(reason) => {
            anyhow::bail!("listener failed: {reason}")
        }
    }
}

async fn watch_ctrl_c(handle: ShutdownHandle) {
    tokio::select! {
        _ = handle.wait() => {}
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("interrupt received; shutting down"),
                Err(error) => error!(%error, "couldn't listen for interrupt; shutting down"),
            }
            handle.shutdown();
        }
    }
}
