//! nvimfs entry point.
//!
//! # Usage
//!
//! ```bash
//! nvimfs /mnt/nvim --address /tmp/nvim.sock
//! echo /tmp/other.sock > /mnt/nvim/clients/new
//! echo 'echo "hi"' > /mnt/nvim/clients/0/cmd
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use fuse3::MountOptions;
use fuse3::path::Session;
use nvimfs_bridge::{NvimConnector, RpcBridge};
use nvimfs_core::FsConfig;
use nvimfs_server::cli::Cli;
use nvimfs_server::{Engine, NvimFs};
use nvimfs_vfs::Owner;
use std::os::unix::fs::MetadataExt;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => FsConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => FsConfig::default(),
    };

    let metadata = std::fs::metadata(&cli.mountpoint)
        .with_context(|| format!("mountpoint {} is not accessible", cli.mountpoint.display()))?;
    anyhow::ensure!(
        metadata.is_dir(),
        "mountpoint {} is not a directory",
        cli.mountpoint.display()
    );
    let owner = Owner {
        uid: metadata.uid(),
        gid: metadata.gid(),
    };

    let bridge = RpcBridge::new(Arc::new(NvimConnector::new()));
    let engine = Arc::new(Engine::new(bridge, owner).context("building the namespace")?);
    if let Some(address) = cli.address.as_deref().filter(|a| !a.trim().is_empty()) {
        engine.register_initial(address).await;
    }

    let mut options = MountOptions::default();
    options
        .fs_name(config.fs_name.clone())
        .allow_other(config.allow_other)
        .default_permissions(config.default_permissions)
        .uid(owner.uid)
        .gid(owner.gid);

    tracing::info!(
        mountpoint = %cli.mountpoint.display(),
        version = env!("CARGO_PKG_VERSION"),
        "mounting nvimfs"
    );
    let handle = Session::new(options)
        .mount_with_unprivileged(NvimFs::new(engine, &config), &cli.mountpoint)
        .await
        .with_context(|| format!("mounting on {}", cli.mountpoint.display()))?;
    handle.await.context("filesystem session ended with an error")?;

    tracing::info!("unmounted");
    Ok(())
}

/// Initializes logging to stderr.
///
/// `--verbose` forces the debug level, otherwise `RUST_LOG` applies with
/// `info` as the default.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
