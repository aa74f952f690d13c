//! CLI argument definitions.

use clap::Parser;
use std::path::PathBuf;

/// Mount running Neovim sessions as a filesystem.
///
/// Sessions appear under `/clients/<id>/`; writing an RPC address to
/// `/clients/new` registers another one.
#[derive(Parser, Debug)]
#[command(name = "nvimfs")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Existing directory to mount on
    pub mountpoint: PathBuf,

    /// RPC address of a session to register at startup
    #[arg(short, long, env = "NVIM_LISTEN_ADDRESS")]
    pub address: Option<String>,

    /// TOML file with mount settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,
}
