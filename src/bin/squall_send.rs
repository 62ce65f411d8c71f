//! Thin CLI front end for the sender side. Reads a file fully into memory,
//! connects, and drives the transfer; this binary is a harness for the
//! library, not a polished product (file I/O, process-level logging setup,
//! and argument parsing all live outside the transport core).

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use squall::config::Config;
use squall::net::ConnectedChannel;

#[derive(Parser)]
#[command(about = "Send a file over the squall reliable transport")]
struct Args {
    /// File to send.
    file: PathBuf,

    /// Receiver address, e.g. 127.0.0.1:8888.
    #[arg(long)]
    addr: String,

    /// Target an impairment simulator on this port instead of `--addr`'s
    /// port; does not change the protocol, only the destination.
    #[arg(long)]
    router: Option<u16>,

    /// Optional TOML config file overriding the default constants.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the completion statistics as JSON on stdout.
    #[arg(long)]
    stats_json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path).context("loading config file")?,
        None => Config::default(),
    };

    let mut addr: SocketAddr = args
        .addr
        .to_socket_addrs()
        .context("resolving --addr")?
        .next()
        .context("--addr resolved to no addresses")?;
    if let Some(router_port) = args.router {
        addr.set_port(router_port);
    }

    let data = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let channel = ConnectedChannel::connect(addr, config).context("establishing connection")?;
    let stats = channel.send_bytes(&data).context("sending file")?;

    if args.stats_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        eprintln!(
            "sent {} bytes in {} ms",
            data.len(),
            stats.elapsed_ms
        );
    }

    Ok(())
}
