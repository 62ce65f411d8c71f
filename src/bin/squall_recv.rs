//! Thin CLI front end for the receiver side. Opens a fixed-name sink and
//! writes the delivered byte stream to it; this binary is a harness for
//! the library, not a polished product.

use std::fs::File;
use std::net::UdpSocket;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use squall::config::Config;
use squall::net::ReceiverChannel;

#[derive(Parser)]
#[command(about = "Receive a file over the squall reliable transport")]
struct Args {
    /// Output file to write the received bytes to.
    out: PathBuf,

    /// Port to listen on.
    #[arg(long)]
    listen: Option<u16>,

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

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).context("loading config file")?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.server_port = listen;
    }

    let socket = UdpSocket::bind(("0.0.0.0", config.server_port))
        .with_context(|| format!("binding port {}", config.server_port))?;

    let channel = ReceiverChannel::accept(socket, config).context("accepting connection")?;

    let file = File::create(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let stats = channel.receive_to(file).context("receiving file")?;

    if args.stats_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        eprintln!("received file in {} ms", stats.elapsed_ms);
    }

    Ok(())
}
