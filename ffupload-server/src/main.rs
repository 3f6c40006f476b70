//! ffupload dev server

use std::collections::HashSet;
use std::net::SocketAddr;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use ffupload_server::{DevConfig, DevServer, DEFAULT_PART_SIZE};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = Command::new("ffupload-server")
        .version("0.1.0")
        .about("In-memory upload backend and multipart object store for development")
        .arg(
            Arg::new("bind")
                .long("bind")
                .value_name("ADDR")
                .help("Bind address")
                .default_value("127.0.0.1:8080")
                .value_parser(value_parser!(SocketAddr)),
        )
        .arg(
            Arg::new("part-size")
                .long("part-size")
                .value_name("BYTES")
                .help("Size of every part except the last [default: 5 MiB]")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("fail-part")
                .long("fail-part")
                .value_name("N")
                .help("Answer PUTs for this part number with a 500")
                .action(ArgAction::Append)
                .value_parser(value_parser!(u32)),
        )
        .get_matches();

    let bind_addr = *matches
        .get_one::<SocketAddr>("bind")
        .context("missing bind address")?;
    let part_size = matches
        .get_one::<u64>("part-size")
        .copied()
        .unwrap_or(DEFAULT_PART_SIZE);
    let fail_parts: HashSet<u32> = matches
        .get_many::<u32>("fail-part")
        .into_iter()
        .flatten()
        .copied()
        .collect();

    info!("Starting ffupload dev server");
    info!("Part size: {} bytes", part_size);
    if !fail_parts.is_empty() {
        info!("Failing parts: {:?}", fail_parts);
    }

    let server = DevServer::bind(bind_addr, DevConfig { part_size, fail_parts })
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Backend base URL: {}", server.base_url());

    server.serve().await?;
    Ok(())
}
