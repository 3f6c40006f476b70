//! ffupload command line client

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, Command};
use ffupload_client::{ClientConfig, UploadEvent, UploadFile, UploadResult, Uploader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("ffupload")
        .version("0.1.0")
        .about("Upload a file to a form backend through multipart object storage")
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .value_name("URL")
                .help("Base URL of the backend upload endpoints")
                .required_unless_present("config"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("JSON configuration file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("field-id")
                .long("field-id")
                .value_name("ID")
                .help("Form field the upload belongs to")
                .required(true),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .value_name("N")
                .help("Maximum part uploads in flight, 0 for unbounded")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("header")
                .long("header")
                .short('H')
                .value_name("NAME:VALUE")
                .help("Extra header for backend calls")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("no-abort")
                .long("no-abort")
                .help("Leave failed multipart uploads open")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("File to upload")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ClientConfig::new(String::new()),
    };
    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config.base_url = base_url.clone();
    }
    if let Some(limit) = matches.get_one::<usize>("concurrency") {
        config.max_concurrent_parts = *limit;
    }
    if matches.get_flag("no-abort") {
        config.abort_on_failure = false;
    }
    for header in matches.get_many::<String>("header").into_iter().flatten() {
        let Some((name, value)) = header.split_once(':') else {
            bail!("Invalid header '{}', expected NAME:VALUE", header);
        };
        config = config.with_header(name.trim(), value.trim());
    }

    let field_id = matches
        .get_one::<String>("field-id")
        .context("missing --field-id")?
        .clone();
    let path = matches
        .get_one::<PathBuf>("file")
        .context("missing FILE")?
        .clone();

    let file = UploadFile::open(&path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let uploader = Uploader::new(config)?.with_events(events_tx);

    let progress = tokio::spawn(async move {
        let mut total = 0u64;
        let mut sent = 0u64;
        while let Some(event) = events_rx.recv().await {
            match event {
                UploadEvent::Initialized { object_key, parts, total_bytes } => {
                    total = total_bytes;
                    info!("Uploading {} bytes to {} in {} parts", total_bytes, object_key, parts);
                }
                UploadEvent::PartUploaded { part_number, bytes } => {
                    sent += bytes;
                    info!("Part {} done ({}/{} bytes)", part_number, sent, total);
                }
                UploadEvent::Completed => info!("Object assembled"),
                UploadEvent::Finalized { value } => info!("Field value: {}", value),
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    info!("Uploading {} for field {}", path.display(), field_id);
    let outcome = uploader.upload_file_with_cancel(&file, &field_id, &cancel).await;

    drop(uploader);
    let _ = progress.await;

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            println!("{}", serde_json::to_string_pretty(&UploadResult::errored())?);
            Err(anyhow::Error::new(e).context(format!("Failed to upload {}", path.display())))
        }
    }
}
