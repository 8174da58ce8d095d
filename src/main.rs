use crate::app_config::AppConfig;
use crate::chirpstack::http_client::HttpClientFactory;
use crate::chirpstack::types::{DeviceUpdate, ListDevicesQuery};
use crate::domain::{BatchResult, DuplicatePolicy, ProgressEvent, ResultKind};
use crate::normalizer::Defaults;
use crate::progress_listener::progress_listener;
use crate::registration::{BatchRequest, Registrar};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{info, warn};

mod app_config;
mod chirpstack;
mod domain;
mod extensions;
mod normalizer;
mod progress_listener;
mod registration;
mod report;
mod sse;
mod validation;

#[derive(Parser, Debug)]
#[command(name = "chirp-loader")]
#[command(about = "Bulk registration of LoRaWAN devices in ChirpStack")]
#[command(version)]
struct Args {
    /// Configuration file without extension, `<name>_local` and `CHIRP_*` variables are layered on top
    #[arg(short, long, default_value = "config")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server is reachable and accepts the API token
    Check,
    /// Register the devices of a JSON row export
    Register {
        input: PathBuf,
        /// What to do with devices that already exist, overrides the configuration
        #[arg(short, long)]
        policy: Option<DuplicatePolicy>,
        #[arg(short, long)]
        workers: Option<usize>,
        /// Additional tag for every device, overrides configured custom tags
        #[arg(short, long, value_parser = parse_tag)]
        tag: Vec<(String, String)>,
    },
    /// Delete devices by DevEUI
    Delete {
        #[arg(required = true)]
        dev_euis: Vec<String>,
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// List the devices of an application
    List {
        #[arg(short, long)]
        application_id: String,
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long, default_value_t = 100)]
        limit: u32,
        #[arg(short, long, default_value_t = 0)]
        offset: u32,
    },
    /// List the device profiles of the tenant with their LoRaWAN version
    Profiles,
    /// Merge tags into an existing device
    Tag {
        dev_eui: String,
        #[arg(required = true, value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.trim().to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;
    tracing_subscriber::fmt()
        .with_max_level(config.core().log_level())
        .with_writer(std::io::stderr)
        .init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("✅ Loaded configuration");

    let factory = Arc::new(HttpClientFactory::new(config.chirpstack().clone()));
    let registrar = Registrar::new(config.chirpstack().clone(), factory, config.core().max_workers());

    match args.command {
        Command::Check => {
            let message = registrar.check_connection().await?;
            println!("{}", message);
        }
        Command::Register {
            input,
            policy,
            workers,
            tag,
        } => {
            let import = config.import();
            let rows = normalizer::load_rows(&input).await?;
            let defaults = Defaults {
                application_id: import.default_application_id(),
                device_profile_id: import.default_device_profile_id(),
            };
            let records = normalizer::normalize(&rows, import.mapping(), &defaults)?;

            let mut custom_tags = import.custom_tags().clone();
            custom_tags.extend(tag);
            let request = BatchRequest {
                records,
                policy: policy.unwrap_or(import.duplicate_policy()),
                custom_tags,
                concurrency_hint: workers,
            };

            let (tx, rx) = mpsc::channel::<ProgressEvent>(config.core().progress_buffer_size());
            let listener = task::spawn(progress_listener(rx, tokio::io::stdout()));
            let result = registrar.register_batch(request, tx).await?;
            listener.await?;

            finish_batch(&result, Path::new(import.report_directory()), "registration").await?;
        }
        Command::Delete { dev_euis, workers } => {
            let (tx, rx) = mpsc::channel::<ProgressEvent>(config.core().progress_buffer_size());
            let listener = task::spawn(progress_listener(rx, tokio::io::stdout()));
            let result = registrar.delete_batch(dev_euis, workers, tx).await?;
            listener.await?;

            finish_batch(&result, Path::new(config.import().report_directory()), "deletion").await?;
        }
        Command::List {
            application_id,
            search,
            limit,
            offset,
        } => {
            let application_id = validation::validate_uuid(&application_id, "Application ID")?.to_string();
            let mut client = registrar.connect().await?;
            let query = ListDevicesQuery {
                application_id,
                limit,
                offset,
                search,
            };
            let result = client.list_devices(&query).await;
            client.close().await;

            let device_list = result?;
            for device in &device_list.devices {
                println!("{}\t{}\t{}", device.dev_eui, device.name, device.device_profile_name);
            }
            println!("{} of {} devices", device_list.devices.len(), device_list.total_count);
        }
        Command::Profiles => {
            let mut client = registrar.connect().await?;
            let result = client.device_profiles(config.chirpstack().tenant_id()).await;
            client.close().await;

            for profile in result? {
                let version = profile.mac_version.0.map_or_else(|| "UNKNOWN".to_string(), |version| version.to_string());
                println!("{}\t{}\tLoRaWAN {}", profile.id, profile.name, version);
            }
        }
        Command::Tag { dev_eui, tags } => {
            let dev_eui = validation::validate_dev_eui(&dev_eui)?;
            let update = DeviceUpdate {
                tags: tags.into_iter().collect::<HashMap<_, _>>(),
                ..DeviceUpdate::default()
            };

            let mut client = registrar.connect().await?;
            let result = client.update_device(&dev_eui, &update).await;
            client.close().await;

            result?;
            println!("Updated tags of {}", dev_eui);
        }
    }

    Ok(())
}

async fn finish_batch(result: &BatchResult, report_directory: &Path, prefix: &str) -> Result<(), report::ReportError> {
    for warning in &result.warnings {
        warn!("⚠️ {}", warning);
    }
    for device in &result.failed {
        warn!(dev_eui = device.dev_eui.as_str(), "{}: {}", device.name, device.outcome.reason().unwrap_or_default());
    }

    let path = report::write_report(result, report_directory, prefix).await?;
    info!(
        successful = result.successful.len(),
        warnings = result.count(ResultKind::Warning),
        skipped = result.count(ResultKind::Skipped),
        failed = result.failed.len(),
        report = %path.display(),
        "🔥 {} finished",
        prefix
    );
    Ok(())
}
