// Network Profiles - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # nmprofile
//!
//! Command-line front end: activate, add, commit and show NetworkManager
//! connection profiles.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use network_profiles::connection::{ConnectionProfile, Context};
use network_profiles::dbus::NmDbusClient;
use network_profiles::models::{AppConfig, Error, Profile, Result};
use network_profiles::service::{DeviceRef, NetworkService};
use network_profiles::{APP_NAME, VERSION};

/// Print version information and exit.
fn print_version() {
    println!("{} {}", APP_NAME, VERSION);
    println!("Copyright (C) 2026 Christos A. Daggas");
    println!("License: MIT");
}

/// Print help information and exit.
fn print_help() {
    println!(
        "Usage: {} [OPTIONS] <COMMAND>",
        env::args().next().unwrap_or_else(|| "nmprofile".to_string())
    );
    println!();
    println!("Manage NetworkManager connection profiles.");
    println!();
    println!("Commands:");
    println!("  activate [--device IFACE] [--id NAME]  Activate a connection profile");
    println!("  add --file PROFILE.toml [--memory]     Add a profile from a TOML file");
    println!("  commit --device IFACE [--memory]       Re-commit the device's active profile");
    println!("  show --id NAME                         Print a stored profile as TOML");
    println!();
    println!("Options:");
    println!("  -h, --help           Show this help message and exit");
    println!("  -v, --version        Show version information and exit");
    println!("  -d, --debug          Enable debug logging");
    println!("  -c, --config PATH    Read configuration from PATH");
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG         Set log level (trace, debug, info, warn, error)");
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Activate {
        device: Option<String>,
        id: Option<String>,
    },
    Add {
        file: PathBuf,
        memory: bool,
    },
    Commit {
        device: String,
        memory: bool,
    },
    Show {
        id: String,
    },
}

#[derive(Debug, Default)]
struct Options {
    debug: bool,
    config: Option<PathBuf>,
}

enum Parsed {
    Run(Options, Command),
    Help,
    Version,
}

fn value_of(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
) -> std::result::Result<String, String> {
    args.next()
        .ok_or_else(|| format!("Option '{}' requires a value", flag))
}

fn parse_args(args: Vec<String>) -> std::result::Result<Parsed, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    let mut command = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Parsed::Help),
            "-v" | "--version" => return Ok(Parsed::Version),
            "-d" | "--debug" => options.debug = true,
            "-c" | "--config" => options.config = Some(value_of(&mut args, &arg)?.into()),
            _ if arg.starts_with('-') => return Err(format!("Unknown option: {}", arg)),
            _ => {
                command = Some(arg);
                break;
            }
        }
    }

    let command = command.ok_or_else(|| "Missing command".to_string())?;
    let mut device = None;
    let mut id = None;
    let mut file = None;
    let mut memory = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--device" => device = Some(value_of(&mut args, &arg)?),
            "--id" => id = Some(value_of(&mut args, &arg)?),
            "--file" => file = Some(PathBuf::from(value_of(&mut args, &arg)?)),
            "--memory" => memory = true,
            "-d" | "--debug" => options.debug = true,
            _ => return Err(format!("Unknown argument for '{}': {}", command, arg)),
        }
    }

    let command = match command.as_str() {
        "activate" => Command::Activate { device, id },
        "add" => Command::Add {
            file: file.ok_or_else(|| "'add' requires --file".to_string())?,
            memory,
        },
        "commit" => Command::Commit {
            device: device.ok_or_else(|| "'commit' requires --device".to_string())?,
            memory,
        },
        "show" => Command::Show {
            id: id.ok_or_else(|| "'show' requires --id".to_string())?,
        },
        other => return Err(format!("Unknown command: {}", other)),
    };
    Ok(Parsed::Run(options, command))
}

async fn find_device(service: &Arc<dyn NetworkService>, iface: &str) -> Result<DeviceRef> {
    service
        .device_by_iface(iface)
        .await?
        .ok_or_else(|| Error::DeviceNotFound(iface.to_string()))
}

async fn execute(config: &AppConfig, command: Command) -> Result<()> {
    let service: Arc<dyn NetworkService> = Arc::new(NmDbusClient::connect().await?);
    let ctx = Context::from_config(Arc::clone(&service), &config.activation);
    let timeout = config.activation.timeout();

    match command {
        Command::Activate { device, id } => {
            let device = match device {
                Some(iface) => Some(find_device(&service, &iface).await?),
                None => None,
            };
            ConnectionProfile::new(&ctx).activate(device, id);
            ctx.run(timeout).await?;
            tracing::info!("Connection activated");
        }
        Command::Add { file, memory } => {
            let content = std::fs::read_to_string(&file)?;
            let profile = Profile::from_toml(&content)?;
            let persist = config.activation.persist && !memory;
            ConnectionProfile::with_profile(&ctx, profile).add(persist);
            ctx.run(timeout).await?;
            tracing::info!("Connection added from {:?}", file);
        }
        Command::Commit { device, memory } => {
            let dev = find_device(&service, &device).await?;
            let profile = ConnectionProfile::new(&ctx);
            profile.import_by_device(&dev).await?;
            if profile.profile().is_none() {
                return Err(Error::ProfileNotFound(format!("no active profile on {}", device)));
            }
            profile.commit(config.activation.persist && !memory, Some(dev));
            ctx.run(timeout).await?;
            tracing::info!("Connection on {} committed", device);
        }
        Command::Show { id } => {
            let profile = service
                .get_connection_by_id(&id)
                .await?
                .ok_or(Error::ProfileNotFound(id))?;
            print!("{}", profile.to_toml()?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let (options, command) = match parse_args(env::args().skip(1).collect()) {
        Ok(Parsed::Run(options, command)) => (options, command),
        Ok(Parsed::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Ok(Parsed::Version) => {
            print_version();
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("Try '--help' for more information.");
            return ExitCode::FAILURE;
        }
    };

    let config = match &options.config {
        Some(path) => match AppConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::load(),
    };

    // Initialize logging with appropriate level
    let log_level = if options.debug {
        tracing::Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .init();

    tracing::debug!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(&config, command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
