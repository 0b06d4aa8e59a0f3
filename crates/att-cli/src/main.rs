use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use att_core::{Attendance, ReferenceZone, UserId};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use att_cli::commands::{alias, export, history, init, mark, report, status, totp};
use att_cli::{Cli, Commands, Config, TotpAction, default_config_file};

/// Load config and resolve the reference zone.
fn load_config(config_path: Option<&Path>) -> Result<(Config, ReferenceZone)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let zone = config.zone().context("invalid timezone in configuration")?;
    Ok((config, zone))
}

/// Open the database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<att_db::Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    att_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let now = Utc::now();
    let mut stdout = io::stdout().lock();
    let config_path = cli.config.as_deref();

    match &cli.command {
        Some(Commands::Mark {
            user,
            first_name,
            last_name,
            username,
            code,
        }) => {
            let (config, zone) = load_config(config_path)?;
            let secret = Arc::new(config.secret()?);
            let engine = Attendance::new(open_database(&config)?, secret, zone);
            let submitter = mark::Submitter {
                user: *user,
                first_name,
                last_name: last_name.as_deref(),
                username: username.as_deref(),
            };
            mark::run(&mut stdout, &engine, &submitter, code, now)?;
        }
        Some(Commands::Status { user, json }) => {
            let (config, zone) = load_config(config_path)?;
            let db = open_database(&config)?;
            status::run(&mut stdout, &db, zone, UserId::new(*user), *json, now)?;
        }
        Some(Commands::Report { date, json }) => {
            let (config, zone) = load_config(config_path)?;
            let db = open_database(&config)?;
            report::run(&mut stdout, &db, zone, date.as_deref(), *json, now)?;
        }
        Some(Commands::History { user, days, json }) => {
            let (config, zone) = load_config(config_path)?;
            let db = open_database(&config)?;
            history::run(
                &mut stdout,
                &db,
                zone,
                UserId::new(*user),
                *days,
                *json,
                now,
            )?;
        }
        Some(Commands::Export {
            start,
            end,
            output,
            password,
        }) => {
            let (config, zone) = load_config(config_path)?;
            let db = open_database(&config)?;
            let request = export::ExportRequest {
                start,
                end,
                output: output.as_deref(),
                password: password.as_deref(),
            };
            export::run(
                &mut stdout,
                &db,
                zone,
                &request,
                config.admin_password.as_deref(),
                &config.export_dir,
            )?;
        }
        Some(Commands::Alias { user, first, last }) => {
            let (config, _zone) = load_config(config_path)?;
            let db = open_database(&config)?;
            alias::run(&mut stdout, &db, UserId::new(*user), first, last)?;
        }
        Some(Commands::Totp(action)) => match action {
            TotpAction::New { issuer, account } => {
                // Provisioning doesn't need config
                totp::new(&mut stdout, issuer, account, now)?;
            }
            TotpAction::Show => {
                let (config, _zone) = load_config(config_path)?;
                totp::show(&mut stdout, &config.secret()?, now)?;
            }
        },
        Some(Commands::Init { force }) => {
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => default_config_file().context("could not determine config directory")?,
            };
            init::run(&mut stdout, &path, *force)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
