mod cli;
mod commands;
mod config;
mod observability;
mod output;

use std::sync::Arc;

use anyhow::Result;
use casefetch_core::{CommandRefresher, FileCredentialStore, SessionManager};
use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands, OutputFormat};
use config::Settings;
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // EMAIL / PASSWORD for the login helper may live in a .env file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);
    let profile = &cli.profile;
    tracing::debug!(profile = %profile, "Using configuration profile");

    match &cli.command {
        Commands::Resolve(args) => {
            let settings = config::resolve_settings(&cli)?;
            let format = output_format(&cli, profile)?;
            let session = make_session(&settings);
            commands::resolve::resolve(session, &settings, args, format).await?;
        }
        Commands::Download(args) => {
            let settings = config::resolve_settings(&cli)?;
            let session = make_session(&settings);
            commands::download::download(session, &settings, args).await?;
        }
        Commands::Login => {
            let settings = config::resolve_settings(&cli)?;
            commands::session::login(&make_session(&settings)).await?;
        }
        Commands::Logout => {
            let settings = config::resolve_settings(&cli)?;
            commands::session::logout(&make_session(&settings), profile).await?;
        }
        Commands::Whoami => {
            let settings = config::resolve_settings(&cli)?;
            commands::session::whoami(&make_session(&settings), &settings, profile).await?;
        }
        Commands::Config(args) => match &args.command {
            cli::ConfigCommands::Show => {
                let cfg = config::load_profile(profile)?;
                let portal = cfg.portal_config();
                println!("{}: {}", "Profile".cyan(), profile);
                println!("{}: {}", "Search URL".cyan(), portal.search_url);
                println!(
                    "{}: {}",
                    "Login command".cyan(),
                    cfg.login_command
                        .as_deref()
                        .unwrap_or(config::DEFAULT_LOGIN_COMMAND)
                );
                println!(
                    "{}: {}s",
                    "Request timeout".cyan(),
                    portal.request_timeout.as_secs()
                );
                println!("{}: {}s", "Login timeout".cyan(), cfg.login_timeout().as_secs());
                println!("{}: {}", "Fan-out limit".cyan(), portal.fan_out_limit);
                println!("{}: {}", "Max pages".cyan(), portal.max_pages);
                println!(
                    "{}: {}",
                    "Format".cyan(),
                    cfg.format.as_deref().unwrap_or("json")
                );
            }
            cli::ConfigCommands::Set(set_args) => {
                let mut cfg = config::load_profile(profile)?;
                cfg.set(&set_args.key, &set_args.value)?;
                config::save_profile(profile, &cfg)?;
                output::print_success(&format!("Set {} = {}", set_args.key, set_args.value));
            }
        },
    }

    Ok(())
}

fn make_session(settings: &Settings) -> Arc<SessionManager> {
    let store = FileCredentialStore::new(&settings.credentials_path);
    let refresher =
        CommandRefresher::new(&settings.login_command).with_timeout(settings.login_timeout);
    Arc::new(SessionManager::new(Arc::new(store), Arc::new(refresher)))
}

fn output_format(cli: &Cli, profile: &str) -> Result<OutputFormat> {
    if let Some(format) = cli.format {
        return Ok(format);
    }
    match config::load_profile(profile)?.format.as_deref() {
        None | Some("json") => Ok(OutputFormat::Json),
        Some("table") => Ok(OutputFormat::Table),
        Some(other) => anyhow::bail!("Unknown output format in config: {other}"),
    }
}
