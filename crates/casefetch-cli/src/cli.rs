use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "casefetch")]
#[command(about = "Find a patient's case files on the lab portal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Case-search endpoint (overrides config and CASEFETCH_SEARCH_URL env var)
    #[arg(long, global = true, env = "CASEFETCH_SEARCH_URL")]
    pub search_url: Option<String>,

    /// Login helper that prints a fresh session token (overrides config)
    #[arg(long, global = true, env = "CASEFETCH_LOGIN_COMMAND")]
    pub login_command: Option<String>,

    /// Config profile name
    #[arg(short, long, global = true, env = "CASEFETCH_PROFILE", default_value = "default")]
    pub profile: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find a patient's case by name, falling back to birthdate
    Resolve(ResolveArgs),
    /// Download an attachment
    Download(DownloadArgs),
    /// Log in to the portal now (replaces the stored session)
    Login,
    /// Logout (remove stored session)
    Logout,
    /// Show current session info
    Whoami,
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct ResolveArgs {
    /// Patient name as entered on the portal (empty skips the name search)
    #[arg(short, long, default_value = "")]
    pub name: String,
    /// Birthdate exactly as printed on order forms (e.g. 5/21/1992)
    #[arg(short, long)]
    pub birthdate: String,
}

#[derive(clap::Args)]
pub struct DownloadArgs {
    /// Attachment href (from a resolve result)
    pub href: String,
    /// Output file
    #[arg(short, long)]
    pub out: PathBuf,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current config
    Show,
    /// Set config value
    Set(ConfigSetArgs),
}

#[derive(clap::Args)]
pub struct ConfigSetArgs {
    /// Key to set (search_url, login_command, request_timeout_secs,
    /// login_timeout_secs, fan_out_limit, max_pages, format)
    pub key: String,
    /// Value
    pub value: String,
}
