use std::sync::Arc;

use anyhow::{Context, Result};
use casefetch_core::{AuthenticatedClient, CasePortal, SessionManager};
use colored::Colorize;

use crate::cli::DownloadArgs;
use crate::config::Settings;
use crate::output::print_success;

pub async fn download(
    session: Arc<SessionManager>,
    settings: &Settings,
    args: &DownloadArgs,
) -> Result<()> {
    let client = AuthenticatedClient::new(session, &settings.portal)
        .context("Failed to build HTTP client")?;
    let portal = CasePortal::new(client, &settings.portal);

    let bytes = portal
        .download_attachment(&args.href)
        .await
        .with_context(|| format!("Failed to download {}", args.href))?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tracing::debug!(bytes = bytes.len(), out = %args.out.display(), "Writing attachment");
    tokio::fs::write(&args.out, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    print_success(&format!(
        "Saved {} bytes to {}",
        bytes.len(),
        args.out.display().to_string().cyan()
    ));
    Ok(())
}
