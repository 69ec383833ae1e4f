use std::sync::Arc;

use anyhow::{Context, Result};
use casefetch_core::{
    AuthenticatedClient, CasePortal, PatientResolver, PrintableOrderFormParser, SessionManager,
};

use crate::cli::{OutputFormat, ResolveArgs};
use crate::config::Settings;
use crate::output::print_resolution;

pub async fn resolve(
    session: Arc<SessionManager>,
    settings: &Settings,
    args: &ResolveArgs,
    format: OutputFormat,
) -> Result<()> {
    let client = AuthenticatedClient::new(session, &settings.portal)
        .context("Failed to build HTTP client")?;
    let portal = CasePortal::new(client, &settings.portal);
    let parser = PrintableOrderFormParser::new()?;
    let resolver = PatientResolver::new(portal, Arc::new(parser), &settings.portal);

    if args.name.trim().is_empty() {
        tracing::info!(birthdate = %args.birthdate, "No name given, matching by birthdate");
    }

    let resolution = resolver
        .resolve(&args.name, &args.birthdate)
        .await
        .inspect_err(|e| tracing::debug!(stage = e.stage(), "Resolution failed"))
        .with_context(|| format!("Could not resolve patient \"{}\"", args.name))?;

    print_resolution(&resolution, format)
}
