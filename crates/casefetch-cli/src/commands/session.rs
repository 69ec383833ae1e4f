use anyhow::{Context, Result};
use casefetch_core::{Credential, SessionManager};
use colored::Colorize;

use crate::config::Settings;
use crate::output::{print_error, print_success};

pub async fn login(session: &SessionManager) -> Result<()> {
    println!("Logging in to the portal...");
    let token = session
        .force_refresh()
        .await
        .context("Portal login failed")?;
    print_success(&format!(
        "Logged in (token: {})",
        Credential::new(token).preview().cyan()
    ));
    Ok(())
}

pub async fn logout(session: &SessionManager, profile: &str) -> Result<()> {
    if session.sign_out().await? {
        print_success("Logged out (session removed)");
    } else {
        println!("No session found for profile \"{profile}\"");
    }
    Ok(())
}

pub async fn whoami(session: &SessionManager, settings: &Settings, profile: &str) -> Result<()> {
    println!("{}: {}", "Profile".cyan(), profile);
    println!("{}: {}", "Search".cyan(), settings.portal.search_url);
    println!("{}: {}", "Login".cyan(), settings.login_command);
    match session.current().await {
        Some(credential) => {
            println!("{}: Bearer (token: {})", "Session".cyan(), credential.preview());
        }
        None => {
            print_error(&format!("Not logged in (profile: \"{profile}\")"));
        }
    }
    Ok(())
}
