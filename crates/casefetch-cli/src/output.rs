use anyhow::Result;
use casefetch_core::Resolution;
use colored::Colorize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_resolution(resolution: &Resolution, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(resolution)?);
        }
        OutputFormat::Table => print_as_table(resolution),
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn print_as_table(resolution: &Resolution) {
    let matched_by = match resolution {
        Resolution::NameMatch(_) => "name",
        Resolution::BirthdateMatches(_) => "birthdate",
        Resolution::NoMatch => {
            println!("No match found.");
            return;
        }
    };

    let mut builder = Builder::default();
    builder.push_record(["Patient", "Matched by", "STL attachments"]);
    for m in resolution.matches() {
        let attachments = if m.attachments_hrefs.is_empty() {
            "-".to_string()
        } else {
            m.attachments_hrefs.join("\n")
        };
        builder.push_record([m.name.as_str(), matched_by, attachments.as_str()]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
    println!("Matches: {}", resolution.matches().len());
}
