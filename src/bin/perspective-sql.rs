//! perspective-sql — CloudHealth perspective schema reader
//!
//! # Usage
//!
//! ```bash
//! # From a downloaded schema
//! perspective-sql schema.json
//!
//! # Straight from the API, saved to a file
//! perspective-sql --api-key $KEY --perspective-id 5841155522569 -o owners.txt
//! ```

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use perspective_sql::prelude::*;
use tracing_subscriber::EnvFilter;

const MANUAL_DOWNLOAD_HINT: &str = "See https://apidocs.cloudhealthtech.com/#perspectives_retrieve-perspective-schema \
for downloading a schema manually.";

#[derive(Parser)]
#[command(name = "perspective-sql")]
#[command(version)]
#[command(about = "Render a CloudHealth perspective schema as readable WHERE/AND/OR clauses", long_about = None)]
#[command(after_help = "EXAMPLES:
    perspective-sql schema.json
    perspective-sql schema.json -o owners.txt
    perspective-sql --perspective-id 5841155522569

See https://apidocs.cloudhealthtech.com/#perspectives_retrieve-perspective-schema
for help downloading a schema manually.")]
struct Cli {
    /// Path to the JSON schema file (prompts for API credentials when omitted)
    input_file: Option<PathBuf>,

    /// Write output to this file instead of the screen
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// CloudHealth API key
    #[arg(long, env = "CLOUDHEALTH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// CloudHealth perspective ID
    #[arg(long)]
    perspective_id: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(err) = e.downcast_ref::<PerspectiveError>() {
            if err.is_acquisition() {
                eprintln!("{}", MANUAL_DOWNLOAD_HINT.dimmed());
            }
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "perspective_sql=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    let source = match &cli.input_file {
        Some(path) => SchemaSource::File(path.clone()),
        None => {
            let api_key = match cli.api_key.clone().or_else(|| config.api.api_key.clone()) {
                Some(key) => key,
                None => prompt("CloudHealth API Key: ")?,
            };
            let perspective_id = match cli.perspective_id.clone() {
                Some(id) => id,
                None => prompt("Perspective ID: ")?,
            };
            eprintln!("{}", "Fetching perspective schema from CloudHealth API...".dimmed());
            SchemaSource::Api {
                perspective_id,
                api_key,
            }
        }
    };

    let doc = source.fetch(&config.api).await?;
    let lines = perspective_sql::convert(&doc)?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, lines.join("\n"))
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            println!(
                "{} Output written to {}",
                "✓".green(),
                path.display().to_string().cyan()
            );
        }
        None => {
            for line in &lines {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

/// Ask for a value on stdin.
fn prompt(label: &str) -> Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{}", label.cyan())?;
    stderr.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_string();
    if answer.is_empty() {
        anyhow::bail!("{} is required", label.trim_end_matches(": "));
    }
    Ok(answer)
}
