//! muro: Muro operator CLI
//!
//! Inspects and maintains the cache store a murod instance uses.

use clap::{Parser, Subcommand};

use muro::server::build_proxy;
use muro::server::config::{Config, Secrets};
use muro::{CacheProxy, Resource, presenter};

/// Muro operator CLI
#[derive(Parser)]
#[command(name = "muro")]
#[command(version = muro::PKG_VERSION)]
#[command(about = "Inspect and maintain the Muro cache")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show configuration and cache state per resource
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the stored payload without contacting the upstream
    Show {
        /// Resource: tweets or youtube-videos
        resource: Resource,
    },

    /// Remove stored entries so the next request goes upstream
    Clear {
        /// Resource, or "all"
        target: String,
    },

    /// Run one request through the cache and print the result
    Refresh {
        /// Resource: tweets or youtube-videos
        resource: Resource,
        /// Page size for the upstream call
        #[arg(short, long)]
        max_results: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    config.apply_env()?;
    config.validate()?;
    let mut secrets = Secrets::load()?;
    secrets.apply_env();
    let proxy = build_proxy(&config, &secrets)?;

    match args.command {
        Command::Status { json } => print_status(&proxy, json)?,

        Command::Show { resource } => {
            let entry = proxy.peek(resource)?;
            let now = chrono::Utc::now();
            eprintln!(
                "{resource}: fetched {} ({}s ago, {})",
                entry.created_at.to_rfc3339(),
                entry.age_at(now).as_secs(),
                if entry.is_fresh_at(now) { "fresh" } else { "stale" }
            );
            println!("{}", serde_json::to_string_pretty(&entry.payload)?);
        }

        Command::Clear { target } => {
            let resources = if target.eq_ignore_ascii_case("all") {
                proxy.resources().collect()
            } else {
                vec![target.parse::<Resource>()?]
            };
            for resource in resources {
                proxy.clear(resource)?;
                println!("cleared {resource}");
            }
        }

        Command::Refresh {
            resource,
            max_results,
        } => {
            let result = proxy.get(resource, max_results).await;
            let presented = presenter::present(resource, result);
            eprintln!("status: {}", presented.status);
            for (name, value) in &presented.headers {
                eprintln!("{name}: {value}");
            }
            println!("{}", serde_json::to_string_pretty(&presented.body)?);
            if presented.status >= 400 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_status(proxy: &CacheProxy, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let report = proxy.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for status in report {
        let configured = if status.configured {
            "configured".to_string()
        } else {
            format!("missing {}", status.missing.join(", "))
        };
        let cache = &status.cache;
        let state = match (cache.has_cache, cache.expires_in) {
            (false, _) => "no cached entry".to_string(),
            (true, Some(expires_in)) => format!("fresh, expires in {expires_in}s"),
            (true, None) => format!("stale, {}s old", cache.age_seconds.unwrap_or(0)),
        };
        println!("{:<16} {configured:<40} {state}", status.resource.key());
    }
    Ok(())
}
