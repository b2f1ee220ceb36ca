//! onecode admin tool
//!
//! Talks to a running license server: issues codes, inspects and unbinds
//! them, and can probe a code the way a client installation would.
//!
//! Usage:
//!   onecode-admin --admin-key KEY batch 10
//!   onecode-admin probe ABCDEF1234

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use onecode_license::{
    ActivationCache, DeviceFingerprint, DeviceInfo, DEFAULT_OFFLINE_GRACE_DAYS, MAX_BATCH,
    MAX_OFFLINE_GRACE_DAYS,
};
use onecode_server::{ActivationStatus, AdminClient};
use onecode_types::LicenseCode;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "onecode-admin", version)]
#[command(about = "Admin client for the onecode license server")]
struct Args {
    /// License server base URL
    #[arg(long, env = "ONECODE_SERVER_URL", default_value = "http://localhost:3000")]
    server: String,

    /// Shared admin credential (required for admin commands)
    #[arg(long, env = "ONECODE_ADMIN_KEY", hide_env_values = true)]
    admin_key: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue the code for a seed (e.g. an order ID)
    Gen { seed: String },

    /// Issue a batch of codes from random seeds
    Batch {
        #[arg(value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_BATCH)))]
        count: u32,
    },

    /// Show the record for a code
    Check { code: String },

    /// Release a code from its device
    Unbind {
        code: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete a code permanently
    Delete {
        code: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List codes, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Show activation counts
    Stats,

    /// Show server status
    Status,

    /// Verify a code for this machine, falling back to the local cache
    /// when the server is unreachable
    Probe {
        code: String,
        /// Override the detected machine ID
        #[arg(long)]
        machine_id: Option<String>,
        /// Activation cache file
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Days a cached activation is honored offline
        #[arg(
            long,
            default_value_t = DEFAULT_OFFLINE_GRACE_DAYS,
            value_parser = clap::value_parser!(i64).range(0..=MAX_OFFLINE_GRACE_DAYS)
        )]
        grace_days: i64,
    },
}

/// Trims and upper-cases a code the way the server does.
fn canonical(code: &str) -> Result<String> {
    Ok(LicenseCode::parse(code)
        .context("invalid license code")?
        .into_inner())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} (y/n): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let client = AdminClient::new(&args.server, args.admin_key)?;
    debug!(?client, "client ready");

    match args.command {
        Command::Gen { seed } => {
            let resp = client.generate(&seed).await?;
            println!("Code:    {}", resp.code);
            println!("Seed:    {}", resp.seed);
            println!("Message: {}", resp.message);
            if let Some(warning) = resp.warning {
                println!("Warning: {warning}");
            }
        }
        Command::Batch { count } => {
            let resp = client.batch(count).await?;
            println!("{}", resp.message);
            for (i, code) in resp.codes.iter().enumerate() {
                println!("{:>4}. {}", i + 1, code);
            }
            if let Some(warning) = resp.warning {
                println!("Warning: {warning}");
            }
        }
        Command::Check { code } => {
            let resp = client.check(&canonical(&code)?).await?;
            match resp.data {
                Some(record) => {
                    println!("Code:        {}", record.code);
                    println!("Machine ID:  {}", record.machine_id.as_deref().unwrap_or("-"));
                    println!(
                        "Status:      {}",
                        if record.is_activated { "activated" } else { "unused" }
                    );
                    println!("Created:     {}", record.created_at.to_rfc3339());
                    println!(
                        "Activated:   {}",
                        record.activated_at.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
                    );
                }
                None => println!("{}", resp.message.as_deref().unwrap_or("code not found")),
            }
        }
        Command::Unbind { code, yes } => {
            let code = canonical(&code)?;
            if !yes && !confirm(&format!("Unbind {code} from its device?"))? {
                println!("Cancelled");
                return Ok(());
            }
            let resp = client.unbind(&code).await?;
            println!("{}", resp.message);
        }
        Command::Delete { code, yes } => {
            let code = canonical(&code)?;
            if !yes && !confirm(&format!("Delete {code} permanently?"))? {
                println!("Cancelled");
                return Ok(());
            }
            let resp = client.delete(&code).await?;
            if !resp.success {
                bail!("{}", resp.message);
            }
            println!("{}", resp.message);
        }
        Command::List { page, limit } => {
            let resp = client.list(page, limit).await?;
            let p = &resp.pagination;
            println!("Page {}/{} ({} codes total)", p.page, p.pages.max(1), p.total);
            if resp.data.is_empty() {
                println!("  (no records)");
            }
            for record in &resp.data {
                match record.machine_id() {
                    Some(machine) => println!("  {}  activated  {}", record.code(), machine),
                    None => println!("  {}  unused", record.code()),
                }
            }
        }
        Command::Stats => {
            let stats = client.stats().await?.stats;
            println!("Total:     {}", stats.total);
            println!("Activated: {}", stats.activated);
            println!("Unused:    {}", stats.unused);
        }
        Command::Status => {
            let status = client.status().await?;
            println!("{} v{}: {}", status.service, status.version, status.status);
            println!("Server time: {}", status.timestamp.to_rfc3339());
        }
        Command::Probe {
            code,
            machine_id,
            cache,
            grace_days,
        } => {
            let machine_id = match machine_id {
                Some(id) => id,
                None => DeviceFingerprint::generate().id().to_string(),
            };
            let cache = match cache {
                Some(path) => ActivationCache::at(path),
                None => ActivationCache::default_location()
                    .context("no cache directory on this platform, pass --cache")?,
            };
            let device = DeviceInfo::collect();
            println!("Device:     {} {} ({})", device.os_name, device.arch, device.hostname);
            println!("Machine ID: {machine_id}");

            match client
                .check_activation(&cache, &code, &machine_id, grace_days)
                .await?
            {
                ActivationStatus::Online { message, .. } => {
                    println!("License valid ({})", message.as_deref().unwrap_or("ok"));
                }
                ActivationStatus::Offline(entry) => {
                    println!(
                        "Server unreachable; license valid offline (last verified {})",
                        entry.verified_at.to_rfc3339()
                    );
                }
                ActivationStatus::Rejected { reason } => bail!("license rejected: {reason}"),
                ActivationStatus::Unavailable { error } => {
                    bail!("server unreachable ({error}) and no usable cached activation")
                }
            }
        }
    }
    Ok(())
}
