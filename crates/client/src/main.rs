mod api;

use api::LockClient;
use clap::{Parser, Subcommand};
use slotlock_common::LockResponse;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the lock coordinator
    #[arg(long, global = true, default_value = "http://127.0.0.1:3030")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a lease on a resource
    Acquire {
        resource_id: String,
        /// Owner identity (default: a fresh random one)
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 30)]
        ttl: i64,
        /// Keep retrying on conflict for up to this many seconds
        #[arg(long, default_value_t = 0)]
        wait: u64,
    },
    /// Renew a lease you hold
    Renew {
        resource_id: String,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = 30)]
        ttl: i64,
    },
    /// Release a lease you hold
    Release {
        resource_id: String,
        #[arg(long)]
        owner: String,
    },
    /// Show who holds a resource
    Inspect {
        resource_id: String,
    },
    /// List all live leases
    List,
    /// Show the coordinator's clock
    Time,
    /// Acquire a lease and keep renewing it until Ctrl-C
    Hold {
        resource_id: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 30)]
        ttl: i64,
        #[arg(long, default_value_t = 0)]
        wait: u64,
    },
    /// Run a command while holding a lease
    Run {
        resource_id: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 30)]
        ttl: i64,
        #[arg(long, default_value_t = 0)]
        wait: u64,

        /// Command and arguments to execute
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = LockClient::new(cli.server);

    match cli.command {
        Commands::Acquire { resource_id, owner, ttl, wait } => {
            let owner = owner.unwrap_or_else(generated_owner);
            let resp = client
                .acquire_with_wait(&resource_id, &owner, ttl, Duration::from_secs(wait))
                .await?;
            println!("{}", describe(&resp));
            if matches!(resp, LockResponse::Locked { .. }) {
                println!("Owner: {}", owner);
            } else {
                std::process::exit(1);
            }
        }
        Commands::Renew { resource_id, owner, ttl } => {
            let resp = client.renew(&resource_id, &owner, ttl).await?;
            println!("{}", describe(&resp));
            if !matches!(resp, LockResponse::Renewed { .. }) {
                std::process::exit(1);
            }
        }
        Commands::Release { resource_id, owner } => {
            let resp = client.release(&resource_id, &owner).await?;
            println!("{}", describe(&resp));
            if matches!(resp, LockResponse::Forbidden { .. }) {
                std::process::exit(1);
            }
        }
        Commands::Inspect { resource_id } => {
            let resp = client.inspect(&resource_id).await?;
            println!("{}", describe(&resp));
        }
        Commands::List => {
            let leases = client.list().await?;
            println!("Active Leases:");
            for lease in leases {
                println!(
                    "Resource: {}, Owner: {}, Acquired: {}, TTL: {}s",
                    lease.resource_id,
                    lease.owner_id,
                    format_ts(&lease.acquired_at),
                    lease.ttl_seconds
                );
            }
        }
        Commands::Time => {
            let time = client.time().await?;
            println!("{} ({} ms)", format_ts(&time.server_time_utc), time.server_unix_ms);
        }
        Commands::Hold { resource_id, owner, ttl, wait } => {
            let owner = owner.unwrap_or_else(generated_owner);
            let resp = client
                .acquire_with_wait(&resource_id, &owner, ttl, Duration::from_secs(wait))
                .await?;
            if !matches!(resp, LockResponse::Locked { .. }) {
                eprintln!("{}", describe(&resp));
                std::process::exit(1);
            }
            println!("Holding {} as {}. Renewing until Ctrl-C...", resource_id, owner);

            let mut interval = time::interval(renew_period(ttl));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match client.renew(&resource_id, &owner, ttl).await {
                            Ok(LockResponse::Renewed { .. }) => println!("Renewed {}", resource_id),
                            Ok(other) => {
                                eprintln!("Lease lost: {}", describe(&other));
                                std::process::exit(1);
                            }
                            Err(e) => eprintln!("Renew error: {}", e),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            let resp = client.release(&resource_id, &owner).await?;
            println!("{}", describe(&resp));
        }
        Commands::Run { resource_id, owner, ttl, wait, command } => {
            if command.is_empty() {
                eprintln!("No command specified");
                std::process::exit(1);
            }
            let owner = owner.unwrap_or_else(generated_owner);

            let resp = client
                .acquire_with_wait(&resource_id, &owner, ttl, Duration::from_secs(wait))
                .await?;
            if !matches!(resp, LockResponse::Locked { .. }) {
                eprintln!("Failed to acquire: {}", describe(&resp));
                std::process::exit(1);
            }
            println!("Acquired {} as {}", resource_id, owner);

            // Spawn renew task
            let renew_client = client.clone();
            let renew_resource = resource_id.clone();
            let renew_owner = owner.clone();
            let renew_handle = tokio::spawn(async move {
                let mut interval = time::interval(renew_period(ttl));
                interval.tick().await;
                loop {
                    interval.tick().await;
                    match renew_client.renew(&renew_resource, &renew_owner, ttl).await {
                        Ok(LockResponse::Renewed { .. }) => {}
                        Ok(other) => {
                            eprintln!("Lease lost: {}", describe(&other));
                            break;
                        }
                        Err(e) => {
                            eprintln!("Renew error: {}", e);
                            break;
                        }
                    }
                }
            });

            let cmd = &command[0];
            let args = &command[1..];
            println!("Running: {} {:?} holding {}", cmd, args, resource_id);

            let status = Command::new(cmd)
                .args(args)
                .env("SLOTLOCK_RESOURCE_ID", &resource_id)
                .env("SLOTLOCK_OWNER_ID", &owner)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await;

            renew_handle.abort();

            // Release regardless of how the command ended
            match client.release(&resource_id, &owner).await {
                Ok(resp) => println!("{}", describe(&resp)),
                Err(e) => eprintln!("Release error: {}", e),
            }

            match status {
                Ok(s) => {
                    if !s.success() {
                        std::process::exit(s.code().unwrap_or(1));
                    }
                }
                Err(e) => {
                    eprintln!("Failed to run command: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn generated_owner() -> String {
    format!("slotlock-{}", Uuid::new_v4().simple())
}

/// Renew at a third of the TTL so two renewals can fail before expiry.
fn renew_period(ttl_seconds: i64) -> Duration {
    let ttl_ms = u64::try_from(ttl_seconds).unwrap_or(1).max(1) * 1_000;
    Duration::from_millis((ttl_ms / 3).max(100))
}

fn format_ts(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn describe(resp: &LockResponse) -> String {
    match resp {
        LockResponse::Locked { resource_id, owner_id: Some(owner), acquired_at, ttl_seconds } => format!(
            "LOCKED {} by {} since {} (ttl {}s)",
            resource_id,
            owner,
            format_ts(acquired_at),
            ttl_seconds
        ),
        LockResponse::Locked { resource_id, owner_id: None, acquired_at, ttl_seconds } => format!(
            "LOCKED {} at {} (ttl {}s)",
            resource_id,
            format_ts(acquired_at),
            ttl_seconds
        ),
        LockResponse::Conflict { resource_id, owner_id, acquired_at } => format!(
            "CONFLICT {} held by {} since {}",
            resource_id,
            owner_id,
            format_ts(acquired_at)
        ),
        LockResponse::Renewed { resource_id, acquired_at, ttl_seconds } => format!(
            "RENEWED {} at {} (ttl {}s)",
            resource_id,
            format_ts(acquired_at),
            ttl_seconds
        ),
        LockResponse::Released { resource_id } => format!("RELEASED {}", resource_id),
        LockResponse::Forbidden { resource_id } => format!("FORBIDDEN {}: held by another owner", resource_id),
        LockResponse::NotFound { resource_id } => format!("NOT_FOUND {}", resource_id),
        LockResponse::Free { resource_id } => format!("FREE {}", resource_id),
    }
}
