//! CapsuleVault CLI
//!
//! Thin wrapper around capsulevault-core for command-line usage. The CLI
//! plays the role of the execution environment: it supplies the caller
//! identity (`--as`) and owns the data directory.
//!
//! ## Usage
//!
//! ```bash
//! # Initialize a store for the caller
//! capsulevault --as did:vault:alice store init
//!
//! # Create a time-locked capsule
//! capsulevault --as did:vault:alice capsule create \
//!     --kind 0 --mime application/pdf --secret-hex abcd --unlock-at 1900000000
//!
//! # Upload chunks, marking the last one final
//! capsulevault --as did:vault:alice chunk upload did:vault:alice 1 0 --data-hex 0102
//! capsulevault --as did:vault:alice chunk upload did:vault:alice 1 1 --data-hex 0304 --final
//!
//! # Grant and revoke access on a FileLocker capsule
//! capsulevault --as did:vault:alice access grant did:vault:alice 1 did:vault:bob
//! capsulevault --as did:vault:alice access revoke did:vault:alice 1 did:vault:bob
//!
//! # Attach a contributor file to a Collaborative capsule
//! capsulevault --as did:vault:bob contribute did:vault:alice 1 --data-hex c0ffee
//!
//! # Report an oracle-verified location
//! capsulevault --as did:vault:oracle geo verify did:vault:alice 1 47600000 -122300000
//!
//! # Unlock and read
//! capsulevault --as did:vault:alice unlock did:vault:alice 1 --secret-hex abcd
//! capsulevault --as did:vault:alice chunk get did:vault:alice 1 0
//!
//! # Inspect state
//! capsulevault info did:vault:alice 1
//! capsulevault events did:vault:alice
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use capsulevault_core::{
    CapsuleId, CapsuleKind, CapsuleParams, CapsuleVault, GeoTarget, VaultConfig,
};

/// CapsuleVault - conditional-release capsule storage
#[derive(Parser)]
#[command(name = "capsulevault")]
#[command(version = "0.1.0")]
#[command(about = "CapsuleVault - conditional-release capsule storage")]
#[command(
    long_about = "Capsules hold client-encrypted payloads assembled from bounded-size chunks, released only once an owner-defined policy (time, geo, secret, authorization) is fully satisfied."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.capsulevault/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Caller identity for every operation
    #[arg(long = "as", value_name = "DID", global = true, default_value = "did:vault:local")]
    caller: String,

    /// Identity trusted for geo callbacks
    #[arg(long, global = true, default_value = capsulevault_core::DEFAULT_ORACLE_ID)]
    oracle_id: String,

    /// Maximum accepted chunk size in bytes
    #[arg(long, global = true, default_value_t = capsulevault_core::DEFAULT_MAX_CHUNK_BYTES)]
    max_chunk_bytes: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store management
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Capsule management
    Capsule {
        #[command(subcommand)]
        action: CapsuleAction,
    },

    /// Chunk upload and retrieval
    Chunk {
        #[command(subcommand)]
        action: ChunkAction,
    },

    /// Attach a contributor file to a Collaborative capsule
    Contribute {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
        /// Payload bytes as hex
        #[arg(long)]
        data_hex: String,
    },

    /// Access list management
    Access {
        #[command(subcommand)]
        action: AccessAction,
    },

    /// Attempt to unlock a capsule
    Unlock {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
        /// Unlock code as hex
        #[arg(long, default_value = "")]
        secret_hex: String,
    },

    /// Geo verification (oracle)
    Geo {
        #[command(subcommand)]
        action: GeoAction,
    },

    /// Show capsule policy and state
    Info {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
    },

    /// Show capsule payload metadata
    File {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
    },

    /// List contributor identities
    Contributors {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
    },

    /// Show the most recently allocated capsule id
    Latest {
        /// Capsule owner identity
        owner: String,
    },

    /// Show the unlock-event log
    Events {
        /// Capsule owner identity
        owner: String,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Initialize the caller's store (idempotent)
    Init,
}

#[derive(Subcommand)]
enum CapsuleAction {
    /// Create a new capsule in the caller's store
    Create {
        /// Kind code: 0=TimeLock, 1=Collaborative, 2=FileLocker, 3=GeoLock
        #[arg(long)]
        kind: u8,
        /// Mime metadata for the assembled payload
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
        /// Unlock code as hex
        #[arg(long, default_value = "")]
        secret_hex: String,
        /// Unix timestamp the capsule opens at (0 = disabled)
        #[arg(long, default_value_t = 0)]
        unlock_at: i64,
        /// Target latitude in microdegrees
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        geo_lat: i64,
        /// Target longitude in microdegrees
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        geo_long: i64,
        /// Acceptance radius in meters (0 = geo gate disabled)
        #[arg(long, default_value_t = 0)]
        geo_radius: u64,
        /// Maximum number of contributor slots
        #[arg(long, default_value_t = 0)]
        max_contributors: u32,
        /// Declared total payload size in bytes
        #[arg(long, default_value_t = 0)]
        size: u64,
    },
}

#[derive(Subcommand)]
enum ChunkAction {
    /// Upload one chunk (owner only)
    Upload {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
        /// Chunk index
        index: u32,
        /// Chunk bytes as hex
        #[arg(long)]
        data_hex: String,
        /// Mark the upload complete
        #[arg(long = "final")]
        is_final: bool,
    },
    /// Read one chunk of an unlocked capsule
    Get {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
        /// Chunk index
        index: u32,
    },
}

#[derive(Subcommand)]
enum AccessAction {
    /// Grant access on a FileLocker capsule (owner only)
    Grant {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
        /// Identity to grant
        grantee: String,
    },
    /// Revoke access (owner only)
    Revoke {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
        /// Identity to revoke
        revokee: String,
    },
    /// Check whether an identity holds access
    Check {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
        /// Identity to check
        who: String,
    },
}

#[derive(Subcommand)]
enum GeoAction {
    /// Report an oracle-verified coordinate for a capsule
    Verify {
        /// Capsule owner identity
        owner: String,
        /// Capsule id
        id: u64,
        /// Reported latitude in microdegrees
        #[arg(allow_negative_numbers = true)]
        lat: i64,
        /// Reported longitude in microdegrees
        #[arg(allow_negative_numbers = true)]
        long: i64,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.capsulevault/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".capsulevault")
        .join("data")
}

/// Parse hex payload bytes
fn parse_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| anyhow::anyhow!("Invalid hex '{}': {}", s, e))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config = VaultConfig {
        max_chunk_bytes: cli.max_chunk_bytes,
        oracle_id: cli.oracle_id.clone(),
    };
    let mut vault = CapsuleVault::open(&data_dir, config)?;
    let caller = cli.caller.as_str();

    match cli.command {
        Commands::Store { action } => match action {
            StoreAction::Init => {
                vault.init_store(caller)?;
                println!("Store ready for {}", caller);
            }
        },

        Commands::Capsule { action } => match action {
            CapsuleAction::Create {
                kind,
                mime,
                secret_hex,
                unlock_at,
                geo_lat,
                geo_long,
                geo_radius,
                max_contributors,
                size,
            } => {
                let mut params = CapsuleParams::new(CapsuleKind::from_code(kind)?, mime);
                params.secret = parse_hex(&secret_hex)?;
                params.unlock_time = unlock_at;
                params.geo = GeoTarget::new(geo_lat, geo_long, geo_radius);
                params.max_contributors = max_contributors;
                params.declared_size = size;

                let kind = params.kind;
                let id = vault.create_capsule(caller, params)?;
                println!("Created {} capsule:", kind);
                println!("  ID: {}", id.as_u64());
                println!("  Owner: {}", caller);
            }
        },

        Commands::Chunk { action } => match action {
            ChunkAction::Upload {
                owner,
                id,
                index,
                data_hex,
                is_final,
            } => {
                let bytes = parse_hex(&data_hex)?;
                let size = bytes.len();
                vault.upload_chunk(caller, &owner, CapsuleId::from_u64(id), index, bytes, is_final)?;
                println!("Stored chunk {} ({} bytes)", index, size);
                if is_final {
                    println!("Upload marked complete");
                }
            }
            ChunkAction::Get { owner, id, index } => {
                let bytes = vault.file_chunk(caller, &owner, CapsuleId::from_u64(id), index)?;
                println!("{}", hex::encode(bytes));
            }
        },

        Commands::Contribute {
            owner,
            id,
            data_hex,
        } => {
            let bytes = parse_hex(&data_hex)?;
            vault.add_contributor_file(caller, &owner, CapsuleId::from_u64(id), bytes)?;
            println!("Contribution stored for {}", caller);
        }

        Commands::Access { action } => match action {
            AccessAction::Grant { owner, id, grantee } => {
                vault.grant_access(caller, &owner, CapsuleId::from_u64(id), &grantee)?;
                println!("Granted access to {}", grantee);
            }
            AccessAction::Revoke { owner, id, revokee } => {
                vault.revoke_access(caller, &owner, CapsuleId::from_u64(id), &revokee)?;
                println!("Revoked access for {}", revokee);
            }
            AccessAction::Check { owner, id, who } => {
                let allowed = vault.has_access(&owner, CapsuleId::from_u64(id), &who);
                println!("{}", if allowed { "granted" } else { "denied" });
            }
        },

        Commands::Unlock {
            owner,
            id,
            secret_hex,
        } => {
            let secret = parse_hex(&secret_hex)?;
            vault.request_unlock(caller, &owner, CapsuleId::from_u64(id), &secret)?;
            println!("Capsule {} unlocked", id);
        }

        Commands::Geo { action } => match action {
            GeoAction::Verify {
                owner,
                id,
                lat,
                long,
            } => {
                vault.oracle_geo_callback(caller, &owner, CapsuleId::from_u64(id), lat, long)?;
                let info = vault.capsule_info(&owner, CapsuleId::from_u64(id))?;
                if info.geo_verified {
                    println!("Geo proximity verified");
                } else {
                    println!("Reported coordinate outside radius (no change)");
                }
            }
        },

        Commands::Info { owner, id } => {
            let info = vault.capsule_info(&owner, CapsuleId::from_u64(id))?;
            println!("Capsule {}:", info.id.as_u64());
            println!("  Kind: {}", info.kind);
            println!("  Owner: {}", info.owner);
            println!("  Complete: {}", info.complete);
            println!("  Unlocked: {}", info.unlocked);
            if info.unlock_time > 0 {
                println!("  Unlock time: {}", info.unlock_time);
            }
            if info.geo.is_enabled() {
                println!(
                    "  Geo target: ({}, {}) radius {} m, verified: {}",
                    info.geo.lat_micro, info.geo.long_micro, info.geo.radius_m, info.geo_verified
                );
            }
            if info.max_contributors > 0 {
                println!(
                    "  Contributors: {}/{}",
                    info.contributor_count, info.max_contributors
                );
            }
        }

        Commands::File { owner, id } => {
            let file = vault.file_info(&owner, CapsuleId::from_u64(id))?;
            println!("File info:");
            println!("  Mime: {}", file.mime);
            println!("  Declared size: {} bytes", file.declared_size);
            println!("  Total chunks: {}", file.total_chunks);
            println!("  Stored chunks: {}", file.stored_chunks);
            println!("  Complete: {}", file.complete);
        }

        Commands::Contributors { owner, id } => {
            let contributors = vault.contributors(&owner, CapsuleId::from_u64(id))?;
            if contributors.is_empty() {
                println!("No contributors");
            } else {
                for did in contributors {
                    println!("{}", did);
                }
            }
        }

        Commands::Latest { owner } => {
            let id = vault.latest_capsule_id(&owner)?;
            println!("  ID: {}", id.as_u64());
        }

        Commands::Events { owner } => {
            let events = vault.unlock_events(&owner)?;
            if events.is_empty() {
                println!("No unlock events");
            } else {
                for event in events {
                    println!(
                        "{}  capsule_{}  by {}",
                        event.timestamp,
                        event.capsule_id.as_u64(),
                        event.unlocker
                    );
                }
            }
        }
    }

    Ok(())
}
