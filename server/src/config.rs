//! Server configuration from flags and environment.

use clap::{Parser, ValueEnum};
use onecode_license::{AdminKey, CodeGenerator, LicenseResult, Registry};
use onecode_storage::{LicenseStore, MemoryStore, SqliteStore};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Storage backend selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Process memory; records are lost on restart.
    Memory,
    /// SQLite database file.
    Sqlite,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "onecode-server", version)]
#[command(about = "onecode license registry: one code, one device")]
pub struct ServerArgs {
    /// Address to bind the HTTP listener to
    #[arg(long, env = "ONECODE_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// HTTP port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Storage backend
    #[arg(long, env = "ONECODE_STORE", value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,

    /// SQLite database path (ignored for the memory store)
    #[arg(long, env = "ONECODE_DATABASE", default_value = "binds.db")]
    pub database: PathBuf,

    /// Secret used to derive license codes
    #[arg(long, env = "ONECODE_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Shared credential for admin operations
    #[arg(long, env = "ONECODE_ADMIN_KEY", hide_env_values = true)]
    pub admin_key: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerArgs {
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Opens the configured store and assembles the registry.
    ///
    /// Blank secrets are rejected here, before any listener is bound.
    pub fn open_registry(&self) -> LicenseResult<Registry> {
        let generator = CodeGenerator::new(&self.secret_key)?;
        let admin_key = AdminKey::new(&self.admin_key)?;

        let store: Arc<dyn LicenseStore> = match self.store {
            StoreKind::Memory => {
                info!("using in-memory license store");
                Arc::new(MemoryStore::new())
            }
            StoreKind::Sqlite => {
                info!(path = %self.database.display(), "opening SQLite license store");
                Arc::new(SqliteStore::open(&self.database)?)
            }
        };
        Ok(Registry::new(store, generator, admin_key))
    }
}
