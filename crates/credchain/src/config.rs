//! Configuration for the issuance service.
//!
//! Every section has a `Default`; the environment overrides individual
//! keys. Variables use the `CREDCHAIN_` prefix and `__` between sections:
//!
//! ```text
//! CREDCHAIN_COORDINATOR__ATTESTATION_MODE=server_signed
//! CREDCHAIN_LEDGER__RPC_URL=https://rpc-amoy.polygon.technology
//! CREDCHAIN_LEDGER__CONTRACT_ADDRESS=0x...
//! CREDCHAIN_LEDGER__PRIVATE_KEY=0x...
//! CREDCHAIN_CONTENT__WALLET_ADDRESS=...
//! CREDCHAIN_STORE__DATABASE_PATH=/var/lib/credchain/credentials.db
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use serde::Deserialize;

use credchain_content::{ContentConfig, HttpContentStore};
use credchain_ledger::{EthersRpc, LedgerClient, LedgerConfig};
use credchain_store::SqliteStore;

use crate::coordinator::{Coordinator, CoordinatorConfig};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CREDCHAIN";

/// Who signs attestation transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationMode {
    /// A client wallet signs and broadcasts; the service only confirms.
    #[default]
    External,
    /// The service holds the key and submits attestations itself.
    ServerSigned,
}

/// Metadata cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("credchain.db"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CertifyConfig {
    pub coordinator: CoordinatorConfig,
    pub ledger: LedgerConfig,
    pub content: ContentConfig,
    pub store: StoreConfig,
}

/// The coordinator wired to the production backends.
pub type LiveCoordinator = Coordinator<LedgerClient<EthersRpc>, HttpContentStore, SqliteStore>;

impl CertifyConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let source = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration from environment")?;

        Self::from_config(source)
    }

    /// Deserialize from an already-built `config::Config`.
    pub fn from_config(source: config::Config) -> anyhow::Result<Self> {
        let config: Self = source
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ledger.contract_address.trim().is_empty() {
            bail!("ledger.contract_address is required");
        }
        if self.ledger.rpc_url.trim().is_empty() {
            bail!("ledger.rpc_url is required");
        }
        if self.coordinator.max_public_id_attempts == 0 {
            bail!("coordinator.max_public_id_attempts must be at least 1");
        }

        if self.coordinator.attestation_mode == AttestationMode::ServerSigned {
            let has_key = self
                .ledger
                .private_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty());
            if !has_key {
                bail!("ledger.private_key is required when attestation_mode is server_signed");
            }
        }

        Ok(())
    }

    /// Build the coordinator over the HTTP ledger, HTTP content store and
    /// SQLite cache.
    pub fn build(&self) -> anyhow::Result<LiveCoordinator> {
        self.validate()?;

        let ledger = LedgerClient::connect(&self.ledger).context("failed to set up ledger client")?;
        let content = HttpContentStore::new(self.content.clone())
            .context("failed to set up content store client")?;
        let store = SqliteStore::open(&self.store.database_path).with_context(|| {
            format!(
                "failed to open metadata cache at {}",
                self.store.database_path.display()
            )
        })?;

        tracing::info!(
            mode = ?self.coordinator.attestation_mode,
            chain_id = self.ledger.chain_id,
            database = %self.store.database_path.display(),
            "coordinator configured"
        );

        Ok(Coordinator::new(ledger, content, store, self.coordinator.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn with_overrides(pairs: &[(&str, &str)]) -> anyhow::Result<CertifyConfig> {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value)?;
        }
        CertifyConfig::from_config(builder.build()?)
    }

    #[test]
    fn test_defaults() {
        let config = CertifyConfig::default();
        assert_eq!(config.coordinator.attestation_mode, AttestationMode::External);
        assert!(config.coordinator.verify_on_confirm);
        assert_eq!(config.ledger.max_poll_attempts, 60);
        assert_eq!(config.ledger.min_balance, "0.03");
        assert_eq!(config.store.database_path, PathBuf::from("credchain.db"));
    }

    #[test]
    fn test_overrides() {
        let config = with_overrides(&[
            ("ledger.contract_address", CONTRACT),
            ("ledger.chain_id", "137"),
            ("coordinator.verify_on_confirm", "false"),
            ("store.database_path", "/tmp/cache.db"),
        ])
        .unwrap();

        assert_eq!(config.ledger.chain_id, 137);
        assert!(!config.coordinator.verify_on_confirm);
        assert_eq!(config.store.database_path, PathBuf::from("/tmp/cache.db"));
        // Untouched keys keep their defaults.
        assert_eq!(config.ledger.poll_interval_ms, 1000);
    }

    #[test]
    fn test_requires_contract_address() {
        assert!(with_overrides(&[]).is_err());
    }

    #[test]
    fn test_server_signed_requires_key() {
        let missing = with_overrides(&[
            ("ledger.contract_address", CONTRACT),
            ("coordinator.attestation_mode", "server_signed"),
        ]);
        assert!(missing.is_err());

        let present = with_overrides(&[
            ("ledger.contract_address", CONTRACT),
            ("coordinator.attestation_mode", "server_signed"),
            ("ledger.private_key", "0xabc"),
        ])
        .unwrap();
        assert_eq!(
            present.coordinator.attestation_mode,
            AttestationMode::ServerSigned
        );
    }
}
