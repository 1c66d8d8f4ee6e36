//! The signing account and its nonce lock.
//!
//! One [`SignerAccount`] exists per private key. Every submission holds its
//! lock from nonce selection through broadcast, so two attestations from the
//! same key never race for a nonce. Read-only ledger calls never take it.

use std::str::FromStr;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, U256};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{LedgerError, Result};

/// A local signing key plus the last nonce it broadcast.
pub struct SignerAccount {
    wallet: LocalWallet,
    last_nonce: Mutex<Option<U256>>,
}

impl std::fmt::Debug for SignerAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerAccount")
            .field("address", &self.wallet.address())
            .finish_non_exhaustive()
    }
}

impl SignerAccount {
    /// Load a hex private key (with or without `0x`).
    pub fn from_private_key(key: &str, chain_id: u64) -> Result<Self> {
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);

        let wallet = LocalWallet::from_str(key)
            .map_err(|e| LedgerError::InvalidCredentials(e.to_string()))?
            .with_chain_id(chain_id);

        Ok(Self::new(wallet))
    }

    pub fn new(wallet: LocalWallet) -> Self {
        Self {
            wallet,
            last_nonce: Mutex::new(None),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Enter the signing section. Waits for any submission in progress.
    pub async fn lock(&self) -> SigningSession<'_> {
        SigningSession {
            wallet: &self.wallet,
            last_nonce: self.last_nonce.lock().await,
        }
    }
}

/// Exclusive access to the account between nonce selection and broadcast.
pub struct SigningSession<'a> {
    wallet: &'a LocalWallet,
    last_nonce: MutexGuard<'a, Option<U256>>,
}

impl SigningSession<'_> {
    /// Pick the nonce for the next transaction.
    ///
    /// `pending` must be fetched inside this session. It already counts
    /// mempool transactions, so it is used as is; a value at or below the
    /// last broadcast nonce means that transaction was dropped.
    pub fn next_nonce(&self, pending: U256) -> U256 {
        if let Some(last) = *self.last_nonce {
            if pending <= last {
                tracing::warn!(
                    %pending,
                    %last,
                    "node pending nonce behind last broadcast, reusing dropped nonce"
                );
            }
        }
        pending
    }

    /// Last nonce this account broadcast.
    pub fn last_nonce(&self) -> Option<U256> {
        *self.last_nonce
    }

    /// Sign a transaction and return its raw RLP encoding.
    pub async fn sign(&self, tx: &TypedTransaction) -> Result<Bytes> {
        let signature = self
            .wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| LedgerError::InvalidCredentials(e.to_string()))?;
        Ok(tx.rlp_signed(&signature))
    }

    /// Record a nonce as broadcast.
    pub fn commit(&mut self, nonce: U256) {
        *self.last_nonce = Some(nonce);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (anvil account #0).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_loads_key_with_or_without_prefix() {
        let a = SignerAccount::from_private_key(DEV_KEY, 80002).unwrap();
        let b = SignerAccount::from_private_key(&DEV_KEY[2..], 80002).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(
            format!("{:?}", a.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_rejects_malformed_key() {
        assert!(matches!(
            SignerAccount::from_private_key("not-a-key", 1),
            Err(LedgerError::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn test_nonce_selection() {
        let account = SignerAccount::from_private_key(DEV_KEY, 1).unwrap();

        let mut session = account.lock().await;
        assert_eq!(session.next_nonce(U256::from(5)), U256::from(5));

        session.commit(U256::from(5));
        assert_eq!(session.last_nonce(), Some(U256::from(5)));
        assert_eq!(session.next_nonce(U256::from(6)), U256::from(6));
        // Nonce 5 was dropped from the mempool; the node's value wins.
        assert_eq!(session.next_nonce(U256::from(5)), U256::from(5));
        // Node moved ahead on its own.
        assert_eq!(session.next_nonce(U256::from(9)), U256::from(9));
    }

    #[tokio::test]
    async fn test_sessions_are_exclusive() {
        let account = SignerAccount::from_private_key(DEV_KEY, 1).unwrap();

        let session = account.lock().await;
        assert!(account.last_nonce.try_lock().is_err());
        drop(session);
        assert!(account.last_nonce.try_lock().is_ok());
    }
}
