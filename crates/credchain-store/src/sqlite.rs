//! SQLite implementation of the CredentialStore trait.
//!
//! This is the primary cache backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Params, TransactionBehavior};
use uuid::Uuid;

use credchain_core::{
    ContentLocator, Credential, DescriptiveMetadata, Fingerprint, InternalId, LedgerReference,
    PublicId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{classify_existing, CredentialStore, InsertResult};

/// How long a writer waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_CREDENTIAL: &str = "SELECT c.internal_id, c.public_id, c.fingerprint,
        c.content_locator, c.content_url, c.ledger_tx_hash, c.ledger_block, c.ledger_url,
        c.owner, c.issued_at,
        m.first_name, m.last_name, m.email, m.university, m.faculty, m.department,
        m.graduation_year, m.student_number, m.nationality
     FROM credentials c
     JOIN credential_metadata m ON m.credential_id = c.internal_id";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn conversion_error<E>(idx: usize) -> impl FnOnce(E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

// Helper to convert a joined row to a Credential
fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<Credential> {
    let internal_id: String = row.get(0)?;
    let public_id: String = row.get(1)?;
    let fingerprint: String = row.get(2)?;
    let content_locator: String = row.get(3)?;
    let ledger_tx_hash: String = row.get(5)?;
    let ledger_block: i64 = row.get(6)?;

    let metadata = DescriptiveMetadata {
        first_name: row.get(10)?,
        last_name: row.get(11)?,
        email: row.get(12)?,
        university: row.get(13)?,
        faculty: row.get(14)?,
        department: row.get(15)?,
        graduation_year: row.get(16)?,
        student_number: row.get(17)?,
        nationality: row.get(18)?,
    };

    Ok(Credential {
        internal_id: InternalId::from_uuid(
            Uuid::parse_str(&internal_id).map_err(conversion_error(0))?,
        ),
        public_id: PublicId::parse(&public_id).map_err(conversion_error(1))?,
        fingerprint: Fingerprint::from_hex(&fingerprint).map_err(conversion_error(2))?,
        content_locator: ContentLocator::new(content_locator).map_err(conversion_error(3))?,
        content_url: row.get(4)?,
        ledger_reference: LedgerReference::new(ledger_tx_hash, ledger_block as u64)
            .map_err(conversion_error(5))?,
        ledger_url: row.get(7)?,
        owner: row.get(8)?,
        metadata,
        issued_at: row.get(9)?,
    })
}

fn query_credential<P: Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> rusqlite::Result<Option<Credential>> {
    conn.query_row(
        &format!("{} WHERE {}", SELECT_CREDENTIAL, filter),
        params,
        row_to_credential,
    )
    .optional()
}

/// Decide the outcome for a credential whose fingerprint or transaction is
/// already present. `None` means neither is stored.
fn existing_outcome(conn: &Connection, credential: &Credential) -> Result<Option<InsertResult>> {
    if let Some(existing) = query_credential(
        conn,
        "c.fingerprint = ?1",
        params![credential.fingerprint.to_hex()],
    )? {
        return Ok(Some(classify_existing(credential, existing)));
    }

    if let Some(existing) = query_credential(
        conn,
        "c.ledger_tx_hash = ?1",
        params![credential.ledger_reference.tx_hash],
    )? {
        return Ok(Some(InsertResult::ReferenceInUse { existing }));
    }

    Ok(None)
}

fn write_rows(conn: &Connection, credential: &Credential) -> rusqlite::Result<()> {
    let internal_id = credential.internal_id.to_string();

    conn.execute(
        "INSERT INTO credentials (
            internal_id, public_id, fingerprint, content_locator, content_url,
            ledger_tx_hash, ledger_block, ledger_url, owner, issued_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            internal_id,
            credential.public_id.as_str(),
            credential.fingerprint.to_hex(),
            credential.content_locator.as_str(),
            credential.content_url,
            credential.ledger_reference.tx_hash,
            credential.ledger_reference.block_number as i64,
            credential.ledger_url,
            credential.owner,
            credential.issued_at,
        ],
    )?;

    let meta = &credential.metadata;
    conn.execute(
        "INSERT INTO credential_metadata (
            credential_id, first_name, last_name, email, university, faculty,
            department, graduation_year, student_number, nationality
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            internal_id,
            meta.first_name,
            meta.last_name,
            meta.email,
            meta.university,
            meta.faculty,
            meta.department,
            meta.graduation_year,
            meta.student_number,
            meta.nationality,
        ],
    )?;

    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn insert_credential(&self, credential: &Credential) -> Result<InsertResult> {
        let credential = credential.clone();

        self.blocking(move |conn| {
            // Take the write lock up front so a second handle on the same
            // file waits here and then sees the winner in the checks below.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if let Some(outcome) = existing_outcome(&tx, &credential)? {
                return Ok(outcome);
            }

            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM credentials WHERE public_id = ?1)",
                params![credential.public_id.as_str()],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::PublicIdTaken(credential.public_id.to_string()));
            }

            match write_rows(&tx, &credential) {
                Ok(()) => {
                    tx.commit()?;
                    tracing::debug!(
                        public_id = %credential.public_id,
                        fingerprint = %credential.fingerprint,
                        "credential committed"
                    );
                    Ok(InsertResult::Inserted)
                }
                Err(e) if is_constraint_violation(&e) => {
                    // Another writer on the same file won the race; the
                    // transaction rolls back on drop.
                    drop(tx);
                    match existing_outcome(conn, &credential)? {
                        Some(outcome) => Ok(outcome),
                        None => Err(StoreError::PublicIdTaken(credential.public_id.to_string())),
                    }
                }
                Err(e) => Err(StoreError::WriteFailed(e.to_string())),
            }
        })
        .await
    }

    async fn get_by_public_id(&self, public_id: &PublicId) -> Result<Option<Credential>> {
        let public_id = public_id.clone();

        self.blocking(move |conn| {
            query_credential(conn, "c.public_id = ?1", params![public_id.as_str()])
                .map_err(StoreError::from)
        })
        .await
    }

    async fn get_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<Credential>> {
        let fingerprint = *fingerprint;

        self.blocking(move |conn| {
            query_credential(conn, "c.fingerprint = ?1", params![fingerprint.to_hex()])
                .map_err(StoreError::from)
        })
        .await
    }

    async fn fingerprint_by_ledger_tx(&self, tx_hash: &str) -> Result<Option<Fingerprint>> {
        let tx_hash = tx_hash.trim().to_ascii_lowercase();

        self.blocking(move |conn| {
            let hex: Option<String> = conn
                .query_row(
                    "SELECT fingerprint FROM credentials WHERE ledger_tx_hash = ?1",
                    params![tx_hash],
                    |row| row.get(0),
                )
                .optional()?;

            hex.map(|h| Fingerprint::from_hex(&h))
                .transpose()
                .map_err(|e| StoreError::InvalidData(e.to_string()))
        })
        .await
    }

    async fn fingerprint_by_content_locator(
        &self,
        locator: &ContentLocator,
    ) -> Result<Option<Fingerprint>> {
        let locator = locator.clone();

        self.blocking(move |conn| {
            let hex: Option<String> = conn
                .query_row(
                    "SELECT fingerprint FROM credentials WHERE content_locator = ?1",
                    params![locator.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            hex.map(|h| Fingerprint::from_hex(&h))
                .transpose()
                .map_err(|e| StoreError::InvalidData(e.to_string()))
        })
        .await
    }

    async fn list_credentials(&self, limit: Option<usize>) -> Result<Vec<Credential>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} ORDER BY c.issued_at DESC, c.internal_id DESC LIMIT ?1",
                SELECT_CREDENTIAL
            ))?;

            let credentials = stmt
                .query_map(params![limit], row_to_credential)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(credentials)
        })
        .await
    }

    async fn count_credentials(&self) -> Result<u64> {
        self.blocking(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM credentials", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}
