//! SQLite implementation of `RequestRepository`.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema
//! version. When the schema needs to change, increment
//! `CURRENT_SCHEMA_VERSION` and add a migration in `run_migrations()`.
//! Migrations run sequentially from the current version to the target
//! version.
//!
//! # Atomicity
//!
//! The decision transition is a single conditional `UPDATE` whose
//! `WHERE` clause re-checks both the `PENDING` status and the decision
//! token. The follow-up classification read runs under the same
//! connection lock, so a losing caller always observes the committed
//! terminal state.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{error, warn};

use greenlight_core::{Decision, DecisionToken, Request, RequestId, RequestStatus};

use super::{DecideOutcome, RepositoryError, RequestRepository};

/// Current schema version. Increment this when making schema changes and
/// add corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed request repository.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite
/// operations without blocking the async runtime.
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Create a new SQLite repository at the given path.
    ///
    /// Creates the database file and schema if they don't exist, and
    /// runs any pending migrations if the database has an older schema.
    ///
    /// # Durability
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` for maximum durability
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();

        // Ensure parent directory exists (unless it's :memory: or empty path)
        let path_str = path_ref.to_string_lossy().to_string();
        if path_str != ":memory:" && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        // Restrict access to the database file: it holds decision tokens.
        #[cfg(unix)]
        if path_str != ":memory:" && !path_str.is_empty() {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path_ref, permissions) {
                warn!(
                    "Failed to set restrictive permissions on database file: {}",
                    e
                );
            }
        }

        // We must verify WAL mode was actually enabled - SQLite can
        // silently keep DELETE mode on some filesystems (e.g., network
        // filesystems that don't support shared memory), which would
        // violate our durability/concurrency assumptions. In-memory
        // databases report "memory", which is expected.
        let is_in_memory = path_str == ":memory:";
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));

        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'. \
                     This can happen on filesystems that don't support shared memory. \
                     The database requires WAL mode for durability and concurrency \
                     guarantees.",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        // Create schema version table if it doesn't exist
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create schema_version table", e.to_string()))?;

        // Get current version (0 if table is empty = fresh database)
        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        // Migration from version 0 (fresh database) to version 1
        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS requests (
                    request_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    course TEXT NOT NULL,
                    cost REAL NOT NULL,
                    status TEXT NOT NULL,
                    decision_token TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    decided_at TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_requests_pending
                    ON requests(status) WHERE status = 'PENDING';
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Create a new in-memory SQLite repository (for testing).
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }
}

// =============================================================================
// Row conversion helpers
// =============================================================================

/// Parse an RFC 3339 timestamp stored as TEXT.
fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RepositoryError::corruption(format!("{} timestamp '{}'", column, value)))
}

/// Build a `Request` from a full row of the `requests` table.
///
/// Column order: request_id, name, course, cost, status, decision_token,
/// created_at, decided_at.
fn request_from_row(row: &Row<'_>) -> rusqlite::Result<RawRequestRow> {
    Ok(RawRequestRow {
        request_id: row.get(0)?,
        name: row.get(1)?,
        course: row.get(2)?,
        cost: row.get(3)?,
        status: row.get(4)?,
        decision_token: row.get(5)?,
        created_at: row.get(6)?,
        decided_at: row.get(7)?,
    })
}

/// Untyped row contents, decoded into a `Request` outside the rusqlite
/// callback so decode failures map to `RepositoryError::Corruption`
/// rather than a storage error.
struct RawRequestRow {
    request_id: String,
    name: String,
    course: String,
    cost: f64,
    status: String,
    decision_token: String,
    created_at: String,
    decided_at: Option<String>,
}

impl RawRequestRow {
    fn decode(self) -> Result<Request, RepositoryError> {
        let status: RequestStatus = self
            .status
            .parse()
            .map_err(|_| RepositoryError::corruption(format!("status '{}'", self.status)))?;
        let created_at = parse_timestamp(&self.created_at, "created_at")?;
        let decided_at = self
            .decided_at
            .as_deref()
            .map(|v| parse_timestamp(v, "decided_at"))
            .transpose()?;

        Ok(Request {
            id: RequestId(self.request_id),
            name: self.name,
            course: self.course,
            cost: self.cost,
            status,
            decision_token: DecisionToken(self.decision_token),
            created_at,
            decided_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "request_id, name, course, cost, status, decision_token, created_at, decided_at";

// =============================================================================
// RequestRepository trait implementation
// =============================================================================

#[async_trait]
impl RequestRepository for SqliteRepository {
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError> {
        let conn = self.conn.clone();
        let request = request.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            conn.execute(
                "INSERT INTO requests (request_id, name, course, cost, status,
                                       decision_token, created_at, decided_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    request.id.0,
                    request.name,
                    request.course,
                    request.cost,
                    request.status.as_str(),
                    request.decision_token.0,
                    request.created_at.to_rfc3339(),
                    request.decided_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .map_err(|e| RepositoryError::storage("insert", e.to_string()))?;

            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::storage("insert", e.to_string()))?
    }

    async fn get(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let conn = self.conn.clone();
        let id = id.0.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let raw = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM requests WHERE request_id = ?1",
                        SELECT_COLUMNS
                    ),
                    params![id],
                    request_from_row,
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get", e.to_string()))?;

            raw.map(RawRequestRow::decode).transpose()
        })
        .await
        .map_err(|e| RepositoryError::storage("get", e.to_string()))?
    }

    async fn decide(
        &self,
        id: &RequestId,
        token: &DecisionToken,
        decision: Decision,
        decided_at: DateTime<Utc>,
    ) -> Result<DecideOutcome, RepositoryError> {
        let conn = self.conn.clone();
        let id = id.0.clone();
        let token = token.0.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            // The conditional write: status check, token check, and
            // terminal write in one statement. Concurrent callers are
            // serialized by SQLite; at most one sees rows_changed == 1.
            let updated = conn
                .execute(
                    "UPDATE requests SET status = ?1, decided_at = ?2
                     WHERE request_id = ?3 AND decision_token = ?4 AND status = 'PENDING'",
                    params![
                        decision.terminal_status().as_str(),
                        decided_at.to_rfc3339(),
                        id,
                        token,
                    ],
                )
                .map_err(|e| RepositoryError::storage("decide", e.to_string()))?;

            // Classify the outcome from the row as it now stands. Still
            // under the same connection lock, so a loser reads the
            // winner's committed state.
            let raw = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM requests WHERE request_id = ?1",
                        SELECT_COLUMNS
                    ),
                    params![id],
                    request_from_row,
                )
                .optional()
                .map_err(|e| RepositoryError::storage("decide", e.to_string()))?;

            let request = match raw {
                Some(raw) => raw.decode()?,
                None => {
                    if updated > 0 {
                        // Updated a row that then vanished: records are
                        // never deleted, so this is corruption.
                        error!("Decided request {} disappeared mid-transition", id);
                        return Err(RepositoryError::corruption(format!(
                            "request {} missing after decision write",
                            id
                        )));
                    }
                    return Ok(DecideOutcome::NotFound);
                }
            };

            if updated > 0 {
                return Ok(DecideOutcome::Applied(request));
            }

            if request.status.is_terminal() {
                Ok(DecideOutcome::AlreadyDecided(request.status))
            } else {
                Ok(DecideOutcome::TokenMismatch)
            }
        })
        .await
        .map_err(|e| RepositoryError::storage("decide", e.to_string()))?
    }

    async fn list(&self) -> Result<Vec<Request>, RepositoryError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM requests ORDER BY created_at DESC, request_id",
                    SELECT_COLUMNS
                ))
                .map_err(|e| RepositoryError::storage("list", e.to_string()))?;

            let rows = stmt
                .query_map([], request_from_row)
                .map_err(|e| RepositoryError::storage("list", e.to_string()))?;

            let mut results = Vec::new();
            for row in rows {
                let raw = match row {
                    Ok(raw) => raw,
                    Err(e) => {
                        error!("Failed to read request row from SQLite: {}", e);
                        continue;
                    }
                };

                // Skip rows that fail to decode so the listing still
                // shows valid requests even if one row is corrupt. Log
                // the error for investigation.
                match raw.decode() {
                    Ok(request) => results.push(request),
                    Err(e) => {
                        warn!("Skipping corrupt request row: {}", e);
                        continue;
                    }
                }
            }

            Ok(results)
        })
        .await
        .map_err(|e| RepositoryError::storage("list", e.to_string()))?
    }
}
