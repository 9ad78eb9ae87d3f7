//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `reference` - Accounts, cards and categories
//! - `rules` - Recurring rules and their amount revisions
//! - `ledger` - Ledger entry CRUD
//! - `ledger_filter` - Dynamic WHERE clause builder for ledger queries
//! - `invoices` - Card invoice lifecycle
//! - `totals` - Period aggregates for indicators
//!
//! Amounts are stored as TEXT so decimals round-trip exactly; dates as
//! `YYYY-MM-DD`; periods as `YYYY-MM`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Error, Result};

mod invoices;
mod ledger;
mod ledger_filter;
mod reference;
mod rules;
mod totals;

pub use ledger_filter::{FilterResult, LedgerFilter, TargetKind};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "RUNWAY_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"runway-salt-v1-f";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a timestamp the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

/// Read a TEXT column holding a decimal amount
pub(crate) fn get_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

pub(crate) fn get_opt_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Read a TEXT column through the type's `FromStr`
pub(crate) fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let s: String = row.get(idx)?;
    s.parse::<T>()
        .map_err(|e| conversion_error(idx, e.to_string()))
}

/// Whether a rusqlite error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `RUNWAY_DB_KEY` to be set. The database is encrypted with
    /// SQLCipher using a key derived from the passphrase via Argon2.
    /// Use `new_unencrypted()` for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let key_pragma = match passphrase {
            Some(pass) => format!("PRAGMA key = 'x\"{}\"';", derive_key(pass)?),
            None => String::new(),
        };

        // Key must be set first on every new connection; foreign keys are per connection
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if !key_pragma.is_empty() {
                conn.execute_batch(&key_pragma)?;
            }
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "runway_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        // Remove any leftover file from an earlier run
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Bank accounts
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                opening_balance TEXT NOT NULL DEFAULT '0',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(owner, name)
            );

            -- Credit cards
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                closing_day INTEGER NOT NULL CHECK (closing_day BETWEEN 1 AND 31),
                due_day INTEGER NOT NULL CHECK (due_day BETWEEN 1 AND 31),
                payment_account_id INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(owner, name)
            );

            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                UNIQUE(owner, name)
            );

            -- Recurring rules: exactly one of account_id/card_id is set
            CREATE TABLE IF NOT EXISTS recurring_rules (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                description TEXT NOT NULL,
                amount TEXT NOT NULL,
                kind TEXT NOT NULL,                        -- income, expense, card_expense
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                account_id INTEGER REFERENCES accounts(id),
                card_id INTEGER REFERENCES cards(id),
                day_of_month INTEGER NOT NULL CHECK (day_of_month BETWEEN 1 AND 31),
                start_date DATE NOT NULL,
                end_date DATE,
                active BOOLEAN NOT NULL DEFAULT 1,
                note TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                CHECK ((account_id IS NULL) <> (card_id IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_rules_owner ON recurring_rules(owner, active);

            -- From-now-on amount changes; months before effective_from use previous_amount
            CREATE TABLE IF NOT EXISTS rule_amount_revisions (
                id INTEGER PRIMARY KEY,
                rule_id INTEGER NOT NULL REFERENCES recurring_rules(id) ON DELETE CASCADE,
                effective_from TEXT NOT NULL,              -- YYYY-MM
                previous_amount TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(rule_id, effective_from)
            );

            -- Card invoices (one per card per month)
            CREATE TABLE IF NOT EXISTS invoices (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                period_key TEXT NOT NULL,                  -- YYYY-MM
                window_start DATE NOT NULL,                -- previous closing date, exclusive
                closing_date DATE NOT NULL,
                due_date DATE NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',       -- open, closed, paid
                total TEXT NOT NULL DEFAULT '0',
                closed_at DATETIME,
                paid_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(card_id, period_key)
            );

            CREATE INDEX IF NOT EXISTS idx_invoices_owner_status ON invoices(owner, status);
            CREATE INDEX IF NOT EXISTS idx_invoices_due ON invoices(due_date);

            -- Ledger entries (real transactions)
            CREATE TABLE IF NOT EXISTS ledger_entries (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                description TEXT NOT NULL,
                amount TEXT NOT NULL,
                date DATE NOT NULL,
                period_key TEXT NOT NULL,                  -- YYYY-MM of date
                kind TEXT NOT NULL,
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                account_id INTEGER REFERENCES accounts(id),
                card_id INTEGER REFERENCES cards(id),
                status TEXT NOT NULL,                      -- pending, confirmed
                origin TEXT NOT NULL,                      -- manual, recurring, recurring_adjustment, recurring_skip, invoice
                rule_id INTEGER REFERENCES recurring_rules(id) ON DELETE SET NULL,
                installment_index INTEGER,
                installment_total INTEGER,
                installment_group TEXT,
                invoice_id INTEGER REFERENCES invoices(id) ON DELETE SET NULL,
                note TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                CHECK ((account_id IS NULL) <> (card_id IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_owner_date ON ledger_entries(owner, date);
            CREATE INDEX IF NOT EXISTS idx_ledger_card ON ledger_entries(card_id, date);
            CREATE INDEX IF NOT EXISTS idx_ledger_invoice ON ledger_entries(invoice_id);

            -- At most one realization of a rule per month
            CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_one_realization
                ON ledger_entries(rule_id, period_key)
                WHERE rule_id IS NOT NULL
                  AND origin IN ('recurring', 'recurring_adjustment', 'recurring_skip');
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
