//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `open_engine` - Engine over an opened database
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use runway_core::{Database, EngineSettings, Engine, EventBus, Store};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Arc<Database>> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    let db = if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")?
    } else {
        Database::new(path_str).context("Failed to open database")?
    };
    Ok(Arc::new(db))
}

/// Engine over `db` with its own change bus
pub fn open_engine(db: Arc<Database>, settings: &EngineSettings) -> Engine {
    let store: Arc<dyn Store> = db;
    Engine::new(store, EventBus::new(), settings.clone())
}

/// Today in local time
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool, owner: &str) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    // Opening runs the migrations
    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }
    println!("   Owner: {}", owner);

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Add an account: runway accounts add Checking --opening 1500");
    println!("  2. Add a rule: runway rules add Rent -a 1200 -k expense --account 1 --day 5 --start 2024-01-01");
    println!("  3. See the month: runway month");

    Ok(())
}
