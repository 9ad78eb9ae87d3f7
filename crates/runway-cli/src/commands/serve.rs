//! Server command implementation

use std::path::Path;

use anyhow::Result;
use runway_core::RunwayConfig;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    mut config: RunwayConfig,
    host: Option<String>,
    port: Option<u16>,
    no_encrypt: bool,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("🚀 Starting Runway web server...");
    println!("   Database: {}", db_path.display());
    println!(
        "   Listening: http://{}:{}",
        config.server.host, config.server.port
    );
    println!("   Default owner: {}", config.owner);

    let interval = config.scheduler.auto_close_interval_minutes;
    if interval == 0 {
        println!("   Invoice auto-close: DISABLED");
    } else {
        println!("   ⏱️  Invoice auto-close: every {} minutes", interval);
    }
    if !config.server.allowed_origins.is_empty() {
        println!(
            "   🌐 Allowed origins: {}",
            config.server.allowed_origins.join(", ")
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    runway_server::serve(db, config).await
}
