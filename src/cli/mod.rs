pub mod ask;
pub mod clear;
pub mod ingest;
pub mod memories;
pub mod stats;

use anyhow::{bail, Result};
use rusqlite::Connection;
use std::io::Write;
use std::sync::{Arc, Mutex};

use mem42::config::Mem42Config;
use mem42::store::{self, VectorStore};

/// Open the database and vector store without creating an API client.
///
/// Commands that never call the hosted API use this, so they work without a key.
pub fn open_store(config: &Mem42Config) -> Result<(Arc<Mutex<Connection>>, Arc<dyn VectorStore>)> {
    let conn = mem42::db::open_database(config.resolved_db_path())?;
    let db = Arc::new(Mutex::new(conn));
    let store = store::create_store(config, Arc::clone(&db))?;
    Ok((db, store))
}

/// Ask the user to type YES. Anything else cancels the command.
pub fn confirm(warning: &str, cancelled: &str) -> Result<()> {
    println!("WARNING: {warning}");
    print!("\nType YES to confirm: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim() != "YES" {
        bail!("{cancelled}");
    }
    Ok(())
}
