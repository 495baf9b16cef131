use anyhow::{Result, anyhow};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

pub mod models;
pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// One short-lived connection per operation; sqlite keeps this cheap.
pub fn establish_connection() -> Result<SqliteConnection> {
    let url = crate::env::read_database_url();
    SqliteConnection::establish(&url).map_err(|e| anyhow!("failed to open database {url}: {e}"))
}

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("running migrations: {e}"))?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
    conn.run_pending_migrations(MIGRATIONS).expect("migrations");
    conn
}
