//! Schema versions of the `entities` store.
//!
//! Each step is an embedded SQL script keyed by the `PRAGMA user_version`
//! it leaves behind. Pending steps run in one transaction; a database
//! written by a newer binary is refused rather than downgraded.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// `(user_version after the script, script)`, ascending.
const STEPS: &[(u32, &str)] = &[
    (1, include_str!("0001_init.sql")),
    (2, include_str!("0002_type_index.sql")),
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _)| *version)
}

/// Upgrades `conn` to `latest_version()`.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = stored_version(conn)?;
    let to = latest_version();
    if from == to {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in STEPS.iter().filter(|(version, _)| *version > from) {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        from, to
    );
    Ok(())
}

/// Fails unless `conn` already sits at `latest_version()`.
pub fn ensure_schema_ready(conn: &Connection) -> DbResult<()> {
    let db_version = stored_version(conn)?;
    let required = latest_version();
    if db_version < required {
        return Err(DbError::SchemaNotReady {
            db_version,
            required,
        });
    }
    Ok(())
}

/// Reads `user_version`, refusing schemas newer than this binary.
fn stored_version(conn: &Connection) -> DbResult<u32> {
    let db_version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let latest_supported = latest_version();
    if db_version > latest_supported {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        });
    }
    Ok(db_version)
}
