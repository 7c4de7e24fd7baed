use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Ordered `(version, sql)` steps; a database at `user_version = n` applies
/// every step above `n`.
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("schemas/schema_v1.sql"))];

const CURRENT_SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let installed: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if installed > CURRENT_SCHEMA_VERSION {
        bail!(
            "progress database is at schema {installed}, newer than supported {CURRENT_SCHEMA_VERSION}"
        );
    }

    let pending: Vec<_> = MIGRATIONS
        .iter()
        .filter(|(version, _)| *version > installed)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (version, sql) in pending {
        tx.execute_batch(sql)
            .with_context(|| format!("migration to schema {version} failed"))?;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}
