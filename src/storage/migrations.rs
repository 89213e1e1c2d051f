use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema scripts in order; entry `n` upgrades `user_version` from `n` to
/// `n + 1`.
const MIGRATIONS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

fn latest_version() -> i32 {
    MIGRATIONS.len() as i32
}

/// Brings the store up to the latest schema in a single transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let found: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read storage schema version")?;
    let latest = latest_version();

    if found > latest {
        bail!("storage schema v{found} was written by a newer client (this build knows v{latest})");
    }
    if found == latest {
        return Ok(());
    }

    let tx = conn.transaction().context("failed to begin storage migration")?;
    for (name, script) in &MIGRATIONS[found as usize..] {
        tx.execute_batch(script)
            .with_context(|| format!("failed to apply {name}"))?;
    }
    tx.pragma_update(None, "user_version", latest)
        .context("failed to record storage schema version")?;
    tx.commit().context("failed to commit storage migration")
}
