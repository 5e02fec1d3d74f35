/// Schema migrations
///
/// The applied version lives in `PRAGMA user_version`. It only moves when the
/// set of tables or indexes changes.

use crate::error::{Result, SoundboardError};
use sqlx::SqlitePool;
use tracing::info;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_init.sql"),
}];

/// Latest schema version this build knows about
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Read the schema version stored in the database
pub async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Apply every pending migration in one transaction
///
/// Returns the schema version after the call.
pub async fn apply_migrations(pool: &SqlitePool) -> Result<i64> {
    let current = current_version(pool).await?;
    let latest = latest_version();

    if current > latest {
        return Err(SoundboardError::SchemaTooNew {
            found: current,
            supported: latest,
        });
    }

    if current == latest {
        return Ok(current);
    }

    let mut tx = pool.begin().await?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }

        // sqlx runs one statement per query, so split the script up
        for statement in statements(migration.sql) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        let pragma = format!("PRAGMA user_version = {}", migration.version);
        sqlx::query(&pragma).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!(from = current, to = latest, "schema migrated");
    Ok(latest)
}

fn statements(script: &str) -> impl Iterator<Item = &str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_increasing() {
        let mut last = 0;
        for migration in MIGRATIONS {
            assert!(migration.version > last);
            last = migration.version;
        }
        assert_eq!(latest_version(), last);
    }

    #[test]
    fn test_init_script_splits_into_three_statements() {
        let parts: Vec<&str> = statements(MIGRATIONS[0].sql).collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[2].starts_with("CREATE INDEX"));
    }
}
