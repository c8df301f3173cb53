use rusqlite::{Connection, params};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use crate::error::{Result, AssetGraphError};

/// One numbered `.sql` file under the migrations directory.
#[derive(Debug)]
struct Migration {
    version: u32,
    name: String,
    sql: String,
}

impl Migration {
    /// Parse `NNN_description.sql`. Files without the `.sql` extension yield `None`.
    fn from_path(path: &Path) -> Result<Option<Self>> {
        if path.extension().and_then(|s| s.to_str()) != Some("sql") {
            return Ok(None);
        }
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AssetGraphError::Config(format!("Invalid migration filename: {}", path.display())))?
            .to_string();
        let version = name
            .split_once('_')
            .and_then(|(prefix, _)| prefix.parse::<u32>().ok())
            .ok_or_else(|| AssetGraphError::Config(format!(
                "Migration {} must be named <version>_<description>.sql",
                name
            )))?;
        let sql = fs::read_to_string(path)?;
        Ok(Some(Self { version, name, sql }))
    }
}

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )?;
    Ok(())
}

/// Names of applied migrations, in version order
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

fn applied_versions(conn: &Connection) -> Result<BTreeSet<u32>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
    let versions = stmt
        .query_map([], |row| row.get::<_, u32>(0))?
        .collect::<std::result::Result<BTreeSet<_>, rusqlite::Error>>()?;
    Ok(versions)
}

/// Read every migration in `migrations_dir`, ordered by version.
/// Two files sharing a version number are rejected.
fn load_migrations(migrations_dir: &Path) -> Result<Vec<Migration>> {
    let entries = fs::read_dir(migrations_dir).map_err(|e| {
        AssetGraphError::Config(format!(
            "Cannot read migrations directory {}: {}",
            migrations_dir.display(),
            e
        ))
    })?;

    let mut by_version: BTreeMap<u32, Migration> = BTreeMap::new();
    for entry in entries {
        let Some(migration) = Migration::from_path(&entry?.path())? else {
            continue;
        };
        if let Some(existing) = by_version.get(&migration.version) {
            return Err(AssetGraphError::Config(format!(
                "Migrations {} and {} share version {}",
                existing.name, migration.name, migration.version
            )));
        }
        by_version.insert(migration.version, migration);
    }

    Ok(by_version.into_values().collect())
}

/// Apply pending migrations in version order, each in its own transaction.
/// A failing migration rolls back alone; earlier ones stay applied.
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = applied_versions(conn)?;
    let pending: Vec<Migration> = load_migrations(migrations_dir)?
        .into_iter()
        .filter(|m| !applied.contains(&m.version))
        .collect();

    if pending.is_empty() {
        log::debug!("Schema up to date ({} migrations applied)", applied.len());
        return Ok(());
    }

    for migration in pending {
        log::info!("Applying migration {}", migration.name);

        let tx = conn.transaction()?;
        if let Err(e) = tx.execute_batch(&migration.sql) {
            log::error!("Migration {} failed: {}", migration.name, e);
            return Err(e.into());
        }
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
    }

    log::info!("All migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use std::fs;

    fn project_migrations() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    }

    fn list(conn: &Connection, sql: &str) -> Vec<String> {
        conn.prepare(sql)
            .unwrap()
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .unwrap()
    }

    #[test]
    fn test_migration_tracking() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        ensure_migrations_table(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![1, "001_test"],
        ).unwrap();

        let applied = get_applied_migrations(&conn).unwrap();
        assert!(applied.contains(&"001_test".to_string()));
    }

    #[test]
    fn test_load_migrations_sorted_by_version() {
        let temp_dir = TempDir::new().unwrap();
        let migrations_dir = temp_dir.path().join("migrations");
        fs::create_dir(&migrations_dir).unwrap();

        fs::write(migrations_dir.join("002_another.sql"), "CREATE TABLE another (id INTEGER);").unwrap();
        fs::write(migrations_dir.join("001_test.sql"), "CREATE TABLE test (id INTEGER);").unwrap();
        fs::write(migrations_dir.join("README.md"), "not a migration").unwrap();

        let migrations = load_migrations(&migrations_dir).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].version, 1);
        assert_eq!(migrations[1].version, 2);
    }

    #[test]
    fn test_missing_migrations_dir() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_migrations(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(AssetGraphError::Config(_))));
    }

    #[test]
    fn test_rerun_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        run_migrations(&mut conn, &project_migrations()).unwrap();
        let first = get_applied_migrations(&conn).unwrap();
        run_migrations(&mut conn, &project_migrations()).unwrap();
        assert_eq!(first, get_applied_migrations(&conn).unwrap());
    }

    #[test]
    fn test_full_migration_schema() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        run_migrations(&mut conn, &project_migrations()).unwrap();

        let tables = list(&conn, "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name");
        for expected in [
            "asset_entities",
            "asset_ownerships",
            "assets",
            "entity_positions",
            "relationships",
            "schema_migrations",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
        }

        let indexes = list(&conn, "SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'");
        assert!(indexes.contains(&"idx_relationships_source".to_string()));
        assert!(indexes.contains(&"idx_relationships_target".to_string()));
        assert!(indexes.contains(&"idx_relationships_unordered_pair".to_string()));
    }

    #[test]
    fn test_duplicate_versions_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let migrations_dir = temp_dir.path().join("migrations");
        fs::create_dir(&migrations_dir).unwrap();
        fs::write(migrations_dir.join("001_a.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
        fs::write(migrations_dir.join("001_b.sql"), "CREATE TABLE b (id INTEGER);").unwrap();

        let err = load_migrations(&migrations_dir).unwrap_err();
        assert!(err.to_string().contains("share version 1"));
    }

    #[test]
    fn test_unnumbered_sql_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let migrations_dir = temp_dir.path().join("migrations");
        fs::create_dir(&migrations_dir).unwrap();
        fs::write(migrations_dir.join("schema.sql"), "CREATE TABLE a (id INTEGER);").unwrap();

        assert!(matches!(load_migrations(&migrations_dir), Err(AssetGraphError::Config(_))));
    }

    #[test]
    fn test_failed_migration_rolls_back_alone() {
        let temp_dir = TempDir::new().unwrap();
        let migrations_dir = temp_dir.path().join("migrations");
        fs::create_dir(&migrations_dir).unwrap();
        fs::write(migrations_dir.join("001_ok.sql"), "CREATE TABLE ok (id INTEGER);").unwrap();
        fs::write(
            migrations_dir.join("002_broken.sql"),
            "CREATE TABLE half (id INTEGER); CREATE TABLE;",
        )
        .unwrap();

        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        assert!(matches!(
            run_migrations(&mut conn, &migrations_dir),
            Err(AssetGraphError::Database(_))
        ));

        assert_eq!(get_applied_migrations(&conn).unwrap(), vec!["001_ok".to_string()]);
        let tables = list(&conn, "SELECT name FROM sqlite_master WHERE type='table'");
        assert!(tables.contains(&"ok".to_string()));
        assert!(!tables.contains(&"half".to_string()));
    }
}
