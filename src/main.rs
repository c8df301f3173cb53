use anyhow::Result;
use assetgraph::api::HttpApiServer;
use assetgraph::db::{migrate, Db};
use assetgraph::{AssetGraph, Config};
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "assetgraph")]
#[command(version, about = "Asset-entity ownership and relationship graph")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve,
    /// Apply migrations and verify the database schema (default)
    Verify,
    /// Print the relationships reachable from an entity as JSON
    Traverse {
        /// Entity to start from
        entity_id: Uuid,

        /// Number of BFS rounds (defaults to graph.default_traversal_depth)
        #[arg(short, long)]
        depth: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.assetgraph.log_level.as_str())
    ).init();

    let db = open_database(&config).await?;

    match args.command.unwrap_or(Command::Verify) {
        Command::Serve => {
            log::info!("Starting AssetGraph HTTP server v{}", env!("CARGO_PKG_VERSION"));
            let server = HttpApiServer::new(AssetGraph::new(db), config);
            server.run().await?;
        }
        Command::Verify => {
            verify_database_schema(&db).await?;
        }
        Command::Traverse { entity_id, depth } => {
            let depth = depth.unwrap_or(config.graph.default_traversal_depth);
            if depth > config.graph.max_traversal_depth {
                anyhow::bail!(
                    "depth {} exceeds graph.max_traversal_depth ({})",
                    depth,
                    config.graph.max_traversal_depth
                );
            }
            let edges = AssetGraph::new(db).traverse_relationships(entity_id, depth).await?;
            log::info!("{} relationship(s) within {} round(s) of {}", edges.len(), depth, entity_id);
            println!("{}", serde_json::to_string_pretty(&edges)?);
        }
    }

    Ok(())
}

/// Open the configured database and bring its schema up to date
async fn open_database(config: &Config) -> Result<Db> {
    log::info!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| {
        migrate::run_migrations(conn, &migrations_dir)
    }).await?;

    log::info!("Database initialized successfully");
    Ok(db)
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    use assetgraph::AssetGraphError;

    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = [
            "asset_entities",
            "asset_ownerships",
            "assets",
            "entity_positions",
            "relationships",
            "schema_migrations",
        ];
        let mut all_tables_exist = true;

        for table in &expected_tables {
            if !tables.iter().any(|t| t == table) {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            } else {
                log::debug!("✓ Table exists: {}", table);
            }
        }

        if !all_tables_exist {
            return Err(AssetGraphError::Config("Not all required tables exist".to_string()));
        }

        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%' ORDER BY name")?;
        let indexes: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        // The pair index is what rejects a second edge between the same two entities.
        if !indexes.iter().any(|i| i == "idx_relationships_unordered_pair") {
            return Err(AssetGraphError::Config(
                "Unique index idx_relationships_unordered_pair does not exist".to_string(),
            ));
        }

        for index_name in ["idx_relationships_source", "idx_relationships_target"] {
            if indexes.iter().any(|i| i == index_name) {
                log::debug!("✓ Index exists: {}", index_name);
            } else {
                log::warn!("Traversal index not found: {}", index_name);
            }
        }

        let applied = migrate::get_applied_migrations(conn)?;
        log::debug!("✓ {} migrations applied", applied.len());

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(AssetGraphError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(AssetGraphError::Config("Foreign keys not enabled".to_string()));
        }
        log::debug!("✓ Foreign keys enabled");

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(AssetGraphError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
