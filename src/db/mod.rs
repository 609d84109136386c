// SPDX-License-Identifier: MIT

//! SQLite connection pooling, embedded migrations, and repositories.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

pub mod sessions;
pub mod strava;
pub mod users;
pub mod visits;
pub mod zones;

pub use sessions::SessionRepo;
pub use strava::StravaRepo;
pub use users::UserRepo;
pub use visits::VisitRepo;
pub use zones::ZoneRepo;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

pub fn create_pool(database_url: &str) -> Result<DbPool, r2d2::Error> {
    let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
    // Remove query parameters (e.g., ?mode=rwc)
    let path = path.split('?').next().unwrap_or(path);

    let manager = if path == ":memory:" {
        SqliteConnectionManager::memory()
    } else {
        SqliteConnectionManager::file(Path::new(path))
    };

    Pool::builder().max_size(5).build(manager)
}

pub fn create_memory_pool() -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::memory();
    Pool::builder().max_size(1).build(manager)
}

/// All migrations in order, each as (filename, sql_content)
pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_schema.sql",
        include_str!("../../migrations/001_schema.sql"),
    ),
    (
        "002_seed_disciplines.sql",
        include_str!("../../migrations/002_seed_disciplines.sql"),
    ),
];

/// Run all pending migrations on the database pool.
///
/// Applied migrations are tracked in a `_migrations` table so each one
/// only runs once.
pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    tracing::info!("Running migrations...");

    let conn = pool.get()?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    for (filename, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?",
                [filename],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if already_applied {
            tracing::debug!("Skipping already applied migration: {}", filename);
            continue;
        }

        tracing::info!("Running migration: {}", filename);

        conn.execute_batch(sql)?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?)", [filename])?;
    }

    tracing::info!("Migrations completed");
    Ok(())
}

/// All repositories bundled together for handler state.
#[derive(Clone)]
pub struct Database {
    pub users: UserRepo,
    pub sessions: SessionRepo,
    pub visits: VisitRepo,
    pub zones: ZoneRepo,
    pub strava: StravaRepo,
}

impl Database {
    pub fn new(pool: DbPool) -> Self {
        Self {
            users: UserRepo::new(pool.clone()),
            sessions: SessionRepo::new(pool.clone()),
            visits: VisitRepo::new(pool.clone()),
            zones: ZoneRepo::new(pool.clone()),
            strava: StravaRepo::new(pool),
        }
    }
}

/// In-memory database with all migrations applied, for tests.
pub fn create_test_database() -> Database {
    let pool = create_memory_pool().expect("memory pool");
    run_migrations(&pool).expect("migrations");
    Database::new(pool)
}
