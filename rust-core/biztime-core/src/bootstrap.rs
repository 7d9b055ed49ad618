//! # Schema Bootstrapper
//!
//! Runs once at startup and leaves a ready [`DatabasePool`] behind:
//!
//! 1. make sure the target database exists (created through the `postgres`
//!    administrative database, or as a new file for SQLite)
//! 2. list the tables already present
//! 3. create `companies` / `invoices` when missing, seeding demo rows outside
//!    test mode
//! 4. open the long-lived pool and check connectivity
//!
//! Any failure is fatal and reported as [`Error::Bootstrap`]. A second run
//! against a correct schema only performs the checks.

use crate::config::{AppConfig, Mode};
use crate::database::DatabasePool;
use crate::error::{Error, Result};
use crate::with_pool;
use chrono::NaiveDate;
use sqlx::postgres::PgConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, error, info};

/// Tables the application needs, in creation order
pub const REQUIRED_TABLES: [&str; 2] = ["companies", "invoices"];

/// Administrative database used for the existence check
const ADMIN_DATABASE: &str = "postgres";

const PG_CREATE_COMPANIES: &str = "
    CREATE TABLE companies (
        code TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT
    )";

const PG_CREATE_INVOICES: &str = "
    CREATE TABLE invoices (
        id SERIAL PRIMARY KEY,
        comp_code TEXT NOT NULL REFERENCES companies ON DELETE CASCADE,
        amt FLOAT NOT NULL,
        paid BOOLEAN DEFAULT false NOT NULL,
        add_date DATE DEFAULT CURRENT_DATE NOT NULL,
        paid_date DATE,
        CONSTRAINT invoices_amt_check CHECK ((amt > (0)::double precision))
    )";

const SQLITE_CREATE_COMPANIES: &str = "
    CREATE TABLE companies (
        code TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT
    )";

const SQLITE_CREATE_INVOICES: &str = "
    CREATE TABLE invoices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        comp_code TEXT NOT NULL REFERENCES companies (code) ON DELETE CASCADE,
        amt FLOAT NOT NULL,
        paid BOOLEAN DEFAULT false NOT NULL,
        add_date DATE DEFAULT CURRENT_DATE NOT NULL,
        paid_date DATE,
        CONSTRAINT invoices_amt_check CHECK (amt > 0)
    )";

const PG_LIST_TABLES: &str = "
    SELECT tablename
    FROM pg_catalog.pg_tables
    WHERE schemaname != 'pg_catalog'
      AND schemaname != 'information_schema'";

const SQLITE_LIST_TABLES: &str = "
    SELECT name
    FROM sqlite_master
    WHERE type = 'table'
      AND name NOT LIKE 'sqlite_%'";

/// Demo companies: `(code, name, description)`
const SEED_COMPANIES: [(&str, &str, &str); 2] = [
    ("apple", "Apple Computer", "Maker of OSX."),
    ("ibm", "IBM", "Big blue."),
];

/// Demo invoice: `(comp_code, amt, paid, paid_date)`
type SeedInvoice = (&'static str, f64, bool, Option<NaiveDate>);

fn seed_invoices() -> [SeedInvoice; 4] {
    [
        ("apple", 100.0, false, None),
        ("apple", 200.0, false, None),
        ("apple", 300.0, true, NaiveDate::from_ymd_opt(2018, 1, 1)),
        ("ibm", 400.0, false, None),
    ]
}

/// What a bootstrap run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// The target database had to be created
    pub database_created: bool,
    /// Tables created during this run
    pub tables_created: Vec<&'static str>,
    /// Tables that received demo rows during this run
    pub tables_seeded: Vec<&'static str>,
}

impl BootstrapReport {
    /// True when the run only performed existence checks
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.database_created && self.tables_created.is_empty() && self.tables_seeded.is_empty()
    }
}

/// Where the target database lives
#[derive(Debug, Clone)]
pub enum Target {
    /// PostgreSQL server plus database name
    Postgres {
        /// Server connection options, without a database
        server: PgConnectOptions,
        /// Target database name
        database: String,
    },
    /// SQLite database file
    Sqlite {
        /// Path of the database file
        path: PathBuf,
    },
}

impl Target {
    /// Resolve the target from configuration
    ///
    /// `sqlite:` URLs name a directory that holds `<database>.db`; anything
    /// else is parsed as a PostgreSQL server URL.
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        let database = config.target_database();
        let url = config.database_url.trim();

        if let Some(dir) = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
        {
            let dir = if dir.is_empty() { "." } else { dir };
            return Ok(Self::Sqlite {
                path: PathBuf::from(dir).join(format!("{database}.db")),
            });
        }

        let server = PgConnectOptions::from_str(url).map_err(|e| Error::Bootstrap {
            step: "configuration",
            message: format!("invalid database URL: {e}"),
        })?;
        Ok(Self::Postgres { server, database })
    }

    /// Human-readable name for logs
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Postgres { database, .. } => database.clone(),
            Self::Sqlite { path } => path.display().to_string(),
        }
    }

    async fn connect(&self, max_connections: u32) -> Result<DatabasePool> {
        match self {
            Self::Postgres { server, database } => {
                DatabasePool::connect_postgres_with(
                    server.clone().database(database),
                    Some(max_connections),
                )
                .await
            }
            Self::Sqlite { path } => {
                DatabasePool::connect_sqlite_with(
                    SqliteConnectOptions::new().filename(path),
                    Some(max_connections),
                )
                .await
            }
        }
    }

    fn create_statement(&self, table: &str) -> Result<&'static str> {
        match (self, table) {
            (Self::Postgres { .. }, "companies") => Ok(PG_CREATE_COMPANIES),
            (Self::Postgres { .. }, "invoices") => Ok(PG_CREATE_INVOICES),
            (Self::Sqlite { .. }, "companies") => Ok(SQLITE_CREATE_COMPANIES),
            (Self::Sqlite { .. }, "invoices") => Ok(SQLITE_CREATE_INVOICES),
            _ => Err(Error::Bootstrap {
                step: "create tables",
                message: format!("Unknown table: {table}"),
            }),
        }
    }

    const fn list_tables_statement(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => PG_LIST_TABLES,
            Self::Sqlite { .. } => SQLITE_LIST_TABLES,
        }
    }
}

fn step_error(step: &'static str) -> impl Fn(Error) -> Error {
    move |err| {
        error!(step, error = %err, "Bootstrap step failed");
        match err {
            Error::Bootstrap { .. } => err,
            other => Error::Bootstrap {
                step,
                message: other.to_string(),
            },
        }
    }
}

fn sql_step_error(step: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |err| step_error(step)(Error::storage(err.to_string()))
}

/// Ensure database, tables and seed rows exist, then open the shared pool
///
/// # Errors
///
/// Returns [`Error::Bootstrap`] naming the step that failed. Callers must
/// not serve traffic after an error.
pub async fn bootstrap(config: &AppConfig) -> Result<(DatabasePool, BootstrapReport)> {
    let target = Target::resolve(config)?;
    let mut report = BootstrapReport {
        database_created: ensure_database(&target).await?,
        ..BootstrapReport::default()
    };

    ensure_tables(&target, config.mode, &mut report).await?;

    let pool = target
        .connect(config.max_connections)
        .await
        .map_err(step_error("connect"))?;
    pool.ping().await.map_err(step_error("connect"))?;

    info!(
        database = %target.display_name(),
        backend = pool.backend_name(),
        "Connected to database"
    );
    Ok((pool, report))
}

/// Step 1: create the target database when absent
///
/// Returns whether it had to be created.
async fn ensure_database(target: &Target) -> Result<bool> {
    match target {
        Target::Postgres { server, database } => {
            let admin = DatabasePool::connect_postgres_with(
                server.clone().database(ADMIN_DATABASE),
                Some(1),
            )
            .await
            .map_err(step_error("database check"))?;

            let outcome = create_database_if_absent(&admin, database).await;
            admin.close().await;
            outcome
        }
        Target::Sqlite { path } => {
            if path.exists() {
                return Ok(false);
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| step_error("database check")(Error::Io(e)))?;
            }
            let created = DatabasePool::connect_sqlite_with(
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true),
                Some(1),
            )
            .await
            .map_err(step_error("database check"))?;
            created.close().await;
            info!(database = %path.display(), "Created database");
            Ok(true)
        }
    }
}

async fn create_database_if_absent(admin: &DatabasePool, database: &str) -> Result<bool> {
    let existing: Option<String> = with_pool!(admin, pool => {
        sqlx::query_scalar("SELECT datname FROM pg_catalog.pg_database WHERE datname = $1")
            .bind(database)
            .fetch_optional(pool)
            .await
    })
    .map_err(sql_step_error("database check"))?;

    if existing.is_some() {
        debug!(database, "Database already exists");
        return Ok(false);
    }

    // Identifiers cannot be bound; the name comes from configuration only.
    let statement = format!("CREATE DATABASE \"{}\"", database.replace('"', "\"\""));
    admin
        .execute(&statement)
        .await
        .map_err(step_error("create database"))?;
    info!(database, "Created database");
    Ok(true)
}

/// Steps 2 and 3: create and seed missing tables
async fn ensure_tables(target: &Target, mode: Mode, report: &mut BootstrapReport) -> Result<()> {
    let db = target.connect(1).await.map_err(step_error("table check"))?;
    let outcome = create_missing_tables(&db, target, mode, report).await;
    db.close().await;
    outcome
}

async fn create_missing_tables(
    db: &DatabasePool,
    target: &Target,
    mode: Mode,
    report: &mut BootstrapReport,
) -> Result<()> {
    let existing: Vec<String> = with_pool!(db, pool => {
        sqlx::query_scalar(target.list_tables_statement())
            .fetch_all(pool)
            .await
    })
    .map_err(sql_step_error("table check"))?;

    for table in REQUIRED_TABLES {
        if existing.iter().any(|t| t == table) {
            continue;
        }

        info!(table, database = %target.display_name(), "Table does not exist, creating");
        db.execute(target.create_statement(table)?)
            .await
            .map_err(step_error("create tables"))?;
        report.tables_created.push(table);

        if mode.is_test() {
            continue;
        }
        seed_table(db, table).await?;
        report.tables_seeded.push(table);
        info!(table, "Table seeded");
    }

    Ok(())
}

async fn seed_table(db: &DatabasePool, table: &str) -> Result<()> {
    let seeded = match table {
        "companies" => with_pool!(db, pool => {
            let mut query = sqlx::query(
                "INSERT INTO companies (code, name, description)
                 VALUES ($1, $2, $3), ($4, $5, $6)",
            );
            for (code, name, description) in SEED_COMPANIES {
                query = query.bind(code).bind(name).bind(description);
            }
            query.execute(pool).await.map(|_| ())
        }),
        "invoices" => with_pool!(db, pool => {
            let mut query = sqlx::query(
                "INSERT INTO invoices (comp_code, amt, paid, paid_date)
                 VALUES ($1, $2, $3, $4), ($5, $6, $7, $8),
                        ($9, $10, $11, $12), ($13, $14, $15, $16)",
            );
            for (comp_code, amt, paid, paid_date) in seed_invoices() {
                query = query.bind(comp_code).bind(amt).bind(paid).bind(paid_date);
            }
            query.execute(pool).await.map(|_| ())
        }),
        other => {
            return Err(Error::Bootstrap {
                step: "seed",
                message: format!("Unknown table: {other}"),
            })
        }
    };
    seeded.map_err(sql_step_error("seed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Invoice;

    fn sqlite_config(dir: &tempfile::TempDir, mode: Mode) -> AppConfig {
        AppConfig::default()
            .with_mode(mode)
            .with_database_url(format!("sqlite://{}", dir.path().display()))
    }

    #[test]
    fn test_resolve_sqlite_target() {
        let config = AppConfig::default()
            .with_mode(Mode::Test)
            .with_database_url("sqlite:///tmp/biztime");
        match Target::resolve(&config).unwrap() {
            Target::Sqlite { path } => {
                assert_eq!(path, PathBuf::from("/tmp/biztime/biztime_test.db"));
            }
            Target::Postgres { .. } => panic!("expected sqlite target"),
        }
    }

    #[test]
    fn test_resolve_postgres_target() {
        let config = AppConfig::default().with_database_url("postgres://localhost:5432");
        match Target::resolve(&config).unwrap() {
            Target::Postgres { database, .. } => assert_eq!(database, "biztime"),
            Target::Sqlite { .. } => panic!("expected postgres target"),
        }
    }

    #[test]
    fn test_resolve_rejects_bad_url() {
        let config = AppConfig::default().with_database_url("not a url");
        let err = Target::resolve(&config).unwrap_err();
        assert!(matches!(err, Error::Bootstrap { step: "configuration", .. }));
    }

    #[test]
    fn test_unknown_table_has_no_statement() {
        let target = Target::Sqlite {
            path: PathBuf::from("x.db"),
        };
        assert!(target.create_statement("payments").is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_creates_everything_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = sqlite_config(&dir, Mode::Test);

        let (pool, first) = bootstrap(&config).await.unwrap();
        assert!(first.database_created);
        assert_eq!(first.tables_created, vec!["companies", "invoices"]);
        assert!(first.tables_seeded.is_empty());
        pool.close().await;

        let (pool, second) = bootstrap(&config).await.unwrap();
        assert!(second.is_noop());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_test_mode_does_not_seed() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, _) = bootstrap(&sqlite_config(&dir, Mode::Test)).await.unwrap();

        let count: i64 = with_pool!(&pool, p => {
            sqlx::query_scalar("SELECT COUNT(*) FROM companies").fetch_one(p).await
        })
        .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_production_mode_seeds_fixed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, report) = bootstrap(&sqlite_config(&dir, Mode::Production))
            .await
            .unwrap();
        assert_eq!(report.tables_seeded, vec!["companies", "invoices"]);

        let invoices: Vec<Invoice> = with_pool!(&pool, p => {
            sqlx::query_as("SELECT * FROM invoices ORDER BY id").fetch_all(p).await
        })
        .unwrap();

        let summary: Vec<(&str, f64, bool)> = invoices
            .iter()
            .map(|i| (i.comp_code.as_str(), i.amt, i.paid))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("apple", 100.0, false),
                ("apple", 200.0, false),
                ("apple", 300.0, true),
                ("ibm", 400.0, false),
            ]
        );
        assert_eq!(invoices[2].paid_date, NaiveDate::from_ymd_opt(2018, 1, 1));
        assert!(invoices[0].paid_date.is_none());
    }

    #[tokio::test]
    async fn test_missing_table_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let config = sqlite_config(&dir, Mode::Test);
        let (pool, _) = bootstrap(&config).await.unwrap();
        pool.execute("DROP TABLE invoices").await.unwrap();
        pool.close().await;

        let (_, report) = bootstrap(&config).await.unwrap();
        assert!(!report.database_created);
        assert_eq!(report.tables_created, vec!["invoices"]);
    }

    fn postgres_config(mode: Mode, suffix: &str) -> Option<AppConfig> {
        let url = std::env::var("BIZTIME_DATABASE_URL").ok()?;
        let mut config = AppConfig::default().with_mode(mode).with_database_url(url);
        config.database_name = format!("biztime_{suffix}_{}", std::process::id());
        Some(config)
    }

    async fn drop_postgres_database(config: &AppConfig) {
        let Target::Postgres { server, database } = Target::resolve(config).unwrap() else {
            panic!("expected postgres target");
        };
        let admin = DatabasePool::connect_postgres_with(server.database(ADMIN_DATABASE), Some(1))
            .await
            .unwrap();
        admin
            .execute(&format!("DROP DATABASE IF EXISTS \"{database}\""))
            .await
            .unwrap();
        admin.close().await;
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server in BIZTIME_DATABASE_URL"]
    async fn test_postgres_bootstrap_is_idempotent() {
        let Some(config) = postgres_config(Mode::Test, "idem") else {
            return;
        };

        let (pool, first) = bootstrap(&config).await.unwrap();
        assert!(first.database_created);
        assert_eq!(first.tables_created, vec!["companies", "invoices"]);
        assert!(first.tables_seeded.is_empty());
        pool.close().await;

        let (pool, second) = bootstrap(&config).await.unwrap();
        assert!(second.is_noop());
        pool.close().await;

        drop_postgres_database(&config).await;
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server in BIZTIME_DATABASE_URL"]
    async fn test_postgres_production_seed() {
        let Some(config) = postgres_config(Mode::Production, "seed") else {
            return;
        };

        let (pool, report) = bootstrap(&config).await.unwrap();
        assert_eq!(report.tables_seeded, vec!["companies", "invoices"]);

        let invoices: Vec<Invoice> = with_pool!(&pool, p => {
            sqlx::query_as("SELECT * FROM invoices ORDER BY id").fetch_all(p).await
        })
        .unwrap();
        let amounts: Vec<f64> = invoices.iter().map(|i| i.amt).collect();
        assert_eq!(amounts, vec![100.0, 200.0, 300.0, 400.0]);
        assert_eq!(invoices[2].paid_date, NaiveDate::from_ymd_opt(2018, 1, 1));
        pool.close().await;

        drop_postgres_database(&config).await;
    }
}
