//! Throwaway PostgreSQL databases for store tests.
//!
//! A single server is shared by the whole test binary: the one named by
//! `TEST_DATABASE_URL` when set, otherwise a container started on first use.
//! Every [`TestDb`] is a freshly created, fully migrated database on that
//! server, so tests never see each other's rows.

use once_cell::sync::Lazy;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Connection, PgConnection, PgPool};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres as PostgresImage;
use tokio::sync::OnceCell;

use crate::database::run_migrations;

const USER: &str = "inventory_test";
const PASSWORD: &str = "inventory_test_password";

struct Server {
    /// Points at the maintenance database; each test swaps in its own name.
    admin: PgConnectOptions,
    _container: Option<ContainerAsync<PostgresImage>>,
}

/// `None` once startup has failed, so the remaining tests skip quickly.
static SERVER: Lazy<OnceCell<Option<Server>>> = Lazy::new(OnceCell::new);

static NEXT_DATABASE: AtomicU64 = AtomicU64::new(0);

async fn start_server() -> Option<Server> {
    if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
        return match PgConnectOptions::from_str(&url) {
            Ok(admin) => Some(Server {
                admin: admin.disable_statement_logging(),
                _container: None,
            }),
            Err(err) => {
                eprintln!("TEST_DATABASE_URL is not a PostgreSQL URL: {err}");
                None
            }
        };
    }

    let started = PostgresImage::default()
        .with_user(USER)
        .with_password(PASSWORD)
        .with_db_name("postgres")
        .with_tag("16-alpine")
        .start()
        .await;
    let container = match started {
        Ok(container) => container,
        Err(err) => {
            eprintln!("PostgreSQL container unavailable, skipping database tests: {err}");
            return None;
        }
    };
    let port = match container.get_host_port_ipv4(5432).await {
        Ok(port) => port,
        Err(err) => {
            eprintln!("PostgreSQL container has no mapped port: {err}");
            return None;
        }
    };
    let host =
        std::env::var("TESTCONTAINERS_HOST_OVERRIDE").unwrap_or_else(|_| "localhost".to_string());

    let admin = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .username(USER)
        .password(PASSWORD)
        .database("postgres")
        .disable_statement_logging();

    Some(Server {
        admin,
        _container: Some(container),
    })
}

/// Database names are interpolated into DDL, so only plain identifiers pass.
fn validate_database_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > 63 {
        return Err("Database name must be 1-63 characters long".to_string());
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase() || c == '_') {
        return Err("Database name must start with a lowercase letter or underscore".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err("Database name may only contain a-z, 0-9 and underscores".to_string());
    }
    Ok(())
}

/// One isolated, migrated database. Call [`TestDb::cleanup`] at the end of
/// a test to drop it.
#[derive(Debug)]
pub struct TestDb {
    pub pool: PgPool,
    pub name: String,
    admin: PgConnectOptions,
}

impl TestDb {
    /// Returns `None` when no PostgreSQL server can be reached.
    pub async fn new() -> Option<Self> {
        let server = SERVER.get_or_init(start_server).await.as_ref()?;

        let name = format!(
            "inventory_test_{}_{}",
            std::process::id(),
            NEXT_DATABASE.fetch_add(1, Ordering::Relaxed)
        );
        if let Err(error) = validate_database_name(&name) {
            panic!("Invalid database name '{name}': {error}");
        }

        let mut conn = PgConnection::connect_with(&server.admin)
            .await
            .expect("Failed to connect to the maintenance database");
        sqlx::query(&format!("CREATE DATABASE \"{name}\""))
            .execute(&mut conn)
            .await
            .expect("Failed to create test database");
        conn.close()
            .await
            .expect("Failed to close admin connection");

        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect_with(server.admin.clone().database(&name))
            .await
            .expect("Failed to create pool for test database");

        run_migrations(&pool)
            .await
            .expect("Failed to run migrations on test database");

        Some(Self {
            pool,
            name,
            admin: server.admin.clone(),
        })
    }

    /// Closes the pool and drops the database.
    pub async fn cleanup(self) {
        self.pool.close().await;

        if let Ok(mut conn) = PgConnection::connect_with(&self.admin).await {
            let drop_query = format!("DROP DATABASE IF EXISTS \"{}\"", self.name);
            if let Err(err) = sqlx::query(&drop_query).execute(&mut conn).await {
                eprintln!("Failed to drop test database '{}': {err}", self.name);
            }
            let _ = conn.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_are_valid_identifiers() {
        assert!(validate_database_name("inventory_test_4242_0").is_ok());
        assert!(validate_database_name("_scratch").is_ok());
    }

    #[test]
    fn unsafe_names_are_refused() {
        assert!(validate_database_name("").is_err());
        assert!(validate_database_name(&"a".repeat(64)).is_err());
        assert!(validate_database_name("1st").is_err());
        assert!(validate_database_name("x\"; DROP DATABASE postgres; --").is_err());
        assert!(validate_database_name("Upper").is_err());
    }

    #[tokio::test]
    async fn databases_are_migrated_and_isolated() {
        let Some(first) = TestDb::new().await else {
            return;
        };
        let second = TestDb::new().await.expect("server already running");
        assert_ne!(first.name, second.name);

        sqlx::query("INSERT INTO products (name, price, stock_quantity) VALUES ('Apple', 1, 1)")
            .execute(&first.pool)
            .await
            .expect("products table exists");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&second.pool)
            .await
            .expect("products table exists");
        assert_eq!(count, 0);

        first.cleanup().await;
        second.cleanup().await;
    }
}
