//! Postgres test databases.
//!
//! One PostgreSQL container is started per test binary and shared; every
//! [`TestDb`] gets its own freshly migrated database inside it. Setting
//! `TEST_DATABASE_URL` points the suite at an existing server instead.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Connection, PgConnection, PgPool};
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres as PostgresImage;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::store::PgStore;

/// The running container (if any) and options for its maintenance database.
struct Server {
    _container: Option<ContainerAsync<PostgresImage>>,
    admin: PgConnectOptions,
}

static SERVER: OnceCell<Server> = OnceCell::const_new();

async fn start_server() -> Server {
    if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
        let admin = url.parse::<PgConnectOptions>().expect("TEST_DATABASE_URL is not a postgres url");
        return Server { _container: None, admin };
    }

    let container = PostgresImage::default()
        .with_user("checkout_test")
        .with_password("checkout_test_password")
        .with_db_name("checkout_test")
        .with_env_var("POSTGRES_INITDB_ARGS", "--auth-host=trust")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");
    let port = container.get_host_port_ipv4(5432).await.expect("Failed to get container port");
    let host = std::env::var("TESTCONTAINERS_HOST_OVERRIDE").unwrap_or_else(|_| "localhost".to_string());
    let admin = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .username("checkout_test")
        .password("checkout_test_password")
        .database("postgres");
    Server { _container: Some(container), admin }
}

/// An isolated, migrated database. Call [`TestDb::cleanup`] at the end of a
/// test to drop it; a leftover database is harmless inside the container.
#[derive(Debug)]
pub(crate) struct TestDb {
    pub pool: PgPool,
    name: String,
}

impl TestDb {
    pub async fn new() -> Self {
        let server = SERVER.get_or_init(start_server).await;
        let name = format!("checkout_test_{}", Uuid::now_v7().simple());

        let mut conn = PgConnection::connect_with(&server.admin).await.expect("Failed to connect to postgres database");
        sqlx::query(&format!("CREATE DATABASE \"{name}\""))
            .execute(&mut conn)
            .await
            .expect("Failed to create test database");
        conn.close().await.expect("Failed to close admin connection");

        let options = server.admin.clone().database(&name).disable_statement_logging();
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .expect("Failed to create pool for database");
        let db = Self { pool, name };
        db.store().migrate().await.expect("Failed to run migrations on database");
        db
    }

    pub fn store(&self) -> PgStore { PgStore::new(self.pool.clone()) }

    pub async fn cleanup(self) {
        self.pool.close().await;
        let Some(server) = SERVER.get() else { return };
        if let Ok(mut conn) = PgConnection::connect_with(&server.admin).await {
            let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{}\"", self.name)).execute(&mut conn).await;
            let _ = conn.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_is_migrated() {
        let db = TestDb::new().await;
        let variants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM variants").fetch_one(&db.pool).await.unwrap();
        assert_eq!(variants, 0);
        db.cleanup().await;
    }
}
