
//! Persists validated user records to the `UserData` table.

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;

use crate::error::{ConfigError, WriteError};

/// Environment variable holding the database connection string.
pub const SQL_CONNECTION_ENV: &str = "SQL_CONNECTION_STRING";

const INSERT_QUERY: &str = "INSERT INTO UserData (Name, Age, CreatedAt) VALUES (?, ?, ?)";

/// Writes user records to the database.
///
/// Each call opens its own scoped connection and closes it on every exit path;
/// no connection is shared across concurrent deliveries. The `UserData` table
/// must already exist.
pub struct RecordWriter {
    connection_string: String,
}

impl RecordWriter {
    /// Creates a writer for the given connection string.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }

    /// Resolves the connection string from `SQL_CONNECTION_STRING`.
    ///
    /// # Errors
    /// Fails with `ConfigError::MissingConnectionString` if the variable is
    /// absent or empty. Intended to fail fast at startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(SQL_CONNECTION_ENV) {
            Ok(value) if !value.is_empty() => Ok(Self::new(value)),
            _ => Err(ConfigError::MissingConnectionString(SQL_CONNECTION_ENV)),
        }
    }

    /// Inserts one user record, binding `CreatedAt` to the current UTC time.
    ///
    /// Parameters are bound, never concatenated into the SQL text. Returns the
    /// rows-affected count; zero rows is anomalous but not an error, so it is
    /// logged as a warning and returned as `Ok(0)`.
    pub async fn insert(&self, name: &str, age: i64) -> Result<u64, WriteError> {
        let mut conn = SqliteConnection::connect(&self.connection_string)
            .await
            .map_err(WriteError::Database)?;

        let result = sqlx::query(INSERT_QUERY)
            .bind(name)
            .bind(age)
            .bind(Utc::now())
            .execute(&mut conn)
            .await;

        // Release the connection on the success and the failure path alike.
        let _ = conn.close().await;

        let rows = result.map_err(WriteError::Database)?.rows_affected();
        if rows > 0 {
            log::info!("Successfully inserted user data into database");
        } else {
            log::warn!("No rows were inserted into database");
        }

        Ok(rows)
    }

    /// Opens and immediately closes a connection, reporting whether it worked.
    ///
    /// For external health checks only; not on the message-processing path.
    pub async fn test_connection(&self) -> bool {
        match SqliteConnection::connect(&self.connection_string).await {
            Ok(conn) => {
                let _ = conn.close().await;
                log::info!("Database connection test successful");
                true
            }
            Err(e) => {
                log::error!("Database connection test failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    async fn create_user_table(url: &str) {
        let mut conn = SqliteConnection::connect(url).await.unwrap();
        sqlx::query(
            "CREATE TABLE UserData (Name TEXT NOT NULL, Age INTEGER NOT NULL, CreatedAt TEXT NOT NULL)",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();
    }

    fn db_url(dir: &TempDir) -> String {
        format!("sqlite://{}/test.db?mode=rwc", dir.path().display())
    }

    async fn fetch_rows(url: &str) -> Vec<(String, i64, DateTime<Utc>)> {
        let mut conn = SqliteConnection::connect(url).await.unwrap();
        let rows = sqlx::query_as("SELECT Name, Age, CreatedAt FROM UserData")
            .fetch_all(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
        rows
    }

    #[tokio::test]
    async fn test_insert_writes_one_row_with_bound_values() {
        let dir = TempDir::new().unwrap();
        let url = db_url(&dir);
        create_user_table(&url).await;

        let before = Utc::now();
        let writer = RecordWriter::new(url.clone());
        let rows = writer.insert("Alice", 30).await.unwrap();
        let after = Utc::now();

        assert_eq!(rows, 1);
        let stored = fetch_rows(&url).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].0, "Alice");
        assert_eq!(stored[0].1, 30);
        assert!(stored[0].2 >= before && stored[0].2 <= after);
    }

    #[tokio::test]
    async fn test_insert_fails_when_database_is_unreachable() {
        let writer = RecordWriter::new("sqlite:///no-such-dir/missing.db");
        let err = writer.insert("Alice", 30).await.unwrap_err();
        assert!(matches!(err, WriteError::Database(_)));
    }

    #[tokio::test]
    async fn test_insert_fails_when_table_is_missing() {
        let dir = TempDir::new().unwrap();
        let writer = RecordWriter::new(db_url(&dir));
        let err = writer.insert("Alice", 30).await.unwrap_err();
        // The cause stays attached for logging.
        assert!(err.to_string().contains("database error"));
    }

    #[tokio::test]
    async fn test_connection_reports_success_and_failure() {
        let dir = TempDir::new().unwrap();
        let good = RecordWriter::new(db_url(&dir));
        assert!(good.test_connection().await);

        let bad = RecordWriter::new("sqlite:///no-such-dir/missing.db");
        assert!(!bad.test_connection().await);
    }

    #[test]
    fn test_from_env_requires_connection_string() {
        std::env::remove_var(SQL_CONNECTION_ENV);
        assert!(matches!(
            RecordWriter::from_env(),
            Err(ConfigError::MissingConnectionString(SQL_CONNECTION_ENV))
        ));

        std::env::set_var(SQL_CONNECTION_ENV, "sqlite::memory:");
        let writer = RecordWriter::from_env().unwrap();
        assert_eq!(writer.connection_string, "sqlite::memory:");
        std::env::remove_var(SQL_CONNECTION_ENV);
    }
}
