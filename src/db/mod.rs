//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all marketplace data.

mod conversations;
mod offers;
mod repository;
mod requests;
mod seed;

pub use repository::*;
pub use requests::{NewServiceRequest, RequestScope};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that SQL
/// string comparison matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            profile TEXT NOT NULL,
            technician_profile TEXT,
            client_profile TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS service_requests (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL REFERENCES users(id),
            technician_id TEXT REFERENCES users(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            address TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,
            contact_name TEXT NOT NULL,
            contact_phone TEXT,
            notes TEXT,
            category_details TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending',
            accepted_offer_id TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_service_history (
            user_id TEXT NOT NULL REFERENCES users(id),
            service_request_id TEXT NOT NULL REFERENCES service_requests(id),
            added_at TEXT NOT NULL,
            PRIMARY KEY (user_id, service_request_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS service_offers (
            id TEXT PRIMARY KEY,
            service_request_id TEXT NOT NULL REFERENCES service_requests(id),
            technician_id TEXT NOT NULL REFERENCES users(id),
            amount REAL NOT NULL,
            message TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            service_request_id TEXT NOT NULL REFERENCES service_requests(id),
            participant_a TEXT NOT NULL REFERENCES users(id),
            participant_b TEXT NOT NULL REFERENCES users(id),
            expires_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            sender_id TEXT NOT NULL REFERENCES users(id),
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        CREATE INDEX IF NOT EXISTS idx_requests_client ON service_requests(client_id);
        CREATE INDEX IF NOT EXISTS idx_requests_technician ON service_requests(technician_id);
        CREATE INDEX IF NOT EXISTS idx_requests_status ON service_requests(status, scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_offers_request ON service_offers(service_request_id);
        CREATE INDEX IF NOT EXISTS idx_offers_technician ON service_offers(technician_id);
        CREATE INDEX IF NOT EXISTS idx_conversations_request ON conversations(service_request_id);
        CREATE INDEX IF NOT EXISTS idx_conversations_expires_at ON conversations(expires_at);
        CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_lexicographically() {
        let earlier = parse_timestamp("2026-01-01T09:00:00.5Z");
        let later = parse_timestamp("2026-01-01T10:00:00Z");
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
        assert_eq!(format_timestamp(&later), "2026-01-01T10:00:00.000Z");
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = parse_timestamp(&format_timestamp(&Utc::now()));
        assert_eq!(parse_timestamp(&format_timestamp(&now)), now);
    }
}
