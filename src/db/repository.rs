//! Database repository for CRUD operations.
//!
//! Uses prepared statements, and transactions with version checks wherever a
//! workflow step touches more than one record.

use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::{Row, Sqlite, SqlitePool};

use super::{format_timestamp, parse_timestamp};
use crate::errors::AppError;
use crate::models::{ClientProfile, NewUser, Profile, Role, User};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

const USER_COLUMNS: &str = "id, email, role, profile, technician_profile, client_profile, created_at, updated_at, version";

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying pool, for maintenance tasks and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== USER OPERATIONS ====================

    /// Get a user by ID, including service history.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut user = user_from_row(&row);
                user.service_history = self.service_history(&user.id).await?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Get a user only if they are a technician.
    pub async fn get_technician(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .get_user(id)
            .await?
            .filter(|user| user.role == Role::Technician))
    }

    /// List technicians, optionally only those offering `specialty`.
    pub async fn list_technicians(&self, specialty: Option<&str>) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE role = ? ORDER BY created_at, rowid",
            USER_COLUMNS
        ))
        .bind(Role::Technician.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut technicians = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut user = user_from_row(row);
            if !user.offers_specialty(specialty) {
                continue;
            }
            user.service_history = self.service_history(&user.id).await?;
            technicians.push(user);
        }
        Ok(technicians)
    }

    /// Insert a new user. Emails are unique after trimming and lower-casing.
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        let email = new_user.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let technician_profile = match new_user.role {
            Role::Technician => Some(new_user.technician_profile.clone().unwrap_or_default()),
            _ => new_user.technician_profile.clone(),
        };
        let client_profile = new_user.client_profile.clone().unwrap_or_default();

        let result = sqlx::query(
            "INSERT INTO users (id, email, role, profile, technician_profile, client_profile, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)"
        )
        .bind(&id)
        .bind(&email)
        .bind(new_user.role.as_str())
        .bind(serde_json::to_string(&new_user.profile)?)
        .bind(technician_profile.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&client_profile)?)
        .bind(format_timestamp(&now))
        .bind(format_timestamp(&now))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(AppError::Validation(format!(
                    "Email {} is already registered",
                    email
                )));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(User {
            id,
            email,
            role: new_user.role,
            profile: new_user.profile.clone(),
            technician_profile,
            client_profile,
            service_history: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    /// Persist the mutable parts of a user with optimistic concurrency control.
    pub async fn update_user(&self, user: &User) -> Result<User, AppError> {
        let now = Utc::now();
        let new_version = user.version + 1;

        let result = sqlx::query(
            "UPDATE users SET role = ?, profile = ?, technician_profile = ?, client_profile = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(user.role.as_str())
        .bind(serde_json::to_string(&user.profile)?)
        .bind(user.technician_profile.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&user.client_profile)?)
        .bind(format_timestamp(&now))
        .bind(new_version)
        .bind(&user.id)
        .bind(user.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_user(&user.id).await? {
                Some(_) => Err(AppError::Conflict(
                    "Concurrent modification detected".to_string(),
                )),
                None => Err(AppError::not_found("User")),
            };
        }

        Ok(User {
            updated_at: now,
            version: new_version,
            ..user.clone()
        })
    }

    /// Ids of the requests a user took part in, oldest first.
    async fn service_history(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT service_request_id FROM user_service_history WHERE user_id = ? ORDER BY added_at, rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| row.get("service_request_id"))
            .collect())
    }
}

/// Record that a user took part in a request. Adding twice is a no-op.
pub(super) async fn add_service_history<'e, E>(
    executor: E,
    user_id: &str,
    request_id: &str,
) -> Result<(), AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR IGNORE INTO user_service_history (user_id, service_request_id, added_at) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(request_id)
    .bind(format_timestamp(&Utc::now()))
    .execute(executor)
    .await?;
    Ok(())
}

// Helper functions for row conversion

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    let role: String = row.get("role");
    let profile: String = row.get("profile");
    let technician_profile: Option<String> = row.get("technician_profile");
    let client_profile: String = row.get("client_profile");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    User {
        id: row.get("id"),
        email: row.get("email"),
        role: Role::parse(&role).unwrap_or(Role::Client),
        profile: parse_json::<Profile>(&profile),
        technician_profile: technician_profile.map(|s| parse_json(&s)),
        client_profile: parse_json::<ClientProfile>(&client_profile),
        service_history: Vec::new(),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        version: row.get("version"),
    }
}

pub(super) fn parse_json<T: DeserializeOwned + Default>(s: &str) -> T {
    serde_json::from_str(s).unwrap_or_default()
}
