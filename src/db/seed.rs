//! Local provisioning of users from a JSON seed file.

use std::path::Path;

use super::Repository;
use crate::errors::AppError;
use crate::models::NewUser;

impl Repository {
    /// Insert the users listed in `path` (a JSON array), skipping emails that
    /// are already registered. Returns how many were created.
    pub async fn seed_users(&self, path: &Path) -> Result<usize, AppError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Internal(format!("Failed to read seed file {:?}: {}", path, e))
        })?;
        let users: Vec<NewUser> = serde_json::from_str(&raw)?;

        let mut created = 0;
        for user in &users {
            match self.create_user(user).await {
                Ok(user) => {
                    tracing::info!(user_id = %user.id, role = user.role.as_str(), "Seeded user {}", user.email);
                    created += 1;
                }
                Err(AppError::Validation(msg)) => tracing::debug!("Skipping seed entry: {}", msg),
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::Role;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_seed_skips_existing_emails() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("seed.sqlite"))
            .await
            .unwrap();
        let repo = Repository::new(pool);

        let seed_path = temp_dir.path().join("users.json");
        std::fs::write(
            &seed_path,
            serde_json::json!([
                { "email": "Ana@Example.com", "profile": { "fullName": "Ana" } },
                {
                    "email": "luis@example.com",
                    "role": "technician",
                    "technicianProfile": { "specialties": ["Plumbing"] }
                }
            ])
            .to_string(),
        )
        .unwrap();

        assert_eq!(repo.seed_users(&seed_path).await.unwrap(), 2);
        assert_eq!(repo.seed_users(&seed_path).await.unwrap(), 0);

        let technicians = repo.list_technicians(Some("Plumbing")).await.unwrap();
        assert_eq!(technicians.len(), 1);
        assert_eq!(technicians[0].role, Role::Technician);
        assert_eq!(technicians[0].email, "luis@example.com");
    }
}
