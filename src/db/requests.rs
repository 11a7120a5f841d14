//! Service request persistence and lifecycle writes.

use chrono::{DateTime, Utc};
use sqlx::Row;

use super::repository::{add_service_history, parse_json};
use super::{format_timestamp, parse_timestamp, Repository};
use crate::errors::AppError;
use crate::models::{RequestStatus, ServiceRequest};
use crate::workflow::lifecycle::StatusChange;

pub(super) const REQUEST_COLUMNS: &str = "id, client_id, technician_id, title, description, category, address, scheduled_at, contact_name, contact_phone, notes, category_details, status, accepted_offer_id, completed_at, created_at, updated_at, version";

/// Validated fields for a new request.
#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub address: String,
    pub scheduled_at: DateTime<Utc>,
    pub contact_name: String,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
    pub category_details: serde_json::Value,
}

/// Which requests a listing covers.
#[derive(Debug, Clone, Copy)]
pub enum RequestScope<'a> {
    OwnedBy(&'a str),
    AssignedTo(&'a str),
    All,
}

impl Repository {
    // ==================== SERVICE REQUEST OPERATIONS ====================

    /// Get a service request by ID.
    pub async fn get_service_request(&self, id: &str) -> Result<Option<ServiceRequest>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM service_requests WHERE id = ?",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(request_from_row))
    }

    /// List requests in scope, newest first.
    pub async fn list_service_requests(
        &self,
        scope: RequestScope<'_>,
    ) -> Result<Vec<ServiceRequest>, AppError> {
        let (filter, owner) = match scope {
            RequestScope::OwnedBy(id) => ("WHERE client_id = ?", Some(id)),
            RequestScope::AssignedTo(id) => ("WHERE technician_id = ?", Some(id)),
            RequestScope::All => ("", None),
        };
        let sql = format!(
            "SELECT {} FROM service_requests {} ORDER BY created_at DESC, rowid DESC",
            REQUEST_COLUMNS, filter
        );

        let mut query = sqlx::query(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows.iter().map(request_from_row).collect())
    }

    /// Pending requests nobody has been assigned to, soonest first.
    pub async fn list_open_requests(&self, limit: i64) -> Result<Vec<ServiceRequest>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM service_requests WHERE status = ? AND technician_id IS NULL ORDER BY scheduled_at, rowid LIMIT ?",
            REQUEST_COLUMNS
        ))
        .bind(RequestStatus::Pending.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(request_from_row).collect())
    }

    /// Create a pending request and add it to the client's history.
    pub async fn create_service_request(
        &self,
        client_id: &str,
        new_request: NewServiceRequest,
    ) -> Result<ServiceRequest, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO service_requests (
                id, client_id, technician_id, title, description, category, address,
                scheduled_at, contact_name, contact_phone, notes, category_details,
                status, accepted_offer_id, completed_at, created_at, updated_at, version
            ) VALUES (?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?, 1)"#,
        )
        .bind(&id)
        .bind(client_id)
        .bind(&new_request.title)
        .bind(&new_request.description)
        .bind(&new_request.category)
        .bind(&new_request.address)
        .bind(format_timestamp(&new_request.scheduled_at))
        .bind(&new_request.contact_name)
        .bind(&new_request.contact_phone)
        .bind(&new_request.notes)
        .bind(serde_json::to_string(&new_request.category_details)?)
        .bind(RequestStatus::Pending.as_str())
        .bind(format_timestamp(&now))
        .bind(format_timestamp(&now))
        .execute(&mut *tx)
        .await?;

        add_service_history(&mut *tx, client_id, &id).await?;

        tx.commit().await?;

        Ok(ServiceRequest {
            id,
            client: client_id.to_string(),
            technician: None,
            title: new_request.title,
            description: new_request.description,
            category: new_request.category,
            address: new_request.address,
            scheduled_at: new_request.scheduled_at,
            contact_name: new_request.contact_name,
            contact_phone: new_request.contact_phone,
            notes: new_request.notes,
            category_details: new_request.category_details,
            status: RequestStatus::Pending,
            accepted_offer: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    /// Apply a status change and retime every conversation on the request,
    /// atomically and only if the request is unchanged since it was read.
    pub async fn apply_status_change(
        &self,
        request: &ServiceRequest,
        change: &StatusChange,
    ) -> Result<ServiceRequest, AppError> {
        let now = Utc::now();
        let new_version = request.version + 1;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE service_requests SET status = ?, completed_at = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(change.status.as_str())
        .bind(change.completed_at.as_ref().map(format_timestamp))
        .bind(format_timestamp(&now))
        .bind(new_version)
        .bind(&request.id)
        .bind(request.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "The request was modified concurrently, please retry".to_string(),
            ));
        }

        let retimed = sqlx::query(
            "UPDATE conversations SET expires_at = ? WHERE service_request_id = ?",
        )
        .bind(change.conversation_expiry.as_ref().map(format_timestamp))
        .bind(&request.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            request_id = %request.id,
            status = change.status.as_str(),
            conversations = retimed.rows_affected(),
            "Request status updated"
        );

        Ok(ServiceRequest {
            status: change.status,
            completed_at: change.completed_at,
            updated_at: now,
            version: new_version,
            ..request.clone()
        })
    }

    /// Force-assign a technician: the request becomes `accepted` and its
    /// conversations stop expiring.
    pub async fn assign_technician(
        &self,
        request: &ServiceRequest,
        technician_id: &str,
    ) -> Result<ServiceRequest, AppError> {
        let now = Utc::now();
        let new_version = request.version + 1;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE service_requests SET technician_id = ?, status = ?, completed_at = NULL, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(technician_id)
        .bind(RequestStatus::Accepted.as_str())
        .bind(format_timestamp(&now))
        .bind(new_version)
        .bind(&request.id)
        .bind(request.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "The request was modified concurrently, please retry".to_string(),
            ));
        }

        add_service_history(&mut *tx, technician_id, &request.id).await?;

        sqlx::query("UPDATE conversations SET expires_at = NULL WHERE service_request_id = ?")
            .bind(&request.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ServiceRequest {
            technician: Some(technician_id.to_string()),
            status: RequestStatus::Accepted,
            completed_at: None,
            updated_at: now,
            version: new_version,
            ..request.clone()
        })
    }
}

pub(super) fn request_from_row(row: &sqlx::sqlite::SqliteRow) -> ServiceRequest {
    let status: String = row.get("status");
    let category_details: String = row.get("category_details");
    let scheduled_at: String = row.get("scheduled_at");
    let completed_at: Option<String> = row.get("completed_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    ServiceRequest {
        id: row.get("id"),
        client: row.get("client_id"),
        technician: row.get("technician_id"),
        title: row.get("title"),
        description: row.get("description"),
        category: row.get("category"),
        address: row.get("address"),
        scheduled_at: parse_timestamp(&scheduled_at),
        contact_name: row.get("contact_name"),
        contact_phone: row.get("contact_phone"),
        notes: row.get("notes"),
        category_details: parse_json(&category_details),
        status: RequestStatus::parse(&status).unwrap_or(RequestStatus::Pending),
        accepted_offer: row.get("accepted_offer_id"),
        completed_at: completed_at.as_deref().map(parse_timestamp),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        version: row.get("version"),
    }
}
