//! Offer persistence and the accept/reject resolution writes.

use chrono::Utc;
use sqlx::Row;

use super::repository::add_service_history;
use super::{format_timestamp, parse_timestamp, Repository};
use crate::errors::AppError;
use crate::models::{
    OfferStatus, OwnOffer, RequestStatus, RequestSummary, ServiceOffer, ServiceRequest,
};

const OFFER_COLUMNS: &str =
    "id, service_request_id, technician_id, amount, message, status, created_at, updated_at";

impl Repository {
    // ==================== OFFER OPERATIONS ====================

    /// Record a new pending offer.
    pub async fn create_offer(
        &self,
        request_id: &str,
        technician_id: &str,
        amount: f64,
        message: Option<String>,
    ) -> Result<ServiceOffer, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO service_offers (id, service_request_id, technician_id, amount, message, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(request_id)
        .bind(technician_id)
        .bind(amount)
        .bind(&message)
        .bind(OfferStatus::Pending.as_str())
        .bind(format_timestamp(&now))
        .bind(format_timestamp(&now))
        .execute(&self.pool)
        .await?;

        Ok(ServiceOffer {
            id,
            service_request: request_id.to_string(),
            technician: technician_id.to_string(),
            amount,
            message,
            status: OfferStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get an offer, but only if it belongs to `request_id`.
    pub async fn get_offer_for_request(
        &self,
        offer_id: &str,
        request_id: &str,
    ) -> Result<Option<ServiceOffer>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM service_offers WHERE id = ? AND service_request_id = ?",
            OFFER_COLUMNS
        ))
        .bind(offer_id)
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(offer_from_row))
    }

    /// Offers on a request, newest first, optionally only one technician's.
    pub async fn list_offers(
        &self,
        request_id: &str,
        technician_id: Option<&str>,
    ) -> Result<Vec<ServiceOffer>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM service_offers WHERE service_request_id = ? AND (? IS NULL OR technician_id = ?) ORDER BY created_at DESC, rowid DESC",
            OFFER_COLUMNS
        ))
        .bind(request_id)
        .bind(technician_id)
        .bind(technician_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(offer_from_row).collect())
    }

    pub async fn has_offer(&self, request_id: &str, technician_id: &str) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM service_offers WHERE service_request_id = ? AND technician_id = ?) AS found",
        )
        .bind(request_id)
        .bind(technician_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("found") != 0)
    }

    /// Accept `offer`: every pending sibling offer is rejected, the offer's technician
    /// is assigned, and the request becomes `accepted`. All or nothing, and
    /// only if the request has not changed since it was read.
    pub async fn accept_offer(
        &self,
        request: &ServiceRequest,
        offer: &ServiceOffer,
    ) -> Result<(ServiceOffer, ServiceRequest), AppError> {
        let now = Utc::now();
        let stamp = format_timestamp(&now);
        let new_version = request.version + 1;

        let mut tx = self.pool.begin().await?;

        // Claim the request first so concurrent acceptances serialize here.
        let claimed = sqlx::query(
            "UPDATE service_requests SET technician_id = ?, status = ?, accepted_offer_id = ?, completed_at = NULL, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&offer.technician)
        .bind(RequestStatus::Accepted.as_str())
        .bind(&offer.id)
        .bind(&stamp)
        .bind(new_version)
        .bind(&request.id)
        .bind(request.version)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "The request was modified concurrently, please retry".to_string(),
            ));
        }

        sqlx::query("UPDATE service_offers SET status = ?, updated_at = ? WHERE id = ?")
            .bind(OfferStatus::Accepted.as_str())
            .bind(&stamp)
            .bind(&offer.id)
            .execute(&mut *tx)
            .await?;

        let rejected = sqlx::query(
            "UPDATE service_offers SET status = ?, updated_at = ? WHERE service_request_id = ? AND id != ? AND status = ?",
        )
        .bind(OfferStatus::Rejected.as_str())
        .bind(&stamp)
        .bind(&request.id)
        .bind(&offer.id)
        .bind(OfferStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        add_service_history(&mut *tx, &offer.technician, &request.id).await?;

        sqlx::query("UPDATE conversations SET expires_at = NULL WHERE service_request_id = ?")
            .bind(&request.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            offer_id = %offer.id,
            rejected = rejected.rows_affected(),
            "Offer accepted"
        );

        let accepted = ServiceOffer {
            status: OfferStatus::Accepted,
            updated_at: now,
            ..offer.clone()
        };
        let request = ServiceRequest {
            technician: Some(offer.technician.clone()),
            status: RequestStatus::Accepted,
            accepted_offer: Some(offer.id.clone()),
            completed_at: None,
            updated_at: now,
            version: new_version,
            ..request.clone()
        };
        Ok((accepted, request))
    }

    /// Reject an offer unless it has been accepted in the meantime.
    pub async fn reject_offer(&self, offer: &ServiceOffer) -> Result<ServiceOffer, AppError> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE service_offers SET status = ?, updated_at = ? WHERE id = ? AND status != ?",
        )
        .bind(OfferStatus::Rejected.as_str())
        .bind(format_timestamp(&now))
        .bind(&offer.id)
        .bind(OfferStatus::Accepted.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "The offer was accepted concurrently".to_string(),
            ));
        }

        Ok(ServiceOffer {
            status: OfferStatus::Rejected,
            updated_at: now,
            ..offer.clone()
        })
    }

    /// All of a technician's offers with their request summaries, newest first.
    pub async fn list_offers_by_technician(
        &self,
        technician_id: &str,
    ) -> Result<Vec<OwnOffer>, AppError> {
        let rows = sqlx::query(
            r#"SELECT o.id, o.amount, o.message, o.status, o.created_at, o.updated_at,
                      r.id AS request_id, r.title, r.category, r.address,
                      r.scheduled_at, r.status AS request_status
               FROM service_offers o
               LEFT JOIN service_requests r ON r.id = o.service_request_id
               WHERE o.technician_id = ?
               ORDER BY o.created_at DESC, o.rowid DESC"#,
        )
        .bind(technician_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(own_offer_from_row).collect())
    }
}

fn offer_from_row(row: &sqlx::sqlite::SqliteRow) -> ServiceOffer {
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    ServiceOffer {
        id: row.get("id"),
        service_request: row.get("service_request_id"),
        technician: row.get("technician_id"),
        amount: row.get("amount"),
        message: row.get("message"),
        status: OfferStatus::parse(&status).unwrap_or(OfferStatus::Pending),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    }
}

fn own_offer_from_row(row: &sqlx::sqlite::SqliteRow) -> OwnOffer {
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let request_id: Option<String> = row.get("request_id");

    let service_request = request_id.map(|id| {
        let scheduled_at: String = row.get("scheduled_at");
        let request_status: String = row.get("request_status");
        RequestSummary {
            id,
            title: row.get("title"),
            category: row.get("category"),
            address: row.get("address"),
            scheduled_at: parse_timestamp(&scheduled_at),
            status: RequestStatus::parse(&request_status).unwrap_or(RequestStatus::Pending),
        }
    });

    OwnOffer {
        id: row.get("id"),
        amount: row.get("amount"),
        message: row.get("message"),
        status: OfferStatus::parse(&status).unwrap_or(OfferStatus::Pending),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        service_request,
    }
}
