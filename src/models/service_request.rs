//! Service request model: a unit of repair work posted by a client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a service request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "in_progress" => Some(RequestStatus::InProgress),
            "completed" => Some(RequestStatus::Completed),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    /// Statuses during which chat is always open.
    pub fn is_active(&self) -> bool {
        matches!(self, RequestStatus::Accepted | RequestStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

/// A posted repair job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: String,
    /// Owning client id; never changes after creation
    pub client: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician: Option<String>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub address: String,
    pub scheduled_at: DateTime<Utc>,
    pub contact_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub category_details: serde_json::Value,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_offer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Internal version for optimistic concurrency control
    #[serde(default, skip_serializing)]
    pub version: i64,
}

impl ServiceRequest {
    pub fn is_client(&self, user_id: &str) -> bool {
        self.client == user_id
    }

    pub fn is_assigned_technician(&self, user_id: &str) -> bool {
        self.technician.as_deref() == Some(user_id)
    }
}

/// Request body for creating a service request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub address: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub category_details: Option<serde_json::Value>,
}

/// Request body for `PATCH /service-request/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Request body for `PATCH /service-request/{id}/assign`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTechnicianRequest {
    #[serde(default)]
    pub technician_id: String,
}

/// A pending request as seen from a technician's nearby feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyRequest {
    pub id: String,
    pub title: String,
    pub category: String,
    pub address: String,
    pub scheduled_at: DateTime<Utc>,
    pub description: String,
    pub client: String,
    pub score: u32,
    pub relevance: &'static str,
}
