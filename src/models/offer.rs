//! Service offer model: a technician's bid on a service request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RequestStatus;

/// Resolution status of an offer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OfferStatus::Pending),
            "accepted" => Some(OfferStatus::Accepted),
            "rejected" => Some(OfferStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOffer {
    pub id: String,
    pub service_request: String,
    pub technician: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for submitting an offer.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOfferRequest {
    pub amount: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Parent request fields shown next to a technician's own offers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    pub address: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: RequestStatus,
}

/// One of the calling technician's offers with its request summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnOffer {
    pub id: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub service_request: Option<RequestSummary>,
}

/// A technician's offers bucketed by status.
#[derive(Debug, Clone, Serialize, Default)]
pub struct GroupedOffers {
    pub pending: Vec<OwnOffer>,
    pub accepted: Vec<OwnOffer>,
    pub rejected: Vec<OwnOffer>,
}
