//! Marketplace rules kept free of I/O: request lifecycle, offer negotiation,
//! the conversation gate and the nearby-request ranking.
//!
//! Handlers load records, ask these functions what is allowed, and hand the
//! resulting plan to the repository.

pub mod gate;
pub mod lifecycle;
pub mod nearby;
pub mod negotiation;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;

    use crate::models::{
        ClientProfile, Profile, RequestStatus, Role, ServiceRequest, User,
    };

    pub fn user_with(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            role,
            profile: Profile::default(),
            technician_profile: None,
            client_profile: ClientProfile::default(),
            service_history: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 1,
        }
    }

    pub fn request_with(
        client: &str,
        technician: Option<&str>,
        status: RequestStatus,
    ) -> ServiceRequest {
        ServiceRequest {
            id: "request-1".to_string(),
            client: client.to_string(),
            technician: technician.map(str::to_string),
            title: "Leaking faucet".to_string(),
            description: "Kitchen faucet drips".to_string(),
            category: "plumbing".to_string(),
            address: "Roma Norte, CDMX".to_string(),
            scheduled_at: Utc::now(),
            contact_name: "Ana".to_string(),
            contact_phone: None,
            notes: None,
            category_details: serde_json::json!({}),
            status,
            accepted_offer: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 1,
        }
    }
}
