//! User model shared by clients, technicians and administrators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marketplace role of a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Technician,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Technician => "technician",
            Role::Superadmin => "superadmin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client" => Some(Role::Client),
            "technician" => Some(Role::Technician),
            "superadmin" => Some(Role::Superadmin),
            _ => None,
        }
    }
}

/// Public contact profile.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Aggregated review score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Rating {
    pub average: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub day: String,
    #[serde(default)]
    pub start_hour: Option<String>,
    #[serde(default)]
    pub end_hour: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Technician-only profile data.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianProfile {
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub service_areas: Vec<String>,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub availability: Vec<AvailabilitySlot>,
    #[serde(default)]
    pub portfolio: Vec<PortfolioItem>,
}

/// A saved client address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
}

/// Client-only profile data.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Favorite technician ids
    #[serde(default)]
    pub favorites: Vec<String>,
}

/// A marketplace user. Credentials live with the identity service and never
/// appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_profile: Option<TechnicianProfile>,
    pub client_profile: ClientProfile,
    /// Ids of service requests this user took part in
    pub service_history: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing)]
    pub version: i64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Superadmin
    }

    /// Whether this user lists `specialty` exactly. A missing or blank
    /// specialty matches everyone.
    pub fn offers_specialty(&self, specialty: Option<&str>) -> bool {
        let Some(wanted) = specialty.map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        self.technician_profile
            .as_ref()
            .is_some_and(|p| p.specialties.iter().any(|s| s == wanted))
    }
}

/// A user entry from the provisioning seed file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub technician_profile: Option<TechnicianProfile>,
    #[serde(default)]
    pub client_profile: Option<ClientProfile>,
}

fn default_role() -> Role {
    Role::Client
}

/// Partial profile update; absent fields keep their value.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl ProfilePatch {
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(full_name) = &self.full_name {
            profile.full_name = full_name.clone();
        }
        if let Some(phone) = &self.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(address) = &self.address {
            profile.address = Some(address.clone());
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = Some(avatar.clone());
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfilePatch {
    #[serde(default)]
    pub addresses: Option<Vec<Address>>,
    #[serde(default)]
    pub favorites: Option<Vec<String>>,
}

/// Request body for `PUT /api/users/{id}`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub profile: Option<ProfilePatch>,
    #[serde(default)]
    pub client_profile: Option<ClientProfilePatch>,
    /// Only honoured for superadmins
    #[serde(default)]
    pub role: Option<Role>,
}

/// Either a single string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flatten into a list, dropping blank entries.
    pub fn into_vec(self) -> Vec<String> {
        let items = match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn normalize(value: Option<OneOrMany>) -> Vec<String> {
    value.map(OneOrMany::into_vec).unwrap_or_default()
}

/// Request body for `POST /api/technicians/register`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTechnicianRequest {
    #[serde(default)]
    pub specialties: Option<OneOrMany>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub experience_years: Option<i32>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Option<OneOrMany>,
    #[serde(default)]
    pub service_areas: Option<OneOrMany>,
    #[serde(default)]
    pub documents: Option<OneOrMany>,
    #[serde(default)]
    pub availability: Vec<AvailabilitySlot>,
    #[serde(default)]
    pub portfolio: Vec<PortfolioItem>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl RegisterTechnicianRequest {
    /// Build the technician profile, keeping the rating already earned.
    pub fn into_profile(self, rating: Rating) -> TechnicianProfile {
        let specialties = match self.specialties {
            Some(list) => list.into_vec(),
            None => normalize(self.specialty.map(OneOrMany::One)),
        };
        TechnicianProfile {
            specialties,
            experience_years: self.experience_years,
            bio: self.bio,
            skills: normalize(self.skills),
            service_areas: normalize(self.service_areas),
            rating,
            documents: normalize(self.documents),
            availability: self.availability,
            portfolio: self.portfolio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_support::user_with;

    #[test]
    fn test_specialty_filter() {
        let mut plumber = user_with("tech-1", Role::Technician);
        plumber.technician_profile = Some(TechnicianProfile {
            specialties: vec!["Plumbing".into(), "Heating".into()],
            ..Default::default()
        });

        assert!(plumber.offers_specialty(None));
        assert!(plumber.offers_specialty(Some("  ")));
        assert!(plumber.offers_specialty(Some("Heating")));
        assert!(!plumber.offers_specialty(Some("heat")));
        assert!(!user_with("tech-2", Role::Technician).offers_specialty(Some("Plumbing")));
    }

    #[test]
    fn test_role_round_trip_strings() {
        for role in [Role::Client, Role::Technician, Role::Superadmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn test_register_accepts_single_specialty() {
        let request: RegisterTechnicianRequest = serde_json::from_value(serde_json::json!({
            "specialty": "Plumbing",
            "serviceAreas": "Roma Norte",
            "skills": ["Leaks", " ", "Heaters"]
        }))
        .unwrap();

        let rating = Rating {
            average: 4.5,
            count: 2,
        };
        let profile = request.into_profile(rating);
        assert_eq!(profile.specialties, vec!["Plumbing"]);
        assert_eq!(profile.service_areas, vec!["Roma Norte"]);
        assert_eq!(profile.skills, vec!["Leaks", "Heaters"]);
        assert_eq!(profile.rating, rating);
    }

    #[test]
    fn test_profile_patch_merges() {
        let mut profile = Profile {
            full_name: "Ana".into(),
            phone: Some("555".into()),
            address: None,
            avatar: None,
        };
        ProfilePatch {
            address: Some("Coyoacan, CDMX".into()),
            ..Default::default()
        }
        .apply(&mut profile);

        assert_eq!(profile.full_name, "Ana");
        assert_eq!(profile.phone.as_deref(), Some("555"));
        assert_eq!(profile.address.as_deref(), Some("Coyoacan, CDMX"));
    }
}
