//! Relevance of open requests for a technician, by naive keyword matching of
//! service areas and home address against the request address and title.

use crate::models::{NearbyRequest, ServiceRequest, User};

const IN_AREA: &str = "Matches your service areas";
const OUT_OF_AREA: &str = "Outside your usual areas";

fn lowercase_terms<'a>(terms: impl Iterator<Item = &'a str>) -> Vec<String> {
    terms
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn score(areas: &[String], home_fragments: &[String], request: &ServiceRequest) -> u32 {
    let address = request.address.to_lowercase();
    let title = request.title.to_lowercase();

    let mut score = 0;
    for area in areas {
        if address.contains(area.as_str()) {
            score += 2;
        }
        if title.contains(area.as_str()) {
            score += 1;
        }
    }
    for fragment in home_fragments {
        if address.contains(fragment.as_str()) {
            score += 1;
        }
    }
    score
}

/// Score and order candidate requests for `technician`, best match first.
/// Ties keep the incoming order.
pub fn rank(technician: &User, candidates: Vec<ServiceRequest>) -> Vec<NearbyRequest> {
    let areas = technician
        .technician_profile
        .as_ref()
        .map(|p| lowercase_terms(p.service_areas.iter().map(String::as_str)))
        .unwrap_or_default();
    let home_fragments = lowercase_terms(
        technician
            .profile
            .address
            .as_deref()
            .unwrap_or_default()
            .split(','),
    );

    let mut ranked: Vec<NearbyRequest> = candidates
        .into_iter()
        .map(|request| {
            let score = score(&areas, &home_fragments, &request);
            NearbyRequest {
                id: request.id,
                title: request.title,
                category: request.category,
                address: request.address,
                scheduled_at: request.scheduled_at,
                description: request.description,
                client: request.client,
                score,
                relevance: if score > 0 { IN_AREA } else { OUT_OF_AREA },
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}
