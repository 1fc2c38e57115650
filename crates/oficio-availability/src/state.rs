use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use oficio_core::types::ProviderRecord;

use crate::wire::{normalize_phone, Candidate, Disposition};

/// One gathered reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub provider_id: Option<String>,
    pub provider_phone: Option<String>,
    pub status: String,
    pub received_at: DateTime<Utc>,
}

/// Full scatter/gather record, persisted under `availability:{req_id}`
/// with a 5-minute TTL. Replies landing after the caller stopped waiting
/// still accumulate here until expiry — harmless, occasionally useful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityState {
    pub req_id: String,
    pub phone: String,
    pub service: String,
    pub city: String,
    pub created_at: DateTime<Utc>,
    pub providers: Vec<Candidate>,
    #[serde(default)]
    pub accepted: Vec<ResponseRecord>,
    #[serde(default)]
    pub declined: Vec<ResponseRecord>,
}

impl AvailabilityState {
    /// Record a reply. Idempotent by `(provider_id, provider_phone)`;
    /// returns whether anything changed.
    pub fn record(&mut self, record: ResponseRecord, disposition: Disposition) -> bool {
        let target = match disposition {
            Disposition::Accepted => &mut self.accepted,
            Disposition::Declined => &mut self.declined,
            Disposition::Unknown => return false,
        };
        let duplicate = target.iter().any(|existing| {
            existing.provider_id == record.provider_id
                && existing.provider_phone == record.provider_phone
        });
        if duplicate {
            return false;
        }
        target.push(record);
        true
    }
}

/// Normalize a candidate set for the wire: dedupe by id and by normalized
/// phone, drop entries carrying neither.
pub fn normalize_candidates(providers: &[ProviderRecord]) -> Vec<Candidate> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_phones: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();
    for p in providers {
        let id = p.id.clone();
        let phone_norm = normalize_phone(p.phone.as_deref());
        if id.is_none() && phone_norm.is_none() {
            continue;
        }
        if let Some(ref id) = id {
            if !seen_ids.insert(id.clone()) {
                continue;
            }
        }
        if let Some(ref phone) = phone_norm {
            if !seen_phones.insert(phone.clone()) {
                continue;
            }
        }
        candidates.push(Candidate {
            id,
            phone: p.phone.clone(),
            name: p.name.clone(),
        });
    }
    candidates
}

/// Map accepted reply records back onto the original provider set,
/// preserving the original order. Matching is by id first, then by
/// normalized phone.
pub fn filter_providers_by_response(
    providers: &[ProviderRecord],
    accepted: &[ResponseRecord],
) -> Vec<ProviderRecord> {
    if accepted.is_empty() {
        return Vec::new();
    }
    let accepted_ids: HashSet<&str> = accepted
        .iter()
        .filter_map(|r| r.provider_id.as_deref())
        .collect();
    let accepted_phones: HashSet<String> = accepted
        .iter()
        .filter_map(|r| normalize_phone(r.provider_phone.as_deref()))
        .collect();

    providers
        .iter()
        .filter(|p| {
            if let Some(id) = p.id.as_deref() {
                if accepted_ids.contains(id) {
                    return true;
                }
            }
            match normalize_phone(p.phone.as_deref()) {
                Some(phone) => accepted_phones.contains(&phone),
                None => false,
            }
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: Option<&str>, phone: Option<&str>) -> ProviderRecord {
        ProviderRecord {
            id: id.map(String::from),
            phone: phone.map(String::from),
            name: Some("P".into()),
            ..Default::default()
        }
    }

    fn response(id: Option<&str>, phone: Option<&str>) -> ResponseRecord {
        ResponseRecord {
            provider_id: id.map(String::from),
            provider_phone: phone.map(String::from),
            status: "accepted".into(),
            received_at: Utc::now(),
        }
    }

    fn state() -> AvailabilityState {
        AvailabilityState {
            req_id: "req-1".into(),
            phone: "593".into(),
            service: "plomero".into(),
            city: "Quito".into(),
            created_at: Utc::now(),
            providers: vec![],
            accepted: vec![],
            declined: vec![],
        }
    }

    #[test]
    fn record_is_idempotent() {
        let mut s = state();
        assert!(s.record(response(Some("p1"), Some("099")), Disposition::Accepted));
        for _ in 0..5 {
            assert!(!s.record(response(Some("p1"), Some("099")), Disposition::Accepted));
        }
        assert_eq!(s.accepted.len(), 1);
        assert!(s.declined.is_empty());
    }

    #[test]
    fn unknown_status_is_not_stored() {
        let mut s = state();
        assert!(!s.record(response(Some("p1"), None), Disposition::Unknown));
        assert!(s.accepted.is_empty() && s.declined.is_empty());
    }

    #[test]
    fn candidates_dedupe_and_drop_anonymous() {
        let providers = vec![
            provider(Some("a"), Some("+593 1")),
            provider(Some("a"), Some("+593 2")), // duplicate id
            provider(None, Some("5931")),        // duplicate phone after normalization
            provider(None, None),                // nothing to address it by
            provider(Some("b"), None),
        ];
        let candidates = normalize_candidates(&providers);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id.as_deref(), Some("a"));
        assert_eq!(candidates[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn filter_empty_acceptance_is_empty() {
        let providers = vec![provider(Some("a"), None), provider(Some("b"), None)];
        assert!(filter_providers_by_response(&providers, &[]).is_empty());
    }

    #[test]
    fn filter_full_acceptance_preserves_order() {
        let providers = vec![
            provider(Some("a"), Some("+1")),
            provider(Some("b"), Some("+2")),
            provider(Some("c"), Some("+3")),
        ];
        // Replies arrive out of order; the filter must not care.
        let accepted = vec![
            response(Some("c"), None),
            response(Some("a"), None),
            response(Some("b"), None),
        ];
        let filtered = filter_providers_by_response(&providers, &accepted);
        let ids: Vec<_> = filtered.iter().map(|p| p.id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn filter_matches_by_normalized_phone_when_id_absent() {
        let providers = vec![provider(None, Some("+593 99 111@c.us"))];
        let accepted = vec![response(None, Some("59399111"))];
        assert_eq!(filter_providers_by_response(&providers, &accepted).len(), 1);
    }
}
