//! Customer profile access: the relational repo fronted by the profile
//! cache. Mutations write through the cache so the next turn sees them.

use oficio_core::types::CustomerProfile;
use oficio_flows::ProfileCache;
use oficio_kv::keys;
use oficio_store::CustomerRepo;
use tracing::warn;

#[derive(Clone)]
pub struct CustomerDirectory {
    repo: CustomerRepo,
    cache: ProfileCache,
}

impl CustomerDirectory {
    pub fn new(repo: CustomerRepo, cache: ProfileCache) -> Self {
        Self { repo, cache }
    }

    /// Resolve (or create) the customer for a phone.
    ///
    /// Without a configured store — or when it errors — there is nowhere to
    /// persist consent, so a local profile with the consent gate already
    /// open is synthesized; the conversation must keep working either way.
    pub async fn get_or_create(&self, phone: &str) -> CustomerProfile {
        if !self.repo.configured() {
            return Self::local_profile(phone);
        }
        let repo = self.repo.clone();
        let fetch_phone = phone.to_string();
        let fetched = self
            .cache
            .get_or_fetch(&keys::customer_profile(phone), move || async move {
                match repo.get_or_create(&fetch_phone).await {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        warn!(phone = %fetch_phone, error = %e, "customer fetch failed");
                        None
                    }
                }
            })
            .await;
        fetched.unwrap_or_else(|| Self::local_profile(phone))
    }

    /// Confirm a city on the customer row; returns the updated profile when
    /// the store applied it.
    pub async fn update_city(&self, customer_id: &str, city: &str) -> Option<CustomerProfile> {
        match self.repo.update_city(customer_id, city).await {
            Ok(Some(profile)) => {
                self.cache
                    .store(&keys::customer_profile(&profile.phone), &profile)
                    .await;
                Some(profile)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(customer_id, error = %e, "customer city update failed");
                None
            }
        }
    }

    pub async fn mark_consented(&self, profile: &CustomerProfile) {
        if let Some(id) = profile.id.as_deref() {
            if let Err(e) = self.repo.set_consent(id, true).await {
                warn!(customer_id = id, error = %e, "consent flag update failed");
            }
        }
        let mut updated = profile.clone();
        updated.has_consent = true;
        self.cache
            .store(&keys::customer_profile(&updated.phone), &updated)
            .await;
    }

    /// Reset-command cleanup: drop city and consent, evict the cache entry.
    pub async fn clear_for_reset(&self, phone: &str, customer_id: Option<&str>) {
        if let Some(id) = customer_id {
            if let Err(e) = self.repo.clear_city(id).await {
                warn!(customer_id = id, error = %e, "city clear failed");
            }
            if let Err(e) = self.repo.clear_consent(id).await {
                warn!(customer_id = id, error = %e, "consent clear failed");
            }
        }
        self.cache.evict(&keys::customer_profile(phone)).await;
    }

    fn local_profile(phone: &str) -> CustomerProfile {
        CustomerProfile {
            id: None,
            phone: phone.to_string(),
            full_name: None,
            city: None,
            city_confirmed_at: None,
            has_consent: true,
        }
    }
}
