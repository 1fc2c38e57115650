use std::collections::HashMap;
use std::time::Duration;

use oficio_core::types::{ConversationFlow, ConversationState};
use oficio_kv::{keys, KvClient};
use tracing::debug;

/// TTL-bound per-phone flow persistence.
///
/// `get` never fails the caller: a missing or unreadable record comes back
/// as a fresh `awaiting_service` flow, matching the "empty flow" contract.
#[derive(Clone)]
pub struct FlowStore {
    kv: KvClient,
    ttl: Duration,
}

impl FlowStore {
    pub fn new(kv: KvClient, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Current flow, or a fresh one when absent / unreadable.
    pub async fn get(&self, phone: &str) -> ConversationFlow {
        self.get_existing(phone)
            .await
            .unwrap_or_else(|| ConversationFlow::fresh(ConversationState::AwaitingService))
    }

    /// Current flow only if one is stored.
    pub async fn get_existing(&self, phone: &str) -> Option<ConversationFlow> {
        self.kv.get_json(&keys::flow(phone)).await
    }

    pub async fn set(&self, phone: &str, flow: &ConversationFlow) {
        debug!(phone, state = %flow.state, "persisting flow");
        self.kv.set_json(&keys::flow(phone), flow, Some(self.ttl)).await;
    }

    pub async fn delete(&self, phone: &str) {
        self.kv.delete(&keys::flow(phone)).await;
    }

    /// Bulk read (one MGET). Phones without a stored flow are absent from
    /// the result.
    pub async fn get_many(&self, phones: &[String]) -> HashMap<String, ConversationFlow> {
        let flow_keys: Vec<String> = phones.iter().map(|p| keys::flow(p)).collect();
        let found = self.kv.mget_json::<ConversationFlow>(&flow_keys).await;
        phones
            .iter()
            .filter_map(|phone| {
                found
                    .get(&keys::flow(phone))
                    .map(|flow| (phone.clone(), flow.clone()))
            })
            .collect()
    }

    /// Best-effort read-modify-write. Concurrent writers race last-wins,
    /// which the orchestrator tolerates (state is re-read every turn).
    pub async fn update<F>(&self, phone: &str, mutate: F) -> ConversationFlow
    where
        F: FnOnce(&mut ConversationFlow),
    {
        let mut flow = self.get(phone).await;
        mutate(&mut flow);
        self.set(phone, &flow).await;
        flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FlowStore {
        FlowStore::new(KvClient::detached(), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn missing_flow_reads_as_fresh() {
        let store = store();
        let flow = store.get("593999000111").await;
        assert_eq!(flow.state, ConversationState::AwaitingService);
        assert!(store.get_existing("593999000111").await.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = store();
        let mut flow = ConversationFlow::default();
        flow.set_need("plomero".into(), "necesito un plomero".into());
        flow.begin_search();
        store.set("p", &flow).await;

        let back = store.get("p").await;
        assert_eq!(back.state, ConversationState::Searching);
        assert_eq!(back.service.as_deref(), Some("plomero"));
        assert!(back.searching_dispatched);
    }

    #[tokio::test]
    async fn delete_resets_to_fresh() {
        let store = store();
        let mut flow = ConversationFlow::default();
        flow.set_need("pintor".into(), "pintor".into());
        store.set("p", &flow).await;
        store.delete("p").await;
        assert!(store.get_existing("p").await.is_none());
    }

    #[tokio::test]
    async fn update_applies_mutation() {
        let store = store();
        let updated = store
            .update("p", |flow| {
                flow.city = Some("Quito".into());
                flow.city_confirmed = true;
            })
            .await;
        assert!(updated.city_confirmed);
        let back = store.get("p").await;
        assert_eq!(back.city.as_deref(), Some("Quito"));
    }

    #[tokio::test]
    async fn get_many_skips_absent_phones() {
        let store = store();
        let mut flow = ConversationFlow::default();
        flow.set_need("cerrajero".into(), "cerrajero urgente".into());
        store.set("a", &flow).await;
        store.set("b", &ConversationFlow::default()).await;

        let found = store
            .get_many(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await;
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"].service.as_deref(), Some("cerrajero"));
        assert!(!found.contains_key("c"));
    }

    #[tokio::test]
    async fn flow_expires_with_ttl() {
        let store = FlowStore::new(KvClient::detached(), Duration::from_millis(20));
        store.set("p", &ConversationFlow::default()).await;
        assert!(store.get_existing("p").await.is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get_existing("p").await.is_none());
    }
}
