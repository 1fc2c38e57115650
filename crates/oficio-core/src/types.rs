use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Cap on how many providers a conversation ever presents.
pub const MAX_PRESENTED_PROVIDERS: usize = 5;

/// Idle window after which a conversation is reset (seconds).
pub const IDLE_RESET_SECONDS: i64 = 180;

/// The state a per-phone conversation is in.
///
/// Stored as the `state` field of [`ConversationFlow`]; the orchestrator
/// dispatches on it with an exhaustive match, so adding a state here forces
/// every dispatcher to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    AwaitingConsent,
    AwaitingService,
    AwaitingCity,
    Searching,
    AwaitingResponses,
    PresentingResults,
    ViewingProviderDetail,
    ConfirmNewSearch,
    Completed,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationState::AwaitingConsent => "awaiting_consent",
            ConversationState::AwaitingService => "awaiting_service",
            ConversationState::AwaitingCity => "awaiting_city",
            ConversationState::Searching => "searching",
            ConversationState::AwaitingResponses => "awaiting_responses",
            ConversationState::PresentingResults => "presenting_results",
            ConversationState::ViewingProviderDetail => "viewing_provider_detail",
            ConversationState::ConfirmNewSearch => "confirm_new_search",
            ConversationState::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// A provider as returned by the search backend.
///
/// Only the fields the core reads are typed; everything else the backend
/// sends rides along in `extra` untouched so presentation layers can use it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRecord {
    #[serde(default, alias = "provider_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "phone_number", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(
        default,
        alias = "full_name",
        alias = "provider_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(default, alias = "experience_years", skip_serializing_if = "Option::is_none")]
    pub years_of_experience: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub verified: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProviderRecord {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Proveedor")
    }
}

/// Customer profile, a projection of the relational store row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_confirmed_at: Option<String>,
    #[serde(default)]
    pub has_consent: bool,
}

/// Per-phone conversation record. Owned by the flow store; every turn reads
/// it fresh and writes it back with the configured TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationFlow {
    pub state: ConversationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_full: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default)]
    pub city_confirmed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_provider: Option<ProviderRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_detail_idx: Option<usize>,
    #[serde(default)]
    pub searching_dispatched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_req_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_terms: Option<Vec<String>>,
    #[serde(default)]
    pub confirm_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_title: Option<String>,
    #[serde(default)]
    pub confirm_include_city_option: bool,
    #[serde(default)]
    pub has_consent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at_prev: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

impl Default for ConversationFlow {
    fn default() -> Self {
        Self::fresh(ConversationState::AwaitingService)
    }
}

/// Violation of a flow invariant. These indicate a programming error in a
/// state handler, not bad user input; callers log them and reprompt.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FlowInvariantError {
    #[error("cannot present an empty provider list")]
    EmptyProviders,
    #[error("provider index {idx} out of range (have {len})")]
    IndexOutOfRange { idx: usize, len: usize },
}

impl ConversationFlow {
    pub fn fresh(state: ConversationState) -> Self {
        Self {
            state,
            service: None,
            service_full: None,
            city: None,
            city_confirmed: false,
            providers: Vec::new(),
            chosen_provider: None,
            provider_detail_idx: None,
            searching_dispatched: false,
            mqtt_req_id: None,
            expanded_terms: None,
            confirm_attempts: 0,
            confirm_title: None,
            confirm_include_city_option: false,
            has_consent: false,
            last_seen_at: None,
            last_seen_at_prev: None,
            customer_id: None,
        }
    }

    /// True when the previous turn is older than the idle-reset window.
    pub fn idle_expired(&self, now: DateTime<Utc>) -> bool {
        match self.last_seen_at_prev {
            Some(prev) => (now - prev).num_seconds() > IDLE_RESET_SECONDS,
            None => false,
        }
    }

    /// Record what the user asked for and move to city capture or search.
    pub fn set_need(&mut self, service: String, service_full: String) {
        self.service = Some(service);
        self.service_full = Some(service_full);
    }

    /// Enter `searching` with the double-dispatch guard set.
    pub fn begin_search(&mut self) {
        self.state = ConversationState::Searching;
        self.searching_dispatched = true;
    }

    /// Transition to `presenting_results`. Refuses an empty list; truncates
    /// to the presentation cap and clears any stale detail index.
    pub fn present_results(
        &mut self,
        mut providers: Vec<ProviderRecord>,
    ) -> Result<(), FlowInvariantError> {
        if providers.is_empty() {
            return Err(FlowInvariantError::EmptyProviders);
        }
        providers.truncate(MAX_PRESENTED_PROVIDERS);
        self.providers = providers;
        self.provider_detail_idx = None;
        self.chosen_provider = None;
        self.state = ConversationState::PresentingResults;
        self.searching_dispatched = false;
        self.mqtt_req_id = None;
        Ok(())
    }

    /// Select a provider by zero-based index and enter the detail view.
    pub fn select_provider(&mut self, idx: usize) -> Result<&ProviderRecord, FlowInvariantError> {
        if idx >= self.providers.len() {
            return Err(FlowInvariantError::IndexOutOfRange {
                idx,
                len: self.providers.len(),
            });
        }
        self.chosen_provider = Some(self.providers[idx].clone());
        self.provider_detail_idx = Some(idx);
        self.state = ConversationState::ViewingProviderDetail;
        Ok(&self.providers[idx])
    }

    /// Leave the detail view back to the list.
    pub fn back_to_results(&mut self) {
        self.chosen_provider = None;
        self.provider_detail_idx = None;
        self.state = ConversationState::PresentingResults;
    }

    /// Enter `confirm_new_search` with a fresh attempt counter.
    pub fn ask_confirm_new_search(&mut self, title: String, include_city_option: bool) {
        self.state = ConversationState::ConfirmNewSearch;
        self.confirm_attempts = 0;
        self.confirm_title = Some(title);
        self.confirm_include_city_option = include_city_option;
        self.searching_dispatched = false;
        self.mqtt_req_id = None;
    }

    /// Drop everything tied to the current need, keeping identity and city.
    pub fn clear_search(&mut self) {
        self.service = None;
        self.service_full = None;
        self.providers.clear();
        self.chosen_provider = None;
        self.provider_detail_idx = None;
        self.searching_dispatched = false;
        self.mqtt_req_id = None;
        self.expanded_terms = None;
        self.confirm_attempts = 0;
        self.confirm_title = None;
        self.confirm_include_city_option = false;
    }
}

/// Inbound WhatsApp payload as delivered by the wire adapter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppInbound {
    pub from_number: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub selected_option: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub device_type: Option<String>,
}

impl WhatsAppInbound {
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("").trim()
    }
}

/// Advisory rendering hint accompanying a reply. The adapter is free to
/// render or ignore it; correctness never depends on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiHint {
    Buttons { buttons: Vec<String> },
    ProviderResults { providers: Vec<Value> },
    Silent,
}

/// A single user-visible reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiHint>,
}

impl Reply {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            response: Some(body.into()),
            ui: None,
        }
    }

    pub fn buttons(body: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            response: Some(body.into()),
            ui: Some(UiHint::Buttons { buttons: labels }),
        }
    }

    pub fn silent() -> Self {
        Self {
            response: None,
            ui: Some(UiHint::Silent),
        }
    }

    /// Numbered provider-results hint: each provider carries its option label.
    pub fn provider_results(body: impl Into<String>, providers: &[ProviderRecord]) -> Self {
        let labeled = providers
            .iter()
            .take(MAX_PRESENTED_PROVIDERS)
            .enumerate()
            .map(|(i, p)| {
                let mut v = serde_json::to_value(p).unwrap_or(Value::Null);
                if let Value::Object(ref mut map) = v {
                    map.insert("_option_label".into(), Value::String((i + 1).to_string()));
                }
                v
            })
            .collect();
        Self {
            response: Some(body.into()),
            ui: Some(UiHint::ProviderResults { providers: labeled }),
        }
    }
}

/// What an inbound handler returns: either one reply or an ordered batch.
/// Serializes to `{"response": ...}` or `{"messages": [...]}` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplySet {
    Single(Reply),
    Messages { messages: Vec<Reply> },
}

impl ReplySet {
    pub fn single(reply: Reply) -> Self {
        ReplySet::Single(reply)
    }

    pub fn messages(replies: Vec<Reply>) -> Self {
        ReplySet::Messages { messages: replies }
    }

    /// All reply texts, in order (used to mirror bot output into the
    /// session log).
    pub fn texts(&self) -> Vec<&str> {
        match self {
            ReplySet::Single(r) => r.response.as_deref().into_iter().collect(),
            ReplySet::Messages { messages } => {
                messages.iter().filter_map(|r| r.response.as_deref()).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str) -> ProviderRecord {
        ProviderRecord {
            id: Some(id.to_string()),
            name: Some(format!("P{}", id)),
            ..Default::default()
        }
    }

    #[test]
    fn state_round_trips_as_snake_case() {
        let json = serde_json::to_string(&ConversationState::ViewingProviderDetail).unwrap();
        assert_eq!(json, "\"viewing_provider_detail\"");
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ConversationState::ViewingProviderDetail);
    }

    #[test]
    fn present_results_rejects_empty() {
        let mut flow = ConversationFlow::default();
        assert_eq!(
            flow.present_results(vec![]),
            Err(FlowInvariantError::EmptyProviders)
        );
        assert_eq!(flow.state, ConversationState::AwaitingService);
    }

    #[test]
    fn present_results_truncates_to_cap() {
        let mut flow = ConversationFlow::default();
        let many: Vec<_> = (0..8).map(|i| provider(&i.to_string())).collect();
        flow.present_results(many).unwrap();
        assert_eq!(flow.providers.len(), MAX_PRESENTED_PROVIDERS);
        assert_eq!(flow.state, ConversationState::PresentingResults);
    }

    #[test]
    fn select_provider_bounds_checked() {
        let mut flow = ConversationFlow::default();
        flow.present_results(vec![provider("1"), provider("2")]).unwrap();
        assert!(flow.select_provider(2).is_err());
        flow.select_provider(1).unwrap();
        assert_eq!(flow.provider_detail_idx, Some(1));
        assert_eq!(flow.state, ConversationState::ViewingProviderDetail);
        assert_eq!(flow.chosen_provider.as_ref().unwrap().id.as_deref(), Some("2"));
    }

    #[test]
    fn idle_expiry_uses_previous_turn() {
        let now = Utc::now();
        let mut flow = ConversationFlow::default();
        assert!(!flow.idle_expired(now));
        flow.last_seen_at_prev = Some(now - chrono::Duration::seconds(179));
        assert!(!flow.idle_expired(now));
        flow.last_seen_at_prev = Some(now - chrono::Duration::seconds(200));
        assert!(flow.idle_expired(now));
    }

    #[test]
    fn provider_record_keeps_unknown_fields() {
        let json = r#"{"provider_id":"p1","phone_number":"+593 99","full_name":"Ana",
                       "rating":4.5,"specialties":["tuberías"]}"#;
        let p: ProviderRecord = serde_json::from_str(json).unwrap();
        assert_eq!(p.id.as_deref(), Some("p1"));
        assert_eq!(p.name.as_deref(), Some("Ana"));
        assert!(p.extra.contains_key("specialties"));
        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["specialties"][0], "tuberías");
    }

    #[test]
    fn reply_set_wire_shapes() {
        let single = ReplySet::single(Reply::text("hola"));
        assert_eq!(
            serde_json::to_value(&single).unwrap(),
            serde_json::json!({"response": "hola"})
        );
        let batch = ReplySet::messages(vec![Reply::text("a"), Reply::text("b")]);
        let v = serde_json::to_value(&batch).unwrap();
        assert_eq!(v["messages"][1]["response"], "b");
    }
}
