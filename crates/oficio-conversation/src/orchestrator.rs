//! C12: the conversation orchestrator. One call per inbound WhatsApp
//! message: resolve the customer, gate on consent, run the turn preamble
//! (idle reset, city sync, reset commands, transcript), then dispatch to
//! the handler for the current state.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use oficio_core::types::{
    ConversationFlow, ConversationState, CustomerProfile, Reply, ReplySet, WhatsAppInbound,
};
use oficio_nlp::{extract_service_and_city, is_reset_keyword, normalize_button};

use crate::handlers;
use crate::messages;
use crate::pipeline;
use crate::services::ConversationServices;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("from_number is required")]
    MissingPhone,
}

/// Per-turn working set handed to state handlers. Mutations to `flow` are
/// persisted by the `reply*` helpers; handlers never write the store
/// directly.
pub struct TurnContext<'a> {
    pub services: &'a Arc<ConversationServices>,
    pub phone: String,
    pub flow: ConversationFlow,
    pub text: String,
    pub selected: Option<String>,
    pub customer: CustomerProfile,
}

impl TurnContext<'_> {
    pub async fn persist_flow(&self) {
        self.services.flows.set(&self.phone, &self.flow).await;
    }

    /// Persist the flow, mirror the bot text into the session log, reply.
    pub async fn reply(&self, reply: Reply) -> ReplySet {
        self.persist_flow().await;
        self.log_bot(&reply).await;
        ReplySet::single(reply)
    }

    pub async fn reply_many(&self, replies: Vec<Reply>) -> ReplySet {
        self.persist_flow().await;
        for reply in &replies {
            self.log_bot(reply).await;
        }
        ReplySet::messages(replies)
    }

    async fn log_bot(&self, reply: &Reply) {
        if let Some(text) = &reply.response {
            self.services
                .sessions
                .save(&self.phone, text, true, Map::new())
                .await;
        }
    }

    /// Launch the background search pipeline for the current flow.
    pub fn dispatch_pipeline(&self) {
        let services = Arc::clone(self.services);
        let phone = self.phone.clone();
        let flow = self.flow.clone();
        tokio::spawn(async move {
            pipeline::run(services, phone, flow).await;
        });
    }
}

pub struct Orchestrator {
    services: Arc<ConversationServices>,
}

impl Orchestrator {
    pub fn new(services: Arc<ConversationServices>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<ConversationServices> {
        &self.services
    }

    pub async fn handle_message(
        &self,
        payload: WhatsAppInbound,
    ) -> Result<ReplySet, ConversationError> {
        let phone = payload.from_number.trim().to_string();
        if phone.is_empty() {
            return Err(ConversationError::MissingPhone);
        }
        let services = &self.services;

        // Resolve the customer; gate on consent before anything else. No
        // service or city is ever stored while the gate holds.
        let customer = services.customers.get_or_create(&phone).await;
        if !customer.has_consent {
            let outcome = services
                .consent
                .handle(&services.customers, &customer, &payload)
                .await;
            if outcome.decision == Some(oficio_store::ConsentResponse::Declined) {
                services
                    .flows
                    .set(&phone, &ConversationFlow::fresh(ConversationState::Completed))
                    .await;
            }
            return Ok(outcome.reply);
        }

        let existing = services.flows.get_existing(&phone).await;
        let is_new_flow = existing.is_none();
        let mut flow = existing.unwrap_or_default();
        let now = Utc::now();

        // Idle reset: a stale conversation starts over with a notice.
        if flow.idle_expired(now) {
            info!(%phone, "idle window exceeded, resetting conversation");
            services.flows.delete(&phone).await;
            let mut fresh = ConversationFlow::fresh(ConversationState::AwaitingService);
            fresh.last_seen_at = Some(now);
            fresh.last_seen_at_prev = Some(now);
            fresh.has_consent = true;
            services.flows.set(&phone, &fresh).await;
            let replies = vec![
                Reply::text(messages::INACTIVITY_NOTICE),
                Reply::text(messages::INITIAL_SERVICE_PROMPT),
            ];
            for reply in &replies {
                if let Some(text) = &reply.response {
                    services.sessions.save(&phone, text, true, Map::new()).await;
                }
            }
            return Ok(ReplySet::messages(replies));
        }

        flow.last_seen_at = Some(now);
        flow.last_seen_at_prev = Some(now);
        flow.has_consent = true;

        // Sync customer identity and city into the flow.
        if let Some(id) = &customer.id {
            flow.customer_id.get_or_insert_with(|| id.clone());
        }
        if flow.city.is_none() {
            if let Some(city) = &customer.city {
                flow.city = Some(city.clone());
                flow.city_confirmed = true;
            }
        }

        let text = payload.text().to_string();
        let selected = normalize_button(payload.selected_option.as_deref());

        // Opportunistic city detection: a city mentioned anywhere updates
        // both the flow and the customer record.
        if let Some(detected_city) = extract_service_and_city("", &text).1 {
            self.apply_detected_city(&mut flow, &customer, &detected_city).await;
        }

        // Reset command: wipe flow, registered city, and consent.
        if !text.is_empty() && is_reset_keyword(&text) {
            info!(%phone, "reset keyword received");
            services.flows.delete(&phone).await;
            let reset_id = flow.customer_id.as_deref().or(customer.id.as_deref());
            services.customers.clear_for_reset(&phone, reset_id).await;
            services
                .flows
                .set(&phone, &ConversationFlow::fresh(ConversationState::AwaitingService))
                .await;
            return Ok(ReplySet::single(Reply::text(messages::NEW_SESSION)));
        }

        // Transcript: the user's turn.
        if !text.is_empty() {
            let mut meta = Map::new();
            if let Some(id) = &payload.id {
                meta.insert("message_id".into(), Value::String(id.clone()));
            }
            services.sessions.save(&phone, &text, false, meta).await;
        }

        // Courteous close from any state.
        if selected.as_deref() == Some(messages::CONFIRM_NO_LABEL) {
            services.flows.delete(&phone).await;
            return Ok(ReplySet::single(Reply::text(messages::QUICK_CLOSE)));
        }

        info!(
            %phone,
            state = %flow.state,
            selected = selected.as_deref().unwrap_or(""),
            "processing turn"
        );

        let mut ctx = TurnContext {
            services,
            phone,
            flow,
            text,
            selected,
            customer,
        };

        // A brand-new conversation (or one already closed) goes through the
        // first-contact entry: a recognizable need skips straight ahead.
        if is_new_flow || ctx.flow.state == ConversationState::Completed {
            return Ok(handlers::entry::handle(&mut ctx).await);
        }

        Ok(match ctx.flow.state {
            ConversationState::AwaitingConsent => {
                // Consent arrived through the gate; restart the conversation.
                ctx.flow.state = ConversationState::AwaitingService;
                ctx.reply(Reply::text(messages::INITIAL_SERVICE_PROMPT)).await
            }
            ConversationState::AwaitingService => handlers::service::handle(&mut ctx).await,
            ConversationState::AwaitingCity => handlers::city::handle(&mut ctx).await,
            ConversationState::Searching => handlers::searching::handle(&mut ctx).await,
            ConversationState::AwaitingResponses => handlers::responses::handle(&mut ctx).await,
            ConversationState::PresentingResults => handlers::results::handle(&mut ctx).await,
            ConversationState::ViewingProviderDetail => handlers::detail::handle(&mut ctx).await,
            ConversationState::ConfirmNewSearch => handlers::confirm::handle(&mut ctx).await,
            ConversationState::Completed => handlers::entry::handle(&mut ctx).await,
        })
    }

    async fn apply_detected_city(
        &self,
        flow: &mut ConversationFlow,
        customer: &CustomerProfile,
        detected_city: &str,
    ) {
        let differs = flow
            .city
            .as_deref()
            .map(|current| !current.eq_ignore_ascii_case(detected_city))
            .unwrap_or(true);
        if !differs {
            flow.city_confirmed = true;
            return;
        }
        let customer_id = flow.customer_id.clone().or_else(|| customer.id.clone());
        if let Some(customer_id) = customer_id {
            match self
                .services
                .customers
                .update_city(&customer_id, detected_city)
                .await
            {
                Some(updated) => {
                    flow.city = updated.city.clone();
                    flow.customer_id = updated.id.clone();
                }
                None => {
                    warn!(%customer_id, "city update not persisted, keeping it on the flow");
                    flow.city = Some(detected_city.to_string());
                }
            }
        } else {
            flow.city = Some(detected_city.to_string());
        }
        flow.city_confirmed = true;
    }
}
