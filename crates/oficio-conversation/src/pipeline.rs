//! C10: the background search pipeline. Spawned when a flow enters
//! `searching`; runs search → AI-validate → availability → present, pushing
//! progress over the WhatsApp adapter as it goes. Detached: nothing in
//! here may surface an error to anyone.

use std::sync::Arc;

use tracing::{info, warn};

use oficio_availability::AvailabilityQuery;
use oficio_core::types::{ConversationFlow, ConversationState};

use crate::handlers::{confirm_prompt_replies, provider_prompt_replies};
use crate::messages;
use crate::services::ConversationServices;

const SEARCH_LIMIT: usize = 10;

pub async fn run(services: Arc<ConversationServices>, phone: String, mut flow: ConversationFlow) {
    // Re-read: the dispatching handler persisted just before spawning, and
    // another node may have advanced the flow since.
    if let Some(stored) = services.flows.get_existing(&phone).await {
        flow = stored;
    }
    let Some(service) = flow.service.clone().filter(|s| !s.trim().is_empty()) else {
        warn!(%phone, "search pipeline without a service, aborting");
        return;
    };
    let Some(city) = flow.city.clone().filter(|c| !c.trim().is_empty()) else {
        warn!(%phone, "search pipeline without a city, aborting");
        return;
    };
    let need_summary = flow.service_full.clone().unwrap_or_else(|| service.clone());

    info!(%phone, service, city, "search pipeline started");
    services.whatsapp.send_and_log(&phone, messages::SEARCHING_NOTICE).await;

    let found = match services
        .search
        .search(&service, &city, SEARCH_LIMIT, false, flow.expanded_terms.as_deref())
        .await
    {
        Ok(outcome) => outcome.providers,
        Err(e) => {
            warn!(%phone, error = %e, "provider search failed");
            Vec::new()
        }
    };
    services
        .whatsapp
        .send_and_log(&phone, &messages::found_count(found.len(), &city))
        .await;

    if found.is_empty() {
        services
            .whatsapp
            .send_and_log(&phone, &messages::no_results(&service, &city))
            .await;
        close_with_confirm(&services, &phone, &mut flow).await;
        return;
    }

    let candidates = services.validator.validate(&need_summary, found).await;
    if candidates.is_empty() {
        info!(%phone, "no provider survived AI validation");
        services
            .whatsapp
            .send_and_log(&phone, &messages::no_availability(&service, &city))
            .await;
        close_with_confirm(&services, &phone, &mut flow).await;
        return;
    }

    let pending = services
        .availability
        .request(AvailabilityQuery {
            phone: phone.clone(),
            service: service.clone(),
            city: city.clone(),
            need_summary: Some(need_summary),
            providers: candidates.clone(),
        })
        .await;

    let outcome = match pending {
        Some(pending) => {
            // Expose the in-flight request so inbound turns landing during
            // the gather can peek at its progress.
            flow.state = ConversationState::AwaitingResponses;
            flow.mqtt_req_id = Some(pending.req_id.clone());
            flow.providers = candidates;
            services.flows.set(&phone, &flow).await;
            services.availability.wait(pending).await
        }
        None => Default::default(),
    };

    // Re-read again: an inbound turn may have presented results already.
    if let Some(stored) = services.flows.get_existing(&phone).await {
        flow = stored;
    }
    if flow.state == ConversationState::PresentingResults {
        info!(%phone, "results already presented by an inbound turn");
        return;
    }

    if !outcome.accepted.is_empty() {
        match flow.present_results(outcome.accepted) {
            Ok(()) => {
                services.flows.set(&phone, &flow).await;
                // Snapshot each presented provider for later detail reads.
                for provider in &flow.providers {
                    if let Some(provider_phone) = provider.phone.as_deref() {
                        services
                            .profiles
                            .store(&oficio_kv::keys::provider_profile(provider_phone), provider)
                            .await;
                    }
                }
                for reply in provider_prompt_replies(&city, &flow.providers) {
                    if let Some(text) = reply.response {
                        services.whatsapp.send_and_log(&phone, &text).await;
                    }
                }
                info!(%phone, presented = flow.providers.len(), "search pipeline finished");
            }
            Err(e) => warn!(%phone, error = %e, "present_results refused"),
        }
        return;
    }

    services
        .whatsapp
        .send_and_log(&phone, &messages::no_availability(&service, &city))
        .await;
    close_with_confirm(&services, &phone, &mut flow).await;
}

/// No presentable outcome: park the flow in `confirm_new_search` with the
/// change-city option and push the confirmation prompt.
async fn close_with_confirm(
    services: &Arc<ConversationServices>,
    phone: &str,
    flow: &mut ConversationFlow,
) {
    flow.ask_confirm_new_search(messages::NEW_SEARCH_TITLE.to_string(), true);
    flow.providers.clear();
    services.flows.set(phone, flow).await;
    for reply in confirm_prompt_replies(flow) {
        if let Some(text) = reply.response {
            services.whatsapp.send_and_log(phone, &text).await;
        }
    }
}
