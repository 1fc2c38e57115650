//! `awaiting_city`: resolve the city (synonyms included), persist it on the
//! customer, and launch the search. A service typed here when none is
//! stored reroutes instead of being misread as a city.

use oficio_core::types::{Reply, ReplySet};
use oficio_nlp::{extract_service_and_city, normalize_city_input};

use crate::messages;
use crate::orchestrator::TurnContext;

pub async fn handle(ctx: &mut TurnContext<'_>) -> ReplySet {
    let text = ctx.text.clone();

    // Reroute: "necesito un electricista" while we were asking for a city.
    if !text.is_empty() && ctx.flow.service.is_none() {
        if let (Some(service), _) = extract_service_and_city("", &text) {
            ctx.flow.clear_search();
            ctx.flow.set_need(service.clone(), text.clone());
            ctx.flow.city_confirmed = false;
            return ctx
                .reply(Reply::text(messages::reroute_city_prompt(&service)))
                .await;
        }
    }

    if text.is_empty() {
        return ctx.reply(Reply::text(messages::CITY_PROMPT)).await;
    }
    let Some(city) = normalize_city_input(&text) else {
        return ctx.reply(Reply::text(messages::CITY_NOT_RECOGNIZED)).await;
    };

    // The preamble already pushed the detected city to the customer store;
    // here we only pin the canonical value onto the flow.
    ctx.flow.city = Some(city.to_string());
    ctx.flow.city_confirmed = true;

    if ctx.flow.service.is_none() {
        // City without a need: guide back to the service question.
        ctx.flow.state = oficio_core::types::ConversationState::AwaitingService;
        return ctx.reply(Reply::text(messages::INITIAL_SERVICE_PROMPT)).await;
    }

    ctx.flow.begin_search();
    ctx.persist_flow().await;
    ctx.dispatch_pipeline();
    ctx.reply(Reply::text(messages::CONFIRMING_AVAILABILITY)).await
}
