//! `awaiting_responses`: the user pinged us while the availability gather
//! is still open. Peek at the state record — present as soon as anyone
//! accepted, give up when the record expired, otherwise keep them posted.

use oficio_availability::state::filter_providers_by_response;
use oficio_availability::AvailabilityState;
use oficio_core::types::{Reply, ReplySet};
use oficio_kv::keys;
use tracing::warn;

use crate::handlers::{confirm_prompt_replies, provider_prompt_replies};
use crate::messages;
use crate::orchestrator::TurnContext;

pub async fn handle(ctx: &mut TurnContext<'_>) -> ReplySet {
    let Some(req_id) = ctx.flow.mqtt_req_id.clone() else {
        // The pipeline is between scatter and its first flow write; it will
        // move the conversation forward on its own.
        return ctx
            .reply(Reply::text(messages::CONFIRMING_AVAILABILITY))
            .await;
    };

    let state = ctx
        .services
        .kv
        .get_json::<AvailabilityState>(&keys::availability(&req_id))
        .await;

    match state {
        Some(state) if !state.accepted.is_empty() => {
            let accepted = filter_providers_by_response(&ctx.flow.providers, &state.accepted);
            if accepted.is_empty() {
                return ctx
                    .reply(Reply::text(messages::CONFIRMING_AVAILABILITY))
                    .await;
            }
            let city = ctx.flow.city.clone().unwrap_or_default();
            if let Err(e) = ctx.flow.present_results(accepted) {
                warn!(phone = %ctx.phone, error = %e, "could not present gathered results");
                return ctx
                    .reply(Reply::text(messages::CONFIRMING_AVAILABILITY))
                    .await;
            }
            ctx.reply_many(provider_prompt_replies(&city, &ctx.flow.providers))
                .await
        }
        Some(_) => {
            ctx.reply(Reply::text(messages::CONFIRMING_AVAILABILITY))
                .await
        }
        None => {
            // The record aged out with no accepts: offer a fresh start.
            let service = ctx.flow.service.clone().unwrap_or_default();
            let city = ctx.flow.city.clone().unwrap_or_default();
            let mut replies = vec![Reply::text(messages::no_availability(&service, &city))];
            ctx.flow
                .ask_confirm_new_search(messages::NEW_SEARCH_TITLE.to_string(), true);
            replies.extend(confirm_prompt_replies(&ctx.flow));
            ctx.reply_many(replies).await
        }
    }
}
