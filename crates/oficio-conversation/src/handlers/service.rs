//! `awaiting_service`: validate the request (ban check, structure,
//! moderation), extract and expand the need, then move to city capture or
//! straight into the search.

use oficio_core::types::{ConversationState, Reply, ReplySet};
use oficio_nlp::{is_greeting, normalize_for_matching};

use oficio_ai::Verdict;

use crate::messages;
use crate::orchestrator::TurnContext;

pub async fn handle(ctx: &mut TurnContext<'_>) -> ReplySet {
    let services = ctx.services;

    if services.moderator.is_banned(&ctx.phone).await {
        return ctx.reply(Reply::text(messages::ACCOUNT_SUSPENDED)).await;
    }

    let text = ctx.text.clone();
    if text.is_empty() {
        return ctx.reply(Reply::text(messages::SERVICE_FORMAT_ERROR)).await;
    }
    if is_greeting(&text) {
        return ctx.reply(Reply::text(messages::INITIAL_SERVICE_PROMPT)).await;
    }
    if normalize_for_matching(&text).len() < 3 {
        return ctx.reply(Reply::text(messages::SERVICE_FORMAT_ERROR)).await;
    }

    match services.moderator.validate(&text, &ctx.phone).await {
        Verdict::Valid => {}
        Verdict::Nonsense => {
            return ctx.reply(Reply::text(messages::NONSENSE_ERROR)).await;
        }
        Verdict::Illegal { banned: true, .. } => {
            return ctx.reply(Reply::text(messages::BAN_NOTICE)).await;
        }
        Verdict::Illegal { warnings, banned: false } => {
            return ctx
                .reply(Reply::text(messages::warning_notice(warnings)))
                .await;
        }
    }

    let history = services.sessions.context(&ctx.phone, 10).await;
    let need = services.extractor.extract_with_expansion(&history, &text).await;
    let service_value = need.service.clone().unwrap_or_else(|| text.clone());
    ctx.flow.set_need(service_value.clone(), text.clone());
    ctx.flow.expanded_terms = need.expanded_terms.clone();

    if need.service_inferred {
        // The tables did not know this phrasing; remember what the model
        // made of it.
        services
            .relations
            .record_inference(
                &text,
                &service_value,
                need.expanded_terms.as_deref().unwrap_or(&[]),
            )
            .await;
    }

    if ctx.flow.city.is_some() {
        ctx.flow.begin_search();
        ctx.persist_flow().await;
        ctx.dispatch_pipeline();
        return ctx.reply(Reply::text(messages::CONFIRMING_AVAILABILITY)).await;
    }

    ctx.flow.state = ConversationState::AwaitingCity;
    ctx.flow.city_confirmed = false;
    ctx.reply(Reply::text(messages::CITY_PROMPT)).await
}
