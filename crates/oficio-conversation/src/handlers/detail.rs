//! `viewing_provider_detail`: contact the provider, go back to the list,
//! or leave.

use oficio_core::types::{Reply, ReplySet};
use tracing::warn;

use crate::handlers::{confirm_prompt_replies, provider_prompt_replies};
use crate::messages;
use crate::orchestrator::TurnContext;

pub async fn handle(ctx: &mut TurnContext<'_>) -> ReplySet {
    let input = ctx
        .selected
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ctx.text.clone());

    match input.trim() {
        "1" => contact(ctx).await,
        "2" => back_to_list(ctx).await,
        "3" => farewell(ctx).await,
        _ => {
            let menu = format!("Por favor selecciona:\n{}", messages::PROVIDER_DETAIL_MENU);
            ctx.reply(Reply::text(menu)).await
        }
    }
}

/// The formal connection: notify the provider out of band and hand the
/// client their number.
async fn contact(ctx: &mut TurnContext<'_>) -> ReplySet {
    let Some(provider) = ctx.flow.chosen_provider.clone() else {
        warn!(phone = %ctx.phone, "detail view without a chosen provider");
        ctx.flow.back_to_results();
        let city = ctx.flow.city.clone().unwrap_or_default();
        return ctx
            .reply_many(provider_prompt_replies(&city, &ctx.flow.providers))
            .await;
    };

    let service = ctx.flow.service.clone().unwrap_or_default();
    let city = ctx.flow.city.clone().unwrap_or_default();
    if let Some(provider_phone) = provider.phone.as_deref() {
        // Out-of-band push; does not belong to the customer transcript.
        ctx.services
            .whatsapp
            .send_text(
                provider_phone,
                &messages::provider_notification(&ctx.phone, &service, &city),
            )
            .await;
    }

    let mut replies = vec![Reply::text(messages::connection_message(&provider))];
    ctx.flow
        .ask_confirm_new_search(messages::NEW_SEARCH_TITLE.to_string(), false);
    replies.extend(confirm_prompt_replies(&ctx.flow));
    ctx.reply_many(replies).await
}

async fn back_to_list(ctx: &mut TurnContext<'_>) -> ReplySet {
    ctx.flow.back_to_results();
    let city = ctx.flow.city.clone().unwrap_or_default();
    ctx.reply_many(provider_prompt_replies(&city, &ctx.flow.providers))
        .await
}

async fn farewell(ctx: &mut TurnContext<'_>) -> ReplySet {
    ctx.services.flows.delete(&ctx.phone).await;
    ctx.services
        .sessions
        .save(&ctx.phone, messages::FAREWELL, true, serde_json::Map::new())
        .await;
    ReplySet::single(Reply::text(messages::FAREWELL))
}
