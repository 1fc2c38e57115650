//! First contact (or a conversation that already said goodbye): greet, or
//! jump straight ahead when the need is already recognizable.

use oficio_core::types::{ConversationState, Reply, ReplySet};
use oficio_nlp::is_greeting;

use crate::messages;
use crate::orchestrator::TurnContext;

pub async fn handle(ctx: &mut TurnContext<'_>) -> ReplySet {
    let text = ctx.text.clone();

    if !text.is_empty() && !is_greeting(&text) {
        // Fast path: "necesito un plomero en Quito" skips the prompts.
        let (detected, _) = ctx.services.extractor.extract("", &text);
        let service_value = detected.unwrap_or_else(|| text.clone());
        ctx.flow.set_need(service_value, text);

        if ctx.flow.city.is_some() {
            ctx.flow.begin_search();
            ctx.persist_flow().await;
            ctx.dispatch_pipeline();
            return ctx.reply(Reply::text(messages::CONFIRMING_AVAILABILITY)).await;
        }
        ctx.flow.state = ConversationState::AwaitingCity;
        ctx.flow.city_confirmed = false;
        return ctx.reply(Reply::text(messages::CITY_PROMPT)).await;
    }

    ctx.flow.state = ConversationState::AwaitingService;
    ctx.reply(Reply::text(messages::INITIAL_SERVICE_PROMPT)).await
}
