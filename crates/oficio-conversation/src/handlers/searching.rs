//! `searching`: the guard state while the background pipeline runs. The
//! dispatch flag keeps a chatty user from launching the pipeline twice.

use oficio_core::types::{ConversationState, Reply, ReplySet};
use tracing::warn;

use crate::messages;
use crate::orchestrator::TurnContext;

pub async fn handle(ctx: &mut TurnContext<'_>) -> ReplySet {
    if ctx.flow.searching_dispatched {
        return ctx
            .reply(Reply::text(messages::CONFIRMING_AVAILABILITY))
            .await;
    }

    if ctx.flow.service.is_some() && ctx.flow.city.is_some() {
        ctx.flow.begin_search();
        ctx.persist_flow().await;
        ctx.dispatch_pipeline();
        return ctx
            .reply(Reply::text(messages::CONFIRMING_AVAILABILITY))
            .await;
    }

    // A searching flow without a complete need is a programming error;
    // steer back to the missing question instead of hanging.
    warn!(phone = %ctx.phone, "searching state with incomplete need");
    if ctx.flow.service.is_none() {
        ctx.flow.state = ConversationState::AwaitingService;
        ctx.reply(Reply::text(messages::INITIAL_SERVICE_PROMPT)).await
    } else {
        ctx.flow.state = ConversationState::AwaitingCity;
        ctx.reply(Reply::text(messages::CITY_PROMPT)).await
    }
}
