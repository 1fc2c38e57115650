//! `presenting_results`: a number picks a provider; "nuevo" starts over;
//! anything else re-prompts.

use oficio_core::types::{ConversationState, Reply, ReplySet};
use oficio_nlp::normalize_for_matching;

use crate::messages;
use crate::orchestrator::TurnContext;

pub async fn handle(ctx: &mut TurnContext<'_>) -> ReplySet {
    let input = ctx
        .selected
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ctx.text.clone());

    if let Ok(choice) = input.trim().parse::<usize>() {
        if choice == 0 || choice > ctx.flow.providers.len() {
            let hint = format!(
                "Por favor selecciona un número entre 1 y {}.",
                ctx.flow.providers.len()
            );
            return ctx.reply(Reply::text(hint)).await;
        }
        return match ctx.flow.select_provider(choice - 1) {
            Ok(provider) => {
                let detail = messages::provider_detail_block(provider);
                ctx.reply_many(vec![
                    Reply::text(detail),
                    Reply::buttons(
                        messages::PROVIDER_DETAIL_MENU,
                        vec![
                            "Contactar".to_string(),
                            "Ver otro proveedor".to_string(),
                            "Salir".to_string(),
                        ],
                    ),
                ])
                .await
            }
            Err(_) => ctx.reply(Reply::text(messages::SELECT_PROVIDER_RETRY)).await,
        };
    }

    let normalized = normalize_for_matching(&input);
    if matches!(normalized.as_str(), "nuevo" | "nueva" | "otro") {
        ctx.flow.clear_search();
        ctx.flow.state = ConversationState::AwaitingService;
        return ctx.reply(Reply::text(messages::INITIAL_SERVICE_PROMPT)).await;
    }

    ctx.reply(Reply::text(messages::SELECT_PROVIDER_RETRY)).await
}
