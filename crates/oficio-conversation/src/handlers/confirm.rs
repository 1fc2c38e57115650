//! `confirm_new_search`: a small dynamic menu — search again, change city,
//! revisit the last results, or close — with a bounded re-prompt budget.

use oficio_core::types::{ConversationState, Reply, ReplySet};
use oficio_nlp::interpret_yes_no;

use crate::handlers::confirm_prompt_replies;
use crate::messages;
use crate::orchestrator::TurnContext;

/// Unrecognized answers tolerated before the conversation resets.
pub const MAX_CONFIRM_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOption {
    NewSearch,
    ChangeCity,
    ShowProviders,
    Close,
}

impl ConfirmOption {
    pub fn label(self) -> &'static str {
        match self {
            ConfirmOption::NewSearch => messages::CONFIRM_YES_LABEL,
            ConfirmOption::ChangeCity => messages::CONFIRM_CITY_LABEL,
            ConfirmOption::ShowProviders => messages::CONFIRM_PROVIDERS_LABEL,
            ConfirmOption::Close => messages::CONFIRM_NO_LABEL,
        }
    }
}

/// The menu for this flow, in presentation order. Numbering in the prompt
/// and parsing here both come from this list.
pub fn options_for(flow: &oficio_core::types::ConversationFlow) -> Vec<ConfirmOption> {
    let mut options = vec![ConfirmOption::NewSearch];
    if flow.confirm_include_city_option {
        options.push(ConfirmOption::ChangeCity);
    }
    if !flow.providers.is_empty() {
        options.push(ConfirmOption::ShowProviders);
    }
    options.push(ConfirmOption::Close);
    options
}

pub async fn handle(ctx: &mut TurnContext<'_>) -> ReplySet {
    let options = options_for(&ctx.flow);
    let input = ctx
        .selected
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ctx.text.clone());

    match parse_choice(&options, &input) {
        Some(ConfirmOption::NewSearch) => {
            // Keep the city; everything tied to the old need goes.
            ctx.flow.clear_search();
            ctx.flow.state = ConversationState::AwaitingService;
            ctx.reply(Reply::text(messages::INITIAL_SERVICE_PROMPT)).await
        }
        Some(ConfirmOption::ChangeCity) => {
            ctx.flow.city = None;
            ctx.flow.city_confirmed = false;
            ctx.flow.providers.clear();
            ctx.flow.state = ConversationState::AwaitingCity;
            ctx.reply(Reply::text(messages::CITY_PROMPT)).await
        }
        Some(ConfirmOption::ShowProviders) => {
            ctx.flow.back_to_results();
            let city = ctx.flow.city.clone().unwrap_or_default();
            ctx.reply_many(crate::handlers::provider_prompt_replies(
                &city,
                &ctx.flow.providers,
            ))
            .await
        }
        Some(ConfirmOption::Close) => {
            ctx.services.flows.delete(&ctx.phone).await;
            ctx.services
                .sessions
                .save(&ctx.phone, messages::FAREWELL, true, serde_json::Map::new())
                .await;
            ReplySet::single(Reply::text(messages::FAREWELL))
        }
        None => {
            if ctx.flow.confirm_attempts >= MAX_CONFIRM_ATTEMPTS {
                // Enough guessing; start the conversation over.
                ctx.flow.clear_search();
                ctx.flow.state = ConversationState::AwaitingService;
                return ctx.reply(Reply::text(messages::INITIAL_SERVICE_PROMPT)).await;
            }
            ctx.flow.confirm_attempts += 1;
            ctx.reply_many(confirm_prompt_replies(&ctx.flow)).await
        }
    }
}

/// Menu numbers and labels first (so "2" means option 2 of THIS menu, not
/// the yes/no shortcut), free-form yes/no last.
fn parse_choice(options: &[ConfirmOption], input: &str) -> Option<ConfirmOption> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<usize>() {
        return (n >= 1).then(|| options.get(n - 1).copied()).flatten();
    }
    for option in options {
        if option.label().eq_ignore_ascii_case(trimmed) {
            return Some(*option);
        }
    }
    match interpret_yes_no(trimmed) {
        Some(true) => Some(ConfirmOption::NewSearch),
        Some(false) => Some(ConfirmOption::Close),
        None => None,
    }
}
