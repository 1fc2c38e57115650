//! C13: one handler per conversational state, plus the first-contact entry.
//! Handlers receive the mutable [`TurnContext`](crate::orchestrator::TurnContext)
//! and return the turn's replies; every flow write goes through its helpers.

pub mod city;
pub mod confirm;
pub mod detail;
pub mod entry;
pub mod responses;
pub mod results;
pub mod searching;
pub mod service;

use oficio_core::types::{ConversationFlow, ProviderRecord, Reply};

use crate::messages;

/// The two provider-presentation messages: header+list block, then the
/// selection instruction carrying the provider-results UI hint.
pub fn provider_prompt_replies(city: &str, providers: &[ProviderRecord]) -> Vec<Reply> {
    let header = format!(
        "{}\n\n{}",
        messages::providers_intro(city),
        messages::provider_list_block(providers)
    );
    vec![
        Reply::text(header),
        Reply::provider_results(messages::SELECT_PROVIDER_INSTRUCTION, providers),
    ]
}

/// The confirm-new-search prompt: bolded title plus the numbered option
/// menu, then the numeric footer with button hints.
pub fn confirm_prompt_replies(flow: &ConversationFlow) -> Vec<Reply> {
    let options = confirm::options_for(flow);
    let title = flow
        .confirm_title
        .clone()
        .unwrap_or_else(|| messages::NEW_SEARCH_TITLE.to_string());
    let menu = options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("*{}.* {}", i + 1, option.label()))
        .collect::<Vec<_>>()
        .join("\n");
    let labels = options.iter().map(|o| o.label().to_string()).collect();
    vec![
        Reply::text(format!("{}\n\n{}", messages::bold(&title), menu)),
        Reply::buttons(messages::NUMERIC_FOOTER, labels),
    ]
}
