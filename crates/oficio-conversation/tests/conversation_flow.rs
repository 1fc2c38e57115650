// End-to-end turns through the orchestrator with the in-process KV store,
// no relational store, no broker, and no model — the degraded-but-working
// configuration every subsystem must support.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use oficio_conversation::messages;
use oficio_conversation::{ConversationServices, Orchestrator};
use oficio_core::config::OficioConfig;
use oficio_core::types::{
    ConversationFlow, ConversationState, ProviderRecord, ReplySet, WhatsAppInbound,
};

async fn orchestrator() -> Orchestrator {
    let services = ConversationServices::init(OficioConfig::default(), CancellationToken::new()).await;
    Orchestrator::new(services)
}

fn inbound(phone: &str, content: &str) -> WhatsAppInbound {
    WhatsAppInbound {
        from_number: phone.to_string(),
        content: Some(content.to_string()),
        ..Default::default()
    }
}

fn selected(phone: &str, option: &str) -> WhatsAppInbound {
    WhatsAppInbound {
        from_number: phone.to_string(),
        content: Some(option.to_string()),
        selected_option: Some(option.to_string()),
        ..Default::default()
    }
}

fn first_text(reply: &ReplySet) -> String {
    reply.texts().first().map(|t| t.to_string()).unwrap_or_default()
}

fn providers(n: usize) -> Vec<ProviderRecord> {
    (0..n)
        .map(|i| ProviderRecord {
            id: Some(format!("p{}", i)),
            name: Some(format!("Proveedor {}", i + 1)),
            phone: Some(format!("09900000{}", i)),
            rating: Some(4.0 + i as f64 / 10.0),
            ..Default::default()
        })
        .collect()
}

#[tokio::test]
async fn greeting_prompts_for_service() {
    let orch = orchestrator().await;
    let reply = orch.handle_message(inbound("593900000001", "hola")).await.unwrap();
    assert_eq!(first_text(&reply), messages::INITIAL_SERVICE_PROMPT);

    let flow = orch.services().flows.get("593900000001").await;
    assert_eq!(flow.state, ConversationState::AwaitingService);
}

#[tokio::test]
async fn missing_phone_is_rejected() {
    let orch = orchestrator().await;
    assert!(orch.handle_message(inbound("  ", "hola")).await.is_err());
}

#[tokio::test]
async fn direct_need_with_city_goes_straight_to_search() {
    let orch = orchestrator().await;
    let reply = orch
        .handle_message(inbound("593900000002", "necesito un plomero en Quito"))
        .await
        .unwrap();
    assert_eq!(first_text(&reply), messages::CONFIRMING_AVAILABILITY);

    let flow = orch.services().flows.get("593900000002").await;
    assert_eq!(flow.service.as_deref(), Some("plomero"));
    assert_eq!(flow.city.as_deref(), Some("Quito"));
    assert!(flow.city_confirmed);
    // The pipeline was dispatched exactly once and, with no search backend,
    // lands the conversation in confirm_new_search.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let flow = orch.services().flows.get("593900000002").await;
    assert_eq!(flow.state, ConversationState::ConfirmNewSearch);
    assert!(flow.confirm_include_city_option);
    assert_eq!(flow.confirm_attempts, 0);
}

#[tokio::test]
async fn city_synonym_resolves_to_canonical() {
    let orch = orchestrator().await;
    orch.handle_message(inbound("593900000003", "plomero en cueca"))
        .await
        .unwrap();
    let flow = orch.services().flows.get("593900000003").await;
    assert_eq!(flow.city.as_deref(), Some("Cuenca"));
    assert!(flow.city_confirmed);
    assert_eq!(flow.service.as_deref(), Some("plomero"));
    // The detached pipeline may already have moved the flow onward.
    assert!(matches!(
        flow.state,
        ConversationState::Searching | ConversationState::ConfirmNewSearch
    ));
}

#[tokio::test]
async fn need_without_city_asks_for_one() {
    let orch = orchestrator().await;
    let reply = orch
        .handle_message(inbound("593900000004", "busco electricista"))
        .await
        .unwrap();
    assert_eq!(first_text(&reply), messages::CITY_PROMPT);
    let flow = orch.services().flows.get("593900000004").await;
    assert_eq!(flow.state, ConversationState::AwaitingCity);

    // Unknown city keeps asking.
    let reply = orch
        .handle_message(inbound("593900000004", "en mi barrio"))
        .await
        .unwrap();
    assert_eq!(first_text(&reply), messages::CITY_NOT_RECOGNIZED);

    // A known city launches the search.
    let reply = orch
        .handle_message(inbound("593900000004", "Loja"))
        .await
        .unwrap();
    assert_eq!(first_text(&reply), messages::CONFIRMING_AVAILABILITY);
    let flow = orch.services().flows.get("593900000004").await;
    assert_eq!(flow.city.as_deref(), Some("Loja"));
    assert!(matches!(
        flow.state,
        ConversationState::Searching | ConversationState::ConfirmNewSearch
    ));
}

#[tokio::test]
async fn inactivity_resets_with_notice() {
    let orch = orchestrator().await;
    let phone = "593900000005";
    let mut flow = ConversationFlow::fresh(ConversationState::AwaitingCity);
    flow.service = Some("electricista".into());
    flow.last_seen_at_prev = Some(chrono::Utc::now() - chrono::Duration::seconds(200));
    orch.services().flows.set(phone, &flow).await;

    let reply = orch.handle_message(inbound(phone, "sigo aquí")).await.unwrap();
    let texts = reply.texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], messages::INACTIVITY_NOTICE);
    assert_eq!(texts[1], messages::INITIAL_SERVICE_PROMPT);

    let flow = orch.services().flows.get(phone).await;
    assert_eq!(flow.state, ConversationState::AwaitingService);
    assert!(flow.service.is_none());
}

#[tokio::test]
async fn reset_keyword_wipes_the_flow() {
    let orch = orchestrator().await;
    let phone = "593900000006";
    orch.handle_message(inbound(phone, "necesito un plomero en Quito"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let reply = orch.handle_message(inbound(phone, "reiniciar")).await.unwrap();
    assert_eq!(first_text(&reply), messages::NEW_SESSION);
    let flow = orch.services().flows.get(phone).await;
    assert_eq!(flow.state, ConversationState::AwaitingService);
    assert!(flow.service.is_none());
}

#[tokio::test]
async fn double_dispatch_is_guarded() {
    let orch = orchestrator().await;
    let phone = "593900000007";
    let mut flow = ConversationFlow::fresh(ConversationState::Searching);
    flow.service = Some("plomero".into());
    flow.city = Some("Quito".into());
    flow.searching_dispatched = true;
    orch.services().flows.set(phone, &flow).await;

    let reply = orch.handle_message(inbound(phone, "¿ya?")).await.unwrap();
    assert_eq!(first_text(&reply), messages::CONFIRMING_AVAILABILITY);
    let flow = orch.services().flows.get(phone).await;
    assert_eq!(flow.state, ConversationState::Searching);
    assert!(flow.searching_dispatched);
}

#[tokio::test]
async fn selection_flow_to_detail_and_farewell() {
    let orch = orchestrator().await;
    let phone = "593900000008";
    let mut flow = ConversationFlow::fresh(ConversationState::AwaitingService);
    flow.service = Some("plomero".into());
    flow.city = Some("Quito".into());
    flow.present_results(providers(3)).unwrap();
    orch.services().flows.set(phone, &flow).await;

    // Out-of-range selection reprompts without changing state.
    let reply = orch.handle_message(inbound(phone, "9")).await.unwrap();
    assert!(first_text(&reply).contains("entre 1 y 3"));
    let stored = orch.services().flows.get(phone).await;
    assert_eq!(stored.state, ConversationState::PresentingResults);

    // Picking number 2 opens the detail view with a bounded index.
    let reply = orch.handle_message(inbound(phone, "2")).await.unwrap();
    assert!(first_text(&reply).contains("Proveedor 2"));
    let stored = orch.services().flows.get(phone).await;
    assert_eq!(stored.state, ConversationState::ViewingProviderDetail);
    assert_eq!(stored.provider_detail_idx, Some(1));

    // "2" goes back to the list, "3" says goodbye and clears the flow.
    let reply = orch.handle_message(inbound(phone, "2")).await.unwrap();
    assert_eq!(
        orch.services().flows.get(phone).await.state,
        ConversationState::PresentingResults
    );
    assert!(first_text(&reply).contains("Quito"));
    orch.handle_message(inbound(phone, "1")).await.unwrap();
    let reply = orch.handle_message(inbound(phone, "3")).await.unwrap();
    assert_eq!(first_text(&reply), messages::FAREWELL);
    assert!(orch.services().flows.get_existing(phone).await.is_none());
}

#[tokio::test]
async fn contact_marks_confirm_new_search() {
    let orch = orchestrator().await;
    let phone = "593900000009";
    let mut flow = ConversationFlow::fresh(ConversationState::AwaitingService);
    flow.service = Some("plomero".into());
    flow.city = Some("Quito".into());
    flow.present_results(providers(2)).unwrap();
    flow.select_provider(0).unwrap();
    orch.services().flows.set(phone, &flow).await;

    let reply = orch.handle_message(inbound(phone, "1")).await.unwrap();
    let texts = reply.texts();
    assert!(texts[0].contains("He compartido tu contacto"));
    let stored = orch.services().flows.get(phone).await;
    assert_eq!(stored.state, ConversationState::ConfirmNewSearch);
}

#[tokio::test]
async fn confirm_change_city_clears_city() {
    let orch = orchestrator().await;
    let phone = "593900000010";
    let mut flow = ConversationFlow::fresh(ConversationState::AwaitingService);
    flow.service = Some("plomero".into());
    flow.city = Some("Quito".into());
    flow.ask_confirm_new_search(messages::NEW_SEARCH_TITLE.to_string(), true);
    orch.services().flows.set(phone, &flow).await;

    let reply = orch.handle_message(inbound(phone, "2")).await.unwrap();
    assert_eq!(first_text(&reply), messages::CITY_PROMPT);
    let stored = orch.services().flows.get(phone).await;
    assert_eq!(stored.state, ConversationState::AwaitingCity);
    assert!(stored.city.is_none());
}

#[tokio::test]
async fn confirm_reprompts_then_resets_after_max_attempts() {
    let orch = orchestrator().await;
    let phone = "593900000011";
    let mut flow = ConversationFlow::fresh(ConversationState::AwaitingService);
    flow.ask_confirm_new_search(messages::NEW_SEARCH_TITLE.to_string(), false);
    orch.services().flows.set(phone, &flow).await;

    for attempt in 1..=2u32 {
        orch.handle_message(inbound(phone, "eh? explícame otra vez"))
            .await
            .unwrap();
        let stored = orch.services().flows.get(phone).await;
        assert_eq!(stored.state, ConversationState::ConfirmNewSearch);
        assert_eq!(stored.confirm_attempts, attempt);
    }
    let reply = orch
        .handle_message(inbound(phone, "¿qué opciones tengo?"))
        .await
        .unwrap();
    assert_eq!(first_text(&reply), messages::INITIAL_SERVICE_PROMPT);
    let stored = orch.services().flows.get(phone).await;
    assert_eq!(stored.state, ConversationState::AwaitingService);
}

#[tokio::test]
async fn quick_close_button_ends_the_conversation() {
    let orch = orchestrator().await;
    let phone = "593900000012";
    orch.handle_message(inbound(phone, "necesito un plomero en Quito"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let reply = orch
        .handle_message(selected(phone, messages::CONFIRM_NO_LABEL))
        .await
        .unwrap();
    assert_eq!(first_text(&reply), messages::QUICK_CLOSE);
    assert!(orch.services().flows.get_existing(phone).await.is_none());
}

#[tokio::test]
async fn bot_and_user_turns_land_in_the_session_log() {
    let orch = orchestrator().await;
    let phone = "593900000013";
    orch.handle_message(inbound(phone, "hola")).await.unwrap();
    let history = orch.services().sessions.history(phone, 10).await;
    assert_eq!(history.len(), 2);
    assert!(!history[0].is_bot);
    assert_eq!(history[0].message, "hola");
    assert!(history[1].is_bot);
    assert_eq!(history[1].message, messages::INITIAL_SERVICE_PROMPT);
}
