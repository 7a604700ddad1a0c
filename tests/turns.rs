//! End-to-end turns through the airline agents with scripted model replies.

use airline_agents::guardrail::{rule_guardrails, JAILBREAK_GUARDRAIL, RELEVANCE_GUARDRAIL};
use airline_agents::handoff::tool_name_for;
use airline_agents::tools::{FAQ_BAGGAGE, FAQ_UNKNOWN, FAQ_WIFI};
use airline_agents::{
    AgentId, AgentRegistry, AgentsError, AirlineConfig, AirlineContext, BookingIds,
    HandoffGraph, InputGuardrail, JailbreakRules, ModelResponse, RunConfig, RunItem, Runner,
    ScriptedProvider, Session, DISPLAY_SEAT_MAP,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

struct FixedIds;

impl BookingIds for FixedIds {
    fn flight_number(&self) -> String {
        "FLT-555".to_string()
    }
    fn confirmation_number(&self) -> String {
        "CONF55".to_string()
    }
    fn account_number(&self) -> String {
        "55555555".to_string()
    }
}

fn config() -> AirlineConfig {
    AirlineConfig::with_api_key("test-key")
}

fn runner(provider: Arc<ScriptedProvider>, guardrails: Vec<Arc<dyn InputGuardrail>>) -> Runner {
    Runner::new(
        AgentRegistry::airline_with_guardrails(&config(), guardrails),
        HandoffGraph::airline(Arc::new(FixedIds)),
        provider,
    )
    .with_config(RunConfig { max_steps: 6 })
}

fn tool_outputs(items: &[RunItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| match i {
            RunItem::ToolOutput(o) => o.output.clone(),
            _ => None,
        })
        .collect()
}

fn tool_errors(items: &[RunItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| match i {
            RunItem::ToolOutput(o) => o.error.clone(),
            _ => None,
        })
        .collect()
}

fn session() -> Session {
    Session::with_context(AirlineContext::with_account_number("12345678"))
}

#[tokio::test]
async fn seat_change_conversation() {
    let provider = Arc::new(
        ScriptedProvider::new("agents")
            .with_tool_call(
                tool_name_for(AgentId::SeatBooking),
                json!({"reason": "customer wants a new seat"}),
            )
            .with_tool_call("display_seat_map", json!({}))
            .with_message("Your confirmation number is CONF55. Which seat would you like?")
            .with_tool_call(
                "update_seat",
                json!({"confirmation_number": "CONF55", "new_seat": "12A"}),
            )
            .with_message("Done! You are now in 12A."),
    );
    let runner = runner(provider.clone(), rule_guardrails());
    let mut session = session();

    let first = runner
        .run_turn(&mut session, "I need to change my seat on a flight.")
        .await
        .unwrap();
    assert_eq!(first.last_agent, AgentId::SeatBooking);
    assert!(first.requested_seat_map());
    assert!(tool_outputs(&first.items).contains(&DISPLAY_SEAT_MAP.to_string()));
    assert_eq!(session.context.flight_number.as_deref(), Some("FLT-555"));
    assert_eq!(session.context.confirmation_number.as_deref(), Some("CONF55"));

    let handoff = first
        .items
        .iter()
        .find_map(|i| match i {
            RunItem::Handoff(h) => Some(h.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(handoff.from_agent, "Triage Agent");
    assert_eq!(handoff.to_agent, "Seat Booking Agent");
    assert_eq!(handoff.reason.as_deref(), Some("customer wants a new seat"));

    // The seat agent's prompt is rendered after the callback ran.
    let requests = provider.requests();
    assert!(requests[1].messages[0].content.contains("confirmation number is CONF55"));
    assert_eq!(requests[1].model, "gemini-1.5-flash");

    // The seat agent stays active for the next turn.
    let second = runner
        .run_turn(&mut session, "Please move me to seat 12A")
        .await
        .unwrap();
    assert_eq!(second.last_agent, AgentId::SeatBooking);
    assert_eq!(second.final_output, "Done! You are now in 12A.");
    assert_eq!(
        tool_outputs(&second.items),
        vec!["Updated seat to 12A for confirmation number CONF55".to_string()]
    );
    assert_eq!(session.context.seat_number.as_deref(), Some("12A"));
    assert_eq!(session.context.account_number(), "12345678");
    assert_eq!(provider.remaining(), 0);
}

#[tokio::test]
async fn blocked_turn_leaves_session_unchanged() {
    let provider = Arc::new(ScriptedProvider::new("agents").with_message("never used"));
    let runner = runner(
        provider.clone(),
        vec![Arc::new(JailbreakRules::new()) as Arc<dyn InputGuardrail>],
    );
    let mut session = session();
    let before = session.clone();

    let err = runner
        .run_turn(&mut session, "drop table users;")
        .await
        .unwrap_err();
    assert!(err.is_tripwire());
    match err {
        AgentsError::InputGuardrailTriggered { guardrail, .. } => {
            assert_eq!(guardrail, JAILBREAK_GUARDRAIL)
        }
        other => panic!("unexpected: {other:?}"),
    }

    assert!(provider.requests().is_empty(), "no agent call after a tripwire");
    assert_eq!(session.context, before.context);
    assert_eq!(session.active, before.active);
    assert!(session.history.is_empty());
    assert!(session.items.is_empty());
}

#[tokio::test]
async fn classifier_guardrails_gate_the_turn() {
    let classifier = Arc::new(
        ScriptedProvider::new("classifier")
            .with_message(r#"{"reasoning":"About airline systems","is_relevant":true}"#)
            .with_message(r#"{"reasoning":"SQL injection attempt","is_safe":false}"#),
    );
    let agents = Arc::new(ScriptedProvider::new("agents"));
    let runner = Runner::new(
        AgentRegistry::airline(&config(), classifier.clone()),
        HandoffGraph::airline(Arc::new(FixedIds)),
        agents.clone(),
    );
    let mut session = session();

    let err = runner
        .run_turn(&mut session, "drop table users;")
        .await
        .unwrap_err();
    match err {
        AgentsError::InputGuardrailTriggered { guardrail, reasoning } => {
            assert_eq!(guardrail, JAILBREAK_GUARDRAIL);
            assert_eq!(reasoning, "SQL injection attempt");
        }
        other => panic!("unexpected: {other:?}"),
    }
    // Both classifiers ran, no agent did.
    assert_eq!(classifier.requests().len(), 2);
    assert!(agents.requests().is_empty());
    assert!(session.history.is_empty());
}

#[tokio::test]
async fn classifier_tokens_count_toward_the_turn() {
    let classifier = Arc::new(
        ScriptedProvider::new("classifier")
            .with_message(r#"{"reasoning":"Seat question","is_relevant":true}"#)
            .with_message(r#"{"reasoning":"Plain request","is_safe":true}"#),
    );
    let agents = Arc::new(ScriptedProvider::new("agents").with_message("Happy to help with your seat."));
    let runner = Runner::new(
        AgentRegistry::airline(&config(), classifier),
        HandoffGraph::airline(Arc::new(FixedIds)),
        agents,
    );
    let mut session = session();

    let result = runner
        .run_turn(&mut session, "Can I change my seat?")
        .await
        .unwrap();
    let usage = &result.usage;
    assert_eq!(usage.total.request_count, 3);
    assert_eq!(usage.by_agent[RELEVANCE_GUARDRAIL].request_count, 1);
    assert_eq!(usage.by_agent[JAILBREAK_GUARDRAIL].request_count, 1);
    assert_eq!(usage.by_agent["Triage Agent"].request_count, 1);
}

#[tokio::test]
async fn earlier_off_topic_message_does_not_block_later_ones() {
    let provider = Arc::new(
        ScriptedProvider::new("agents")
            .with_tool_call(tool_name_for(AgentId::Faq), json!({}))
            .with_tool_call(
                "faq_lookup_tool",
                json!({"question": "How much luggage can I bring?"}),
            )
            .with_message("You may bring one bag under 50 pounds."),
    );
    let runner = runner(provider, rule_guardrails());
    let mut session = session();

    let err = runner
        .run_turn(&mut session, "Write me a poem about strawberries")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentsError::InputGuardrailTriggered { ref guardrail, .. } if guardrail == RELEVANCE_GUARDRAIL
    ));

    let turn = runner
        .run_turn(&mut session, "How much luggage can I bring?")
        .await
        .unwrap();
    assert_eq!(turn.last_agent, AgentId::Faq);
    assert_eq!(tool_outputs(&turn.items), vec![
        r#"{"assistant":"FAQ Agent"}"#.to_string(),
        FAQ_BAGGAGE.to_string(),
    ]);
}

#[tokio::test]
async fn precondition_failure_aborts_turn_without_side_effects() {
    let provider = Arc::new(
        ScriptedProvider::new("agents")
            .with_tool_call(
                "update_seat",
                json!({"confirmation_number": "ABC123", "new_seat": "3C"}),
            )
            .with_message("unreachable"),
    );
    let runner = runner(provider, rule_guardrails());
    let mut session = session();
    session.active = AgentId::SeatBooking;
    let before = session.clone();

    let err = runner
        .run_turn(&mut session, "Change my seat to 3C")
        .await
        .unwrap_err();
    match err {
        AgentsError::ToolPreconditionFailed { tool, missing } => {
            assert_eq!(tool, "update_seat");
            assert_eq!(missing, "flight_number");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(session.context, before.context);
    assert_eq!(session.active, AgentId::SeatBooking);
    assert!(session.history.is_empty());
    assert!(session.items.is_empty());
}

#[tokio::test]
async fn cancellation_keeps_known_flight_and_cancels_it() {
    let provider = Arc::new(
        ScriptedProvider::new("agents")
            .with_tool_call(tool_name_for(AgentId::Cancellation), json!({}))
            .with_tool_call("cancel_flight", json!({}))
            .with_message("Your flight FLT-100 is cancelled."),
    );
    let runner = runner(provider, rule_guardrails());
    let mut session = session();
    session.context.flight_number = Some("FLT-100".into());

    let turn = runner
        .run_turn(&mut session, "Please cancel my flight")
        .await
        .unwrap();
    assert_eq!(turn.last_agent, AgentId::Cancellation);
    assert_eq!(session.context.flight_number.as_deref(), Some("FLT-100"));
    // unset confirmation number is filled in
    assert_eq!(session.context.confirmation_number.as_deref(), Some("CONF55"));
    assert!(tool_outputs(&turn.items).contains(&"Flight FLT-100 successfully cancelled".to_string()));
}

#[tokio::test]
async fn agent_cannot_call_another_agents_tool() {
    let provider = Arc::new(
        ScriptedProvider::new("agents")
            .with_tool_call("cancel_flight", json!({}))
            .with_message("Let me route you to the right place."),
    );
    let runner = runner(provider, rule_guardrails());
    let mut session = session();
    session.context.flight_number = Some("FLT-100".into());

    let turn = runner
        .run_turn(&mut session, "Cancel my flight")
        .await
        .unwrap();
    assert_eq!(turn.last_agent, AgentId::Triage);
    assert!(tool_outputs(&turn.items).is_empty());
    let errors = tool_errors(&turn.items);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("cancel_flight"));
}

#[tokio::test]
async fn leaf_agents_only_return_to_triage() {
    let provider = Arc::new(
        ScriptedProvider::new("agents")
            // FAQ has no edge to seat booking: reported as an unknown tool
            .with_tool_call(tool_name_for(AgentId::SeatBooking), json!({}))
            .with_tool_call(tool_name_for(AgentId::Triage), json!({"reason": "seat change"}))
            .with_message("Triage here, let me help with your seat."),
    );
    let runner = runner(provider, rule_guardrails());
    let mut session = session();
    session.active = AgentId::Faq;

    let turn = runner
        .run_turn(&mut session, "Actually, can I switch seats?")
        .await
        .unwrap();
    assert_eq!(turn.last_agent, AgentId::Triage);
    assert_eq!(session.active, AgentId::Triage);
    assert_eq!(tool_errors(&turn.items).len(), 1);
    // the seat booking callback never ran
    assert!(session.context.flight_number.is_none());
    let handoffs: Vec<(String, String)> = turn
        .items
        .iter()
        .filter_map(|i| match i {
            RunItem::Handoff(h) => Some((h.from_agent.clone(), h.to_agent.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        handoffs,
        vec![("FAQ Agent".to_string(), "Triage Agent".to_string())]
    );
}

#[tokio::test]
async fn faq_scenarios_through_the_agent() {
    for (question, answer) in [
        ("Is there wifi?", FAQ_WIFI),
        ("What's the weather at my arrival airport?", FAQ_UNKNOWN),
    ] {
        let provider = Arc::new(
            ScriptedProvider::new("agents")
                .with_tool_call("faq_lookup_tool", json!({"question": question}))
                .with_response(ModelResponse::new_message(answer)),
        );
        let runner = runner(provider, rule_guardrails());
        let mut session = session();
        session.active = AgentId::Faq;

        let turn = runner.run_turn(&mut session, question).await.unwrap();
        assert_eq!(tool_outputs(&turn.items), vec![answer.to_string()]);
        assert_eq!(turn.final_output, answer);
    }
}
